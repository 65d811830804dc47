// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Full graph shutdown and reconfiguration.

mod common;

use campipe::core::StreamType;
use campipe::core::config::PipelineSettings;
use campipe::core::error::PipelineError;
use campipe::core::hardware::fake::VirtualHardware;
use campipe::core::manager::{GraphNotification, ManagerState, PipelineManager};
use common::{Bench, DS_ML, FR_ML, SCALER_PRODUCT, SHARED_PRODUCT, TIMEOUT};

#[test]
fn test_shutdown_waits_for_every_completion() {
    let mut bench = Bench::manual(SCALER_PRODUCT);
    let mut full = bench.start(FR_ML);
    let downscaled = bench.start(DS_ML);
    let sensor = bench.hardware.isp.live_stream().unwrap();
    let notifications = bench.manager.subscribe();

    let first = bench.manager.shutdown();
    let second = bench.manager.shutdown();
    bench.manager.run_until_idle();
    assert_eq!(bench.manager.state(), ManagerState::ShuttingDown);
    assert!(first.try_take().is_none());
    assert_eq!(bench.hardware.scaler.pending_removals(), 1);

    let late = bench.manager.create_stream(common::request(FR_ML));
    bench.manager.run_until_idle();
    assert!(matches!(late.try_take(), Some(Err(PipelineError::ShuttingDown))));

    assert!(bench.hardware.scaler.complete_removal());
    bench.manager.run_until_idle();
    assert!(second.try_take().is_none());
    assert_eq!(bench.manager.graph().len(), 1);

    assert!(sensor.is_shut_down());
    assert!(sensor.complete_shutdown());
    bench.resolve(first).unwrap();
    bench.resolve(second).unwrap();

    assert_eq!(bench.manager.state(), ManagerState::Uninitialized);
    assert!(bench.manager.graph().is_empty());
    assert_eq!(bench.manager.stream_count(), 0);
    assert!(!sensor.is_running());
    assert!(full.try_next_frame().is_none());

    let notifications: Vec<GraphNotification> = notifications.try_iter().collect();
    assert_eq!(
        notifications.last(),
        Some(&GraphNotification::ShutdownComplete)
    );

    // The streams are already gone; dropping the clients changes nothing.
    drop(full);
    drop(downscaled);
    bench.manager.run_until_idle();
    assert_eq!(bench.manager.state(), ManagerState::Uninitialized);
}

#[test]
fn test_shutdown_during_disconnect() {
    let mut bench = Bench::manual(SCALER_PRODUCT);
    let _full = bench.start(FR_ML);
    let downscaled = bench.start(DS_ML);
    let sensor = bench.hardware.isp.live_stream().unwrap();

    drop(downscaled);
    bench.manager.run_until_idle();
    assert!(bench.manager.is_changing());

    let pending = bench.manager.shutdown();
    bench.manager.run_until_idle();
    assert!(bench.hardware.scaler.complete_removal());
    bench.manager.run_until_idle();
    assert!(pending.try_take().is_none());

    assert!(sensor.complete_shutdown());
    bench.resolve(pending).unwrap();
    assert!(bench.manager.graph().is_empty());
    assert_eq!(bench.hardware.scaler.active_tasks(), 0);
}

#[test]
fn test_shutdown_and_reconfigure_installs_next_roots() {
    let mut bench = Bench::new(SCALER_PRODUCT);
    let _full = bench.start(FR_ML);

    let pending = bench
        .manager
        .shutdown_and_reconfigure(common::roots(SHARED_PRODUCT));
    bench.resolve(pending).unwrap();
    assert_eq!(bench.manager.state(), ManagerState::Configured);
    assert!(bench.manager.graph().is_empty());

    let monitor = bench.open(StreamType::MONITORING);
    assert_eq!(bench.manager.graph().len(), 3);
    assert_eq!(bench.hardware.isp.streams().len(), 2);
    drop(monitor);
    bench.shutdown();
}

#[test]
fn test_requests_without_configuration() {
    let mut manager = PipelineManager::new(
        VirtualHardware::new().hardware(),
        PipelineSettings::default(),
    );

    let pending = manager.create_stream(common::request(FR_ML));
    assert!(matches!(
        manager.resolve(pending, TIMEOUT),
        Err(PipelineError::BadState(_))
    ));

    // Nothing to tear down.
    let pending = manager.shutdown();
    manager.resolve(pending, TIMEOUT).unwrap();
    assert_eq!(manager.state(), ManagerState::Uninitialized);

    manager.set_roots(common::roots(SCALER_PRODUCT)).unwrap();
    assert!(matches!(
        manager.set_roots(common::roots(SCALER_PRODUCT)),
        Err(PipelineError::BadState(_))
    ));
    let pending = manager.shutdown();
    manager.resolve(pending, TIMEOUT).unwrap();
}
