// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Frame delivery: rate division and buffer accounting.

mod common;

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use campipe::core::StreamType;
use campipe::core::frames::InFlightBuffers;
use campipe::core::graph::NodePath;
use common::{Bench, DS_ML, FR_ML, SCALER_PRODUCT, SHARED_PRODUCT, TIMEOUT};

const FRAME_NANOS: i64 = 33_333_333;

fn in_flight(bench: &Bench, path: &[u8]) -> Arc<InFlightBuffers> {
    let node = bench
        .manager
        .graph()
        .node(&NodePath::from_indices(path.to_vec()))
        .unwrap();
    Arc::clone(node.in_flight())
}

#[test]
fn test_scaler_receives_a_third_of_sensor_frames() {
    let mut bench = Bench::new(SCALER_PRODUCT);
    let mut full = bench.start(FR_ML);
    let mut downscaled = bench.start(DS_ML);

    let (mut full_frames, mut downscaled_frames) = (0, 0);
    for frame in 0..30 {
        assert!(bench.emit(frame * FRAME_NANOS).is_some());
        full_frames += bench.consume(&mut full);
        downscaled_frames += bench.consume(&mut downscaled);
    }
    assert_eq!(full_frames, 30);
    assert_eq!(downscaled_frames, 10);

    let sensor = bench.hardware.isp.live_stream().unwrap();
    assert!(sensor.held_buffers().is_empty());
    let task = bench.hardware.scaler.task("0.1").unwrap();
    assert_eq!(task.submitted, 10);
    assert!(task.held_outputs.is_empty());

    drop(full);
    drop(downscaled);
    bench.shutdown();
}

#[test]
fn test_shared_pass_through_divides_for_both_children() {
    let mut bench = Bench::new(SHARED_PRODUCT);
    let mut monitor = bench.start(StreamType::MONITORING);
    let mut conference = bench.start(StreamType::VIDEO_CONFERENCE);

    let (mut monitor_frames, mut conference_frames) = (0, 0);
    for frame in 0..60 {
        bench.emit(frame * FRAME_NANOS);
        monitor_frames += bench.consume(&mut monitor);
        conference_frames += bench.consume(&mut conference);
        // Neither child drifts more than one frame from its exact share.
        let elapsed = frame + 1;
        assert!((monitor_frames as i64 - elapsed / 2).abs() <= 1);
        assert!((conference_frames as i64 - elapsed / 6).abs() <= 1);
    }
    assert_eq!(monitor_frames, 30);
    assert_eq!(conference_frames, 10);
    bench.shutdown();
}

#[test]
fn test_upstream_release_waits_for_every_consumer() {
    let mut bench = Bench::new(SHARED_PRODUCT);
    let mut monitor = bench.start(StreamType::MONITORING);
    let mut conference = bench.start(StreamType::VIDEO_CONFERENCE);
    let sensor = bench.hardware.isp.live_stream().unwrap();
    let shared = in_flight(&bench, &[0, 0]);

    let buffer = bench.emit(0).unwrap();
    assert_eq!(shared.in_use(buffer), 2);
    assert_eq!(sensor.held_buffers(), vec![buffer]);

    let frame = monitor.try_next_frame().unwrap();
    assert_eq!(frame.buffer_id, buffer);
    monitor.release_frame(frame.buffer_id);
    bench.manager.run_until_idle();
    assert_eq!(shared.in_use(buffer), 1);
    assert_eq!(sensor.held_buffers(), vec![buffer]);
    assert!(sensor.released_frames().is_empty());

    let frame = conference.try_next_frame().unwrap();
    conference.release_frame(frame.buffer_id);
    bench.manager.run_until_idle();
    assert_eq!(shared.in_use(buffer), 0);
    assert!(sensor.held_buffers().is_empty());
    assert_eq!(sensor.released_frames(), vec![buffer]);
    bench.shutdown();
}

#[test]
fn test_releases_from_client_thread_return_buffers() {
    const FRAMES: usize = 20;
    let mut bench = Bench::new(SCALER_PRODUCT);
    let mut full = bench.start(FR_ML);
    let sensor = bench.hardware.isp.live_stream().unwrap();

    let consumer = thread::spawn(move || {
        let deadline = Instant::now() + TIMEOUT * 5;
        let mut received = 0;
        while received < FRAMES && Instant::now() < deadline {
            match full.try_next_frame() {
                Some(frame) => {
                    full.release_frame(frame.buffer_id);
                    received += 1;
                }
                None => thread::sleep(Duration::from_millis(1)),
            }
        }
        (full, received)
    });

    for frame in 0..FRAMES as i64 {
        assert!(bench.emit(frame * FRAME_NANOS).is_some());
        assert!(
            bench
                .manager
                .run_until(TIMEOUT, |_| sensor.held_buffers().is_empty())
        );
    }
    let (full, received) = consumer.join().unwrap();
    assert_eq!(received, FRAMES);
    assert_eq!(sensor.released_frames().len(), FRAMES);
    assert_eq!(in_flight(&bench, &[0]).outstanding(), 0);

    drop(full);
    bench.shutdown();
}

#[test]
fn test_camping_client_stalls_only_itself() {
    let mut bench = Bench::new(SCALER_PRODUCT);
    let mut full = bench.start(FR_ML);
    let mut downscaled = bench.start(DS_ML);

    // The full-resolution client never releases; its output holds at most
    // its buffer count and drops the rest.
    let mut held = Vec::new();
    let mut downscaled_frames = 0;
    for frame in 0..9 {
        bench.emit(frame * FRAME_NANOS);
        while let Some(available) = full.try_next_frame() {
            held.push(available.buffer_id);
        }
        downscaled_frames += bench.consume(&mut downscaled);
    }
    assert_eq!(held.len(), 2);
    assert_eq!(downscaled_frames, 3);
    let output = bench
        .manager
        .graph()
        .node(&NodePath::from_indices([0, 0]))
        .and_then(|node| node.as_output())
        .unwrap();
    assert_eq!(output.held_frames().len(), 2);

    for buffer_id in held {
        full.release_frame(buffer_id);
    }
    bench.manager.run_until_idle();
    let sensor = bench.hardware.isp.live_stream().unwrap();
    assert!(sensor.held_buffers().is_empty());
    bench.shutdown();
}

#[test]
fn test_global_streaming_switch() {
    let mut bench = Bench::new(SCALER_PRODUCT);
    let mut full = bench.start(FR_ML);
    let sensor = bench.hardware.isp.live_stream().unwrap();
    assert!(sensor.is_running());

    bench.manager.set_streaming_enabled(false);
    assert!(!sensor.is_running());
    assert!(bench.emit(0).is_none());
    assert_eq!(bench.consume(&mut full), 0);

    bench.manager.set_streaming_enabled(true);
    assert!(sensor.is_running());
    assert!(bench.emit(FRAME_NANOS).is_some());
    assert_eq!(bench.consume(&mut full), 1);
    bench.shutdown();
}

#[test]
fn test_release_of_unheld_buffer_is_ignored() {
    let mut bench = Bench::new(SCALER_PRODUCT);
    let mut full = bench.start(FR_ML);
    let sensor = bench.hardware.isp.live_stream().unwrap();

    let buffer = bench.emit(0).unwrap();
    let frame = full.try_next_frame().unwrap();
    full.release_frame(frame.buffer_id + 7);
    bench.manager.run_until_idle();
    assert_eq!(sensor.held_buffers(), vec![buffer]);
    assert_eq!(bench.manager.stream_count(), 1);

    full.release_frame(frame.buffer_id);
    bench.manager.run_until_idle();
    assert!(sensor.held_buffers().is_empty());
    assert!(bench.emit(FRAME_NANOS).is_some());
    assert_eq!(bench.consume(&mut full), 1);
    bench.shutdown();
}
