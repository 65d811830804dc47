// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Product configuration and runtime settings read from disk.

mod common;

use std::path::Path;

use campipe::core::config::{PipelineSettings, ProductConfig};
use campipe::core::error::PipelineError;
use campipe::core::hardware::fake::VirtualHardware;
use campipe::core::manager::ManagerState;
use campipe::core::{Controller, CreateStreamRequest, StreamType};
use common::{REFERENCE_PRODUCT, SCALER_PRODUCT, TIMEOUT};

#[test]
fn test_load_product_from_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("product.yaml");
    std::fs::write(&path, SCALER_PRODUCT).unwrap();

    let config = ProductConfig::load(&path).unwrap();
    assert_eq!(config.device_info.product_name, "Scaler Bench");
    assert_eq!(config.external_configs[0].streams.len(), 2);
}

#[test]
fn test_broken_product_names_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("broken.yaml");
    // An output node with children cannot be realized.
    let broken = SCALER_PRODUCT.replace(
        "            input_constraints: { min_buffer_count_for_camping: 2 }\n          - kind: { type: scaler",
        "            input_constraints: { min_buffer_count_for_camping: 2 }\n            children: [{ kind: { type: output }, frame_rate: { numerator: 30 } }]\n          - kind: { type: scaler",
    );
    assert_ne!(broken, SCALER_PRODUCT);
    std::fs::write(&path, broken).unwrap();

    match ProductConfig::load(&path) {
        Err(PipelineError::Configuration(message)) => {
            assert!(message.contains("broken.yaml"), "{}", message);
            assert!(message.contains("0.0"), "{}", message);
        }
        other => panic!(
            "expected a configuration error, got {:?}",
            other.map(|_| ())
        ),
    }
}

#[test]
fn test_missing_product_file() {
    let dir = tempfile::tempdir().unwrap();
    assert!(matches!(
        ProductConfig::load(&dir.path().join("absent.yaml")),
        Err(PipelineError::Configuration(_))
    ));
}

#[test]
fn test_settings_from_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join(PipelineSettings::FILE_NAME);
    std::fs::write(
        &path,
        r#"
streaming_enabled = false
allocation_tag_prefix = "bench"

[logging]
filter = "campipe=trace"
with_target = true
"#,
    )
    .unwrap();

    let settings = PipelineSettings::load(&path).unwrap();
    assert!(!settings.streaming_enabled);
    assert_eq!(settings.allocation_tag(&"0.1"), "bench-0.1");
    assert!(settings.logging.with_target);

    std::fs::write(&path, "streaming_enabled = \"sometimes\"").unwrap();
    assert!(PipelineSettings::load(&path).is_err());
    assert_eq!(
        PipelineSettings::load_or_default(&path),
        PipelineSettings::default()
    );
    assert_eq!(
        PipelineSettings::load_or_default(Path::new("/nonexistent/campipe.toml")),
        PipelineSettings::default()
    );
}

#[test]
fn test_settings_reach_the_graph() {
    let settings = PipelineSettings {
        streaming_enabled: false,
        allocation_tag_prefix: "bench".into(),
        ..Default::default()
    };
    let hardware = VirtualHardware::new();
    let config = ProductConfig::from_yaml_str(SCALER_PRODUCT).unwrap();
    let mut controller = Controller::new(config, hardware.hardware(), settings).unwrap();
    let pending = controller.set_config(0);
    controller.manager_mut().resolve(pending, TIMEOUT).unwrap();

    let pending = controller.create_stream(CreateStreamRequest {
        config_index: 0,
        stream_index: 0,
        image_format_index: 0,
        buffer_count: 2,
    });
    let client = controller.manager_mut().resolve(pending, TIMEOUT).unwrap();
    client.start();
    controller.manager_mut().run_until_idle();

    let allocations = hardware.allocator.allocations();
    assert_eq!(allocations[0].name, "bench-0");
    let sensor = hardware.isp.live_stream().unwrap();
    assert!(!sensor.is_running());

    controller.enable_streaming();
    assert!(sensor.is_running());

    drop(client);
    let pending = controller.shutdown();
    controller.manager_mut().resolve(pending, TIMEOUT).unwrap();
}

#[test]
fn test_reference_product_switches_configs() {
    let config = ProductConfig::from_yaml_str(REFERENCE_PRODUCT).unwrap();
    assert_eq!(config.external_configs.len(), 2);
    let mut controller = Controller::new(
        config,
        VirtualHardware::new().hardware(),
        PipelineSettings::default(),
    )
    .unwrap();

    let pending = controller.set_config(0);
    controller.manager_mut().resolve(pending, TIMEOUT).unwrap();
    let pending = controller.create_stream(CreateStreamRequest {
        config_index: 0,
        stream_index: 1,
        image_format_index: 0,
        buffer_count: 2,
    });
    let downscaled = controller.manager_mut().resolve(pending, TIMEOUT).unwrap();
    assert_eq!(
        downscaled.stream_type(),
        StreamType::DOWNSCALED_RESOLUTION | StreamType::MACHINE_LEARNING
    );
    assert_eq!(controller.manager().graph().len(), 3);

    let pending = controller.set_config(1);
    controller.manager_mut().resolve(pending, TIMEOUT).unwrap();
    assert_eq!(controller.active_config(), Some(1));
    assert_eq!(controller.manager().state(), ManagerState::Configured);
    assert!(controller.manager().graph().is_empty());

    // Config 0 requests are now refused before reaching the graph.
    let stale = controller.create_stream(CreateStreamRequest {
        config_index: 0,
        stream_index: 1,
        image_format_index: 0,
        buffer_count: 2,
    });
    assert!(matches!(
        stale.try_take(),
        Some(Err(PipelineError::BadState(_)))
    ));

    let pending = controller.create_stream(CreateStreamRequest {
        config_index: 1,
        stream_index: 0,
        image_format_index: 1,
        buffer_count: 2,
    });
    let conference = controller.manager_mut().resolve(pending, TIMEOUT).unwrap();
    assert_eq!(conference.stream_type(), StreamType::VIDEO_CONFERENCE);
    assert_eq!(controller.manager().graph().len(), 4);

    drop(downscaled);
    drop(conference);
    let pending = controller.shutdown();
    controller.manager_mut().resolve(pending, TIMEOUT).unwrap();
}
