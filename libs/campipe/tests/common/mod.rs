// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Shared fixture for the integration tests.

#![allow(dead_code)]

use std::time::Duration;

use campipe::core::Result;
use campipe::core::config::{ConfigNode, PipelineSettings, ProductConfig, StreamType};
use campipe::core::hardware::fake::VirtualHardware;
use campipe::core::manager::{PendingReply, PipelineManager, StreamClient, StreamRequest};

pub const TIMEOUT: Duration = Duration::from_secs(2);

pub const FR_ML: StreamType = StreamType::FULL_RESOLUTION.union(StreamType::MACHINE_LEARNING);
pub const DS_ML: StreamType =
    StreamType::DOWNSCALED_RESOLUTION.union(StreamType::MACHINE_LEARNING);

/// Sensor at 30fps feeding a full-resolution output directly and a 10fps
/// downscaled output through a scaler.
pub const SCALER_PRODUCT: &str = r#"
device_info: { vendor_name: Example, product_name: Scaler Bench }
external_configs:
  - streams:
      - stream_type: FULL_RESOLUTION | MACHINE_LEARNING
        frame_rate: { numerator: 30 }
        image_formats:
          - { pixel_format: nv12, width: 1920, height: 1080, bytes_per_row: 1920 }
      - stream_type: DOWNSCALED_RESOLUTION | MACHINE_LEARNING
        frame_rate: { numerator: 10 }
        image_formats:
          - { pixel_format: nv12, width: 640, height: 480, bytes_per_row: 640 }
internal_configs:
  - frame_rate_range: { min: { numerator: 10 }, max: { numerator: 30 } }
    roots:
      - kind: { type: input }
        frame_rate: { numerator: 30 }
        supported_streams:
          - stream_type: FULL_RESOLUTION | MACHINE_LEARNING
          - stream_type: DOWNSCALED_RESOLUTION | MACHINE_LEARNING
        output_constraints: { min_buffer_count_for_camping: 2 }
        image_formats:
          - { pixel_format: nv12, width: 1920, height: 1080, bytes_per_row: 1920 }
        children:
          - kind: { type: output }
            frame_rate: { numerator: 30 }
            supported_streams:
              - stream_type: FULL_RESOLUTION | MACHINE_LEARNING
            input_constraints: { min_buffer_count_for_camping: 2 }
          - kind: { type: scaler, config_files: [config_480p.bin] }
            frame_rate: { numerator: 10 }
            supported_streams:
              - stream_type: DOWNSCALED_RESOLUTION | MACHINE_LEARNING
            input_constraints: { min_buffer_count_for_camping: 1 }
            output_constraints: { min_buffer_count_for_camping: 1 }
            image_formats:
              - { pixel_format: nv12, width: 640, height: 480, bytes_per_row: 640 }
            children:
              - kind: { type: output }
                frame_rate: { numerator: 10 }
                supported_streams:
                  - stream_type: DOWNSCALED_RESOLUTION | MACHINE_LEARNING
                input_constraints: { min_buffer_count_for_camping: 2 }
"#;

/// Sensor at 30fps feeding a 15fps pass-through shared by a 15fps monitor
/// and a 5fps conference output.
pub const SHARED_PRODUCT: &str = r#"
device_info: { vendor_name: Example, product_name: Shared Bench }
external_configs:
  - streams:
      - stream_type: MONITORING
        frame_rate: { numerator: 15 }
        image_formats:
          - { pixel_format: nv12, width: 1280, height: 720, bytes_per_row: 1280 }
      - stream_type: VIDEO_CONFERENCE
        frame_rate: { numerator: 5 }
        image_formats:
          - { pixel_format: nv12, width: 1280, height: 720, bytes_per_row: 1280 }
internal_configs:
  - frame_rate_range: { min: { numerator: 5 }, max: { numerator: 30 } }
    roots:
      - kind: { type: input }
        frame_rate: { numerator: 30 }
        supported_streams:
          - stream_type: MONITORING
          - stream_type: VIDEO_CONFERENCE
        output_constraints: { min_buffer_count_for_camping: 2 }
        image_formats:
          - { pixel_format: nv12, width: 1280, height: 720, bytes_per_row: 1280 }
        children:
          - kind: { type: pass_through }
            frame_rate: { numerator: 15 }
            supported_streams:
              - stream_type: MONITORING
              - stream_type: VIDEO_CONFERENCE
            children:
              - kind: { type: output }
                frame_rate: { numerator: 15 }
                supported_streams:
                  - stream_type: MONITORING
                input_constraints: { min_buffer_count_for_camping: 1 }
              - kind: { type: output }
                frame_rate: { numerator: 5 }
                supported_streams:
                  - stream_type: VIDEO_CONFERENCE
                input_constraints: { min_buffer_count_for_camping: 1 }
"#;

/// The sample product configuration shipped with the workspace.
pub const REFERENCE_PRODUCT: &str = include_str!("../../../../configs/reference_product.yaml");

pub fn roots(product: &str) -> Vec<ConfigNode> {
    let config = ProductConfig::from_yaml_str(product).unwrap();
    config.roots(0).unwrap().to_vec()
}

pub fn request(stream_type: StreamType) -> StreamRequest {
    StreamRequest {
        stream_type,
        image_format_index: 0,
        buffer_count: 2,
    }
}

/// A manager over virtual hardware with the first config of a product
/// installed.
pub struct Bench {
    pub hardware: VirtualHardware,
    pub manager: PipelineManager,
}

impl Bench {
    pub fn new(product: &str) -> Self {
        Self::with_hardware(product, VirtualHardware::new())
    }

    /// Completions wait for the test to release them.
    pub fn manual(product: &str) -> Self {
        Self::with_hardware(product, VirtualHardware::manual())
    }

    fn with_hardware(product: &str, hardware: VirtualHardware) -> Self {
        Self::with_roots(roots(product), hardware)
    }

    pub fn with_roots(roots: Vec<ConfigNode>, hardware: VirtualHardware) -> Self {
        let mut manager = PipelineManager::new(hardware.hardware(), PipelineSettings::default());
        manager.set_roots(roots).unwrap();
        manager.run_until_idle();
        Self { hardware, manager }
    }

    pub fn resolve<T>(&mut self, pending: PendingReply<T>) -> Result<T> {
        self.manager.resolve(pending, TIMEOUT)
    }

    pub fn open(&mut self, stream_type: StreamType) -> StreamClient {
        let pending = self.manager.create_stream(request(stream_type));
        self.resolve(pending).unwrap()
    }

    /// Open and start a stream.
    pub fn start(&mut self, stream_type: StreamType) -> StreamClient {
        let client = self.open(stream_type);
        client.start();
        self.manager.run_until_idle();
        client
    }

    /// Emit one frame on the live sensor stream and run the loop dry.
    pub fn emit(&mut self, timestamp: i64) -> Option<u32> {
        let sensor = self.hardware.isp.live_stream()?;
        let emitted = sensor.emit_frame(timestamp);
        self.manager.run_until_idle();
        emitted
    }

    /// Take every frame waiting on `client`, release them all and run the
    /// loop dry. Returns how many there were.
    pub fn consume(&mut self, client: &mut StreamClient) -> usize {
        let mut consumed = 0;
        while let Some(frame) = client.try_next_frame() {
            client.release_frame(frame.buffer_id);
            consumed += 1;
        }
        self.manager.run_until_idle();
        consumed
    }

    pub fn shutdown(&mut self) {
        let pending = self.manager.shutdown();
        self.resolve(pending).unwrap();
    }
}
