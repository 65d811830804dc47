// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use serde::Serialize;

use campipe::core::config::{PipelineSettings, ProductConfig};
use campipe::core::hardware::fake::VirtualHardware;
use campipe::core::manager::StreamClient;
use campipe::core::{Controller, CreateStreamRequest};

const REPLY_TIMEOUT: Duration = Duration::from_secs(5);
const NANOS_PER_SECOND: i64 = 1_000_000_000;

pub struct SimulateOptions {
    pub config_index: u32,
    /// Empty means every stream of the config.
    pub streams: Vec<u32>,
    pub frames: u32,
    pub buffer_count: u32,
}

#[derive(Debug, Serialize)]
pub struct StreamReport {
    pub stream_index: u32,
    pub stream_type: String,
    pub path: String,
    pub frames_received: u64,
}

#[derive(Debug, Serialize)]
pub struct SimulationReport {
    pub product: String,
    pub config_index: u32,
    pub frames_emitted: u64,
    pub nodes_built: usize,
    pub streams: Vec<StreamReport>,
    pub buffers_outstanding: usize,
}

struct OpenStream {
    stream_index: u32,
    client: StreamClient,
    frames_received: u64,
}

/// Activate a config on virtual hardware, open the requested streams and
/// push sensor frames through the graph until every frame has been consumed.
pub fn run(
    product: &Path,
    settings: PipelineSettings,
    options: &SimulateOptions,
) -> Result<SimulationReport> {
    let config = ProductConfig::load(product)
        .with_context(|| format!("Invalid product configuration {}", product.display()))?;
    let product_name = config.device_info.product_name.clone();

    let roots = config
        .roots(options.config_index as usize)
        .with_context(|| format!("Config {} does not exist", options.config_index))?;
    let Some(sensor_rate) = roots
        .iter()
        .find(|root| root.is_input())
        .map(|root| root.frame_rate)
    else {
        bail!("Config {} has no sensor input", options.config_index);
    };
    let frame_interval =
        NANOS_PER_SECOND * i64::from(sensor_rate.denominator) / i64::from(sensor_rate.numerator);
    let stream_indices: Vec<u32> = if options.streams.is_empty() {
        let count = config.external_configs[options.config_index as usize]
            .streams
            .len();
        (0..count as u32).collect()
    } else {
        options.streams.clone()
    };

    let hardware = VirtualHardware::new();
    let mut controller = Controller::new(config, hardware.hardware(), settings)?;

    let pending = controller.set_config(options.config_index);
    controller
        .manager_mut()
        .resolve(pending, REPLY_TIMEOUT)
        .context("Failed to activate config")?;

    let mut open = Vec::with_capacity(stream_indices.len());
    for stream_index in stream_indices {
        let pending = controller.create_stream(CreateStreamRequest {
            config_index: options.config_index,
            stream_index,
            image_format_index: 0,
            buffer_count: options.buffer_count,
        });
        let client = controller
            .manager_mut()
            .resolve(pending, REPLY_TIMEOUT)
            .with_context(|| format!("Failed to open stream {}", stream_index))?;
        tracing::info!(
            "Opened stream {} ({}) at {}",
            stream_index,
            client.stream_type(),
            client.path()
        );
        client.start();
        open.push(OpenStream {
            stream_index,
            client,
            frames_received: 0,
        });
    }
    controller.manager_mut().run_until_idle();

    let mut frames_emitted = 0;
    for frame in 0..i64::from(options.frames) {
        let timestamp = frame * frame_interval;
        for sensor in hardware.isp.streams() {
            if sensor.emit_frame(timestamp).is_some() {
                frames_emitted += 1;
            }
        }
        controller.manager_mut().run_until_idle();

        for stream in &mut open {
            while let Some(available) = stream.client.try_next_frame() {
                stream.frames_received += 1;
                stream.client.release_frame(available.buffer_id);
            }
        }
        controller.manager_mut().run_until_idle();
    }

    let nodes_built = controller.manager().graph().len();
    let streams = open
        .iter()
        .map(|stream| StreamReport {
            stream_index: stream.stream_index,
            stream_type: stream.client.stream_type().to_string(),
            path: stream.client.path().to_string(),
            frames_received: stream.frames_received,
        })
        .collect();

    drop(open);
    let pending = controller.shutdown();
    controller
        .manager_mut()
        .resolve(pending, REPLY_TIMEOUT)
        .context("Graph did not shut down")?;

    Ok(SimulationReport {
        product: product_name,
        config_index: options.config_index,
        frames_emitted,
        nodes_built,
        streams,
        buffers_outstanding: hardware.allocator.outstanding_tokens(),
    })
}

pub fn print_report(report: &SimulationReport, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(report)?);
        return Ok(());
    }

    println!(
        "{}: config {} built {} nodes, {} sensor frames",
        report.product, report.config_index, report.nodes_built, report.frames_emitted
    );
    for stream in &report.streams {
        println!(
            "  stream {} {} at {}: {} frames",
            stream.stream_index, stream.stream_type, stream.path, stream.frames_received
        );
    }
    if report.buffers_outstanding > 0 {
        println!(
            "  warning: {} buffer tokens still outstanding",
            report.buffers_outstanding
        );
    }
    Ok(())
}
