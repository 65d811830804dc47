// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Contracts for the sensor, accelerator and firmware collaborators.
//!
//! Every operation is a request that returns immediately; results arrive
//! later as [`HardwareEvent`]s through the [`HardwareCallback`] bound at
//! creation time, and the graph handles them on its own event loop.

mod accelerator;
pub mod fake;
mod firmware;
mod isp;

use std::sync::Arc;

pub use accelerator::{Accelerator, CropRect, TaskConfig, TaskIndex, TaskRequest, WatermarkBlob};
pub use firmware::{DirectoryFirmwareLoader, FirmwareBlob, FirmwareLoader};
pub use isp::{IspDevice, IspStream, OutputStreamRequest};

use crate::core::error::Result;
use crate::core::memory::Allocator;

/// One-shot continuation signalled when an asynchronous request finishes.
pub type Completion = Box<dyn FnOnce() + Send>;

/// Sink for events raised by one hardware stream or task.
pub type HardwareCallback = Arc<dyn Fn(HardwareEvent) + Send + Sync>;

#[derive(Debug)]
pub enum HardwareEvent {
    /// A buffer was filled and is now owned by the receiver.
    FrameReady {
        buffer_index: u32,
        timestamp: i64,
        capture_timestamp: i64,
    },
    /// The task switched its active output format.
    ResolutionChanged { format_index: u32 },
    /// A `remove_task` request finished.
    TaskRemoved { status: Result<()> },
}

/// The hardware collaborators one pipeline instance drives.
#[derive(Clone)]
pub struct PipelineHardware {
    pub isp: Arc<dyn IspDevice>,
    /// Scale/crop accelerator.
    pub scaler: Arc<dyn Accelerator>,
    /// 2D compositing accelerator (resize and watermark tasks).
    pub compositor: Arc<dyn Accelerator>,
    pub allocator: Arc<dyn Allocator>,
    pub firmware: Arc<dyn FirmwareLoader>,
}
