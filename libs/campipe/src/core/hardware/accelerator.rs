// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::{FirmwareBlob, HardwareCallback};
use crate::core::error::{PipelineError, Result};
use crate::core::memory::{BufferCollection, HwImageFormat};

/// Opaque handle for an initialized accelerator task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskIndex(pub u32);

impl fmt::Display for TaskIndex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "task_{}", self.0)
    }
}

/// Crop region in normalized `0.0..=1.0` image coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRect {
    pub x_min: f32,
    pub y_min: f32,
    pub x_max: f32,
    pub y_max: f32,
}

impl CropRect {
    pub const FULL: CropRect = CropRect {
        x_min: 0.0,
        y_min: 0.0,
        x_max: 1.0,
        y_max: 1.0,
    };

    /// Build a crop region, rejecting empty or out-of-range rectangles.
    pub fn new(x_min: f32, y_min: f32, x_max: f32, y_max: f32) -> Result<Self> {
        let valid = |v: f32| (0.0..=1.0).contains(&v);
        if ![x_min, y_min, x_max, y_max].into_iter().all(valid) {
            return Err(PipelineError::InvalidArgs(format!(
                "crop ({}, {}, {}, {}) outside 0..=1",
                x_min, y_min, x_max, y_max
            )));
        }
        if x_min >= x_max || y_min >= y_max {
            return Err(PipelineError::InvalidArgs(format!(
                "crop ({}, {}, {}, {}) is empty",
                x_min, y_min, x_max, y_max
            )));
        }
        Ok(Self {
            x_min,
            y_min,
            x_max,
            y_max,
        })
    }
}

/// A watermark image loaded for a compositing task.
#[derive(Debug, Clone)]
pub struct WatermarkBlob {
    pub blob: FirmwareBlob,
    pub x: u32,
    pub y: u32,
}

/// Kind-specific setup for a task.
#[derive(Debug, Clone)]
pub enum TaskConfig {
    /// Scale/crop with its firmware configuration blobs.
    Scale { firmware: Vec<FirmwareBlob> },
    /// Compositor resize, optionally cropped.
    Resize { crop: Option<CropRect> },
    /// Compositor watermark blend.
    Watermark { watermarks: Vec<WatermarkBlob> },
}

#[derive(Debug, Clone)]
pub struct TaskRequest {
    /// Diagnostic name, the node path.
    pub name: String,
    pub input_collection: Arc<BufferCollection>,
    pub output_collection: Arc<BufferCollection>,
    pub input_format: HwImageFormat,
    pub output_formats: Vec<HwImageFormat>,
    pub default_format_index: u32,
    pub config: TaskConfig,
}

impl TaskRequest {
    /// Whether the task writes into the buffer it reads.
    pub fn is_in_place(&self) -> bool {
        self.input_collection.id() == self.output_collection.id()
    }
}

/// A scaling or compositing accelerator driver.
///
/// Completed frames are reported as `FrameReady` with the output buffer
/// index, removals as `TaskRemoved`, format switches as `ResolutionChanged`.
pub trait Accelerator: Send + Sync {
    fn init_task(&self, request: TaskRequest, callback: HardwareCallback) -> Result<TaskIndex>;

    fn process_frame(&self, task: TaskIndex, buffer_index: u32) -> Result<()>;

    /// Return an output buffer previously reported through `FrameReady`.
    fn release_frame(&self, task: TaskIndex, buffer_index: u32);

    fn set_output_resolution(&self, task: TaskIndex, format_index: u32) -> Result<()>;

    fn set_crop_rect(&self, task: TaskIndex, crop: CropRect) -> Result<()>;

    fn remove_task(&self, task: TaskIndex);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_crop_rect_validation() {
        assert!(CropRect::new(0.0, 0.0, 1.0, 1.0).is_ok());
        assert!(CropRect::new(0.25, 0.25, 0.75, 0.5).is_ok());
        assert!(matches!(
            CropRect::new(-0.1, 0.0, 1.0, 1.0),
            Err(PipelineError::InvalidArgs(_))
        ));
        assert!(matches!(
            CropRect::new(0.5, 0.0, 0.5, 1.0),
            Err(PipelineError::InvalidArgs(_))
        ));
        assert!(CropRect::new(0.0, 0.0, 1.5, 1.0).is_err());
    }
}
