// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::Arc;

use super::{Completion, HardwareCallback};
use crate::core::error::Result;
use crate::core::memory::{BufferCollection, ImageFormat};
use crate::core::rational::Fraction;

/// Parameters for one sensor output stream.
#[derive(Debug, Clone)]
pub struct OutputStreamRequest {
    pub collection: Arc<BufferCollection>,
    pub format: Option<ImageFormat>,
    /// Frames per second.
    pub frame_rate: Fraction,
    /// Which physical ISP output to use (e.g. full resolution or downscaled).
    pub variant: String,
}

/// The image-signal-processor driver.
pub trait IspDevice: Send + Sync {
    /// Frames are reported through `callback` as `FrameReady` once started.
    fn create_output_stream(
        &self,
        request: OutputStreamRequest,
        callback: HardwareCallback,
    ) -> Result<Arc<dyn IspStream>>;
}

pub trait IspStream: Send + Sync {
    fn start(&self) -> Result<()>;

    fn stop(&self) -> Result<()>;

    /// Return a buffer previously reported through `FrameReady`.
    fn release_frame(&self, buffer_index: u32);

    fn shutdown(&self, completion: Completion);
}
