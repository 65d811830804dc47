// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

/// Per-frame data that travels alongside a buffer token.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrameMetadata {
    /// Presentation timestamp in nanoseconds.
    pub timestamp: i64,
    /// Sensor capture timestamp in nanoseconds.
    pub capture_timestamp: i64,
    pub image_format_index: u32,
    /// Buffer index within the producing collection.
    pub buffer_index: u32,
}

impl FrameMetadata {
    pub fn with_buffer_index(mut self, buffer_index: u32) -> Self {
        self.buffer_index = buffer_index;
        self
    }

    pub fn with_image_format_index(mut self, image_format_index: u32) -> Self {
        self.image_format_index = image_format_index;
        self
    }
}
