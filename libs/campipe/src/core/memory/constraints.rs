// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use super::format::PixelFormat;

bitflags! {
    /// How a participant will touch the buffers.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct BufferUsage: u32 {
        const CPU_READ = 1 << 0;
        const CPU_WRITE = 1 << 1;
        const ISP_WRITE = 1 << 2;
        const ACCELERATOR_READ = 1 << 3;
        const ACCELERATOR_WRITE = 1 << 4;
        const VIDEO_READ = 1 << 5;
    }
}

impl Default for BufferUsage {
    fn default() -> Self {
        BufferUsage::empty()
    }
}

/// One acceptable image layout for a participant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageFormatConstraints {
    pub pixel_format: PixelFormat,
    pub width: u32,
    pub height: u32,
    #[serde(default)]
    pub bytes_per_row: Option<u32>,
}

/// What one participant needs from a shared buffer collection.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct BufferCollectionConstraints {
    /// Buffers this participant may hold at once.
    pub min_buffer_count_for_camping: u32,
    /// Minimum total buffer count regardless of camping.
    pub min_buffer_count: u32,
    pub max_buffer_count: Option<u32>,
    pub usage: BufferUsage,
    pub image_format_constraints: Vec<ImageFormatConstraints>,
}

impl BufferCollectionConstraints {
    pub fn camping(count: u32) -> Self {
        Self {
            min_buffer_count_for_camping: count,
            ..Default::default()
        }
    }

    pub fn with_usage(mut self, usage: BufferUsage) -> Self {
        self.usage = usage;
        self
    }

    pub fn with_image_format(mut self, constraints: ImageFormatConstraints) -> Self {
        self.image_format_constraints.push(constraints);
        self
    }
}
