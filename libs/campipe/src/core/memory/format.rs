// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use serde::{Deserialize, Serialize};

/// Pixel layouts the camera stages exchange.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PixelFormat {
    Nv12,
    I420,
    R8G8B8A8,
    Bayer,
}

impl PixelFormat {
    /// Stable numeric code used in hardware descriptors.
    pub fn code(&self) -> u32 {
        match self {
            PixelFormat::Nv12 => 1,
            PixelFormat::I420 => 2,
            PixelFormat::R8G8B8A8 => 3,
            PixelFormat::Bayer => 4,
        }
    }
}

/// Resolved layout of the images in a buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ImageFormat {
    pub pixel_format: PixelFormat,
    pub width: u32,
    pub height: u32,
    pub bytes_per_row: u32,
}

impl ImageFormat {
    pub fn new(pixel_format: PixelFormat, width: u32, height: u32, bytes_per_row: u32) -> Self {
        Self {
            pixel_format,
            width,
            height,
            bytes_per_row,
        }
    }

    /// NV12 with a tightly packed stride.
    pub fn nv12(width: u32, height: u32) -> Self {
        Self::new(PixelFormat::Nv12, width, height, width)
    }

    /// Descriptor in the layout the accelerator drivers consume.
    pub fn to_hw(&self) -> HwImageFormat {
        HwImageFormat {
            width: self.width,
            height: self.height,
            stride: self.bytes_per_row,
            pixel_format: self.pixel_format.code(),
        }
    }
}

/// C-compatible image format descriptor handed to accelerator drivers.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HwImageFormat {
    pub width: u32,
    pub height: u32,
    pub stride: u32,
    pub pixel_format: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_nv12_stride() {
        let format = ImageFormat::nv12(1920, 1080);
        assert_eq!(format.bytes_per_row, 1920);
        assert_eq!(format.pixel_format, PixelFormat::Nv12);
    }

    #[test]
    fn test_hw_descriptor() {
        let hw = ImageFormat::new(PixelFormat::I420, 640, 480, 704).to_hw();
        assert_eq!(hw.width, 640);
        assert_eq!(hw.height, 480);
        assert_eq!(hw.stride, 704);
        assert_eq!(hw.pixel_format, PixelFormat::I420.code());
    }

    #[test]
    fn test_yaml_names() {
        let format: ImageFormat = serde_yaml::from_str(
            "pixel_format: nv12\nwidth: 1280\nheight: 720\nbytes_per_row: 1280\n",
        )
        .unwrap();
        assert_eq!(format, ImageFormat::nv12(1280, 720));
    }
}
