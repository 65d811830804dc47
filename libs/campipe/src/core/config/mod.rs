// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Product configuration and runtime settings.

mod node_descriptor;
mod product_config;
mod settings;
mod stream_type;

pub use node_descriptor::{
    ConfigNode, FrameRate, NodeKind, StreamSupport, WatermarkConfig, find_matching_child,
    resolve_stream_path,
};
pub use product_config::{
    ConfigProvider, DeviceInfo, ExternalConfig, FrameRateRange, InternalConfig, ProductConfig,
    StreamDescription,
};
pub use settings::{LoggingSettings, PipelineSettings};
pub use stream_type::StreamType;
