// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

pub mod config;
pub mod controller;
pub mod error;
pub mod frames;
pub mod graph;
pub mod hardware;
pub mod logging;
pub mod manager;
pub mod memory;
pub mod nodes;
pub mod prelude;
pub mod rational;

pub use config::{
    ConfigNode, ConfigProvider, ExternalConfig, NodeKind, PipelineSettings, ProductConfig,
    StreamType,
};
pub use controller::{Controller, CreateStreamRequest};
pub use error::*;
pub use frames::{FrameMetadata, FrameToken, InFlightBuffers};
pub use graph::{FrameGraph, NodePath, Pulldown};
pub use hardware::{Completion, HardwareCallback, HardwareEvent, PipelineHardware};
pub use manager::{GraphNotification, ManagerState, PipelineManager, StreamClient};
pub use memory::{BufferCollection, BufferCollectionConstraints, ImageFormat, PixelFormat};
pub use nodes::ProcessNode;
pub use rational::Fraction;
