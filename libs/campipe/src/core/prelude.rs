// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Commonly used types for `use campipe::prelude::*`.

pub use crate::core::{
    // Configuration
    config::{ConfigNode, NodeKind, PipelineSettings, ProductConfig, StreamType},

    // Device entry point
    controller::{Controller, CreateStreamRequest},

    // Errors
    error::{PipelineError, Result},

    // Graph
    graph::NodePath,

    // Hardware
    hardware::{PipelineHardware, fake::VirtualHardware},

    // Manager
    manager::{FrameAvailable, PipelineManager, StreamClient},

    // Buffers
    memory::{BufferCollectionConstraints, ImageFormat, PixelFormat},
};
