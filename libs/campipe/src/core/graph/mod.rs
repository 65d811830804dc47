// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Path-indexed table of live pipeline nodes.

mod frame_graph;
mod path;
mod pulldown;

pub use frame_graph::{FrameGraph, FrameGraphNode};
pub use path::NodePath;
pub use pulldown::Pulldown;
