// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Live pipeline nodes.
//!
//! The set of node kinds is fixed by the config vocabulary, so nodes are a
//! closed enum dispatching to one struct per kind. All methods run on the
//! graph event loop; hardware results come back as events.

mod accelerator;
mod base;
mod input;
mod output;
mod pass_through;

use std::collections::BTreeSet;
use std::sync::Arc;

pub use self::accelerator::{AcceleratorKind, AcceleratorNode};
pub use self::base::{DeliverFn, FormatDone, NodeCore, NodeId};
pub use self::input::InputNode;
pub use self::output::OutputNode;
pub use self::pass_through::PassThroughNode;

use crate::core::config::StreamType;
use crate::core::error::{PipelineError, Result};
use crate::core::frames::{FrameMetadata, FrameToken, InFlightBuffers};
use crate::core::graph::NodePath;
use crate::core::hardware::{Completion, CropRect, HardwareEvent};
use crate::core::memory::ImageFormat;

pub enum ProcessNode {
    Input(InputNode),
    Accelerator(AcceleratorNode),
    PassThrough(PassThroughNode),
    Output(OutputNode),
}

impl ProcessNode {
    pub fn core(&self) -> &NodeCore {
        match self {
            ProcessNode::Input(node) => &node.core,
            ProcessNode::Accelerator(node) => &node.core,
            ProcessNode::PassThrough(node) => &node.core,
            ProcessNode::Output(node) => &node.core,
        }
    }

    pub fn core_mut(&mut self) -> &mut NodeCore {
        match self {
            ProcessNode::Input(node) => &mut node.core,
            ProcessNode::Accelerator(node) => &mut node.core,
            ProcessNode::PassThrough(node) => &mut node.core,
            ProcessNode::Output(node) => &mut node.core,
        }
    }

    pub fn id(&self) -> NodeId {
        self.core().id()
    }

    pub fn path(&self) -> &NodePath {
        self.core().path()
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            ProcessNode::Input(_) => "input",
            ProcessNode::Accelerator(node) => node.kind_name(),
            ProcessNode::PassThrough(_) => "pass_through",
            ProcessNode::Output(_) => "output",
        }
    }

    pub fn is_output(&self) -> bool {
        matches!(self, ProcessNode::Output(_))
    }

    pub fn is_enabled(&self) -> bool {
        self.core().is_enabled()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.core().is_shutting_down()
    }

    /// Enabled and not shutting down.
    pub fn accepts_frames(&self) -> bool {
        self.core().accepts_frames()
    }

    pub fn stream_types(&self) -> &BTreeSet<StreamType> {
        self.core().stream_types()
    }

    pub fn in_flight(&self) -> &Arc<InFlightBuffers> {
        self.core().in_flight()
    }

    pub fn output_formats(&self) -> &[ImageFormat] {
        self.core().output_formats()
    }

    pub fn current_format(&self) -> u32 {
        self.core().current_format()
    }

    /// Take ownership of a frame from the parent.
    pub fn process_frame(&mut self, token: FrameToken, metadata: FrameMetadata) {
        match self {
            ProcessNode::Input(node) => node.process_frame(token, metadata),
            ProcessNode::Accelerator(node) => node.process_frame(token, metadata),
            ProcessNode::PassThrough(node) => node.process_frame(token, metadata),
            ProcessNode::Output(node) => node.process_frame(token, metadata),
        }
    }

    /// Switch the active output format; `done` runs once acknowledged.
    pub fn set_output_format(&mut self, format_index: u32, done: FormatDone) {
        if format_index as usize >= self.output_formats().len().max(1) {
            done(Err(PipelineError::InvalidArgs(format!(
                "[{}] format index {} out of range",
                self.path(),
                format_index
            ))));
            return;
        }
        match self {
            ProcessNode::Accelerator(node) => node.set_output_format(format_index, done),
            _ => {
                self.core_mut().set_current_format(format_index);
                done(Ok(()))
            }
        }
    }

    pub fn set_crop_rect(&mut self, crop: CropRect) -> Result<()> {
        match self {
            ProcessNode::Accelerator(node) => node.set_crop_rect(crop),
            _ => Err(PipelineError::NotSupported(format!(
                "[{}] {} nodes cannot crop",
                self.path(),
                self.kind_name()
            ))),
        }
    }

    /// Mark the node enabled. Returns whether this was a transition.
    pub fn start_streaming(&mut self) -> Result<bool> {
        if self.is_shutting_down() {
            return Err(PipelineError::BadState(format!(
                "[{}] start requested during shutdown",
                self.path()
            )));
        }
        if self.is_enabled() {
            return Ok(false);
        }
        if let ProcessNode::Input(node) = self {
            node.set_enabled(true)?;
        } else {
            self.core_mut().set_enabled(true);
        }
        tracing::debug!("[{}] Streaming started", self.path());
        Ok(true)
    }

    /// Mark the node disabled. Returns whether this was a transition.
    pub fn stop_streaming(&mut self) -> Result<bool> {
        if !self.is_enabled() {
            return Ok(false);
        }
        if let ProcessNode::Input(node) = self {
            node.set_enabled(false)?;
        } else {
            self.core_mut().set_enabled(false);
        }
        tracing::debug!("[{}] Streaming stopped", self.path());
        Ok(true)
    }

    /// Apply the global streaming switch. Only input nodes touch hardware.
    pub fn set_streaming_allowed(&mut self, allowed: bool) -> Result<()> {
        match self {
            ProcessNode::Input(node) => node.set_streaming_allowed(allowed),
            _ => Ok(()),
        }
    }

    /// Begin asynchronous teardown. `completion` runs when the node is done.
    pub fn shutdown(&mut self, completion: Completion) {
        if self.is_shutting_down() {
            tracing::error!("[{}] Shutdown requested twice", self.path());
            return;
        }
        self.core_mut().mark_shutting_down();
        tracing::debug!("[{}] Shutting down {}", self.path(), self.kind_name());
        match self {
            ProcessNode::Input(node) => node.shutdown(completion),
            ProcessNode::Accelerator(node) => node.shutdown(completion),
            ProcessNode::PassThrough(node) => node.shutdown(completion),
            ProcessNode::Output(node) => node.shutdown(completion),
        }
    }

    pub(crate) fn handle_hardware(&mut self, event: HardwareEvent) {
        match self {
            ProcessNode::Input(node) => node.handle_hardware(event),
            ProcessNode::Accelerator(node) => node.handle_hardware(event),
            _ => tracing::warn!(
                "[{}] Unexpected hardware event {:?} for {}",
                self.path(),
                event,
                self.kind_name()
            ),
        }
    }

    /// Hand the oldest queued input to the accelerator task.
    pub(crate) fn submit_next(&mut self) {
        if let ProcessNode::Accelerator(node) = self {
            node.submit_next();
        }
    }

    pub fn as_output(&self) -> Option<&OutputNode> {
        match self {
            ProcessNode::Output(node) => Some(node),
            _ => None,
        }
    }

    pub fn as_output_mut(&mut self) -> Option<&mut OutputNode> {
        match self {
            ProcessNode::Output(node) => Some(node),
            _ => None,
        }
    }
}

impl std::fmt::Debug for ProcessNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProcessNode")
            .field("kind", &self.kind_name())
            .field("path", self.path())
            .field("enabled", &self.is_enabled())
            .field("shutting_down", &self.is_shutting_down())
            .finish()
    }
}
