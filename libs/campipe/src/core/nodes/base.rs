// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;

use crate::core::config::StreamType;
use crate::core::error::Result;
use crate::core::frames::{FrameMetadata, FrameToken, InFlightBuffers};
use crate::core::graph::NodePath;
use crate::core::memory::{BufferCollection, ImageFormat};

/// Identity of one node instance. Paths are reused after teardown; ids are not.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub u64);

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "node_{}", self.0)
    }
}

/// Frame-delivery callback bound to a node's path.
pub type DeliverFn = Box<dyn Fn(FrameToken, FrameMetadata) + Send>;

/// Acknowledgement of a format change.
pub type FormatDone = Box<dyn FnOnce(Result<()>) + Send>;

/// State shared by every node kind.
pub struct NodeCore {
    id: NodeId,
    path: NodePath,
    enabled: bool,
    shutting_down: bool,
    stream_types: BTreeSet<StreamType>,
    input_formats: Vec<ImageFormat>,
    output_formats: Vec<ImageFormat>,
    current_format: u32,
    input_collection: Option<Arc<BufferCollection>>,
    output_collection: Option<Arc<BufferCollection>>,
    in_flight: Arc<InFlightBuffers>,
    deliver: DeliverFn,
}

impl NodeCore {
    pub fn new(id: NodeId, path: NodePath, deliver: DeliverFn) -> Self {
        Self {
            id,
            path,
            enabled: false,
            shutting_down: false,
            stream_types: BTreeSet::new(),
            input_formats: Vec::new(),
            output_formats: Vec::new(),
            current_format: 0,
            input_collection: None,
            output_collection: None,
            in_flight: InFlightBuffers::new(),
            deliver,
        }
    }

    pub fn with_input(
        mut self,
        collection: Option<Arc<BufferCollection>>,
        formats: Vec<ImageFormat>,
    ) -> Self {
        self.input_collection = collection;
        self.input_formats = formats;
        self
    }

    pub fn with_output(
        mut self,
        collection: Option<Arc<BufferCollection>>,
        formats: Vec<ImageFormat>,
    ) -> Self {
        self.output_collection = collection;
        self.output_formats = formats;
        self
    }

    pub fn with_current_format(mut self, format_index: u32) -> Self {
        self.current_format = format_index;
        self
    }

    pub fn id(&self) -> NodeId {
        self.id
    }

    pub fn path(&self) -> &NodePath {
        &self.path
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub(crate) fn set_enabled(&mut self, enabled: bool) {
        self.enabled = enabled;
    }

    pub fn is_shutting_down(&self) -> bool {
        self.shutting_down
    }

    pub(crate) fn mark_shutting_down(&mut self) {
        self.shutting_down = true;
    }

    pub fn accepts_frames(&self) -> bool {
        self.enabled && !self.shutting_down
    }

    pub fn stream_types(&self) -> &BTreeSet<StreamType> {
        &self.stream_types
    }

    pub fn add_stream_type(&mut self, stream_type: StreamType) {
        self.stream_types.insert(stream_type);
    }

    pub fn remove_stream_type(&mut self, stream_type: StreamType) {
        self.stream_types.remove(&stream_type);
    }

    pub fn input_formats(&self) -> &[ImageFormat] {
        &self.input_formats
    }

    pub fn output_formats(&self) -> &[ImageFormat] {
        &self.output_formats
    }

    pub fn current_format(&self) -> u32 {
        self.current_format
    }

    pub(crate) fn set_current_format(&mut self, format_index: u32) {
        self.current_format = format_index;
    }

    pub fn input_collection(&self) -> Option<&Arc<BufferCollection>> {
        self.input_collection.as_ref()
    }

    pub fn output_collection(&self) -> Option<&Arc<BufferCollection>> {
        self.output_collection.as_ref()
    }

    pub fn in_flight(&self) -> &Arc<InFlightBuffers> {
        &self.in_flight
    }

    /// Hand a produced frame to the children, stamped with the active format.
    pub(crate) fn deliver(&self, token: FrameToken, metadata: FrameMetadata) {
        let metadata = metadata
            .with_buffer_index(token.buffer_index())
            .with_image_format_index(self.current_format);
        (self.deliver)(token, metadata);
    }
}
