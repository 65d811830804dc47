// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::collections::BTreeMap;

use tokio::sync::mpsc::UnboundedSender;

use super::NodeCore;
use crate::core::error::{PipelineError, Result};
use crate::core::frames::{FrameMetadata, FrameToken};
use crate::core::hardware::Completion;
use crate::core::manager::{FrameAvailable, StreamId};

/// Leaf node bound to one client stream.
///
/// Holds a token for every frame the client has been told about until the
/// client releases it. The client's camping budget caps how many frames it
/// may hold at once; frames beyond that are returned immediately.
pub struct OutputNode {
    pub(super) core: NodeCore,
    stream: StreamId,
    sender: Option<UnboundedSender<FrameAvailable>>,
    held: BTreeMap<u32, FrameToken>,
    max_held: u32,
}

impl OutputNode {
    pub fn new(
        core: NodeCore,
        stream: StreamId,
        sender: UnboundedSender<FrameAvailable>,
        max_held: u32,
    ) -> Self {
        Self {
            core,
            stream,
            sender: Some(sender),
            held: BTreeMap::new(),
            max_held: max_held.max(1),
        }
    }

    pub fn stream(&self) -> StreamId {
        self.stream
    }

    /// Buffer ids the client currently holds.
    pub fn held_frames(&self) -> Vec<u32> {
        self.held.keys().copied().collect()
    }

    pub(super) fn process_frame(&mut self, token: FrameToken, metadata: FrameMetadata) {
        if !self.core.accepts_frames() {
            return;
        }
        if self.held.len() as u32 >= self.max_held {
            tracing::warn!(
                "[{}] {} holds {} frames, dropping buffer {}",
                self.core.path(),
                self.stream,
                self.held.len(),
                token.buffer_index()
            );
            return;
        }
        let Some(sender) = &self.sender else {
            return;
        };

        let buffer_id = token.buffer_index();
        let available = FrameAvailable {
            buffer_id,
            image_format_index: metadata.image_format_index,
            timestamp: metadata.timestamp,
            capture_timestamp: metadata.capture_timestamp,
        };
        if sender.send(available).is_err() {
            tracing::debug!("[{}] Client receiver closed", self.core.path());
            return;
        }
        if self.held.insert(buffer_id, token).is_some() {
            tracing::warn!(
                "[{}] Buffer {} delivered while still held",
                self.core.path(),
                buffer_id
            );
        }
    }

    /// Return a frame the client is done with.
    pub fn release_frame(&mut self, buffer_id: u32) -> Result<()> {
        match self.held.remove(&buffer_id) {
            Some(_) => Ok(()),
            None => {
                tracing::warn!(
                    "[{}] {} released buffer {} it does not hold",
                    self.core.path(),
                    self.stream,
                    buffer_id
                );
                Err(PipelineError::InvalidArgs(format!(
                    "buffer {} is not held by {}",
                    buffer_id, self.stream
                )))
            }
        }
    }

    pub(super) fn shutdown(&mut self, completion: Completion) {
        self.held.clear();
        self.sender = None;
        completion();
    }
}
