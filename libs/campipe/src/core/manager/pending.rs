// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::collections::VecDeque;

use super::client::{StreamClient, StreamId, StreamRequest};
use super::events::Reply;

/// A stream creation waiting for the graph to settle.
pub(crate) struct PendingCreation {
    pub request: StreamRequest,
    pub reply: Reply<StreamClient>,
}

/// Work deferred while the graph is changing, replayed in arrival order.
#[derive(Default)]
pub(crate) struct PendingRequestQueue {
    creations: VecDeque<PendingCreation>,
    disconnects: VecDeque<StreamId>,
}

impl PendingRequestQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_creation(&mut self, request: StreamRequest, reply: Reply<StreamClient>) {
        self.creations.push_back(PendingCreation { request, reply });
    }

    pub fn push_disconnect(&mut self, stream: StreamId) {
        if !self.disconnects.contains(&stream) {
            self.disconnects.push_back(stream);
        }
    }

    pub fn pop_creation(&mut self) -> Option<PendingCreation> {
        self.creations.pop_front()
    }

    pub fn pop_disconnect(&mut self) -> Option<StreamId> {
        self.disconnects.pop_front()
    }

    pub fn has_disconnects(&self) -> bool {
        !self.disconnects.is_empty()
    }

    pub fn is_empty(&self) -> bool {
        self.creations.is_empty() && self.disconnects.is_empty()
    }

    pub fn len(&self) -> usize {
        self.creations.len() + self.disconnects.len()
    }

    /// Take every queued creation, leaving disconnects in place.
    pub fn drain_creations(&mut self) -> Vec<PendingCreation> {
        self.creations.drain(..).collect()
    }
}
