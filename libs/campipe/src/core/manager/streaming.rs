// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Start/stop propagation and frame fan-out.

use std::sync::Arc;

use super::PipelineManager;
use super::client::StreamId;
use crate::core::frames::{FrameMetadata, FrameToken};
use crate::core::graph::NodePath;
use crate::core::hardware::HardwareEvent;
use crate::core::nodes::NodeId;

impl PipelineManager {
    pub(super) fn start_stream(&mut self, stream: StreamId) {
        match self.binding(stream) {
            Ok(binding) => {
                let path = binding.path.clone();
                self.start_path(&path);
            }
            Err(e) => tracing::warn!("Start ignored: {}", e),
        }
    }

    pub(super) fn stop_stream(&mut self, stream: StreamId) {
        match self.binding(stream) {
            Ok(binding) => {
                let path = binding.path.clone();
                self.stop_path(&path);
            }
            Err(e) => tracing::warn!("Stop ignored: {}", e),
        }
    }

    /// Enable `path`, then each ancestor that was not yet enabled.
    pub(super) fn start_path(&mut self, path: &NodePath) {
        let mut current = Some(path.clone());
        while let Some(target) = current {
            let Some(node) = self.graph.node_mut(&target) else {
                break;
            };
            match node.start_streaming() {
                Ok(true) => current = target.parent(),
                Ok(false) => break,
                Err(e) => {
                    tracing::error!("[{}] Start failed: {}", target, e);
                    break;
                }
            }
        }
    }

    /// Disable `path`, then each ancestor whose children are all disabled.
    pub(super) fn stop_path(&mut self, path: &NodePath) {
        let mut current = Some(path.clone());
        while let Some(target) = current {
            let Some(node) = self.graph.node_mut(&target) else {
                break;
            };
            match node.stop_streaming() {
                Ok(true) => {}
                Ok(false) => break,
                Err(e) => {
                    tracing::error!("[{}] Stop failed: {}", target, e);
                    break;
                }
            }
            current = target.parent().filter(|parent| {
                !self
                    .graph
                    .children(parent)
                    .iter()
                    .any(|child| self.graph.node(child).is_some_and(|n| n.is_enabled()))
            });
        }
    }

    pub(super) fn apply_streaming_enabled(&mut self, enabled: bool) {
        if self.streaming_enabled == enabled {
            return;
        }
        self.streaming_enabled = enabled;
        tracing::info!(
            "Streaming {}",
            if enabled { "enabled" } else { "disabled" }
        );
        let roots: Vec<NodePath> = self
            .graph
            .paths()
            .filter(|path| path.is_root())
            .cloned()
            .collect();
        for root in roots {
            if let Some(node) = self.graph.node_mut(&root) {
                if let Err(e) = node.set_streaming_allowed(enabled) {
                    tracing::error!("[{}] Streaming switch failed: {}", root, e);
                }
            }
        }
    }

    pub(super) fn release_frame(&mut self, stream: StreamId, buffer_id: u32) {
        let path = match self.binding(stream) {
            Ok(binding) => binding.path.clone(),
            Err(e) => {
                tracing::warn!("Release ignored: {}", e);
                return;
            }
        };
        if let Some(output) = self.graph.node_mut(&path).and_then(|n| n.as_output_mut()) {
            // Unknown ids are logged by the node.
            let _ = output.release_frame(buffer_id);
        }
    }

    /// Fan a produced frame out to the children whose pulldown admits it.
    pub(super) fn on_deliver(
        &mut self,
        path: &NodePath,
        node: NodeId,
        token: FrameToken,
        metadata: FrameMetadata,
    ) {
        let Some(producer) = self.graph.get(path).filter(|entry| entry.node.id() == node) else {
            tracing::debug!("[{}] Frame from a node that is gone", path);
            return;
        };
        let producer_interval = producer.interval();
        let in_flight = Arc::clone(producer.node.in_flight());

        let mut recipients = Vec::new();
        for child in self.graph.children(path) {
            let Some(entry) = self.graph.get_mut(&child) else {
                continue;
            };
            let admitted = entry.pulldown_mut().admit(producer_interval);
            if admitted && entry.node.accepts_frames() {
                recipients.push(child);
            }
        }

        let tokens = in_flight.fan_out(token, recipients.len());
        for (child, token) in recipients.into_iter().zip(tokens) {
            if let Some(child) = self.graph.node_mut(&child) {
                child.process_frame(token, metadata);
            }
        }
    }

    pub(super) fn on_hardware(&mut self, path: &NodePath, node: NodeId, event: HardwareEvent) {
        match self.graph.node_mut(path) {
            Some(target) if target.id() == node => target.handle_hardware(event),
            _ => tracing::debug!(
                "[{}] Hardware event for a node that is gone: {:?}",
                path,
                event
            ),
        }
    }

    pub(super) fn on_submit(&mut self, path: &NodePath, node: NodeId) {
        match self.graph.node_mut(path) {
            Some(target) if target.id() == node => target.submit_next(),
            _ => tracing::debug!("[{}] Submit for a node that is gone", path),
        }
    }
}
