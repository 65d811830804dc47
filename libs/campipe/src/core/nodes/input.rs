// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::sync::Arc;

use super::NodeCore;
use crate::core::error::Result;
use crate::core::frames::{FrameMetadata, FrameToken};
use crate::core::hardware::{Completion, HardwareEvent, IspStream};

/// Root node fed by a sensor output stream.
///
/// The hardware stream runs only while the node is enabled and the global
/// streaming switch allows it; start and stop reach the driver only on a
/// change of that combined state.
pub struct InputNode {
    pub(super) core: NodeCore,
    stream: Arc<dyn IspStream>,
    streaming_allowed: bool,
}

impl InputNode {
    pub fn new(core: NodeCore, stream: Arc<dyn IspStream>, streaming_allowed: bool) -> Self {
        Self {
            core,
            stream,
            streaming_allowed,
        }
    }

    /// Whether the sensor stream is currently started.
    pub fn is_running(&self) -> bool {
        self.core.is_enabled() && self.streaming_allowed && !self.core.is_shutting_down()
    }

    pub fn is_streaming_allowed(&self) -> bool {
        self.streaming_allowed
    }

    fn apply(&mut self, enabled: bool, allowed: bool) -> Result<()> {
        let was_running = self.is_running();
        let (was_enabled, was_allowed) = (self.core.is_enabled(), self.streaming_allowed);
        self.core.set_enabled(enabled);
        self.streaming_allowed = allowed;
        let running = self.is_running();
        if running == was_running {
            return Ok(());
        }

        let result = if running {
            self.stream.start()
        } else {
            self.stream.stop()
        };
        if let Err(e) = &result {
            tracing::error!(
                "[{}] Sensor stream transition failed: {}",
                self.core.path(),
                e
            );
            self.core.set_enabled(was_enabled);
            self.streaming_allowed = was_allowed;
        } else {
            tracing::info!(
                "[{}] Sensor stream {}",
                self.core.path(),
                if running { "started" } else { "stopped" }
            );
        }
        result
    }

    pub(super) fn set_enabled(&mut self, enabled: bool) -> Result<()> {
        self.apply(enabled, self.streaming_allowed)
    }

    pub(super) fn set_streaming_allowed(&mut self, allowed: bool) -> Result<()> {
        self.apply(self.core.is_enabled(), allowed)
    }

    /// Input nodes are roots; nothing upstream sends them frames.
    pub(super) fn process_frame(&mut self, token: FrameToken, _metadata: FrameMetadata) {
        tracing::warn!(
            "[{}] Input node was handed buffer {}",
            self.core.path(),
            token.buffer_index()
        );
    }

    pub(super) fn handle_hardware(&mut self, event: HardwareEvent) {
        match event {
            HardwareEvent::FrameReady {
                buffer_index,
                timestamp,
                capture_timestamp,
            } => {
                let stream = Arc::clone(&self.stream);
                let token =
                    FrameToken::new(buffer_index, move |index| stream.release_frame(index));
                if !self.core.accepts_frames() || !self.streaming_allowed {
                    tracing::debug!(
                        "[{}] Dropping sensor frame {} while stopped",
                        self.core.path(),
                        buffer_index
                    );
                    return;
                }
                self.core.deliver(
                    token,
                    FrameMetadata {
                        timestamp,
                        capture_timestamp,
                        ..Default::default()
                    },
                );
            }
            other => tracing::warn!(
                "[{}] Unexpected sensor event {:?}",
                self.core.path(),
                other
            ),
        }
    }

    pub(super) fn shutdown(&mut self, completion: Completion) {
        if self.core.is_enabled() && self.streaming_allowed {
            if let Err(e) = self.stream.stop() {
                tracing::warn!("[{}] Stop before shutdown failed: {}", self.core.path(), e);
            }
        }
        self.stream.shutdown(completion);
    }
}
