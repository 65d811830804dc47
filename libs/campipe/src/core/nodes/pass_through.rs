// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use super::NodeCore;
use crate::core::frames::{FrameMetadata, FrameToken};
use crate::core::hardware::Completion;

/// Forwards frames unchanged. Used as a fan-out point.
pub struct PassThroughNode {
    pub(super) core: NodeCore,
}

impl PassThroughNode {
    pub fn new(core: NodeCore) -> Self {
        Self { core }
    }

    pub(super) fn process_frame(&mut self, token: FrameToken, metadata: FrameMetadata) {
        if self.core.accepts_frames() {
            self.core.deliver(token, metadata);
        }
    }

    pub(super) fn shutdown(&mut self, completion: Completion) {
        completion();
    }
}

#[cfg(test)]
mod tests {
    use super::super::ProcessNode;
    use super::super::base::testing::recording_core;
    use super::*;
    use crate::core::graph::NodePath;

    #[test]
    fn test_forwards_only_while_enabled() {
        let (core, delivered) = recording_core(NodePath::from_indices([0, 2]));
        let mut node = ProcessNode::PassThrough(PassThroughNode::new(core));

        node.process_frame(FrameToken::detached(1), FrameMetadata::default());
        assert!(delivered.lock().is_empty());

        node.start_streaming().unwrap();
        node.process_frame(FrameToken::detached(2), FrameMetadata::default());
        assert_eq!(delivered.lock()[0].1.buffer_index, 2);
    }
}
