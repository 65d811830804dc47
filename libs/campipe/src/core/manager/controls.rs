// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Per-stream runtime controls, applied along the path from the output
//! node up to its root.

use super::PipelineManager;
use super::client::StreamId;
use super::events::Reply;
use super::join::CompletionJoin;
use crate::core::config::NodeKind;
use crate::core::error::{PipelineError, Result};
use crate::core::graph::NodePath;
use crate::core::hardware::CropRect;
use crate::core::memory::{ClientBuffers, ImageFormat};

impl PipelineManager {
    /// Crop on the one resize stage of the path that allows it for this
    /// stream type.
    pub(super) fn set_region_of_interest(
        &mut self,
        stream: StreamId,
        crop: CropRect,
    ) -> Result<()> {
        let binding = self.binding(stream)?;
        let stream_type = binding.stream_type;
        let path = binding.path.clone();

        let target = path.ancestors().find(|ancestor| {
            self.config_at(ancestor).is_some_and(|config| {
                matches!(config.kind, NodeKind::Resize { .. })
                    && config
                        .support(stream_type)
                        .is_some_and(|support| support.supports_crop_region)
            })
        });
        let Some(target) = target else {
            return Err(PipelineError::NotSupported(format!(
                "no crop-capable stage serves {} at {}",
                stream_type, path
            )));
        };
        let node = self
            .graph
            .node_mut(&target)
            .ok_or_else(|| PipelineError::NotFound(format!("no live node at {}", target)))?;
        node.set_crop_rect(crop)?;
        tracing::debug!("[{}] Crop set to {:?} for {}", target, crop, stream);
        Ok(())
    }

    /// Switch the stream's image format on every stage with a choice of
    /// formats, replying once all of them have acknowledged.
    pub(super) fn set_image_format(
        &mut self,
        stream: StreamId,
        format_index: u32,
        reply: Reply<()>,
    ) {
        let path = match self.validated_format_path(stream, format_index) {
            Ok(path) => path,
            Err(e) => {
                let _ = reply.send(Err(e));
                return;
            }
        };

        let join = CompletionJoin::new(move |result| {
            let _ = reply.send(result);
        });
        let targets = std::iter::once(path.clone()).chain(path.ancestors());
        for target in targets {
            let Some(node) = self.graph.node_mut(&target) else {
                continue;
            };
            if target == path || node.output_formats().len() > 1 {
                node.set_output_format(format_index, join.member());
            }
        }
        join.seal();
    }

    fn validated_format_path(&self, stream: StreamId, format_index: u32) -> Result<NodePath> {
        let path = self.binding(stream)?.path.clone();
        let formats = self
            .graph
            .node(&path)
            .map(|node| node.output_formats().len())
            .unwrap_or(0);
        if format_index as usize >= formats.max(1) {
            return Err(PipelineError::InvalidArgs(format!(
                "format index {} out of range for {} ({} formats)",
                format_index, stream, formats
            )));
        }
        Ok(path)
    }

    pub(super) fn image_formats(&self, stream: StreamId) -> Result<Vec<ImageFormat>> {
        let path = &self.binding(stream)?.path;
        self.graph
            .node(path)
            .map(|node| node.output_formats().to_vec())
            .ok_or_else(|| PipelineError::NotFound(format!("no live node at {}", path)))
    }

    /// Attach a fresh token to the collection the stream's frames live in.
    pub(super) fn buffers(&self, stream: StreamId) -> Result<ClientBuffers> {
        let path = &self.binding(stream)?.path;
        let collection = self
            .graph
            .owner_at_or_above(path)
            .and_then(|owner| owner.owned_collection())
            .ok_or_else(|| {
                PipelineError::NotFound(format!("no buffer collection above {}", path))
            })?;
        let token = self.hardware.allocator.attach_token(collection.id())?;
        Ok(ClientBuffers {
            token,
            collection_id: collection.id(),
            buffer_count: collection.buffer_count(),
            image_format: collection.image_format().copied(),
        })
    }
}
