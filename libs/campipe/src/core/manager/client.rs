// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::fmt;

use tokio::sync::mpsc::UnboundedReceiver;

use super::events::{EventSender, ManagerCommand, PendingReply, reply_channel};
use crate::core::config::StreamType;
use crate::core::error::PipelineError;
use crate::core::graph::NodePath;
use crate::core::hardware::CropRect;
use crate::core::memory::{ClientBuffers, ImageFormat};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StreamId(pub u64);

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "stream_{}", self.0)
    }
}

/// What a client asks the graph for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamRequest {
    pub stream_type: StreamType,
    pub image_format_index: u32,
    /// Frames the client may hold at once.
    pub buffer_count: u32,
}

/// A frame the client may read until it releases `buffer_id`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameAvailable {
    pub buffer_id: u32,
    pub image_format_index: u32,
    pub timestamp: i64,
    pub capture_timestamp: i64,
}

/// Client end of one bound stream. Dropping it disconnects the stream.
pub struct StreamClient {
    id: StreamId,
    path: NodePath,
    stream_type: StreamType,
    events: EventSender,
    frames: UnboundedReceiver<FrameAvailable>,
}

impl StreamClient {
    pub(crate) fn new(
        id: StreamId,
        path: NodePath,
        stream_type: StreamType,
        events: EventSender,
        frames: UnboundedReceiver<FrameAvailable>,
    ) -> Self {
        Self {
            id,
            path,
            stream_type,
            events,
            frames,
        }
    }

    pub fn id(&self) -> StreamId {
        self.id
    }

    /// Path of the output node serving this stream.
    pub fn path(&self) -> &NodePath {
        &self.path
    }

    pub fn stream_type(&self) -> StreamType {
        self.stream_type
    }

    pub fn start(&self) {
        self.events
            .command(ManagerCommand::Start { stream: self.id });
    }

    pub fn stop(&self) {
        self.events
            .command(ManagerCommand::Stop { stream: self.id });
    }

    pub fn release_frame(&self, buffer_id: u32) {
        self.events.command(ManagerCommand::ReleaseFrame {
            stream: self.id,
            buffer_id,
        });
    }

    /// Crop to a normalized rectangle of the sensor image.
    pub fn set_region_of_interest(
        &self,
        x_min: f32,
        y_min: f32,
        x_max: f32,
        y_max: f32,
    ) -> PendingReply<()> {
        let crop = match CropRect::new(x_min, y_min, x_max, y_max) {
            Ok(crop) => crop,
            Err(e) => return PendingReply::ready(Err(e)),
        };
        self.request(|reply| ManagerCommand::SetRegionOfInterest {
            stream: self.id,
            crop,
            reply,
        })
    }

    pub fn set_image_format(&self, format_index: u32) -> PendingReply<()> {
        self.request(|reply| ManagerCommand::SetImageFormat {
            stream: self.id,
            format_index,
            reply,
        })
    }

    pub fn get_image_formats(&self) -> PendingReply<Vec<ImageFormat>> {
        self.request(|reply| ManagerCommand::GetImageFormats {
            stream: self.id,
            reply,
        })
    }

    /// A fresh access token for the buffers this stream's frames live in.
    pub fn get_buffers(&self) -> PendingReply<ClientBuffers> {
        self.request(|reply| ManagerCommand::GetBuffers {
            stream: self.id,
            reply,
        })
    }

    pub fn try_next_frame(&mut self) -> Option<FrameAvailable> {
        self.frames.try_recv().ok()
    }

    /// Wait for the next frame. `None` once the stream is torn down.
    pub async fn next_frame(&mut self) -> Option<FrameAvailable> {
        self.frames.recv().await
    }

    fn request<T>(
        &self,
        build: impl FnOnce(super::events::Reply<T>) -> ManagerCommand,
    ) -> PendingReply<T> {
        let (reply, pending) = reply_channel();
        if !self.events.command(build(reply)) {
            return PendingReply::ready(Err(PipelineError::PeerClosed));
        }
        pending
    }
}

impl fmt::Debug for StreamClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamClient")
            .field("id", &self.id)
            .field("path", &self.path)
            .field("stream_type", &self.stream_type)
            .finish()
    }
}

impl Drop for StreamClient {
    fn drop(&mut self) {
        self.events
            .command(ManagerCommand::Disconnect { stream: self.id });
    }
}
