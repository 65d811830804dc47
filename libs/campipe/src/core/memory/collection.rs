// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use std::fmt;

use super::format::ImageFormat;

/// Identifies a negotiated collection within its allocator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CollectionId(pub u64);

impl fmt::Display for CollectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "collection_{}", self.0)
    }
}

/// Opaque handle to one physical buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(pub u64);

/// A participant's capability to join (or access) a collection.
///
/// Tokens are consumed by binding or released explicitly; the allocator
/// will not settle a negotiation while an unbound token is outstanding.
#[derive(Debug, PartialEq, Eq, Hash)]
pub struct CollectionToken {
    pub group: u64,
    pub id: u64,
}

/// A negotiated set of buffers plus the format they hold.
///
/// Owned by the frame-graph node that allocated it and shared by reference
/// with every in-place node downstream.
#[derive(Debug, Clone)]
pub struct BufferCollection {
    id: CollectionId,
    name: String,
    image_format: Option<ImageFormat>,
    buffers: Vec<BufferHandle>,
}

impl BufferCollection {
    pub fn new(
        id: CollectionId,
        name: impl Into<String>,
        image_format: Option<ImageFormat>,
        buffers: Vec<BufferHandle>,
    ) -> Self {
        Self {
            id,
            name: name.into(),
            image_format,
            buffers,
        }
    }

    pub fn id(&self) -> CollectionId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn buffer_count(&self) -> u32 {
        self.buffers.len() as u32
    }

    pub fn image_format(&self) -> Option<&ImageFormat> {
        self.image_format.as_ref()
    }

    pub fn buffer(&self, index: u32) -> Option<BufferHandle> {
        self.buffers.get(index as usize).copied()
    }
}

/// What a client receives from `GetBuffers`.
#[derive(Debug)]
pub struct ClientBuffers {
    pub token: CollectionToken,
    pub collection_id: CollectionId,
    pub buffer_count: u32,
    pub image_format: Option<ImageFormat>,
}
