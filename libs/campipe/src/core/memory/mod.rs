// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Buffer collections and the shared-memory allocator adapter.

mod allocator;
mod collection;
mod constraints;
pub mod fake;
mod format;

pub use allocator::{AllocatedBuffers, Allocator, LogicalCollection, allocate_shared_memory};
pub use collection::{BufferCollection, BufferHandle, ClientBuffers, CollectionId, CollectionToken};
pub use constraints::{BufferCollectionConstraints, BufferUsage, ImageFormatConstraints};
pub use format::{HwImageFormat, ImageFormat, PixelFormat};
