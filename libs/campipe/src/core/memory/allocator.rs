// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Shared-memory allocator adapter.
//!
//! The allocator negotiates one collection across several participants
//! using tokens: one token per participant is duplicated from a root
//! token, each duplicate is bound to a logical collection, each logical
//! collection receives its participant's constraints, and the allocation
//! settles once every participant has spoken.

use super::collection::{BufferCollection, BufferHandle, CollectionId, CollectionToken};
use super::constraints::BufferCollectionConstraints;
use super::format::ImageFormat;
use crate::core::error::{PipelineError, Result};

/// Outcome of a settled negotiation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocatedBuffers {
    pub collection_id: CollectionId,
    pub image_format: Option<ImageFormat>,
    pub buffers: Vec<BufferHandle>,
}

/// One participant's view of a collection under negotiation.
pub trait LogicalCollection: Send {
    fn set_constraints(&mut self, constraints: &BufferCollectionConstraints) -> Result<()>;

    /// Block until the allocator has settled the collection.
    fn wait_for_buffers_allocated(&mut self) -> Result<AllocatedBuffers>;

    fn close(self: Box<Self>);
}

/// Token-based system memory allocator.
pub trait Allocator: Send + Sync {
    /// Start a new negotiation, returning its root token.
    fn allocate_shared_collection(&self, name: &str) -> Result<CollectionToken>;

    /// Mint another participant token in the same negotiation.
    fn duplicate(&self, token: &CollectionToken) -> Result<CollectionToken>;

    /// Turn a token into a participant handle.
    fn bind_shared_collection(&self, token: CollectionToken) -> Result<Box<dyn LogicalCollection>>;

    /// Give up a token without binding it.
    fn release_token(&self, token: CollectionToken);

    /// Mint an access token for an already allocated collection.
    fn attach_token(&self, collection: CollectionId) -> Result<CollectionToken>;
}

/// Negotiate a single collection that satisfies every participant.
///
/// `constraints[0]` is the allocating node's own output constraints; the
/// remaining entries are its downstream consumers' input constraints.
pub fn allocate_shared_memory(
    allocator: &dyn Allocator,
    constraints: &[BufferCollectionConstraints],
    name: &str,
) -> Result<BufferCollection> {
    if constraints.is_empty() {
        return Err(PipelineError::Allocation(format!(
            "{}: no participants",
            name
        )));
    }

    let root = allocator.allocate_shared_collection(name)?;

    let mut tokens = Vec::with_capacity(constraints.len());
    for _ in constraints {
        match allocator.duplicate(&root) {
            Ok(token) => tokens.push(token),
            Err(e) => {
                allocator.release_token(root);
                tokens
                    .into_iter()
                    .for_each(|token| allocator.release_token(token));
                return Err(e);
            }
        }
    }
    allocator.release_token(root);

    let mut handles: Vec<Box<dyn LogicalCollection>> = Vec::with_capacity(tokens.len());
    let mut tokens = tokens.into_iter();
    let mut failure = None;
    for token in tokens.by_ref() {
        match allocator.bind_shared_collection(token) {
            Ok(handle) => handles.push(handle),
            Err(e) => {
                failure = Some(e);
                break;
            }
        }
    }
    if let Some(e) = failure {
        tokens.for_each(|token| allocator.release_token(token));
        close_all(handles);
        return Err(e);
    }

    let failure = handles
        .iter_mut()
        .zip(constraints)
        .find_map(|(handle, participant)| handle.set_constraints(participant).err());
    if let Some(e) = failure {
        close_all(handles);
        return Err(e);
    }

    let settled = handles[0].wait_for_buffers_allocated();
    close_all(handles);
    let allocated = settled?;

    tracing::debug!(
        "Allocated {} ({} buffers, {} participants)",
        name,
        allocated.buffers.len(),
        constraints.len()
    );

    Ok(BufferCollection::new(
        allocated.collection_id,
        name,
        allocated.image_format,
        allocated.buffers,
    ))
}

fn close_all(handles: Vec<Box<dyn LogicalCollection>>) {
    for handle in handles {
        handle.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::memory::fake::FakeAllocator;
    use crate::core::memory::{ImageFormatConstraints, PixelFormat};

    fn nv12(width: u32, height: u32) -> ImageFormatConstraints {
        ImageFormatConstraints {
            pixel_format: PixelFormat::Nv12,
            width,
            height,
            bytes_per_row: None,
        }
    }

    #[test]
    fn test_allocate_single_participant() {
        let allocator = FakeAllocator::new();
        let collection = allocate_shared_memory(
            &allocator,
            &[BufferCollectionConstraints::camping(4).with_image_format(nv12(640, 480))],
            "single",
        )
        .unwrap();

        assert_eq!(collection.buffer_count(), 4);
        assert_eq!(collection.name(), "single");
        assert_eq!(
            collection.image_format(),
            Some(&ImageFormat::nv12(640, 480))
        );
        assert_eq!(allocator.outstanding_tokens(), 0);
        assert_eq!(allocator.open_handles(), 0);
    }

    #[test]
    fn test_allocate_sums_camping_counts() {
        let allocator = FakeAllocator::new();
        let collection = allocate_shared_memory(
            &allocator,
            &[
                BufferCollectionConstraints::camping(3),
                BufferCollectionConstraints::camping(2),
                BufferCollectionConstraints::camping(1),
            ],
            "fanout",
        )
        .unwrap();

        assert_eq!(collection.buffer_count(), 6);
        let records = allocator.allocations();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].participants, 3);
    }

    #[test]
    fn test_allocation_failure_propagates_and_cleans_up() {
        let allocator = FakeAllocator::new();
        allocator.fail_next_allocation();

        let result = allocate_shared_memory(
            &allocator,
            &[
                BufferCollectionConstraints::camping(2),
                BufferCollectionConstraints::camping(2),
            ],
            "failing",
        );

        assert!(matches!(result, Err(PipelineError::Allocation(_))));
        assert_eq!(allocator.outstanding_tokens(), 0);
        assert_eq!(allocator.open_handles(), 0);
    }

    #[test]
    fn test_unsatisfiable_constraints() {
        let allocator = FakeAllocator::new();
        let mut capped = BufferCollectionConstraints::camping(1);
        capped.max_buffer_count = Some(2);

        let result = allocate_shared_memory(
            &allocator,
            &[capped, BufferCollectionConstraints::camping(4)],
            "capped",
        );
        assert!(matches!(result, Err(PipelineError::Allocation(_))));
    }

    #[test]
    fn test_no_participants() {
        let allocator = FakeAllocator::new();
        let result = allocate_shared_memory(&allocator, &[], "empty");
        assert!(matches!(result, Err(PipelineError::Allocation(_))));
    }
}
