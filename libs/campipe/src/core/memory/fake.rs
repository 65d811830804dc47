// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! In-process allocator used by the virtual hardware and by tests.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use parking_lot::Mutex;

use super::allocator::{AllocatedBuffers, Allocator, LogicalCollection};
use super::collection::{BufferHandle, CollectionId, CollectionToken};
use super::constraints::{BufferCollectionConstraints, ImageFormatConstraints};
use super::format::ImageFormat;
use crate::core::error::{PipelineError, Result};

/// One settled negotiation, as recorded by [`FakeAllocator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationRecord {
    pub name: String,
    pub collection_id: CollectionId,
    pub participants: usize,
    pub buffer_count: u32,
}

#[derive(Default)]
struct Negotiation {
    name: String,
    unbound: HashSet<u64>,
    bound: usize,
    constraints: Vec<BufferCollectionConstraints>,
    settled: Option<AllocatedBuffers>,
}

#[derive(Default)]
struct State {
    next_group: u64,
    next_token: u64,
    next_collection: u64,
    next_buffer: u64,
    negotiations: HashMap<u64, Negotiation>,
    collections: HashMap<CollectionId, u32>,
    open_handles: usize,
    attached: usize,
    fail_next: bool,
    allocations: Vec<AllocationRecord>,
}

impl State {
    fn mint(&mut self, group: u64) -> Result<CollectionToken> {
        let negotiation = self
            .negotiations
            .get_mut(&group)
            .ok_or_else(|| PipelineError::Allocation(format!("unknown negotiation {}", group)))?;
        self.next_token += 1;
        negotiation.unbound.insert(self.next_token);
        Ok(CollectionToken {
            group,
            id: self.next_token,
        })
    }

    fn settle(&mut self, group: u64) -> Result<AllocatedBuffers> {
        let Some(negotiation) = self.negotiations.get(&group) else {
            return Err(PipelineError::Allocation(format!(
                "unknown negotiation {}",
                group
            )));
        };
        if let Some(settled) = &negotiation.settled {
            return Ok(settled.clone());
        }
        if !negotiation.unbound.is_empty() || negotiation.constraints.len() < negotiation.bound {
            return Err(PipelineError::Allocation(format!(
                "{}: negotiation incomplete",
                negotiation.name
            )));
        }
        if self.fail_next {
            self.fail_next = false;
            return Err(PipelineError::Allocation(format!(
                "{}: injected failure",
                negotiation.name
            )));
        }

        let name = negotiation.name.clone();
        let failed = |reason: String| PipelineError::Allocation(format!("{}: {}", name, reason));
        let constraints = &negotiation.constraints;
        let buffer_count = negotiate_buffer_count(constraints).map_err(failed)?;
        let image_format = negotiate_image_format(constraints).map_err(failed)?;
        let participants = constraints.len();

        self.next_collection += 1;
        let collection_id = CollectionId(self.next_collection);
        let buffers = (0..buffer_count)
            .map(|_| {
                self.next_buffer += 1;
                BufferHandle(self.next_buffer)
            })
            .collect();
        let allocated = AllocatedBuffers {
            collection_id,
            image_format,
            buffers,
        };

        self.collections.insert(collection_id, buffer_count);
        self.allocations.push(AllocationRecord {
            name,
            collection_id,
            participants,
            buffer_count,
        });
        if let Some(negotiation) = self.negotiations.get_mut(&group) {
            negotiation.settled = Some(allocated.clone());
        }
        Ok(allocated)
    }
}

fn negotiate_buffer_count(
    constraints: &[BufferCollectionConstraints],
) -> std::result::Result<u32, String> {
    let camping: u32 = constraints
        .iter()
        .map(|c| c.min_buffer_count_for_camping)
        .sum();
    let minimum = constraints
        .iter()
        .map(|c| c.min_buffer_count)
        .max()
        .unwrap_or(0);
    let count = camping.max(minimum).max(1);

    if let Some(max) = constraints.iter().filter_map(|c| c.max_buffer_count).min() {
        if count > max {
            return Err(format!("need {} buffers but a participant allows {}", count, max));
        }
    }
    Ok(count)
}

fn negotiate_image_format(
    constraints: &[BufferCollectionConstraints],
) -> std::result::Result<Option<ImageFormat>, String> {
    let declared: Vec<&[ImageFormatConstraints]> = constraints
        .iter()
        .map(|c| c.image_format_constraints.as_slice())
        .filter(|formats| !formats.is_empty())
        .collect();
    let Some(first) = declared.first() else {
        return Ok(None);
    };

    for candidate in first.iter() {
        let accepted = declared[1..].iter().all(|formats| {
            formats
                .iter()
                .any(|f| f.pixel_format == candidate.pixel_format)
        });
        if !accepted {
            continue;
        }
        let bytes_per_row = declared
            .iter()
            .flat_map(|formats| formats.iter())
            .filter(|f| f.pixel_format == candidate.pixel_format)
            .filter_map(|f| f.bytes_per_row)
            .max()
            .unwrap_or(candidate.width)
            .max(candidate.width);
        return Ok(Some(ImageFormat::new(
            candidate.pixel_format,
            candidate.width,
            candidate.height,
            bytes_per_row,
        )));
    }
    Err("no pixel format common to all participants".to_string())
}

/// Token allocator that settles negotiations in memory.
#[derive(Clone, Default)]
pub struct FakeAllocator {
    state: Arc<Mutex<State>>,
}

impl FakeAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make the next negotiation fail when it settles.
    pub fn fail_next_allocation(&self) {
        self.state.lock().fail_next = true;
    }

    /// Participant tokens minted but neither bound nor released.
    pub fn outstanding_tokens(&self) -> usize {
        self.state
            .lock()
            .negotiations
            .values()
            .map(|n| n.unbound.len())
            .sum()
    }

    pub fn open_handles(&self) -> usize {
        self.state.lock().open_handles
    }

    /// Access tokens handed out by `attach_token`.
    pub fn attached_tokens(&self) -> usize {
        self.state.lock().attached
    }

    pub fn allocations(&self) -> Vec<AllocationRecord> {
        self.state.lock().allocations.clone()
    }
}

impl Allocator for FakeAllocator {
    fn allocate_shared_collection(&self, name: &str) -> Result<CollectionToken> {
        let mut state = self.state.lock();
        state.next_group += 1;
        let group = state.next_group;
        state.negotiations.insert(
            group,
            Negotiation {
                name: name.to_string(),
                ..Default::default()
            },
        );
        state.mint(group)
    }

    fn duplicate(&self, token: &CollectionToken) -> Result<CollectionToken> {
        self.state.lock().mint(token.group)
    }

    fn bind_shared_collection(&self, token: CollectionToken) -> Result<Box<dyn LogicalCollection>> {
        let mut state = self.state.lock();
        let negotiation = state
            .negotiations
            .get_mut(&token.group)
            .ok_or_else(|| {
                PipelineError::Allocation(format!("unknown negotiation {}", token.group))
            })?;
        if !negotiation.unbound.remove(&token.id) {
            return Err(PipelineError::Allocation(format!(
                "token {} is not outstanding",
                token.id
            )));
        }
        negotiation.bound += 1;
        state.open_handles += 1;
        Ok(Box::new(FakeLogicalCollection {
            state: Arc::clone(&self.state),
            group: token.group,
        }))
    }

    fn release_token(&self, token: CollectionToken) {
        let mut state = self.state.lock();
        let released = state
            .negotiations
            .get_mut(&token.group)
            .is_some_and(|n| n.unbound.remove(&token.id));
        if !released {
            tracing::warn!("Released unknown collection token {}", token.id);
        }
    }

    fn attach_token(&self, collection: CollectionId) -> Result<CollectionToken> {
        let mut state = self.state.lock();
        if !state.collections.contains_key(&collection) {
            return Err(PipelineError::NotFound(collection.to_string()));
        }
        state.next_token += 1;
        state.attached += 1;
        Ok(CollectionToken {
            group: 0,
            id: state.next_token,
        })
    }
}

struct FakeLogicalCollection {
    state: Arc<Mutex<State>>,
    group: u64,
}

impl LogicalCollection for FakeLogicalCollection {
    fn set_constraints(&mut self, constraints: &BufferCollectionConstraints) -> Result<()> {
        let mut state = self.state.lock();
        let negotiation = state
            .negotiations
            .get_mut(&self.group)
            .ok_or_else(|| {
                PipelineError::Allocation(format!("unknown negotiation {}", self.group))
            })?;
        negotiation.constraints.push(constraints.clone());
        Ok(())
    }

    fn wait_for_buffers_allocated(&mut self) -> Result<AllocatedBuffers> {
        self.state.lock().settle(self.group)
    }

    fn close(self: Box<Self>) {
        let mut state = self.state.lock();
        state.open_handles = state.open_handles.saturating_sub(1);
        let finished = state.negotiations.get_mut(&self.group).is_some_and(|n| {
            n.bound = n.bound.saturating_sub(1);
            n.bound == 0 && n.unbound.is_empty()
        });
        if finished {
            state.negotiations.remove(&self.group);
        }
    }
}
