// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Reference counting for buffers fanned out to several consumers.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use super::FrameToken;

#[derive(Debug)]
struct Entry {
    count: usize,
    upstream: Vec<FrameToken>,
}

/// Per-node table of buffers currently held downstream.
///
/// The upstream token for a buffer is kept here until every downstream copy
/// has been released; dropping it then returns the buffer to the producer.
/// Releases arrive from client and driver threads, so the table sits behind
/// its own lock instead of living on the event loop.
#[derive(Debug, Default)]
pub struct InFlightBuffers {
    entries: Mutex<HashMap<u32, Entry>>,
}

impl InFlightBuffers {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Split `upstream` into `consumers` downstream tokens.
    ///
    /// With zero consumers the upstream token is released immediately.
    pub fn fan_out(self: &Arc<Self>, upstream: FrameToken, consumers: usize) -> Vec<FrameToken> {
        if consumers == 0 {
            drop(upstream);
            return Vec::new();
        }

        let buffer_index = upstream.buffer_index();
        {
            let mut entries = self.entries.lock();
            let entry = entries.entry(buffer_index).or_insert_with(|| Entry {
                count: 0,
                upstream: Vec::new(),
            });
            if entry.count > 0 {
                tracing::warn!(
                    "Buffer {} dispatched again while {} copies are still held",
                    buffer_index,
                    entry.count
                );
            }
            entry.count += consumers;
            entry.upstream.push(upstream);
        }

        (0..consumers)
            .map(|_| {
                let table = Arc::clone(self);
                FrameToken::new(buffer_index, move |index| table.release(index))
            })
            .collect()
    }

    /// Number of downstream copies of `buffer_index` still held.
    pub fn in_use(&self, buffer_index: u32) -> usize {
        self.entries
            .lock()
            .get(&buffer_index)
            .map_or(0, |entry| entry.count)
    }

    /// Total downstream copies held across all buffers.
    pub fn outstanding(&self) -> usize {
        self.entries.lock().values().map(|entry| entry.count).sum()
    }

    fn release(&self, buffer_index: u32) {
        let upstream = {
            let mut entries = self.entries.lock();
            let Some(entry) = entries.get_mut(&buffer_index) else {
                tracing::warn!("Release of buffer {} that is not in flight", buffer_index);
                return;
            };
            entry.count -= 1;
            if entry.count > 0 {
                return;
            }
            entries
                .remove(&buffer_index)
                .map(|entry| entry.upstream)
                .unwrap_or_default()
        };
        // Upstream releases may re-enter another node's table; never hold ours.
        drop(upstream);
    }
}
