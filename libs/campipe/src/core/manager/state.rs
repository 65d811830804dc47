// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Graph manager lifecycle.
//!
//! ```text
//! ┌───────────────┐  set_roots()  ┌────────────┐
//! │ Uninitialized │──────────────►│ Configured │
//! └───────────────┘               └─────┬──────┘
//!         ▲                             │ shutdown()
//!         │  all subtrees torn down     ▼
//!         │                      ┌──────────────┐
//!         └──────────────────────│ ShuttingDown │
//!                                └──────────────┘
//! ```
//!
//! Structural changes in flight are tracked separately; see
//! `PipelineManager::is_changing`.

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ManagerState {
    /// No config roots installed. The only state the manager may be dropped in.
    #[default]
    Uninitialized,

    /// Roots installed; streams can be created.
    Configured,

    /// Tearing the whole graph down.
    ShuttingDown,
}

impl ManagerState {
    pub fn accepts_streams(&self) -> bool {
        matches!(self, Self::Configured)
    }

    pub fn can_set_roots(&self) -> bool {
        matches!(self, Self::Uninitialized)
    }
}
