// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

// Suppress pedantic clippy warnings that are intentional design choices
#![allow(clippy::type_complexity)] // Callback types are clear in context
#![allow(clippy::new_without_default)] // Fakes are constructed explicitly in tests

//! Camera image-processing pipeline graph manager.
//!
//! Builds, wires and tears down a graph of processing nodes that route
//! sensor frames through hardware accelerators to client-visible streams.
//! Multiple streams may share upstream stages; streams are added and
//! removed without disturbing their siblings.

// Re-export crossbeam_channel so callers can name reply receivers
pub use crossbeam_channel;

pub mod core;

pub use core::prelude;
