// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

mod in_flight;
mod metadata;
mod token;

pub use in_flight::InFlightBuffers;
pub use metadata::FrameMetadata;
pub use token::FrameToken;
