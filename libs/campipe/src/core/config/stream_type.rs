// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Requested stream properties. A request is an exact combination of
    /// these flags, e.g. `DOWNSCALED_RESOLUTION | MACHINE_LEARNING`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
    pub struct StreamType: u32 {
        const FULL_RESOLUTION = 1 << 0;
        const DOWNSCALED_RESOLUTION = 1 << 1;
        const MACHINE_LEARNING = 1 << 2;
        const MONITORING = 1 << 3;
        const VIDEO_CONFERENCE = 1 << 4;
        const EXTENDED_FOV = 1 << 5;
    }
}

impl std::fmt::Display for StreamType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.is_empty() {
            return write!(f, "NONE");
        }
        bitflags::parser::to_writer(self, f)
    }
}
