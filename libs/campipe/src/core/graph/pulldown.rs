// Copyright (c) 2025 Jonathan Fontanez
// SPDX-License-Identifier: BUSL-1.1

//! Frame-rate division by exact interval accounting.

use crate::core::rational::Fraction;

/// Gate that admits a consumer's share of a faster producer's frames.
///
/// The accumulator holds time until the consumer's next delivery is due.
/// Each producer frame advances time by the producer interval; a frame is
/// admitted when the accumulator has reached zero, which pushes the next
/// delivery one consumer interval out. For a consumer no faster than its
/// producer the accumulator stays within `[-producer, own)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pulldown {
    interval: Fraction,
    accumulator: Fraction,
}

impl Pulldown {
    pub fn new(interval: Fraction) -> Self {
        Self {
            interval,
            accumulator: Fraction::ZERO,
        }
    }

    pub fn interval(&self) -> Fraction {
        self.interval
    }

    pub fn accumulator(&self) -> Fraction {
        self.accumulator
    }

    /// Account for one producer frame; returns whether this consumer takes it.
    pub fn admit(&mut self, producer_interval: Fraction) -> bool {
        let due = self.accumulator <= Fraction::ZERO;
        if due {
            self.accumulator += self.interval;
        }
        self.accumulator -= producer_interval;
        due
    }

    pub fn reset(&mut self) {
        self.accumulator = Fraction::ZERO;
    }
}
