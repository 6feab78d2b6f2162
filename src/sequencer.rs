// Copyright (C) 2026 Michael Wilson <mike@mdwn.dev>
//
// This program is free software: you can redistribute it and/or modify it under
// the terms of the GNU General Public License as published by the Free Software
// Foundation, version 3.
//
// This program is distributed in the hope that it will be useful, but WITHOUT
// ANY WARRANTY; without even the implied warranty of MERCHANTABILITY or FITNESS
// FOR A PARTICULAR PURPOSE. See the GNU General Public License for more details.
//
// You should have received a copy of the GNU General Public License along with
// this program. If not, see <https://www.gnu.org/licenses/>.
//
use std::time::Instant;

use crate::tempo::MIN_NUMERATOR;

/// A single beat produced by the sequencer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BeatTick {
    /// Position within the bar, in [0, numerator).
    pub beat_index: u8,
    /// True for the first beat of the bar.
    pub is_accent: bool,
    /// When the clock delivered the tick.
    pub timestamp: Instant,
}

/// Maps clock ticks to positions within a bar.
#[derive(Debug, Clone)]
pub struct BeatSequencer {
    numerator: u8,
    current_beat: u8,
}

impl BeatSequencer {
    pub fn new(numerator: u8) -> BeatSequencer {
        BeatSequencer {
            numerator: numerator.max(MIN_NUMERATOR),
            current_beat: 0,
        }
    }

    /// Produces the beat for a tick, then advances to the next position.
    pub fn tick(&mut self, timestamp: Instant) -> BeatTick {
        let beat_index = self.current_beat;
        self.current_beat = (self.current_beat + 1) % self.numerator;
        BeatTick {
            beat_index,
            is_accent: beat_index == 0,
            timestamp,
        }
    }

    /// The position the next tick will get.
    pub fn current_beat(&self) -> u8 {
        self.current_beat
    }

    pub fn numerator(&self) -> u8 {
        self.numerator
    }

    pub fn reset(&mut self) {
        self.current_beat = 0;
    }

    /// Changes the bar length. A changed length restarts the bar.
    pub fn set_numerator(&mut self, numerator: u8) {
        let numerator = numerator.max(MIN_NUMERATOR);
        if numerator != self.numerator {
            self.numerator = numerator;
            self.reset();
        }
    }
}
