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

//! Built-in clicks: exponentially decaying sine bursts, one per sound type.

use std::{f32::consts::PI, time::Duration};

use super::LoadedSample;
use crate::tempo::SoundType;

/// Envelope decay rate per second.
const DECAY: f32 = 10.0;

/// The recipe for a synthesized click.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Tone {
    pub frequency: f32,
    pub duration: Duration,
}

/// The tone used for a sound type when no sample file is configured.
pub fn tone(sound_type: SoundType) -> Tone {
    let (frequency, duration_ms) = match sound_type {
        SoundType::Click => (1200.0, 30),
        SoundType::Ping => (1800.0, 50),
        SoundType::Stick => (900.0, 25),
        SoundType::Wooden => (600.0, 40),
        SoundType::Drum => (200.0, 80),
    };
    Tone {
        frequency,
        duration: Duration::from_millis(duration_ms),
    }
}

/// Renders a tone at the given sample rate.
pub fn render(tone: Tone, sample_rate: u32) -> LoadedSample {
    let frames = (tone.duration.as_micros() * u128::from(sample_rate) / 1_000_000) as usize;
    let data = (0..frames)
        .map(|i| {
            let t = i as f32 / sample_rate as f32;
            (-t * DECAY).exp() * (2.0 * PI * tone.frequency * t).sin()
        })
        .collect();
    LoadedSample::new(data, sample_rate)
}

/// Synthesizes the built-in click for a sound type.
pub fn synthesize(sound_type: SoundType, sample_rate: u32) -> LoadedSample {
    render(tone(sound_type), sample_rate)
}
