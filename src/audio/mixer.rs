// Copyright (C) 2025 Michael Wilson <mike@mdwn.dev>
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
// Voice mixing shared by the cpal output and tests. The mixer is owned by the audio
// thread, so nothing in here locks.
use std::sync::Arc;

use tracing::debug;

use crate::audio::Trigger;

/// A voice currently playing.
struct Voice {
    /// Mono sample data at the output rate.
    data: Arc<Vec<f32>>,
    /// Fractional read position in frames.
    position: f64,
    rate: f64,
    volume: f32,
}

impl Voice {
    fn is_finished(&self) -> bool {
        self.position >= self.data.len() as f64
    }

    /// Reads the frame at the current position, linearly interpolated.
    fn next_sample(&mut self) -> f32 {
        let index = self.position.floor() as usize;
        let frac = (self.position - index as f64) as f32;
        let s0 = self.data.get(index).copied().unwrap_or(0.0);
        let s1 = self.data.get(index + 1).copied().unwrap_or(s0);
        self.position += self.rate;
        (s0 + (s1 - s0) * frac) * self.volume
    }
}

/// Mixes mono one-shot voices into interleaved output frames.
pub struct Mixer {
    /// Voices in start order, oldest first.
    voices: Vec<Voice>,
    max_voices: usize,
    num_channels: u16,
}

impl Mixer {
    pub fn new(num_channels: u16, max_voices: usize) -> Mixer {
        let max_voices = max_voices.max(1);
        Mixer {
            voices: Vec::with_capacity(max_voices),
            max_voices,
            num_channels: num_channels.max(1),
        }
    }

    /// Starts a voice, stealing the oldest one if the voice limit is reached.
    pub fn add(&mut self, trigger: Trigger) {
        if self.voices.len() >= self.max_voices {
            self.voices.remove(0);
            debug!(max_voices = self.max_voices, "Voice limit reached, stealing oldest");
        }

        let rate = if trigger.rate.is_finite() && trigger.rate > 0.0 {
            f64::from(trigger.rate)
        } else {
            1.0
        };
        self.voices.push(Voice {
            data: trigger.sample.data(),
            position: 0.0,
            rate,
            volume: trigger.volume,
        });
    }

    /// Fills the interleaved output buffer, replacing whatever it held. Finished
    /// voices are dropped.
    pub fn mix_into(&mut self, output: &mut [f32]) {
        output.fill(0.0);
        if self.voices.is_empty() {
            return;
        }

        let channels = self.num_channels as usize;
        for frame in output.chunks_mut(channels) {
            let mut value = 0.0;
            for voice in self.voices.iter_mut() {
                if !voice.is_finished() {
                    value += voice.next_sample();
                }
            }
            frame.fill(value.clamp(-1.0, 1.0));
        }

        self.voices.retain(|voice| !voice.is_finished());
    }

    /// The number of voices still playing.
    pub fn active_voices(&self) -> usize {
        self.voices.len()
    }

    pub fn num_channels(&self) -> u16 {
        self.num_channels
    }
}
