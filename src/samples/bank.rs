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
use std::{
    collections::HashMap,
    path::{Path, PathBuf},
};

use tracing::{debug, error, info};

use super::{synth, LoadedSample, SampleLoader};
use crate::tempo::SoundType;

/// The playable buffer for each sound type.
#[derive(Default, Debug, Clone)]
pub struct SampleBank {
    samples: HashMap<SoundType, LoadedSample>,
}

impl SampleBank {
    /// A bank with nothing in it. Every sound is silent.
    pub fn empty() -> SampleBank {
        SampleBank::default()
    }

    /// Loads the bank. Sound types with a configured file are decoded from it; a
    /// file that fails to load leaves that sound silent. Sound types without a
    /// file get the built-in click.
    pub fn load(files: &HashMap<SoundType, PathBuf>, sample_rate: u32) -> SampleBank {
        let mut loader = SampleLoader::new(sample_rate);
        let mut samples = HashMap::new();

        for sound_type in SoundType::ALL {
            match files.get(&sound_type) {
                Some(path) => match loader.load(path) {
                    Ok(sample) => {
                        samples.insert(sound_type, sample);
                    }
                    Err(e) => {
                        error!(
                            sound = sound_type.as_str(),
                            path = ?path,
                            err = %e,
                            "Failed to load sample, sound will be silent"
                        );
                    }
                },
                None => {
                    debug!(sound = sound_type.as_str(), "Synthesizing sample");
                    samples.insert(sound_type, synth::synthesize(sound_type, sample_rate));
                }
            }
        }

        let bank = SampleBank { samples };
        info!(
            sounds = bank.len(),
            sample_rate,
            memory_kb = bank.memory_size() / 1024,
            "Sample bank loaded"
        );
        bank
    }

    pub fn get(&self, sound_type: SoundType) -> Option<&LoadedSample> {
        self.samples.get(&sound_type)
    }

    pub fn insert(&mut self, sound_type: SoundType, sample: LoadedSample) {
        self.samples.insert(sound_type, sample);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Total memory held by the bank in bytes.
    pub fn memory_size(&self) -> usize {
        self.samples.values().map(|s| s.memory_size()).sum()
    }
}

/// Resolves a sample path from the config. Relative paths are relative to the
/// directory the config file lives in.
pub fn resolve_path(base_path: &Path, file: &Path) -> PathBuf {
    if file.is_absolute() {
        file.to_path_buf()
    } else {
        base_path.join(file)
    }
}
