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

//! Turns beats into voices on the audio output.

use std::{collections::HashMap, error::Error, path::PathBuf, sync::Arc};

use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::{
    audio::{self, Trigger, TriggerError},
    samples::SampleBank,
    tempo::{SoundModifications, SoundType},
};

/// Gain used when previewing a sound from the library.
pub const PREVIEW_VOLUME: f32 = 0.8;

/// Accents are louder than the configured volume, other beats quieter.
pub fn tick_volume(volume: f32, is_accent: bool) -> f32 {
    if is_accent {
        (volume * 1.2).min(1.0)
    } else {
        volume * 0.8
    }
}

/// Plays clicks. Implementations must never block the caller.
pub trait SoundRenderer: Send + Sync {
    /// Loads samples and opens the output.
    fn initialize(&self) -> Result<(), Box<dyn Error>>;

    /// Releases samples and closes the output.
    fn cleanup(&self);

    /// Plays the click for one beat.
    fn play_tick(
        &self,
        sound_type: SoundType,
        is_accent: bool,
        modifications: &SoundModifications,
        volume: f32,
    );

    /// Plays a sound on its own, unmodified.
    fn play_preview(&self, sound_type: SoundType);
}

/// A renderer that plays samples from a bank through an audio device.
pub struct SampleRenderer {
    device: Arc<dyn audio::Device>,
    files: HashMap<SoundType, PathBuf>,
    bank: RwLock<SampleBank>,
}

impl SampleRenderer {
    /// Creates a renderer. Sound types missing from `files` use the built-in clicks.
    pub fn new(device: Arc<dyn audio::Device>, files: HashMap<SoundType, PathBuf>) -> Self {
        SampleRenderer {
            device,
            files,
            bank: RwLock::new(SampleBank::empty()),
        }
    }

    fn trigger(&self, sound_type: SoundType, volume: f32, rate: f32) {
        let sample = match self.bank.read().get(sound_type) {
            Some(sample) => sample.clone(),
            None => {
                debug!(sound = sound_type.as_str(), "No sample loaded, skipping");
                return;
            }
        };

        match self.device.play(Trigger {
            sample,
            volume,
            rate,
        }) {
            Ok(()) => debug!(sound = sound_type.as_str(), volume, rate, "Triggered"),
            Err(TriggerError::QueueFull) => {
                warn!(sound = sound_type.as_str(), "Voice queue full, dropping click")
            }
            Err(TriggerError::Closed) => {
                debug!(sound = sound_type.as_str(), "Audio output closed, skipping")
            }
        }
    }
}

impl SoundRenderer for SampleRenderer {
    fn initialize(&self) -> Result<(), Box<dyn Error>> {
        self.device.open()?;
        let bank = SampleBank::load(&self.files, self.device.sample_rate());
        *self.bank.write() = bank;
        info!(device = %self.device, "Sound renderer ready");
        Ok(())
    }

    fn cleanup(&self) {
        *self.bank.write() = SampleBank::empty();
        self.device.close();
        info!(device = %self.device, "Sound renderer released");
    }

    fn play_tick(
        &self,
        sound_type: SoundType,
        is_accent: bool,
        modifications: &SoundModifications,
        volume: f32,
    ) {
        self.trigger(
            sound_type,
            tick_volume(volume, is_accent),
            modifications.playback_rate(),
        );
    }

    fn play_preview(&self, sound_type: SoundType) {
        self.trigger(sound_type, PREVIEW_VOLUME, 1.0);
    }
}

#[cfg(test)]
mod test {
    use std::{collections::HashMap, sync::Arc};

    use super::*;
    use crate::audio::{mock, Device as _};

    fn renderer(files: HashMap<SoundType, PathBuf>) -> (SampleRenderer, Arc<mock::Device>) {
        let device = mock::Device::get("mock-renderer");
        let mock = device.to_mock().unwrap();
        (SampleRenderer::new(Arc::new(device), files), mock)
    }

    #[test]
    fn test_tick_volume() {
        assert_eq!(1.0, tick_volume(1.0, true));
        assert!((tick_volume(1.0, false) - 0.8).abs() < f32::EPSILON);
        assert!((tick_volume(0.5, true) - 0.6).abs() < f32::EPSILON);
        assert!((tick_volume(0.5, false) - 0.4).abs() < f32::EPSILON);
        assert_eq!(0.0, tick_volume(0.0, true));
    }

    #[test]
    fn test_play_tick() {
        let (renderer, device) = renderer(HashMap::new());
        renderer.initialize().unwrap();
        assert!(device.is_open());

        let modifications = SoundModifications {
            enabled: true,
            pitch: 10,
            ..Default::default()
        };
        renderer.play_tick(SoundType::Wooden, true, &modifications, 1.0);
        renderer.play_tick(SoundType::Wooden, false, &SoundModifications::default(), 1.0);

        let played = device.played();
        assert_eq!(2, played.len());
        assert_eq!(1.0, played[0].volume);
        assert!((played[0].rate - 1.1).abs() < f32::EPSILON);
        assert!((played[1].volume - 0.8).abs() < f32::EPSILON);
        assert_eq!(1.0, played[1].rate);
        assert_eq!(
            crate::samples::synth::synthesize(SoundType::Wooden, mock::DEFAULT_SAMPLE_RATE)
                .frames(),
            played[0].sample.frames()
        );
    }

    #[test]
    fn test_play_preview() {
        let (renderer, device) = renderer(HashMap::new());
        renderer.initialize().unwrap();
        renderer.play_preview(SoundType::Ping);

        let played = device.played();
        assert_eq!(1, played.len());
        assert_eq!(PREVIEW_VOLUME, played[0].volume);
        assert_eq!(1.0, played[0].rate);
    }

    #[test]
    fn test_missing_sample_is_silent() {
        let (renderer, device) = renderer(HashMap::from([(
            SoundType::Drum,
            PathBuf::from("/nonexistent/drum.wav"),
        )]));
        renderer.initialize().unwrap();

        renderer.play_tick(SoundType::Drum, true, &SoundModifications::default(), 1.0);
        assert_eq!(0, device.played_count());

        renderer.play_tick(SoundType::Click, true, &SoundModifications::default(), 1.0);
        assert_eq!(1, device.played_count());
    }

    #[test]
    fn test_cleanup_silences() {
        let (renderer, device) = renderer(HashMap::new());

        // Nothing loaded before initialize.
        renderer.play_preview(SoundType::Click);
        assert_eq!(0, device.played_count());

        renderer.initialize().unwrap();
        renderer.cleanup();
        assert!(!device.is_open());
        renderer.play_preview(SoundType::Click);
        assert_eq!(0, device.played_count());
    }
}
