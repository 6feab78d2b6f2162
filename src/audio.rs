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
use std::{error::Error, fmt, sync::Arc};

use crate::{config, samples::LoadedSample};

pub mod cpal;
pub mod mixer;
pub mod mock;
pub mod thread_priority;

/// How many triggers may wait for the audio thread before new ones are dropped.
pub const VOICE_QUEUE_SIZE: usize = 64;

/// A request to start a new voice.
#[derive(Clone)]
pub struct Trigger {
    /// The sample to play from its first frame.
    pub sample: LoadedSample,
    /// Gain applied to every frame of the voice.
    pub volume: f32,
    /// Playback rate multiplier. 1.0 plays the sample as recorded.
    pub rate: f32,
}

/// Errors returned when a trigger can't be handed to the output.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TriggerError {
    #[error("voice queue is full")]
    QueueFull,

    #[error("audio output is not open")]
    Closed,
}

/// An audio output that plays one-shot voices.
pub trait Device: fmt::Display + Send + Sync {
    /// Opens the output stream. Opening an open device does nothing.
    fn open(&self) -> Result<(), Box<dyn Error>>;

    /// Closes the output stream. Closing a closed device does nothing.
    fn close(&self);

    /// The output sample rate. Samples must be transcoded to this rate.
    fn sample_rate(&self) -> u32;

    /// Queues a voice for the audio thread. Never blocks.
    fn play(&self, trigger: Trigger) -> Result<(), TriggerError>;

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<mock::Device>, Box<dyn Error>>;
}

/// Lists devices known to cpal.
pub fn list_devices() -> Result<Vec<Box<dyn Device>>, Box<dyn Error>> {
    cpal::Device::list()
}

/// Gets a device for the given configuration.
pub fn get_device(config: &config::Audio) -> Result<Arc<dyn Device>, Box<dyn Error>> {
    let device = config.device();
    if device.starts_with("mock") {
        return Ok(Arc::new(mock::Device::get(device).with_sample_rate(
            config.sample_rate().unwrap_or(mock::DEFAULT_SAMPLE_RATE),
        )));
    };

    Ok(Arc::new(cpal::Device::get(config)?))
}
