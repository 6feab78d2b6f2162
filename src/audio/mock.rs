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
use std::{
    error::Error,
    fmt,
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
};

use parking_lot::Mutex;
use tracing::{debug, info};

use super::{Trigger, TriggerError};

/// Sample rate reported by mock devices unless told otherwise.
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// A mock device. Doesn't actually play anything, it only remembers what it was
/// asked to play.
#[derive(Clone)]
pub struct Device {
    name: String,
    sample_rate: u32,
    is_open: Arc<AtomicBool>,
    played: Arc<Mutex<Vec<Trigger>>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            sample_rate: DEFAULT_SAMPLE_RATE,
            is_open: Arc::new(AtomicBool::new(false)),
            played: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn with_sample_rate(mut self, sample_rate: u32) -> Device {
        self.sample_rate = sample_rate;
        self
    }

    /// Returns true if the device output is open.
    pub fn is_open(&self) -> bool {
        self.is_open.load(Ordering::Relaxed)
    }

    /// Everything played so far, oldest first.
    pub fn played(&self) -> Vec<Trigger> {
        self.played.lock().clone()
    }

    /// The number of voices played so far.
    pub fn played_count(&self) -> usize {
        self.played.lock().len()
    }
}

impl super::Device for Device {
    fn open(&self) -> Result<(), Box<dyn Error>> {
        if !self.is_open.swap(true, Ordering::Relaxed) {
            info!(device = self.name, "Opened mock output");
        }
        Ok(())
    }

    fn close(&self) {
        if self.is_open.swap(false, Ordering::Relaxed) {
            info!(device = self.name, "Closed mock output");
        }
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn play(&self, trigger: Trigger) -> Result<(), TriggerError> {
        if !self.is_open() {
            return Err(TriggerError::Closed);
        }
        debug!(
            device = self.name,
            volume = trigger.volume,
            rate = trigger.rate,
            "Mock voice"
        );
        self.played.lock().push(trigger);
        Ok(())
    }

    #[cfg(test)]
    fn to_mock(&self) -> Result<Arc<Device>, Box<dyn Error>> {
        Ok(Arc::new(self.clone()))
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name,)
    }
}
