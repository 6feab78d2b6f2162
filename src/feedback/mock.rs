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
use std::{error::Error, fmt, sync::Arc};

use parking_lot::Mutex;

use super::Impact;

/// A mock haptic device. Clones share the same record of pulses.
#[derive(Clone)]
pub struct Device {
    name: String,
    pulses: Arc<Mutex<Vec<Impact>>>,
    failures: Arc<Mutex<usize>>,
}

impl Device {
    /// Gets the given mock device.
    pub fn get(name: &str) -> Device {
        Device {
            name: name.to_string(),
            pulses: Arc::new(Mutex::new(Vec::new())),
            failures: Arc::new(Mutex::new(0)),
        }
    }

    /// Every pulse delivered so far, oldest first.
    pub fn pulses(&self) -> Vec<Impact> {
        self.pulses.lock().clone()
    }

    /// Makes the next `count` pulses fail.
    pub fn fail_next(&self, count: usize) {
        *self.failures.lock() = count;
    }
}

impl super::HapticDevice for Device {
    fn impact(&mut self, impact: Impact) -> Result<(), Box<dyn Error>> {
        let mut failures = self.failures.lock();
        if *failures > 0 {
            *failures -= 1;
            return Err("mock haptic failure".into());
        }
        self.pulses.lock().push(impact);
        Ok(())
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (Mock)", self.name)
    }
}
