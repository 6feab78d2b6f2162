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
use std::{error::Error, fmt};

use tracing::debug;

use super::Impact;

/// Stands in for a vibration motor on machines that don't have one: every pulse
/// becomes a debug event.
#[derive(Default)]
pub struct Device {
    pulses: u64,
}

impl Device {
    pub fn new() -> Device {
        Device::default()
    }
}

impl super::HapticDevice for Device {
    fn impact(&mut self, impact: Impact) -> Result<(), Box<dyn Error>> {
        self.pulses += 1;
        debug!(?impact, pulse = self.pulses, "Haptic pulse");
        Ok(())
    }
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "log")
    }
}
