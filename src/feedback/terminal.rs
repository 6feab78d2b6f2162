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
    error::Error,
    fmt,
    io::{self, Write},
};

use super::Impact;

/// The ASCII bell.
const BELL: &[u8] = b"\x07";

/// Rings the terminal bell on accents. Light pulses are ignored, a bell on every
/// beat is just noise.
pub struct Device<W: Write + Send> {
    writer: W,
}

impl Device<io::Stdout> {
    pub fn stdout() -> Self {
        Device {
            writer: io::stdout(),
        }
    }
}

impl<W: Write + Send> Device<W> {
    pub fn new(writer: W) -> Self {
        Device { writer }
    }
}

impl<W: Write + Send> super::HapticDevice for Device<W> {
    fn impact(&mut self, impact: Impact) -> Result<(), Box<dyn Error>> {
        if impact == Impact::Medium {
            self.writer.write_all(BELL)?;
            self.writer.flush()?;
        }
        Ok(())
    }
}

impl<W: Write + Send> fmt::Display for Device<W> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "terminal")
    }
}
