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

//! Haptic feedback for beats.
//!
//! Pulses are fire-and-forget: the tick path queues them and a worker thread talks
//! to the device, so a slow or broken device never delays the beat.

use std::{
    error::Error,
    fmt,
    sync::atomic::{AtomicBool, Ordering},
    thread::{self, JoinHandle},
};

use crossbeam_channel::{Sender, TrySendError};
use tracing::{debug, error, info, span, warn, Level};

pub mod log;
pub mod mock;
pub mod terminal;

/// Pulses that may wait for the worker before new ones are dropped.
const PULSE_QUEUE_SIZE: usize = 16;

/// The strength of a haptic pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Impact {
    Light,
    Medium,
}

impl Impact {
    /// Accents get the stronger pulse.
    pub fn for_beat(is_accent: bool) -> Impact {
        if is_accent {
            Impact::Medium
        } else {
            Impact::Light
        }
    }
}

/// Something that can vibrate. Only ever called from the feedback worker thread.
pub trait HapticDevice: fmt::Display + Send {
    fn impact(&mut self, impact: Impact) -> Result<(), Box<dyn Error>>;
}

/// Gets a haptic device by name: `log`, `terminal`, `none` or anything starting
/// with `mock`. `none` means no device at all.
pub fn get_device(name: &str) -> Result<Option<Box<dyn HapticDevice>>, Box<dyn Error>> {
    match name {
        "none" => Ok(None),
        "log" => Ok(Some(Box::new(log::Device::new()))),
        "terminal" => Ok(Some(Box::new(terminal::Device::stdout()))),
        name if name.starts_with("mock") => Ok(Some(Box::new(mock::Device::get(name)))),
        _ => Err(format!("unknown haptics device {}", name).into()),
    }
}

/// Queues pulses to a haptic device.
pub struct FeedbackDispatcher {
    enabled: AtomicBool,
    pulse_tx: Option<Sender<Impact>>,
    worker: Option<JoinHandle<()>>,
}

impl FeedbackDispatcher {
    /// Creates a dispatcher. With no device, every pulse is a no-op.
    pub fn new(device: Option<Box<dyn HapticDevice>>, vibration_enabled: bool) -> Self {
        let (pulse_tx, worker) = match device {
            Some(device) => match Self::spawn_worker(device) {
                Ok((pulse_tx, worker)) => (Some(pulse_tx), Some(worker)),
                Err(e) => {
                    error!(err = %e, "Unable to start feedback worker, haptics disabled");
                    (None, None)
                }
            },
            None => (None, None),
        };

        FeedbackDispatcher {
            enabled: AtomicBool::new(vibration_enabled),
            pulse_tx,
            worker,
        }
    }

    /// A dispatcher without a device.
    pub fn disabled() -> Self {
        Self::new(None, false)
    }

    fn spawn_worker(
        mut device: Box<dyn HapticDevice>,
    ) -> Result<(Sender<Impact>, JoinHandle<()>), std::io::Error> {
        let (pulse_tx, pulse_rx) = crossbeam_channel::bounded::<Impact>(PULSE_QUEUE_SIZE);
        let worker = thread::Builder::new()
            .name("tactus-feedback".to_string())
            .spawn(move || {
                let span = span!(Level::INFO, "feedback", device = %device);
                let _enter = span.enter();
                info!("Feedback worker started");

                // Ends when the dispatcher drops its sender.
                for impact in pulse_rx {
                    if let Err(e) = device.impact(impact) {
                        error!(err = %e, ?impact, "Haptic device error");
                    }
                }
                info!("Feedback worker stopped");
            })?;
        Ok((pulse_tx, worker))
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::Relaxed);
        info!(enabled, "Vibration setting changed");
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled.load(Ordering::Relaxed)
    }

    /// Queues the pulse for a beat. Never blocks.
    pub fn pulse(&self, is_accent: bool) {
        if !self.is_enabled() {
            return;
        }
        let Some(pulse_tx) = &self.pulse_tx else {
            return;
        };

        match pulse_tx.try_send(Impact::for_beat(is_accent)) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => warn!("Haptic queue full, dropping pulse"),
            Err(TrySendError::Disconnected(_)) => debug!("Feedback worker gone, dropping pulse"),
        }
    }
}

impl Drop for FeedbackDispatcher {
    fn drop(&mut self) {
        // Closing the channel lets the worker drain and exit.
        self.pulse_tx.take();
        if let Some(worker) = self.worker.take() {
            if worker.thread().id() != thread::current().id() && worker.join().is_err() {
                error!("Feedback worker panicked");
            }
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::testutil::eventually;

    #[test]
    fn test_pulse_strength() {
        let device = mock::Device::get("mock-haptics");
        let pulses = device.clone();
        let dispatcher = FeedbackDispatcher::new(Some(Box::new(device)), true);

        dispatcher.pulse(true);
        dispatcher.pulse(false);
        dispatcher.pulse(false);
        eventually(|| pulses.pulses().len() == 3, "Pulses never arrived");
        assert_eq!(
            vec![Impact::Medium, Impact::Light, Impact::Light],
            pulses.pulses()
        );
    }

    #[test]
    fn test_disabled_vibration_is_noop() {
        let device = mock::Device::get("mock-haptics");
        let pulses = device.clone();
        let dispatcher = FeedbackDispatcher::new(Some(Box::new(device)), false);

        dispatcher.pulse(true);
        assert!(!dispatcher.is_enabled());

        dispatcher.set_enabled(true);
        dispatcher.pulse(false);
        eventually(|| pulses.pulses().len() == 1, "Pulse never arrived");

        // Dropping the dispatcher drains and joins the worker.
        drop(dispatcher);
        assert_eq!(vec![Impact::Light], pulses.pulses());
    }

    #[test]
    fn test_device_errors_do_not_stop_the_worker() {
        let device = mock::Device::get("mock-haptics");
        device.fail_next(1);
        let pulses = device.clone();
        let dispatcher = FeedbackDispatcher::new(Some(Box::new(device)), true);

        dispatcher.pulse(true);
        dispatcher.pulse(true);
        eventually(|| pulses.pulses().len() == 1, "Worker stopped after an error");
    }

    #[test]
    fn test_get_device() {
        assert!(get_device("none").unwrap().is_none());
        assert!(get_device("log").unwrap().is_some());
        assert!(get_device("mock-anything").unwrap().is_some());
        assert!(get_device("rumble-pak").is_err());

        // No device at all is quietly fine.
        FeedbackDispatcher::disabled().pulse(true);
    }
}
