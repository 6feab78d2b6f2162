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

//! The clock is the only time source of the engine. It fires a callback at a fixed
//! interval until it is disarmed.

use std::{
    sync::Arc,
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use tracing::error;

pub mod mock;
mod thread_clock;

pub use thread_clock::ThreadClock;

/// The callback fired on every tick. Receives the instant the tick was delivered.
pub type TickFn = Arc<dyn Fn(Instant) + Send + Sync>;

/// A repeating trigger.
///
/// At most one run is armed at a time: arming again replaces the current run.
/// Every operation that disarms a run cancels it before returning and hands back a
/// [`Disarmed`] token. Waiting on the token guarantees the old run has fully
/// exited, so callers holding locks the tick path needs should drop them first.
pub trait Clock: Send + Sync {
    /// Arms the clock. The first tick fires immediately, then once per interval.
    fn start(&self, interval: Duration, on_tick: TickFn) -> Disarmed;

    /// Disarms the clock. Stopping an unarmed clock is a no-op.
    fn stop(&self) -> Disarmed;

    /// Restarts the armed run with a new interval. The next tick fires one full
    /// new interval from now; the current tick is never re-fired. No-op if unarmed.
    fn reconfigure(&self, interval: Duration) -> Disarmed;

    /// The interval of the armed run, if any.
    fn interval(&self) -> Option<Duration>;

    /// Returns true if a run is armed.
    fn is_armed(&self) -> bool {
        self.interval().is_some()
    }
}

/// Proof that a clock run has been cancelled. The run may still be finishing a
/// tick until [`Disarmed::wait`] returns.
#[must_use = "wait on the token to make sure the old run has exited"]
#[derive(Default)]
pub struct Disarmed {
    threads: Vec<JoinHandle<()>>,
}

impl Disarmed {
    /// A token for a clock that had nothing armed.
    pub fn nothing() -> Disarmed {
        Disarmed::default()
    }

    pub(crate) fn thread(handle: JoinHandle<()>) -> Disarmed {
        Disarmed {
            threads: vec![handle],
        }
    }

    /// Waits for the cancelled run to exit. Called from the run's own thread (a tick
    /// handler stopping its clock) this returns at once; the run exits as soon as
    /// the handler returns.
    pub fn wait(self) {
        let current = thread::current().id();
        for handle in self.threads {
            if handle.thread().id() == current {
                continue;
            }
            if handle.join().is_err() {
                error!("Clock thread panicked");
            }
        }
    }
}
