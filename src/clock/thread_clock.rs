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
    thread::{self, JoinHandle},
    time::{Duration, Instant},
};

use parking_lot::Mutex;
use tracing::{debug, error, span, warn, Level};

use super::{Clock, Disarmed, TickFn};
use crate::{audio::thread_priority, playsync::CancelHandle};

/// How long before a deadline the thread stops parking and starts spinning.
const SPIN_WINDOW: Duration = Duration::from_millis(2);

/// The shortest interval the clock will run at.
const MIN_INTERVAL: Duration = Duration::from_millis(1);

/// A clock backed by a dedicated timer thread per armed run.
pub struct ThreadClock {
    run: Mutex<Option<Run>>,
}

/// An armed run of the clock.
struct Run {
    interval: Duration,
    on_tick: TickFn,
    cancel_handle: CancelHandle,
    join_handle: JoinHandle<()>,
}

impl Default for ThreadClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ThreadClock {
    pub fn new() -> ThreadClock {
        ThreadClock {
            run: Mutex::new(None),
        }
    }

    /// Spawns a timer thread that fires its first tick at `first_tick`.
    fn spawn(interval: Duration, first_tick: Instant, on_tick: TickFn) -> Option<Run> {
        let cancel_handle = CancelHandle::new();
        let spawned = thread::Builder::new()
            .name("tactus-clock".to_string())
            .spawn({
                let cancel_handle = cancel_handle.clone();
                let on_tick = on_tick.clone();
                move || run_clock(interval, first_tick, cancel_handle, on_tick)
            });

        match spawned {
            Ok(join_handle) => Some(Run {
                interval,
                on_tick,
                cancel_handle,
                join_handle,
            }),
            Err(e) => {
                error!(err = %e, "Unable to spawn clock thread");
                None
            }
        }
    }

    fn disarm(run: Option<Run>) -> Disarmed {
        match run {
            Some(run) => {
                run.cancel_handle.cancel();
                Disarmed::thread(run.join_handle)
            }
            None => Disarmed::nothing(),
        }
    }
}

impl Clock for ThreadClock {
    fn start(&self, interval: Duration, on_tick: TickFn) -> Disarmed {
        let mut run = self.run.lock();
        let previous = Self::disarm(run.take());
        *run = Self::spawn(interval, Instant::now(), on_tick);
        previous
    }

    fn stop(&self) -> Disarmed {
        Self::disarm(self.run.lock().take())
    }

    fn reconfigure(&self, interval: Duration) -> Disarmed {
        let mut run = self.run.lock();
        let Some(current) = run.take() else {
            return Disarmed::nothing();
        };

        let on_tick = current.on_tick.clone();
        let previous = Self::disarm(Some(current));
        *run = Self::spawn(interval, Instant::now() + interval, on_tick);
        previous
    }

    fn interval(&self) -> Option<Duration> {
        self.run.lock().as_ref().map(|run| run.interval)
    }
}

impl Drop for ThreadClock {
    fn drop(&mut self) {
        self.stop().wait();
    }
}

/// The body of a timer thread. Ticks are scheduled against absolute deadlines so
/// callback time never accumulates as drift.
fn run_clock(interval: Duration, first_tick: Instant, cancel_handle: CancelHandle, on_tick: TickFn) {
    let interval = interval.max(MIN_INTERVAL);
    let span = span!(
        Level::INFO,
        "clock",
        interval_ms = interval.as_secs_f64() * 1000.0
    );
    let _enter = span.enter();

    thread_priority::promote_current_thread(
        thread_priority::realtime_priority(),
        thread_priority::rt_enabled(),
        "clock",
    );
    debug!("Clock armed");

    let mut next = first_tick;
    loop {
        // Park until just before the deadline so a cancel wakes us immediately.
        let wake_at = next.checked_sub(SPIN_WINDOW).unwrap_or(next);
        if cancel_handle.wait_until(wake_at) {
            break;
        }

        let now = Instant::now();
        if next > now {
            spin_sleep::sleep(next - now);
        }
        if cancel_handle.is_cancelled() {
            break;
        }

        on_tick(Instant::now());

        next += interval;
        let now = Instant::now();
        if now > next {
            let behind = now - next;
            if behind > interval {
                let missed = (behind.as_nanos() / interval.as_nanos()) as u32;
                next += interval * missed;
                warn!(missed, "Clock fell behind, skipping ticks");
            }
        }
    }

    debug!("Clock disarmed");
}
