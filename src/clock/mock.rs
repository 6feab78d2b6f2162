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
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use super::{Disarmed, TickFn};

/// A call made against the mock clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    Start(Duration),
    Stop,
    Reconfigure(Duration),
}

/// A clock that only ticks when told to. Nothing fires on start; tests call
/// [`Clock::fire`] to deliver ticks.
#[derive(Default)]
pub struct Clock {
    state: Mutex<State>,
}

#[derive(Default)]
struct State {
    armed: Option<(Duration, TickFn)>,
    calls: Vec<Call>,
}

impl Clock {
    pub fn new() -> Clock {
        Clock::default()
    }

    /// Delivers one tick to the armed callback. Returns false if nothing is armed.
    pub fn fire(&self) -> bool {
        // The callback runs without the lock so it can call back into the clock.
        let on_tick = match &self.state.lock().armed {
            Some((_, on_tick)) => on_tick.clone(),
            None => return false,
        };
        on_tick(Instant::now());
        true
    }

    /// Delivers `count` ticks, stopping early if the clock gets disarmed.
    pub fn fire_times(&self, count: usize) -> usize {
        (0..count).take_while(|_| self.fire()).count()
    }

    /// Every call made against the clock so far.
    pub fn calls(&self) -> Vec<Call> {
        self.state.lock().calls.clone()
    }

    /// The number of `start` calls.
    pub fn start_count(&self) -> usize {
        self.state
            .lock()
            .calls
            .iter()
            .filter(|call| matches!(call, Call::Start(_)))
            .count()
    }
}

impl super::Clock for Clock {
    fn start(&self, interval: Duration, on_tick: TickFn) -> Disarmed {
        let mut state = self.state.lock();
        state.calls.push(Call::Start(interval));
        state.armed = Some((interval, on_tick));
        Disarmed::nothing()
    }

    fn stop(&self) -> Disarmed {
        let mut state = self.state.lock();
        state.calls.push(Call::Stop);
        state.armed = None;
        Disarmed::nothing()
    }

    fn reconfigure(&self, interval: Duration) -> Disarmed {
        let mut state = self.state.lock();
        state.calls.push(Call::Reconfigure(interval));
        if let Some((current, _)) = state.armed.as_mut() {
            *current = interval;
        }
        Disarmed::nothing()
    }

    fn interval(&self) -> Option<Duration> {
        self.state.lock().armed.as_ref().map(|(interval, _)| *interval)
    }
}
