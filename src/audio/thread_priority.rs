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

use thread_priority::{set_current_thread_priority, ThreadPriority, ThreadPriorityValue};
use tracing::{info, warn};

/// Default priority for timing critical threads when TACTUS_THREAD_PRIORITY is unset.
const DEFAULT_THREAD_PRIORITY: u8 = 70;

/// Reads TACTUS_THREAD_PRIORITY (0-99). Read once per thread, never in a hot path.
pub fn realtime_priority() -> ThreadPriority {
    let requested = std::env::var("TACTUS_THREAD_PRIORITY")
        .ok()
        .and_then(|v| v.trim().parse::<u8>().ok())
        .filter(|n| *n < 100)
        .unwrap_or(DEFAULT_THREAD_PRIORITY);

    match ThreadPriorityValue::try_from(requested) {
        Ok(value) => ThreadPriority::Crossplatform(value),
        Err(_) => ThreadPriority::Max,
    }
}

pub(crate) fn env_flag(name: &str) -> bool {
    std::env::var(name)
        .ok()
        .map(|v| {
            v == "1"
                || v.eq_ignore_ascii_case("true")
                || v.eq_ignore_ascii_case("yes")
                || v.eq_ignore_ascii_case("on")
        })
        .unwrap_or(false)
}

/// Returns whether we should attempt RT (SCHED_FIFO) scheduling for the clock and
/// audio callback threads. Default: enabled. Opt out with TACTUS_DISABLE_RT=1.
pub fn rt_enabled() -> bool {
    !env_flag("TACTUS_DISABLE_RT")
}

/// Raises the priority of the calling thread. Failures are logged and ignored; the
/// thread keeps running at normal priority.
pub fn promote_current_thread(priority: ThreadPriority, rt: bool, role: &str) {
    if let Err(e) = set_current_thread_priority(priority) {
        warn!(role, error = ?e, "Failed to raise thread priority");
    }

    #[cfg(unix)]
    if rt {
        use thread_priority::unix::{
            set_thread_priority_and_policy, thread_native_id, RealtimeThreadSchedulePolicy,
            ThreadSchedulePolicy,
        };
        let tid = thread_native_id();
        match set_thread_priority_and_policy(
            tid,
            priority,
            ThreadSchedulePolicy::Realtime(RealtimeThreadSchedulePolicy::Fifo),
        ) {
            Ok(()) => {
                info!(role, "Enabled RT SCHED_FIFO");
            }
            Err(e) => {
                warn!(role, error = %e, "Failed to set RT SCHED_FIFO");
            }
        }
    }

    #[cfg(not(unix))]
    let _ = rt;
}

/// Promotes the audio callback thread the first time the callback runs on it.
pub fn configure_callback_priority(priority: ThreadPriority, rt: bool, priority_set: &mut bool) {
    if *priority_set {
        return;
    }
    promote_current_thread(priority, rt, "audio callback");
    *priority_set = true;
}
