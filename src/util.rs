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

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Outputs the given duration in a minutes:seconds format.
pub fn duration_minutes_seconds(duration: Duration) -> String {
    let minutes = duration.as_secs() / 60;
    let secs = duration.as_secs() - minutes * 60;
    format!("{}:{:02}", minutes, secs)
}

/// Wall clock time in milliseconds since the unix epoch. A clock set before 1970
/// reads as zero.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0)
}

/// Renders a bar with the given beat marked, e.g. `X . . .` on the downbeat of
/// 4/4 and `. . o .` on the third beat.
pub fn bar_display(beat_index: u8, numerator: u8) -> String {
    (0..numerator.max(1))
        .map(|beat| match (beat == beat_index, beat == 0) {
            (true, true) => "X",
            (true, false) => "o",
            (false, _) => ".",
        })
        .collect::<Vec<&str>>()
        .join(" ")
}
