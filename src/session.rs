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
    sync::Arc,
    thread::{self, JoinHandle},
    time::Duration,
};

use crossbeam_channel::Sender;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, span, Level};

use crate::{
    storage::Storage,
    tempo::{SoundType, TempoConfig, TimeSignature},
    util::duration_minutes_seconds,
};

/// One stretch of practice, from start() to stop(). Times are unix epoch
/// milliseconds, the duration is whole seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    pub id: String,
    pub start_time: u64,
    /// Zero while the session is still open.
    pub end_time: u64,
    pub duration: u64,
    pub bpm: u16,
    pub time_signature: TimeSignature,
    pub sound_type: SoundType,
}

impl Session {
    /// Opens a session at `now`, capturing the tempo it was started with.
    pub fn open(config: &TempoConfig, now: u64) -> Session {
        Session {
            id: now.to_string(),
            start_time: now,
            end_time: 0,
            duration: 0,
            bpm: config.bpm,
            time_signature: config.time_signature,
            sound_type: config.sound_type,
        }
    }

    /// Closes the session at `now`. A wall clock that went backwards yields a
    /// zero length session.
    pub fn finalize(self, now: u64) -> Session {
        let end_time = now.max(self.start_time);
        Session {
            end_time,
            duration: (end_time - self.start_time) / 1000,
            ..self
        }
    }

    pub fn is_open(&self) -> bool {
        self.end_time == 0
    }

    /// The duration as `m:ss`.
    pub fn duration_display(&self) -> String {
        duration_minutes_seconds(Duration::from_secs(self.duration))
    }
}

/// Hands finished sessions to storage on a background thread so that stopping
/// the metronome never waits on disk.
pub struct SessionRecorder {
    session_tx: Option<Sender<Session>>,
    writer: Option<JoinHandle<()>>,
}

impl SessionRecorder {
    pub fn new(storage: Arc<dyn Storage>) -> SessionRecorder {
        let (session_tx, session_rx) = crossbeam_channel::unbounded::<Session>();
        let writer = thread::Builder::new()
            .name("tactus-sessions".to_string())
            .spawn(move || {
                let span = span!(Level::INFO, "session recorder");
                let _enter = span.enter();

                for session in session_rx {
                    debug!(id = session.id, duration = session.duration, "Saving session");
                    storage.save_session(&session);
                }
            });

        match writer {
            Ok(writer) => SessionRecorder {
                session_tx: Some(session_tx),
                writer: Some(writer),
            },
            Err(e) => {
                error!(err = %e, "Unable to start session writer, sessions will not be saved");
                SessionRecorder {
                    session_tx: None,
                    writer: None,
                }
            }
        }
    }

    /// Queues a finished session for saving. Never blocks.
    pub fn record(&self, session: Session) {
        info!(
            id = session.id,
            bpm = session.bpm,
            duration = session.duration,
            "Practice session finished"
        );
        let Some(session_tx) = &self.session_tx else {
            return;
        };
        if session_tx.send(session).is_err() {
            error!("Session writer is gone, dropping session");
        }
    }
}

impl Drop for SessionRecorder {
    fn drop(&mut self) {
        // Pending sessions are written before the writer exits.
        self.session_tx.take();
        if let Some(writer) = self.writer.take() {
            if writer.thread().id() != thread::current().id() && writer.join().is_err() {
                error!("Session writer panicked");
            }
        }
    }
}
