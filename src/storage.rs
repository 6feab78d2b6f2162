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

//! Persistence for the last used configuration, presets, practice sessions and
//! settings.
//!
//! Storage never fails from the caller's point of view: errors are logged and
//! read back as "no data" or a dropped write. Every record is stored as JSON
//! under a fixed key.

use std::fmt;

use parking_lot::MutexGuard;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, error};

use crate::{session::Session, tempo::TempoConfig};

pub mod json;
pub mod memory;

/// The most sessions kept in history.
pub const MAX_SESSIONS: usize = 100;

/// Errors raised by storage backends. These never leave this module.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// The keys records are stored under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    LastConfig,
    Presets,
    Sessions,
    Settings,
}

impl Key {
    pub const ALL: [Key; 4] = [Key::LastConfig, Key::Presets, Key::Sessions, Key::Settings];

    pub fn as_str(&self) -> &'static str {
        match self {
            Key::LastConfig => "last_config",
            Key::Presets => "presets",
            Key::Sessions => "sessions",
            Key::Settings => "settings",
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A named, saved tempo configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    pub id: String,
    pub name: String,
    pub config: TempoConfig,
    /// Unix epoch milliseconds.
    pub created_at: u64,
}

impl Preset {
    /// Creates a preset. The id is the creation time in milliseconds.
    pub fn new(name: &str, config: TempoConfig, created_at: u64) -> Preset {
        Preset {
            id: created_at.to_string(),
            name: name.to_string(),
            config,
            created_at,
        }
    }
}

/// The colour scheme of the UI.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
    #[default]
    Auto,
}

/// User settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct AppSettings {
    pub theme: Theme,
    pub vibration_enabled: bool,
    /// Output latency compensation in milliseconds.
    pub audio_calibration: i64,
}

impl Default for AppSettings {
    fn default() -> Self {
        AppSettings {
            theme: Theme::Auto,
            vibration_enabled: true,
            audio_calibration: 0,
        }
    }
}

/// Raw string storage under fixed keys. Implement this to get [`Storage`].
pub trait KeyValue: Send + Sync {
    fn get(&self, key: Key) -> Result<Option<String>, StorageError>;

    fn set(&self, key: Key, value: &str) -> Result<(), StorageError>;

    fn remove(&self, key: Key) -> Result<(), StorageError>;

    /// Held across read-modify-write updates so concurrent updates of the same
    /// list can't lose each other's changes.
    fn update_lock(&self) -> MutexGuard<'_, ()>;
}

/// The persistence collaborator of the metronome.
pub trait Storage: Send + Sync {
    fn last_config(&self) -> Option<TempoConfig>;

    fn save_last_config(&self, config: &TempoConfig);

    fn presets(&self) -> Vec<Preset>;

    /// Saves a preset, replacing any preset with the same id.
    fn save_preset(&self, preset: &Preset);

    fn delete_preset(&self, id: &str);

    /// Practice history, newest first.
    fn sessions(&self) -> Vec<Session>;

    /// Adds a session to the front of the history, keeping at most
    /// [`MAX_SESSIONS`].
    fn save_session(&self, session: &Session);

    fn clear_sessions(&self);

    fn settings(&self) -> Option<AppSettings>;

    fn save_settings(&self, settings: &AppSettings);

    /// Removes every record.
    fn clear_all(&self);
}

impl<T: KeyValue> Storage for T {
    fn last_config(&self) -> Option<TempoConfig> {
        read::<_, TempoConfig>(self, Key::LastConfig).map(TempoConfig::clamped)
    }

    fn save_last_config(&self, config: &TempoConfig) {
        write(self, Key::LastConfig, config);
    }

    fn presets(&self) -> Vec<Preset> {
        read::<_, Vec<Preset>>(self, Key::Presets)
            .unwrap_or_default()
            .into_iter()
            .map(|preset| Preset {
                config: preset.config.clamped(),
                ..preset
            })
            .collect()
    }

    fn save_preset(&self, preset: &Preset) {
        let _guard = self.update_lock();
        let mut presets: Vec<Preset> = read(self, Key::Presets).unwrap_or_default();
        presets.retain(|p| p.id != preset.id);
        presets.push(preset.clone());
        write(self, Key::Presets, &presets);
    }

    fn delete_preset(&self, id: &str) {
        let _guard = self.update_lock();
        let mut presets: Vec<Preset> = read(self, Key::Presets).unwrap_or_default();
        presets.retain(|p| p.id != id);
        write(self, Key::Presets, &presets);
    }

    fn sessions(&self) -> Vec<Session> {
        read(self, Key::Sessions).unwrap_or_default()
    }

    fn save_session(&self, session: &Session) {
        let _guard = self.update_lock();
        let mut sessions: Vec<Session> = read(self, Key::Sessions).unwrap_or_default();
        sessions.insert(0, session.clone());
        sessions.truncate(MAX_SESSIONS);
        write(self, Key::Sessions, &sessions);
    }

    fn clear_sessions(&self) {
        let _guard = self.update_lock();
        write(self, Key::Sessions, &Vec::<Session>::new());
    }

    fn settings(&self) -> Option<AppSettings> {
        read(self, Key::Settings)
    }

    fn save_settings(&self, settings: &AppSettings) {
        write(self, Key::Settings, settings);
    }

    fn clear_all(&self) {
        let _guard = self.update_lock();
        for key in Key::ALL {
            if let Err(e) = self.remove(key) {
                error!(key = %key, err = %e, "Error clearing data");
            }
        }
    }
}

fn read<S: KeyValue + ?Sized, T: DeserializeOwned>(store: &S, key: Key) -> Option<T> {
    let data = match store.get(key) {
        Ok(Some(data)) => data,
        Ok(None) => return None,
        Err(e) => {
            error!(key = %key, err = %e, "Error loading data");
            return None;
        }
    };

    match serde_json::from_str(&data) {
        Ok(value) => Some(value),
        Err(e) => {
            error!(key = %key, err = %e, "Stored data is unreadable, ignoring it");
            None
        }
    }
}

fn write<S: KeyValue + ?Sized, T: Serialize + ?Sized>(store: &S, key: Key, value: &T) {
    let result = serde_json::to_string(value)
        .map_err(StorageError::from)
        .and_then(|data| store.set(key, &data));
    match result {
        Ok(()) => debug!(key = %key, "Saved"),
        Err(e) => error!(key = %key, err = %e, "Error saving data"),
    }
}
