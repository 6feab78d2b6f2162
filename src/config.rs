// Copyright (C) 2024 Michael Wilson <mike@mdwn.dev>
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
use std::{error::Error, path::Path, sync::Arc};

use tracing::info;

use crate::{
    clock::ThreadClock,
    controller::{keyboard, Controller},
    engine::Engine,
    feedback::{self, FeedbackDispatcher},
    session::SessionRecorder,
    sound::SampleRenderer,
    storage::{json, Storage},
};

mod app;
mod audio;
pub mod error;

pub use app::{App, Defaults};
pub use audio::Audio;
pub use error::ConfigError;

/// The voice cap used when the configuration doesn't set one.
pub const DEFAULT_MAX_VOICES: usize = 16;

/// Opens the storage named by the configuration.
pub fn init_storage(app: &App) -> Arc<dyn Storage> {
    Arc::new(json::Storage::new(&app.storage_dir()))
}

/// Builds the engine and its controller from the given config file. The returned
/// controller runs until the user quits.
pub fn init_engine_and_controller(path: &Path) -> Result<Controller, Box<dyn Error>> {
    let app = App::deserialize(path)?;
    let storage = init_storage(&app);

    let settings = storage.settings().unwrap_or(app.default_settings()?);
    let config = match storage.last_config() {
        Some(config) => config,
        None => app.defaults().to_tempo_config()?,
    };

    let device = crate::audio::get_device(&app.audio())?;
    let renderer = Arc::new(SampleRenderer::new(device, app.samples()?));
    let haptics = feedback::get_device(app.haptics())?;
    info!(
        storage = %app.storage_dir().display(),
        haptics = app.haptics(),
        bpm = config.bpm,
        "Loaded configuration"
    );

    let engine = Engine::builder(Arc::new(ThreadClock::new()), renderer)
        .feedback(FeedbackDispatcher::new(haptics, settings.vibration_enabled))
        .recorder(SessionRecorder::new(storage.clone()))
        .config(config)
        .build();
    engine.initialize()?;

    Controller::new(engine, storage, settings, Arc::new(keyboard::Driver::new()))
}
