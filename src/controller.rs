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
use std::error::Error;
use std::io;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::task::JoinError;
use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{error, info, span, warn, Level};

use crate::engine::Engine;
use crate::storage::{AppSettings, Preset, Storage};
use crate::tempo::{SoundType, Subdivision, TempoConfig, TimeSignature};
use crate::util;

pub mod keyboard;

/// Controller events that will trigger behavior in the engine.
#[derive(Debug, PartialEq)]
pub enum Event {
    /// Starts the metronome if stopped, stops it otherwise.
    Toggle,

    Start,

    Stop,

    /// Sets the tempo. Clamped into range.
    SetBpm(i64),

    /// Moves the tempo up or down by the given amount.
    NudgeBpm(i64),

    /// Sets the time signature from a numerator and denominator. The denominator
    /// snaps to the nearest note value.
    SetTimeSignature(i64, i64),

    SetSubdivision(Subdivision),

    SetSound(SoundType),

    /// Sets the volume, from 0.0 to 1.0.
    SetVolume(f32),

    /// Sets the pitch modification in percent.
    SetPitch(i64),

    /// Switches the sound modifications on or off.
    ToggleModifications,

    /// Saves the current configuration under a name.
    SavePreset(String),

    /// Loads a preset by name or id.
    LoadPreset(String),

    /// Deletes a preset by name or id.
    DeletePreset(String),

    SetVibration(bool),

    /// Plays a sound once.
    Preview(SoundType),

    /// Stops the metronome and closes the controller.
    Quit,
}

pub trait Driver: Send + Sync + 'static {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>>;
}

/// Drives the engine from a driver's events.
pub struct Controller {
    engine: Engine,
    handle: JoinHandle<()>,
}

impl Controller {
    /// Creates a new controller with the given driver.
    pub fn new(
        engine: Engine,
        storage: Arc<dyn Storage>,
        settings: AppSettings,
        driver: Arc<dyn Driver>,
    ) -> Result<Controller, Box<dyn Error>> {
        let handler = Handler {
            engine: engine.clone(),
            storage,
            settings,
        };
        Ok(Controller {
            engine,
            handle: tokio::spawn(async move { Controller::trigger_events(handler, driver).await }),
        })
    }

    /// The engine being controlled.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Join will block until the controller finishes.
    pub async fn join(&mut self) -> Result<(), JoinError> {
        (&mut self.handle).await
    }

    /// Applies events from the driver until it quits or goes away.
    async fn trigger_events(mut handler: Handler, driver: Arc<dyn Driver>) {
        let span = span!(Level::INFO, "controller");
        let _enter = span.enter();

        let (events_tx, mut events_rx) = mpsc::channel(1);
        let join_handle = driver.monitor_events(events_tx);

        let state = handler.engine.state();
        info!(
            bpm = state.active_config.bpm,
            time_signature = %state.active_config.time_signature,
            "Controller started."
        );

        loop {
            match events_rx.recv().await {
                Some(Event::Quit) => {
                    info!("Quit requested.");
                    break;
                }
                Some(event) => {
                    info!(event = format!("{:?}", event), "Received event.");
                    handler.handle(event);
                }
                None => {
                    info!("Controller closing.");
                    break;
                }
            }
        }

        handler.engine.cleanup();
        handler.engine.unsubscribe();

        // Dropping the receiver lets a blocked driver finish.
        drop(events_rx);
        if !join_handle.is_finished() {
            info!("Event monitor still running, leaving it behind.");
            return;
        }
        match join_handle.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => error!("Event monitor failed: {}", e),
            Err(e) => error!("Error waiting for event monitor to stop: {}", e),
        }
    }
}

/// Applies events to the engine, saving what needs to be remembered.
struct Handler {
    engine: Engine,
    storage: Arc<dyn Storage>,
    settings: AppSettings,
}

impl Handler {
    fn handle(&mut self, event: Event) {
        match event {
            Event::Toggle => self.engine.toggle(),
            Event::Start => self.engine.start(),
            Event::Stop => self.engine.stop(),
            Event::SetBpm(bpm) => self.update(|config| config.set_bpm(bpm)),
            Event::NudgeBpm(delta) => self.update(|config| {
                config.set_bpm(i64::from(config.bpm).saturating_add(delta))
            }),
            Event::SetTimeSignature(numerator, denominator) => self.update(|config| {
                config.time_signature = TimeSignature::new(numerator, denominator)
            }),
            Event::SetSubdivision(subdivision) => {
                self.update(|config| config.subdivision = subdivision)
            }
            Event::SetSound(sound_type) => self.update(|config| config.sound_type = sound_type),
            Event::SetVolume(volume) => self.update(|config| config.set_volume(volume)),
            Event::SetPitch(pitch) => self.update(|config| config.set_pitch(pitch)),
            Event::ToggleModifications => self.update(|config| {
                config.sound_modifications.enabled = !config.sound_modifications.enabled
            }),
            Event::SavePreset(name) => {
                let preset = Preset::new(
                    &name,
                    self.engine.state().active_config,
                    util::now_millis(),
                );
                self.storage.save_preset(&preset);
                info!(preset = preset.name, id = preset.id, "Saved preset.");
            }
            Event::LoadPreset(name) => match self.find_preset(&name) {
                Some(preset) => {
                    self.engine.load_preset(&preset);
                    self.storage.save_last_config(&preset.config);
                }
                None => warn!(preset = name, "No such preset."),
            },
            Event::DeletePreset(name) => match self.find_preset(&name) {
                Some(preset) => {
                    self.storage.delete_preset(&preset.id);
                    info!(preset = preset.name, "Deleted preset.");
                }
                None => warn!(preset = name, "No such preset."),
            },
            Event::SetVibration(enabled) => {
                self.engine.set_vibration_enabled(enabled);
                self.settings.vibration_enabled = enabled;
                self.storage.save_settings(&self.settings);
            }
            Event::Preview(sound_type) => self.engine.play_preview(sound_type),
            Event::Quit => self.engine.stop(),
        }
    }

    /// Changes the active configuration and remembers it.
    fn update<F>(&self, change: F)
    where
        F: FnOnce(&mut TempoConfig),
    {
        let mut config = self.engine.state().active_config;
        change(&mut config);
        self.engine.configure(config.clone());
        self.storage.save_last_config(&config);
    }

    /// Finds a preset by id, falling back to the first with a matching name.
    fn find_preset(&self, name: &str) -> Option<Preset> {
        let presets = self.storage.presets();
        presets
            .iter()
            .find(|preset| preset.id == name)
            .or_else(|| {
                presets
                    .iter()
                    .find(|preset| preset.name.eq_ignore_ascii_case(name))
            })
            .cloned()
    }
}
