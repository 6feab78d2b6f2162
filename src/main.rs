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
use clap::{crate_version, Parser, Subcommand};
use std::error::Error;
use std::io::{self, Write};
use std::path::PathBuf;
use std::thread;
use tactus::config::{self, App};
use tactus::engine::Engine;
use tactus::util::bar_display;
use tracing_subscriber::EnvFilter;

/// How many beats the display may fall behind before beats are dropped.
const DISPLAY_QUEUE_SIZE: usize = 16;

#[derive(Parser)]
#[clap(
    author = "Michael Wilson",
    version = crate_version!(),
    about = "A low-jitter metronome."
)]
struct Cli {
    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Starts the interactive metronome.
    Start {
        /// The path to the tactus config.
        config_path: String,
    },
    /// Lists the available audio output devices.
    Devices {},
    /// Lists practice sessions, newest first.
    Sessions {
        /// The path to the tactus config.
        config_path: String,
    },
    /// Deletes the practice history.
    ClearSessions {
        /// The path to the tactus config.
        config_path: String,
    },
    /// Lists saved presets.
    Presets {
        /// The path to the tactus config.
        config_path: String,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Start { config_path } => {
            let mut controller = config::init_engine_and_controller(&PathBuf::from(config_path))?;
            let display = spawn_display(controller.engine())?;
            controller.join().await?;
            if display.join().is_err() {
                return Err("beat display panicked".into());
            }
        }
        Commands::Devices {} => {
            let devices = tactus::audio::list_devices()?;

            if devices.is_empty() {
                println!("No devices found.");
                return Ok(());
            }

            println!("Devices:");
            for device in devices {
                println!("- {}", device);
            }
        }
        Commands::Sessions { config_path } => {
            let storage = config::init_storage(&App::deserialize(&PathBuf::from(config_path))?);
            let sessions = storage.sessions();

            if sessions.is_empty() {
                println!("No sessions recorded.");
                return Ok(());
            }

            println!("Sessions (count: {}):", sessions.len());
            for session in sessions {
                println!(
                    "- {} {} bpm {} {} ({})",
                    session.id,
                    session.bpm,
                    session.time_signature,
                    session.sound_type.display_name(),
                    session.duration_display(),
                );
            }
        }
        Commands::ClearSessions { config_path } => {
            let storage = config::init_storage(&App::deserialize(&PathBuf::from(config_path))?);
            storage.clear_sessions();
            println!("Sessions cleared.");
        }
        Commands::Presets { config_path } => {
            let storage = config::init_storage(&App::deserialize(&PathBuf::from(config_path))?);
            let presets = storage.presets();

            if presets.is_empty() {
                println!("No presets saved.");
                return Ok(());
            }

            println!("Presets (count: {}):", presets.len());
            for preset in presets {
                println!(
                    "- {} ({} bpm {} {})",
                    preset.name,
                    preset.config.bpm,
                    preset.config.time_signature,
                    preset.config.sound_type.display_name(),
                );
            }
        }
    };

    Ok(())
}

/// Prints the position in the bar on every beat. Ends when the engine drops
/// its subscriber.
fn spawn_display(engine: &Engine) -> Result<thread::JoinHandle<()>, io::Error> {
    let beats = engine.subscribe_channel(DISPLAY_QUEUE_SIZE);
    let engine = engine.clone();
    thread::Builder::new()
        .name("tactus-display".to_string())
        .spawn(move || {
            for tick in beats {
                let state = engine.state();
                let mut stdout = io::stdout().lock();
                // A closed stdout only costs us the display.
                let _ = write!(
                    stdout,
                    "\r{}  {} bpm ",
                    bar_display(tick.beat_index, state.active_config.time_signature.numerator),
                    state.active_config.bpm,
                );
                let _ = stdout.flush();
            }
        })
}
