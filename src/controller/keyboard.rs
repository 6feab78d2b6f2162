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
use std::{io, str::FromStr};

use tokio::{sync::mpsc::Sender, task::JoinHandle};
use tracing::{info, span, warn, Level};

use super::Event;
use crate::tempo::{SoundType, Subdivision, TimeSignature};

const HELP: &str = "Commands: <enter>/toggle, start, stop, bpm <n>, + [n], - [n], \
                    time <n/d>, sub <none|eighth|triplet|sixteenth>, sound <name>, \
                    volume <0-1>, pitch <n>, mods, save <name>, load <name>, \
                    delete <name>, vibrate <on|off>, preview <sound>, quit";

/// A controller that controls the metronome using the keyboard. Reads one
/// command per line.
#[derive(Default)]
pub struct Driver {}

impl Driver {
    pub fn new() -> Driver {
        Driver {}
    }

    /// Reads and sends one command. Returns false once the input is exhausted.
    fn monitor_io<R, W>(
        events_tx: &Sender<Event>,
        mut reader: R,
        mut writer: W,
    ) -> Result<bool, io::Error>
    where
        R: io::BufRead,
        W: io::Write,
    {
        write!(writer, "> ")?;
        writer.flush()?;
        let mut input: String = String::default();
        if reader.read_line(&mut input)? == 0 {
            events_tx
                .blocking_send(Event::Quit)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?;
            return Ok(false);
        }

        match parse_command(&input) {
            Ok(Some(event)) => events_tx
                .blocking_send(event)
                .map_err(|e| io::Error::new(io::ErrorKind::Other, e))?,
            Ok(None) => writeln!(writer, "{}", HELP)?,
            Err(e) => warn!(input = input.trim(), err = %e, "Unrecognized input"),
        }
        Ok(true)
    }
}

/// Parses a command line. `Ok(None)` means the user asked for help.
fn parse_command(input: &str) -> Result<Option<Event>, String> {
    let input = input.trim();
    let (command, argument) = match input.split_once(char::is_whitespace) {
        Some((command, argument)) => (command, argument.trim()),
        None => (input, ""),
    };

    let number = |argument: &str| -> Result<i64, String> {
        argument
            .parse::<i64>()
            .map_err(|_| format!("'{}' is not a number", argument))
    };
    let required = |argument: &str| -> Result<String, String> {
        if argument.is_empty() {
            Err(format!("{} needs an argument", command))
        } else {
            Ok(argument.to_string())
        }
    };

    let event = match command.to_lowercase().as_str() {
        "" | "t" | "toggle" => Event::Toggle,
        "start" => Event::Start,
        "stop" => Event::Stop,
        "bpm" => Event::SetBpm(number(argument)?),
        "+" | "-" => {
            let amount = if argument.is_empty() {
                1
            } else {
                number(argument)?
            };
            Event::NudgeBpm(if command == "-" { amount.saturating_neg() } else { amount })
        }
        "time" | "ts" => {
            let time_signature =
                TimeSignature::from_str(argument).map_err(|e| e.to_string())?;
            Event::SetTimeSignature(
                time_signature.numerator.into(),
                time_signature.denominator.into(),
            )
        }
        "sub" | "subdivision" => Event::SetSubdivision(
            Subdivision::from_str(argument).map_err(|e| e.to_string())?,
        ),
        "sound" => Event::SetSound(SoundType::from_str(argument).map_err(|e| e.to_string())?),
        "volume" | "vol" => Event::SetVolume(
            argument
                .parse::<f32>()
                .map_err(|_| format!("'{}' is not a volume", argument))?,
        ),
        "pitch" => Event::SetPitch(number(argument)?),
        "mods" => Event::ToggleModifications,
        "save" => Event::SavePreset(required(argument)?),
        "load" => Event::LoadPreset(required(argument)?),
        "delete" => Event::DeletePreset(required(argument)?),
        "vibrate" => match argument.to_lowercase().as_str() {
            "on" | "true" => Event::SetVibration(true),
            "off" | "false" => Event::SetVibration(false),
            _ => return Err(format!("'{}' is not on or off", argument)),
        },
        "preview" => Event::Preview(SoundType::from_str(argument).map_err(|e| e.to_string())?),
        "q" | "quit" | "exit" => Event::Quit,
        "help" | "?" => return Ok(None),
        _ => return Err(format!("unknown command '{}'", command)),
    };
    Ok(Some(event))
}

impl super::Driver for Driver {
    fn monitor_events(&self, events_tx: Sender<Event>) -> JoinHandle<Result<(), io::Error>> {
        tokio::task::spawn_blocking(move || {
            let span = span!(Level::INFO, "keyboard driver");
            let _enter = span.enter();

            info!("Keyboard driver started.");

            while Self::monitor_io(&events_tx, io::stdin().lock(), io::stdout())? {}
            Ok(())
        })
    }
}
