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
    collections::HashMap,
    path::{Path, PathBuf},
    str::FromStr,
    time::Duration,
};

use config::{Config, Environment, File};
use duration_string::DurationString;
use serde::Deserialize;

use super::{error::ConfigError, Audio};
use crate::{
    samples::resolve_path,
    storage::AppSettings,
    tempo::{SoundModifications, SoundType, Subdivision, TempoConfig, TimeSignature},
};

const DEFAULT_AUDIO_DEVICE: &str = "default";
const DEFAULT_HAPTICS: &str = "log";
const DEFAULT_STORAGE_DIR: &str = "tactus-data";

/// The tempo used when nothing has been saved yet.
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct Defaults {
    bpm: Option<i64>,
    /// As `<beats>/<note value>`, e.g. `6/8`.
    time_signature: Option<String>,
    subdivision: Option<String>,
    sound: Option<String>,
    volume: Option<f32>,
    /// Enables the sound modifications with this pitch.
    pitch: Option<i64>,
}

impl Defaults {
    /// Converts to a tempo configuration. Numbers are clamped into range, names
    /// must be valid.
    pub fn to_tempo_config(&self) -> Result<TempoConfig, ConfigError> {
        let mut config = TempoConfig::default();
        if let Some(bpm) = self.bpm {
            config.set_bpm(bpm);
        }
        if let Some(time_signature) = &self.time_signature {
            config.time_signature = TimeSignature::from_str(time_signature)?;
        }
        if let Some(subdivision) = &self.subdivision {
            config.subdivision = Subdivision::from_str(subdivision)?;
        }
        if let Some(sound) = &self.sound {
            config.sound_type = SoundType::from_str(sound)?;
        }
        if let Some(volume) = self.volume {
            config.set_volume(volume);
        }
        if let Some(pitch) = self.pitch {
            config.sound_modifications = SoundModifications {
                enabled: true,
                ..config.sound_modifications
            };
            config.set_pitch(pitch);
        }
        Ok(config)
    }
}

/// The application configuration.
#[derive(Deserialize, Clone, Debug, Default)]
#[serde(default)]
pub struct App {
    /// The audio device: `default`, a cpal device name or `mock...`.
    audio_device: Option<String>,

    sample_rate: Option<u32>,

    max_voices: Option<usize>,

    /// Where presets, sessions and settings are kept. Relative to the config file.
    storage_dir: Option<String>,

    /// The haptic device: `log`, `terminal`, `none` or `mock...`.
    haptics: Option<String>,

    /// Sample files by sound type. Relative to the config file.
    samples: HashMap<String, String>,

    /// Output latency compensation, e.g. `15ms`. Seeds the settings.
    audio_calibration: Option<String>,

    defaults: Defaults,

    #[serde(skip)]
    base_path: PathBuf,
}

impl App {
    /// Parses the configuration from a YAML file. `TACTUS_`-prefixed environment
    /// variables override the file, e.g. `TACTUS_AUDIO_DEVICE`.
    pub fn deserialize(path: &Path) -> Result<App, ConfigError> {
        let mut app = Config::builder()
            .add_source(File::from(path))
            .add_source(Environment::with_prefix("TACTUS").try_parsing(true))
            .build()?
            .try_deserialize::<App>()?;
        app.base_path = path.parent().map(Path::to_path_buf).unwrap_or_default();
        Ok(app)
    }

    /// Makes relative paths resolve against `base_path`.
    pub fn with_base_path(mut self, base_path: &Path) -> App {
        self.base_path = base_path.to_path_buf();
        self
    }

    pub fn audio(&self) -> Audio {
        Audio::new(self.audio_device.as_deref().unwrap_or(DEFAULT_AUDIO_DEVICE))
            .with_sample_rate(self.sample_rate)
            .with_max_voices(self.max_voices)
    }

    pub fn storage_dir(&self) -> PathBuf {
        resolve_path(
            &self.base_path,
            Path::new(self.storage_dir.as_deref().unwrap_or(DEFAULT_STORAGE_DIR)),
        )
    }

    pub fn haptics(&self) -> &str {
        self.haptics.as_deref().unwrap_or(DEFAULT_HAPTICS)
    }

    /// The configured sample files, keyed by sound type.
    pub fn samples(&self) -> Result<HashMap<SoundType, PathBuf>, ConfigError> {
        self.samples
            .iter()
            .map(|(sound, file)| {
                Ok((
                    SoundType::from_str(sound)?,
                    resolve_path(&self.base_path, Path::new(file)),
                ))
            })
            .collect()
    }

    pub fn audio_calibration(&self) -> Result<Duration, ConfigError> {
        match &self.audio_calibration {
            Some(calibration) => Ok(DurationString::from_string(calibration.clone())?.into()),
            None => Ok(Duration::ZERO),
        }
    }

    /// The settings to use when none have been saved.
    pub fn default_settings(&self) -> Result<AppSettings, ConfigError> {
        Ok(AppSettings {
            audio_calibration: self.audio_calibration()?.as_millis() as i64,
            ..Default::default()
        })
    }

    pub fn defaults(&self) -> &Defaults {
        &self.defaults
    }
}

#[cfg(test)]
mod test {
    use std::{fs, path::Path};

    use config::{Config, File, FileFormat};

    use super::*;
    use crate::storage::Theme;

    fn parse(yaml: &str) -> App {
        Config::builder()
            .add_source(File::from_str(yaml, FileFormat::Yaml))
            .build()
            .unwrap()
            .try_deserialize::<App>()
            .unwrap()
            .with_base_path(Path::new("/etc/tactus"))
    }

    #[test]
    fn test_full_config() {
        let app = parse(
            r#"
            audio_device: mock-device
            sample_rate: 44100
            max_voices: 8
            storage_dir: /var/lib/tactus
            haptics: terminal
            samples:
              click: samples/click.wav
              drum: /opt/drum.flac
            audio_calibration: 15ms
            defaults:
              bpm: 96
              time_signature: 6/8
              subdivision: triplet
              sound: wooden
              volume: 0.5
              pitch: 30
            "#,
        );

        let audio = app.audio();
        assert_eq!("mock-device", audio.device());
        assert_eq!(Some(44100), audio.sample_rate());
        assert_eq!(8, audio.max_voices());
        assert_eq!(PathBuf::from("/var/lib/tactus"), app.storage_dir());
        assert_eq!("terminal", app.haptics());

        let samples = app.samples().unwrap();
        assert_eq!(
            Some(&PathBuf::from("/etc/tactus/samples/click.wav")),
            samples.get(&SoundType::Click)
        );
        assert_eq!(
            Some(&PathBuf::from("/opt/drum.flac")),
            samples.get(&SoundType::Drum)
        );

        assert_eq!(Duration::from_millis(15), app.audio_calibration().unwrap());
        let settings = app.default_settings().unwrap();
        assert_eq!(15, settings.audio_calibration);
        assert_eq!(Theme::Auto, settings.theme);
        assert!(settings.vibration_enabled);

        let config = app.defaults().to_tempo_config().unwrap();
        assert_eq!(96, config.bpm);
        assert_eq!(TimeSignature::new(6, 8), config.time_signature);
        assert_eq!(Subdivision::Triplet, config.subdivision);
        assert_eq!(SoundType::Wooden, config.sound_type);
        assert_eq!(0.5, config.volume);
        assert!(config.sound_modifications.enabled);
        assert_eq!(20, config.sound_modifications.pitch);
    }

    #[test]
    fn test_everything_has_a_default() {
        let app = parse("{}");
        assert_eq!("default", app.audio().device());
        assert_eq!(None, app.audio().sample_rate());
        assert_eq!(crate::config::DEFAULT_MAX_VOICES, app.audio().max_voices());
        assert_eq!(PathBuf::from("/etc/tactus/tactus-data"), app.storage_dir());
        assert_eq!("log", app.haptics());
        assert!(app.samples().unwrap().is_empty());
        assert_eq!(Duration::ZERO, app.audio_calibration().unwrap());
        assert_eq!(TempoConfig::default(), app.defaults().to_tempo_config().unwrap());
    }

    #[test]
    fn test_out_of_range_defaults_are_clamped() {
        let app = parse(
            r#"
            defaults:
              bpm: 1000
              time_signature: 40/5
              volume: 3.0
            "#,
        );
        let config = app.defaults().to_tempo_config().unwrap();
        assert_eq!(crate::tempo::MAX_BPM, config.bpm);
        assert_eq!(TimeSignature::new(16, 4), config.time_signature);
        assert_eq!(1.0, config.volume);
    }

    #[test]
    fn test_invalid_values() {
        let app = parse(
            r#"
            samples:
              cowbell: cowbell.wav
            "#,
        );
        assert!(matches!(app.samples(), Err(ConfigError::Value(_))));

        let app = parse("audio_calibration: soon");
        assert!(matches!(
            app.audio_calibration(),
            Err(ConfigError::Duration(_))
        ));

        let app = parse(
            r#"
            defaults:
              sound: cowbell
            "#,
        );
        assert!(app.defaults().to_tempo_config().is_err());
    }

    #[test]
    fn test_deserialize_from_file() {
        let tempdir = tempfile::tempdir().unwrap();
        let path = tempdir.path().join("tactus.yaml");
        fs::write(
            &path,
            "audio_device: mock-file\nsamples:\n  ping: ping.wav\n",
        )
        .unwrap();

        let app = App::deserialize(&path).unwrap();
        assert_eq!("mock-file", app.audio().device());
        assert_eq!(tempdir.path().join("tactus-data"), app.storage_dir());
        assert_eq!(
            Some(&tempdir.path().join("ping.wav")),
            app.samples().unwrap().get(&SoundType::Ping)
        );

        assert!(matches!(
            App::deserialize(&tempdir.path().join("missing.yaml")),
            Err(ConfigError::Load(_))
        ));
    }
}
