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

//! Tempo configuration value types.
//!
//! Everything in here is plain data. Range checks happen when values enter
//! through the setters (clamping, never rejecting); the engine trusts whatever
//! it is handed.

use std::{fmt, str::FromStr, time::Duration};

use serde::{Deserialize, Serialize};

/// The slowest supported tempo.
pub const MIN_BPM: u16 = 40;

/// The fastest supported tempo.
pub const MAX_BPM: u16 = 240;

/// The default tempo.
pub const DEFAULT_BPM: u16 = 120;

/// Beats per bar bounds.
pub const MIN_NUMERATOR: u8 = 1;
pub const MAX_NUMERATOR: u8 = 16;

/// The note values a beat may have.
pub const DENOMINATORS: [u8; 4] = [2, 4, 8, 16];

/// Bounds for the pitch and EQ modification values.
pub const MIN_MODIFICATION: i8 = -20;
pub const MAX_MODIFICATION: i8 = 20;

/// Errors produced when parsing tempo values from text.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum ParseError {
    #[error("invalid time signature '{0}', expected <beats>/<note value>")]
    TimeSignature(String),

    #[error("unknown sound type '{0}'")]
    SoundType(String),

    #[error("unknown subdivision '{0}'")]
    Subdivision(String),
}

/// Clamps an arbitrary tempo into the supported range.
pub fn clamp_bpm(bpm: i64) -> u16 {
    bpm.clamp(i64::from(MIN_BPM), i64::from(MAX_BPM)) as u16
}

/// The quarter-note pulse interval for the given tempo: 60000 / bpm milliseconds.
pub fn interval_for_bpm(bpm: u16) -> Duration {
    Duration::from_nanos(60_000_000_000 / u64::from(bpm.max(1)))
}

/// A time signature. The numerator is the number of beats per bar and the
/// denominator the note value of one beat.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeSignature {
    pub numerator: u8,
    pub denominator: u8,
}

impl TimeSignature {
    /// Creates a time signature, clamping the numerator and snapping the
    /// denominator to the closest allowed note value.
    pub fn new(numerator: i64, denominator: i64) -> TimeSignature {
        let numerator =
            numerator.clamp(i64::from(MIN_NUMERATOR), i64::from(MAX_NUMERATOR)) as u8;
        let denominator = DENOMINATORS
            .iter()
            .copied()
            .min_by_key(|allowed| (i64::from(*allowed) - denominator).abs())
            .unwrap_or(4);

        TimeSignature {
            numerator,
            denominator,
        }
    }

    /// Returns this signature with both parts forced into range.
    pub fn clamped(self) -> TimeSignature {
        TimeSignature::new(self.numerator.into(), self.denominator.into())
    }
}

impl Default for TimeSignature {
    fn default() -> Self {
        TimeSignature {
            numerator: 4,
            denominator: 4,
        }
    }
}

impl fmt::Display for TimeSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.numerator, self.denominator)
    }
}

impl FromStr for TimeSignature {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (numerator, denominator) = s
            .trim()
            .split_once('/')
            .ok_or_else(|| ParseError::TimeSignature(s.to_string()))?;
        let numerator: i64 = numerator
            .trim()
            .parse()
            .map_err(|_| ParseError::TimeSignature(s.to_string()))?;
        let denominator: i64 = denominator
            .trim()
            .parse()
            .map_err(|_| ParseError::TimeSignature(s.to_string()))?;
        Ok(TimeSignature::new(numerator, denominator))
    }
}

/// Note subdivision of each beat.
///
/// Stored and persisted with the rest of the tempo, but the clock always runs
/// at the quarter-note pulse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Subdivision {
    #[default]
    None,
    Eighth,
    Triplet,
    Sixteenth,
}

impl Subdivision {
    pub fn as_str(&self) -> &'static str {
        match self {
            Subdivision::None => "none",
            Subdivision::Eighth => "eighth",
            Subdivision::Triplet => "triplet",
            Subdivision::Sixteenth => "sixteenth",
        }
    }
}

impl FromStr for Subdivision {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "none" => Ok(Subdivision::None),
            "eighth" => Ok(Subdivision::Eighth),
            "triplet" => Ok(Subdivision::Triplet),
            "sixteenth" => Ok(Subdivision::Sixteenth),
            _ => Err(ParseError::Subdivision(s.to_string())),
        }
    }
}

/// The timbre of the click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SoundType {
    #[default]
    Click,
    Ping,
    Stick,
    Wooden,
    Drum,
}

impl SoundType {
    /// Every sound type, in library order.
    pub const ALL: [SoundType; 5] = [
        SoundType::Click,
        SoundType::Ping,
        SoundType::Stick,
        SoundType::Wooden,
        SoundType::Drum,
    ];

    /// The identifier used in config files and storage.
    pub fn as_str(&self) -> &'static str {
        match self {
            SoundType::Click => "click",
            SoundType::Ping => "ping",
            SoundType::Stick => "stick",
            SoundType::Wooden => "wooden",
            SoundType::Drum => "drum",
        }
    }

    /// A human readable name.
    pub fn display_name(&self) -> &'static str {
        match self {
            SoundType::Click => "Classic Click",
            SoundType::Ping => "Ping",
            SoundType::Stick => "Drum Stick",
            SoundType::Wooden => "Wood Block",
            SoundType::Drum => "Kick Drum",
        }
    }
}

impl fmt::Display for SoundType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for SoundType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_lowercase();
        SoundType::ALL
            .into_iter()
            .find(|sound_type| sound_type.as_str() == wanted)
            .ok_or_else(|| ParseError::SoundType(s.to_string()))
    }
}

/// Pitch and EQ adjustments applied to the click.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SoundModifications {
    pub enabled: bool,
    pub pitch: i8,
    pub low: i8,
    pub mid: i8,
    pub high: i8,
}

impl SoundModifications {
    /// Returns the modifications with every value forced into range.
    pub fn clamped(self) -> SoundModifications {
        let clamp = |v: i8| v.clamp(MIN_MODIFICATION, MAX_MODIFICATION);
        SoundModifications {
            enabled: self.enabled,
            pitch: clamp(self.pitch),
            low: clamp(self.low),
            mid: clamp(self.mid),
            high: clamp(self.high),
        }
    }

    /// The playback rate multiplier. Pitch only counts when the modifications
    /// are enabled.
    pub fn playback_rate(&self) -> f32 {
        if self.enabled {
            1.0 + f32::from(self.pitch) / 100.0
        } else {
            1.0
        }
    }
}

/// Everything the engine needs to know to produce a pulse.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct TempoConfig {
    pub bpm: u16,
    pub time_signature: TimeSignature,
    pub subdivision: Subdivision,
    pub sound_type: SoundType,
    pub sound_modifications: SoundModifications,
    pub volume: f32,
}

impl Default for TempoConfig {
    fn default() -> Self {
        TempoConfig {
            bpm: DEFAULT_BPM,
            time_signature: TimeSignature::default(),
            subdivision: Subdivision::None,
            sound_type: SoundType::Click,
            sound_modifications: SoundModifications::default(),
            volume: 1.0,
        }
    }
}

impl TempoConfig {
    /// Forces every field into its valid range. Used on anything that comes
    /// from outside (storage, config files, user input).
    pub fn clamped(self) -> TempoConfig {
        TempoConfig {
            bpm: clamp_bpm(self.bpm.into()),
            time_signature: self.time_signature.clamped(),
            sound_modifications: self.sound_modifications.clamped(),
            volume: clamp_volume(self.volume),
            ..self
        }
    }

    pub fn set_bpm(&mut self, bpm: i64) {
        self.bpm = clamp_bpm(bpm);
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = clamp_volume(volume);
    }

    pub fn set_pitch(&mut self, pitch: i64) {
        self.sound_modifications.pitch =
            pitch.clamp(MIN_MODIFICATION.into(), MAX_MODIFICATION.into()) as i8;
    }

    /// The interval between two clock ticks.
    pub fn interval(&self) -> Duration {
        interval_for_bpm(self.bpm)
    }
}

fn clamp_volume(volume: f32) -> f32 {
    if volume.is_nan() {
        return 1.0;
    }
    volume.clamp(0.0, 1.0)
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_interval_for_every_bpm() {
        for bpm in MIN_BPM..=MAX_BPM {
            let expected_ms = 60000.0 / f64::from(bpm);
            let actual_ms = interval_for_bpm(bpm).as_secs_f64() * 1000.0;
            assert!(
                (expected_ms - actual_ms).abs() < 1e-6,
                "bpm {}: expected {}ms, got {}ms",
                bpm,
                expected_ms,
                actual_ms
            );
        }
        assert_eq!(Duration::from_millis(500), interval_for_bpm(120));
        assert_eq!(Duration::from_millis(1000), interval_for_bpm(60));
        assert_eq!(Duration::from_millis(250), interval_for_bpm(240));
    }

    #[test]
    fn test_bpm_clamping() {
        let mut config = TempoConfig::default();
        config.set_bpm(10);
        assert_eq!(MIN_BPM, config.bpm);
        config.set_bpm(1000);
        assert_eq!(MAX_BPM, config.bpm);
        config.set_bpm(-5);
        assert_eq!(MIN_BPM, config.bpm);
        config.set_bpm(93);
        assert_eq!(93, config.bpm);
    }

    #[test]
    fn test_time_signature_bounds() {
        assert_eq!(TimeSignature::new(0, 4), TimeSignature::new(1, 4));
        assert_eq!(16, TimeSignature::new(40, 4).numerator);
        assert_eq!(2, TimeSignature::new(3, 0).denominator);
        assert_eq!(2, TimeSignature::new(3, 3).denominator);
        assert_eq!(4, TimeSignature::new(3, 5).denominator);
        assert_eq!(8, TimeSignature::new(3, 9).denominator);
        assert_eq!(16, TimeSignature::new(3, 64).denominator);
        for denominator in DENOMINATORS {
            assert_eq!(
                denominator,
                TimeSignature::new(7, denominator.into()).denominator
            );
        }
    }

    #[test]
    fn test_time_signature_parse() {
        assert_eq!(Ok(TimeSignature::new(7, 8)), "7/8".parse());
        assert_eq!(Ok(TimeSignature::new(3, 4)), " 3 / 4 ".parse());
        assert_eq!(Ok(TimeSignature::new(16, 16)), "99/99".parse());
        assert!("7".parse::<TimeSignature>().is_err());
        assert!("a/4".parse::<TimeSignature>().is_err());
        assert_eq!("6/8", TimeSignature::new(6, 8).to_string());
    }

    #[test]
    fn test_playback_rate() {
        let mut modifications = SoundModifications {
            enabled: true,
            pitch: 20,
            ..Default::default()
        };
        assert!((modifications.playback_rate() - 1.2).abs() < f32::EPSILON);

        modifications.pitch = -20;
        assert!((modifications.playback_rate() - 0.8).abs() < f32::EPSILON);

        // Disabled modifications never change the rate, whatever is stored.
        modifications.enabled = false;
        assert_eq!(1.0, modifications.playback_rate());
    }

    #[test]
    fn test_modifications_clamped() {
        let modifications = SoundModifications {
            enabled: true,
            pitch: 100,
            low: -100,
            mid: 3,
            high: 21,
        }
        .clamped();
        assert_eq!(20, modifications.pitch);
        assert_eq!(-20, modifications.low);
        assert_eq!(3, modifications.mid);
        assert_eq!(20, modifications.high);
    }

    #[test]
    fn test_config_clamped() {
        let config = TempoConfig {
            bpm: 500,
            time_signature: TimeSignature {
                numerator: 0,
                denominator: 5,
            },
            volume: 3.0,
            ..Default::default()
        }
        .clamped();
        assert_eq!(MAX_BPM, config.bpm);
        assert_eq!(TimeSignature::new(1, 4), config.time_signature);
        assert_eq!(1.0, config.volume);

        let mut config = TempoConfig::default();
        config.set_volume(f32::NAN);
        assert_eq!(1.0, config.volume);
        config.set_volume(-1.0);
        assert_eq!(0.0, config.volume);
    }

    #[test]
    fn test_config_json_shape() {
        // Field names follow the stored layout of earlier releases.
        let json = r#"{
            "bpm": 96,
            "timeSignature": {"numerator": 6, "denominator": 8},
            "subdivision": "triplet",
            "soundType": "wooden",
            "soundModifications": {"enabled": true, "pitch": 5, "low": 0, "mid": -3, "high": 2},
            "volume": 0.5
        }"#;
        let config: TempoConfig = serde_json::from_str(json).unwrap();
        assert_eq!(96, config.bpm);
        assert_eq!(TimeSignature::new(6, 8), config.time_signature);
        assert_eq!(Subdivision::Triplet, config.subdivision);
        assert_eq!(SoundType::Wooden, config.sound_type);
        assert_eq!(-3, config.sound_modifications.mid);
        assert_eq!(0.5, config.volume);

        // Missing fields fall back to defaults.
        let config: TempoConfig = serde_json::from_str(r#"{"bpm": 70}"#).unwrap();
        assert_eq!(70, config.bpm);
        assert_eq!(TimeSignature::default(), config.time_signature);
        assert_eq!(1.0, config.volume);
    }

    #[test]
    fn test_sound_type_parse() {
        assert_eq!(Ok(SoundType::Drum), "Drum".parse());
        assert_eq!(
            Err(ParseError::SoundType("cowbell".to_string())),
            "cowbell".parse::<SoundType>()
        );
        assert_eq!(Ok(Subdivision::Sixteenth), "sixteenth".parse());
    }
}
