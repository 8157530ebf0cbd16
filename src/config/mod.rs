// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Application settings.
//!
//! Settings are loaded from an optional YAML file. Every field has a
//! default, so an empty document (or no file at all) is valid.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::blocks::DEFAULT_BLOCK_WIDTH;
use crate::export::midi::{DEFAULT_CHORD_VELOCITY, DEFAULT_PPQN, DEFAULT_TEMPO};
use crate::export::MidiEncoder;
use crate::import::{SongDataImporter, DEFAULT_EXTENSIONS};
use crate::music::CHORD_ROOT_BASE;
use crate::sync::APPROXIMATE_CONFIDENCE;

/// Default environment variable holding the rewrite service key
pub const DEFAULT_REWRITE_API_KEY_ENV: &str = "SONGSYNC_REWRITE_API_KEY";

/// Root settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Settings {
    /// Block width in seconds
    #[serde(default = "default_block_width")]
    pub block_width: f64,
    /// Length of a block preview in seconds
    #[serde(default = "default_preview_seconds")]
    pub preview_seconds: f64,
    /// Confidence given to re-tokenized words
    #[serde(default = "default_approximate_confidence")]
    pub approximate_confidence: f64,
    /// Song data extensions, in probe order
    #[serde(default = "default_song_data_extensions")]
    pub song_data_extensions: Vec<String>,
    /// MIDI export settings
    #[serde(default)]
    pub midi: MidiSettings,
    /// Name of the environment variable holding the rewrite service key
    #[serde(default = "default_rewrite_api_key_env")]
    pub rewrite_api_key_env: String,
}

impl Settings {
    /// Load settings from a YAML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read settings file: {:?}", path.as_ref()))?;
        Self::from_yaml(&contents)
    }

    /// Parse settings from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        if yaml.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(yaml).context("Failed to parse YAML settings")
    }

    /// Serialize to YAML string
    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).context("Failed to serialize settings to YAML")
    }

    /// Save settings to a YAML file
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let yaml = self.to_yaml()?;
        fs::write(path.as_ref(), yaml)
            .with_context(|| format!("Failed to write settings file: {:?}", path.as_ref()))
    }

    /// Check values, returning a list of problems (empty if valid)
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        if !(self.block_width.is_finite() && self.block_width > 0.0) {
            errors.push(format!("block_width must be positive, got {}", self.block_width));
        }
        if !(self.preview_seconds.is_finite() && self.preview_seconds > 0.0) {
            errors.push(format!(
                "preview_seconds must be positive, got {}",
                self.preview_seconds
            ));
        }
        if !(0.0..=1.0).contains(&self.approximate_confidence) {
            errors.push(format!(
                "approximate_confidence must be in [0, 1], got {}",
                self.approximate_confidence
            ));
        }
        if self.song_data_extensions.is_empty() {
            errors.push("song_data_extensions must not be empty".to_string());
        }
        if self.rewrite_api_key_env.trim().is_empty() {
            errors.push("rewrite_api_key_env must not be empty".to_string());
        }
        errors.extend(self.midi.validate());

        errors
    }

    /// Rewrite service key from the environment, if set and non-empty
    pub fn rewrite_api_key(&self) -> Option<String> {
        std::env::var(&self.rewrite_api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }

    /// Importer probing the configured extensions
    pub fn importer(&self) -> SongDataImporter {
        SongDataImporter::with_extensions(self.song_data_extensions.clone())
    }
}

fn default_block_width() -> f64 {
    DEFAULT_BLOCK_WIDTH
}

fn default_preview_seconds() -> f64 {
    5.0
}

fn default_approximate_confidence() -> f64 {
    APPROXIMATE_CONFIDENCE
}

fn default_song_data_extensions() -> Vec<String> {
    DEFAULT_EXTENSIONS.iter().map(|s| s.to_string()).collect()
}

fn default_rewrite_api_key_env() -> String {
    DEFAULT_REWRITE_API_KEY_ENV.to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            block_width: default_block_width(),
            preview_seconds: default_preview_seconds(),
            approximate_confidence: default_approximate_confidence(),
            song_data_extensions: default_song_data_extensions(),
            midi: MidiSettings::default(),
            rewrite_api_key_env: default_rewrite_api_key_env(),
        }
    }
}

/// MIDI export settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MidiSettings {
    /// Ticks per quarter note
    #[serde(default = "default_ppqn")]
    pub ppqn: u16,
    /// Tempo in BPM
    #[serde(default = "default_tempo")]
    pub tempo: f64,
    /// Velocity of chord notes
    #[serde(default = "default_chord_velocity")]
    pub chord_velocity: u8,
    /// MIDI number of C for chord roots
    #[serde(default = "default_chord_octave_base")]
    pub chord_octave_base: u8,
}

impl MidiSettings {
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();
        if self.ppqn == 0 {
            errors.push("midi.ppqn must be positive".to_string());
        }
        if !(20.0..=300.0).contains(&self.tempo) {
            errors.push(format!("midi.tempo must be in [20, 300], got {}", self.tempo));
        }
        if !(1..=127).contains(&self.chord_velocity) {
            errors.push(format!(
                "midi.chord_velocity must be in [1, 127], got {}",
                self.chord_velocity
            ));
        }
        if self.chord_octave_base > 116 {
            errors.push(format!(
                "midi.chord_octave_base leaves no room for B, got {}",
                self.chord_octave_base
            ));
        }
        errors
    }

    /// Encoder configured from these settings
    pub fn encoder(&self) -> MidiEncoder {
        let mut encoder = MidiEncoder::new();
        encoder.set_ppqn(self.ppqn);
        encoder.set_tempo(self.tempo);
        encoder.set_chord_velocity(self.chord_velocity);
        encoder.set_chord_octave_base(self.chord_octave_base);
        encoder
    }
}

fn default_ppqn() -> u16 {
    DEFAULT_PPQN
}

fn default_tempo() -> f64 {
    DEFAULT_TEMPO
}

fn default_chord_velocity() -> u8 {
    DEFAULT_CHORD_VELOCITY
}

fn default_chord_octave_base() -> u8 {
    CHORD_ROOT_BASE
}

impl Default for MidiSettings {
    fn default() -> Self {
        Self {
            ppqn: default_ppqn(),
            tempo: default_tempo(),
            chord_velocity: default_chord_velocity(),
            chord_octave_base: default_chord_octave_base(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_defaults() {
        let settings = Settings::default();
        assert_eq!(settings.block_width, 20.0);
        assert_eq!(settings.preview_seconds, 5.0);
        assert_eq!(settings.approximate_confidence, 0.5);
        assert_eq!(settings.song_data_extensions, vec!["song_data", "song_data.json", "json"]);
        assert_eq!(settings.midi.ppqn, 480);
        assert_eq!(settings.midi.tempo, 120.0);
        assert_eq!(settings.midi.chord_velocity, 80);
        assert_eq!(settings.midi.chord_octave_base, 60);
        assert_eq!(settings.rewrite_api_key_env, "SONGSYNC_REWRITE_API_KEY");
        assert!(settings.validate().is_empty());
    }

    #[test]
    fn test_parse_partial_yaml() {
        let yaml = r#"
block_width: 10.0
midi:
  tempo: 90
"#;
        let settings = Settings::from_yaml(yaml).unwrap();
        assert_eq!(settings.block_width, 10.0);
        assert_eq!(settings.preview_seconds, 5.0);
        assert_eq!(settings.midi.tempo, 90.0);
        assert_eq!(settings.midi.ppqn, 480);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(Settings::from_yaml("").unwrap(), Settings::default());
    }

    #[test]
    fn test_invalid_yaml() {
        assert!(Settings::from_yaml("block_width: [").is_err());
    }

    #[test]
    fn test_validate_reports_every_problem() {
        let mut settings = Settings::default();
        settings.block_width = 0.0;
        settings.approximate_confidence = 1.5;
        settings.midi.chord_velocity = 0;
        let errors = settings.validate();
        assert_eq!(errors.len(), 3);
        assert!(errors[0].contains("block_width"));
    }

    #[test]
    fn test_save_and_load() {
        let mut settings = Settings::default();
        settings.preview_seconds = 8.0;
        let file = NamedTempFile::new().unwrap();
        settings.save(file.path()).unwrap();

        let loaded = Settings::load(file.path()).unwrap();
        assert_eq!(loaded, settings);
    }

    #[test]
    fn test_rewrite_api_key_from_env() {
        let mut settings = Settings::default();
        settings.rewrite_api_key_env = "SONGSYNC_TEST_KEY_FOR_SETTINGS".to_string();
        std::env::remove_var("SONGSYNC_TEST_KEY_FOR_SETTINGS");
        assert_eq!(settings.rewrite_api_key(), None);

        std::env::set_var("SONGSYNC_TEST_KEY_FOR_SETTINGS", "secret");
        assert_eq!(settings.rewrite_api_key(), Some("secret".to_string()));
        std::env::remove_var("SONGSYNC_TEST_KEY_FOR_SETTINGS");
    }

    #[test]
    fn test_midi_encoder_from_settings() {
        let midi = MidiSettings {
            ppqn: 96,
            tempo: 60.0,
            ..MidiSettings::default()
        };
        let encoder = midi.encoder();
        assert_eq!(encoder.ppqn(), 96);
        assert_eq!(encoder.seconds_to_ticks(1.0), 96);
    }
}
