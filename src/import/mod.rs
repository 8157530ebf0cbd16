// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Song data import and validation.
//!
//! Given an audio file, looks for a sibling song data file and loads it.
//! The three results are kept apart: no file means the caller should run
//! the processing pipeline; a malformed file yields diagnostics; a valid
//! file yields a store.

pub mod watcher;

pub use watcher::{SongDataEvent, SongDataWatcher};

use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::error::{Diagnostic, ValidationError};
use crate::model::file::check_word_order;
use crate::model::{AlternativeLayer, Metadata, SongDataFile, SongStore, Validate};

/// Extensions probed after the audio file's base name, in preference order
pub const DEFAULT_EXTENSIONS: [&str; 3] = ["song_data", "song_data.json", "json"];

/// Result of looking for and loading a song data file
#[derive(Debug, Clone)]
pub enum ImportOutcome {
    /// A valid file was found and loaded
    Loaded { store: SongStore, path: PathBuf },
    /// No candidate file exists; run the processing pipeline
    Fallback,
    /// A candidate exists but failed validation; run the pipeline and warn
    Invalid(ValidationError),
}

impl ImportOutcome {
    pub fn is_loaded(&self) -> bool {
        matches!(self, ImportOutcome::Loaded { .. })
    }

    pub fn into_store(self) -> Option<SongStore> {
        match self {
            ImportOutcome::Loaded { store, .. } => Some(store),
            _ => None,
        }
    }
}

/// Locates and validates song data files
#[derive(Debug, Clone)]
pub struct SongDataImporter {
    extensions: Vec<String>,
}

impl SongDataImporter {
    pub fn new() -> Self {
        Self::with_extensions(DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect())
    }

    /// Use a custom probe order (extensions without the leading dot)
    pub fn with_extensions(extensions: Vec<String>) -> Self {
        Self { extensions }
    }

    pub fn extensions(&self) -> &[String] {
        &self.extensions
    }

    /// Every candidate path for an audio file, in probe order
    pub fn candidates(&self, audio_path: &Path) -> Vec<PathBuf> {
        let base = audio_path.with_extension("");
        self.extensions
            .iter()
            .map(|ext| {
                let mut name = OsString::from(base.as_os_str());
                name.push(".");
                name.push(ext);
                PathBuf::from(name)
            })
            .collect()
    }

    /// First existing candidate, if any
    pub fn find_song_data_file(&self, audio_path: &Path) -> Option<PathBuf> {
        self.candidates(audio_path).into_iter().find(|p| p.is_file())
    }

    /// Whether `path` is one of the candidates for `audio_path`
    pub fn is_candidate(&self, audio_path: &Path, path: &Path) -> bool {
        self.candidates(audio_path).iter().any(|c| c == path)
    }

    /// Load and validate a specific file
    pub fn import_file(&self, path: &Path) -> Result<SongStore, ValidationError> {
        let contents = fs::read_to_string(path).map_err(|e| {
            ValidationError::single("$", format!("cannot read file: {e}")).with_path(path)
        })?;
        let file = parse_song_data(&contents).map_err(|e| e.with_path(path))?;
        SongStore::load(file).map_err(|e| e.with_path(path))
    }

    /// Probe for a sibling file and import it
    pub fn import_for_audio(&self, audio_path: &Path) -> ImportOutcome {
        let Some(path) = self.find_song_data_file(audio_path) else {
            info!("No song data found for {:?}, falling back to processing", audio_path);
            return ImportOutcome::Fallback;
        };

        match self.import_file(&path) {
            Ok(store) => {
                info!(
                    "Imported {:?}: {} words, {} chords, {} notes, {} segments",
                    path,
                    store.words().len(),
                    store.chords().len(),
                    store.notes().len(),
                    store.segments().len()
                );
                ImportOutcome::Loaded { store, path }
            }
            Err(err) => {
                warn!("Rejected song data {:?}: {}", path, err);
                for diagnostic in &err.diagnostics {
                    warn!("  {}", diagnostic);
                }
                ImportOutcome::Invalid(err)
            }
        }
    }
}

impl Default for SongDataImporter {
    fn default() -> Self {
        Self::new()
    }
}

/// Parse and schema-check a song data document
///
/// Each list element is decoded on its own so every bad element is
/// reported, not just the first.
pub fn parse_song_data(json: &str) -> Result<SongDataFile, ValidationError> {
    let value: Value = serde_json::from_str(json)
        .map_err(|e| ValidationError::single("$", format!("malformed JSON: {e}")))?;
    let Some(root) = value.as_object() else {
        return Err(ValidationError::single("$", "expected a JSON object"));
    };

    let mut out = Vec::new();

    let metadata = decode_value::<Metadata>(root.get("metadata"), "metadata", &mut out);
    let words = decode_list(root.get("words"), "words", true, &mut out);
    if root
        .get("words")
        .and_then(Value::as_array)
        .is_some_and(|items| items.is_empty())
    {
        out.push(Diagnostic::new("words", "must contain at least one word"));
    }
    check_word_order(&words, "words", &mut out);
    let chords = decode_list(root.get("chords"), "chords", false, &mut out);
    let notes = decode_list(root.get("notes"), "notes", false, &mut out);
    let segments = decode_list(root.get("segments"), "segments", false, &mut out);
    let alternative = match root.get("alternative") {
        None | Some(Value::Null) => Some(AlternativeLayer::default()),
        value => decode_value::<AlternativeLayer>(value, "alternative", &mut out),
    };

    match (metadata, alternative) {
        (Some(metadata), Some(alternative)) if out.is_empty() => Ok(SongDataFile {
            metadata,
            words,
            chords,
            notes,
            segments,
            alternative,
        }),
        _ => Err(ValidationError::new(out)),
    }
}

/// Decode a required object field and run its checks
fn decode_value<T: DeserializeOwned + Validate>(
    value: Option<&Value>,
    name: &str,
    out: &mut Vec<Diagnostic>,
) -> Option<T> {
    match value {
        None | Some(Value::Null) => {
            out.push(Diagnostic::new(name, "missing required field"));
            None
        }
        Some(value) => match T::deserialize(value) {
            Ok(decoded) => {
                decoded.check(name, out);
                Some(decoded)
            }
            Err(e) => {
                out.push(Diagnostic::new(name, e.to_string()));
                None
            }
        },
    }
}

/// Decode a list field element by element
fn decode_list<T: DeserializeOwned + Validate>(
    value: Option<&Value>,
    name: &str,
    required: bool,
    out: &mut Vec<Diagnostic>,
) -> Vec<T> {
    let items = match value {
        None | Some(Value::Null) => {
            if required {
                out.push(Diagnostic::new(name, "missing required field"));
            }
            return Vec::new();
        }
        Some(Value::Array(items)) => items,
        Some(_) => {
            out.push(Diagnostic::new(name, "expected a list"));
            return Vec::new();
        }
    };

    let mut decoded = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let path = format!("{name}[{i}]");
        match T::deserialize(item) {
            Ok(value) => {
                value.check(&path, out);
                decoded.push(value);
            }
            Err(e) => out.push(Diagnostic::new(path, e.to_string())),
        }
    }
    decoded
}
