// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! The song data file record.
//!
//! This is the canonical on-disk shape: `metadata`, a non-empty `words`
//! list and the optional `chords`, `notes` and `segments` lists. The
//! alternative layer is only written when it has content.

use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDateTime};
use serde::{Deserialize, Serialize};

use super::entity::{Chord, Note, Segment, Validate, Word};
use crate::error::Diagnostic;

/// Current schema version written by this crate
pub const SCHEMA_VERSION: &str = "2.0.0";

/// Root record of a song data file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SongDataFile {
    pub metadata: Metadata,
    pub words: Vec<Word>,
    #[serde(default)]
    pub chords: Vec<Chord>,
    #[serde(default)]
    pub notes: Vec<Note>,
    #[serde(default)]
    pub segments: Vec<Segment>,
    #[serde(default, skip_serializing_if = "AlternativeLayer::is_empty")]
    pub alternative: AlternativeLayer,
}

impl SongDataFile {
    /// Parse from JSON without schema validation
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).context("Failed to parse song data JSON")
    }

    /// Serialize to pretty JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    /// Save to a file as pretty JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json = self.to_json().context("Failed to serialize song data")?;
        fs::write(path.as_ref(), json)
            .with_context(|| format!("Failed to write song data file: {:?}", path.as_ref()))
    }
}

/// Song-level metadata, fixed at creation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    pub version: String,
    /// RFC 3339 or ISO-8601 local timestamp, kept verbatim
    pub created_at: String,
    pub source_audio: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_tool: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub confidence_threshold: Option<f64>,
}

impl Metadata {
    /// Fresh metadata stamped with the current time
    pub fn new(source_audio: impl Into<String>, processing_tool: impl Into<String>) -> Self {
        Self {
            version: SCHEMA_VERSION.to_string(),
            created_at: chrono::Utc::now().to_rfc3339(),
            source_audio: source_audio.into(),
            processing_tool: Some(processing_tool.into()),
            confidence_threshold: None,
        }
    }
}

impl Validate for Metadata {
    fn check(&self, path: &str, out: &mut Vec<Diagnostic>) {
        if self.version.trim().is_empty() {
            out.push(Diagnostic::new(format!("{path}.version"), "must not be empty"));
        }
        if !is_valid_timestamp(&self.created_at) {
            out.push(Diagnostic::new(
                format!("{path}.created_at"),
                format!("not a valid timestamp: {:?}", self.created_at),
            ));
        }
        if self.source_audio.trim().is_empty() {
            out.push(Diagnostic::new(format!("{path}.source_audio"), "must not be empty"));
        }
        if let Some(threshold) = self.confidence_threshold {
            if !(0.0..=1.0).contains(&threshold) {
                out.push(Diagnostic::new(
                    format!("{path}.confidence_threshold"),
                    format!("must be within [0, 1], got {threshold}"),
                ));
            }
        }
    }
}

/// Accepts RFC 3339 and the zone-less ISO-8601 form
pub fn is_valid_timestamp(value: &str) -> bool {
    DateTime::parse_from_rfc3339(value).is_ok()
        || NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").is_ok()
}

/// Secondary annotations from the rewrite service, parallel to the primary layer
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct AlternativeLayer {
    #[serde(default)]
    pub words: Vec<Word>,
    #[serde(default)]
    pub chords: Vec<Chord>,
}

impl AlternativeLayer {
    pub fn is_empty(&self) -> bool {
        self.words.is_empty() && self.chords.is_empty()
    }
}

impl Validate for AlternativeLayer {
    fn check(&self, path: &str, out: &mut Vec<Diagnostic>) {
        for (i, word) in self.words.iter().enumerate() {
            word.check(&format!("{path}.words[{i}]"), out);
        }
        check_word_order(&self.words, &format!("{path}.words"), out);
        for (i, chord) in self.chords.iter().enumerate() {
            chord.check(&format!("{path}.chords[{i}]"), out);
        }
    }
}

/// Flags every word whose start precedes its predecessor's
pub fn check_word_order(words: &[Word], path: &str, out: &mut Vec<Diagnostic>) {
    for (i, pair) in words.windows(2).enumerate() {
        if pair[1].start < pair[0].start {
            out.push(Diagnostic::new(
                format!("{path}[{}].start", i + 1),
                format!(
                    "starts at {} before the previous word ({})",
                    pair[1].start, pair[0].start
                ),
            ));
        }
    }
}
