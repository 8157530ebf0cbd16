// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Error types shared across the crate.
//!
//! Every error here is recoverable at the component boundary. The only
//! fatal condition is [`EditError::StoreCorrupted`], which asks the
//! caller to reload the song.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

use crate::model::EntityKind;

/// A single schema problem: which field, and what is wrong with it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    /// Field path, e.g. `words[3].end`
    pub field: String,
    /// Human-readable reason
    pub reason: String,
}

impl Diagnostic {
    pub fn new(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.reason)
    }
}

/// Song data failed schema validation
#[derive(Debug, Clone, PartialEq, Error)]
#[error("song data failed validation with {} problem(s)", .diagnostics.len())]
pub struct ValidationError {
    /// Candidate file, when the data came from disk
    pub path: Option<PathBuf>,
    /// Every problem found, in document order
    pub diagnostics: Vec<Diagnostic>,
}

impl ValidationError {
    pub fn new(diagnostics: Vec<Diagnostic>) -> Self {
        Self {
            path: None,
            diagnostics,
        }
    }

    pub fn single(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::new(vec![Diagnostic::new(field, reason)])
    }

    pub fn with_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }
}

/// An edit was rejected; the store keeps its prior state
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EditError {
    #[error("{kind} index {index} out of range (len {len})")]
    IndexOutOfRange {
        kind: EntityKind,
        index: usize,
        len: usize,
    },
    #[error("block {index} out of range ({count} blocks)")]
    BlockOutOfRange { index: usize, count: usize },
    #[error("invariant violated at {}: {}", .0.field, .0.reason)]
    Invariant(Diagnostic),
    #[error("words must stay ordered by start: {0}")]
    OutOfOrder(String),
    #[error("words sequence may not become empty")]
    EmptyWords,
    /// Fatal: the store no longer satisfies its invariants
    #[error("song store is inconsistent, reload required: {0}")]
    StoreCorrupted(String),
}

impl EditError {
    pub fn invariant(field: impl Into<String>, reason: impl Into<String>) -> Self {
        EditError::Invariant(Diagnostic::new(field, reason))
    }

    /// Whether the caller must discard the store and reload the song
    pub fn is_fatal(&self) -> bool {
        matches!(self, EditError::StoreCorrupted(_))
    }
}

/// An encoder could not complete
#[derive(Debug, Error)]
pub enum ExportError {
    #[error("nothing to export: {0}")]
    Empty(&'static str),
    #[error("failed to write {path:?}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("serialization failed: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("no song is open")]
    NoSong,
}

/// Audio slice unavailable or undecodable
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PlaybackError {
    #[error("cannot open audio file {path:?}: {reason}")]
    Open { path: PathBuf, reason: String },
    #[error("unsupported audio format: {0}")]
    Unsupported(String),
    #[error("requested window {start:.2}s lies outside the audio ({duration:.2}s)")]
    OutOfRange { start: f64, duration: f64 },
    #[error("no audio output device available")]
    NoDevice,
    #[error("audio output failed: {0}")]
    Device(String),
    #[error("no block {0} to preview")]
    NoBlock(usize),
}

/// A background producer (processing pipeline or rewrite service) failed
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    #[error("job was cancelled")]
    Cancelled,
    #[error("rewrite service disabled: {0} is not set")]
    NoApiKey(String),
    #[error("no processing pipeline configured")]
    NoPipeline,
    #[error("no rewrite service configured")]
    NoRewriteService,
    #[error("producer failed: {0}")]
    Failed(String),
    #[error(transparent)]
    Invalid(#[from] ValidationError),
}
