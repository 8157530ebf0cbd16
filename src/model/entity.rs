// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Timeline entities and their per-value invariants.
//!
//! Field names match the song data file schema, so these types are
//! serialized directly.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::Diagnostic;
use crate::music::pitch_name;

/// Anything with a `[start, end]` span in seconds
pub trait Timed {
    fn start(&self) -> f64;
    fn end(&self) -> f64;

    /// Length of the intersection with `[from, to]`, zero when disjoint
    fn overlap(&self, from: f64, to: f64) -> f64 {
        (self.end().min(to) - self.start().max(from)).max(0.0)
    }
}

/// Per-value schema checks, appending problems under a field path
pub trait Validate {
    fn check(&self, path: &str, out: &mut Vec<Diagnostic>);

    fn diagnostics(&self, path: &str) -> Vec<Diagnostic> {
        let mut out = Vec::new();
        self.check(path, &mut out);
        out
    }
}

/// Which sequence an entity lives in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Word,
    Chord,
    Note,
    Segment,
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            EntityKind::Word => "word",
            EntityKind::Chord => "chord",
            EntityKind::Note => "note",
            EntityKind::Segment => "segment",
        };
        f.write_str(name)
    }
}

/// A value for one of the store's sequences
#[derive(Debug, Clone, PartialEq)]
pub enum Entity {
    Word(Word),
    Chord(Chord),
    Note(Note),
    Segment(Segment),
}

impl Entity {
    pub fn kind(&self) -> EntityKind {
        match self {
            Entity::Word(_) => EntityKind::Word,
            Entity::Chord(_) => EntityKind::Chord,
            Entity::Note(_) => EntityKind::Note,
            Entity::Segment(_) => EntityKind::Segment,
        }
    }
}

impl Validate for Entity {
    fn check(&self, path: &str, out: &mut Vec<Diagnostic>) {
        match self {
            Entity::Word(w) => w.check(path, out),
            Entity::Chord(c) => c.check(path, out),
            Entity::Note(n) => n.check(path, out),
            Entity::Segment(s) => s.check(path, out),
        }
    }
}

/// Chord annotation attached to a single word (no timing of its own)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineChord {
    pub symbol: String,
    pub root: String,
    pub quality: String,
    #[serde(default)]
    pub bass: Option<String>,
    pub confidence: f64,
}

impl Validate for InlineChord {
    fn check(&self, path: &str, out: &mut Vec<Diagnostic>) {
        check_label(&self.symbol, &format!("{path}.symbol"), out);
        check_label(&self.root, &format!("{path}.root"), out);
        check_label(&self.quality, &format!("{path}.quality"), out);
        check_confidence(self.confidence, path, out);
    }
}

/// One transcribed word
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Word {
    pub text: String,
    pub start: f64,
    pub end: f64,
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chord: Option<InlineChord>,
    /// Set on words regenerated from free text; their timing is synthetic
    #[serde(default, skip_serializing_if = "is_false")]
    pub timing_approximate: bool,
}

impl Word {
    pub fn new(text: impl Into<String>, start: f64, end: f64, confidence: f64) -> Self {
        Self {
            text: text.into(),
            start,
            end,
            confidence,
            chord: None,
            timing_approximate: false,
        }
    }

    pub fn with_chord(mut self, chord: InlineChord) -> Self {
        self.chord = Some(chord);
        self
    }
}

impl Timed for Word {
    fn start(&self) -> f64 {
        self.start
    }
    fn end(&self) -> f64 {
        self.end
    }
}

impl Validate for Word {
    fn check(&self, path: &str, out: &mut Vec<Diagnostic>) {
        if self.text.trim().is_empty() {
            out.push(Diagnostic::new(format!("{path}.text"), "must not be empty"));
        }
        check_span(self.start, self.end, path, out);
        check_confidence(self.confidence, path, out);
        if let Some(chord) = &self.chord {
            chord.check(&format!("{path}.chord"), out);
        }
    }
}

/// A detected chord over a span of time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chord {
    pub symbol: String,
    pub root: String,
    pub quality: String,
    #[serde(default)]
    pub bass: Option<String>,
    pub start: f64,
    pub end: f64,
    pub confidence: f64,
}

impl Chord {
    pub fn to_inline(&self) -> InlineChord {
        InlineChord {
            symbol: self.symbol.clone(),
            root: self.root.clone(),
            quality: self.quality.clone(),
            bass: self.bass.clone(),
            confidence: self.confidence,
        }
    }
}

impl Timed for Chord {
    fn start(&self) -> f64 {
        self.start
    }
    fn end(&self) -> f64 {
        self.end
    }
}

impl Validate for Chord {
    fn check(&self, path: &str, out: &mut Vec<Diagnostic>) {
        check_label(&self.symbol, &format!("{path}.symbol"), out);
        check_label(&self.root, &format!("{path}.root"), out);
        check_label(&self.quality, &format!("{path}.quality"), out);
        check_span(self.start, self.end, path, out);
        check_confidence(self.confidence, path, out);
    }
}

/// A melody note
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub pitch_midi: u8,
    /// Informational; `pitch_midi` is authoritative
    #[serde(default)]
    pub pitch_name: String,
    pub start: f64,
    pub end: f64,
    pub velocity: u8,
    pub confidence: f64,
}

impl Note {
    pub fn derived_pitch_name(&self) -> String {
        pitch_name(self.pitch_midi)
    }
}

impl Timed for Note {
    fn start(&self) -> f64 {
        self.start
    }
    fn end(&self) -> f64 {
        self.end
    }
}

impl Validate for Note {
    fn check(&self, path: &str, out: &mut Vec<Diagnostic>) {
        if self.pitch_midi > 127 {
            out.push(Diagnostic::new(format!("{path}.pitch_midi"), "must be 0-127"));
        }
        if self.velocity > 127 {
            out.push(Diagnostic::new(format!("{path}.velocity"), "must be 0-127"));
        }
        check_span(self.start, self.end, path, out);
        check_confidence(self.confidence, path, out);
    }
}

/// A structural section of the song
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    #[serde(rename = "type")]
    pub kind: String,
    pub label: String,
    pub start: f64,
    pub end: f64,
    pub confidence: f64,
}

impl Timed for Segment {
    fn start(&self) -> f64 {
        self.start
    }
    fn end(&self) -> f64 {
        self.end
    }
}

impl Validate for Segment {
    fn check(&self, path: &str, out: &mut Vec<Diagnostic>) {
        check_span(self.start, self.end, path, out);
        check_confidence(self.confidence, path, out);
    }
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn check_label(value: &str, field: &str, out: &mut Vec<Diagnostic>) {
    if value.trim().is_empty() {
        out.push(Diagnostic::new(field, "must not be empty"));
    }
}

fn check_span(start: f64, end: f64, path: &str, out: &mut Vec<Diagnostic>) {
    let mut valid = true;
    for (name, value) in [("start", start), ("end", end)] {
        if !value.is_finite() {
            out.push(Diagnostic::new(format!("{path}.{name}"), "must be finite"));
            valid = false;
        } else if value < 0.0 {
            out.push(Diagnostic::new(
                format!("{path}.{name}"),
                format!("must be non-negative, got {value}"),
            ));
            valid = false;
        }
    }
    if valid && end < start {
        out.push(Diagnostic::new(
            format!("{path}.end"),
            format!("end {end} precedes start {start}"),
        ));
    }
}

fn check_confidence(confidence: f64, path: &str, out: &mut Vec<Diagnostic>) {
    if !(0.0..=1.0).contains(&confidence) {
        out.push(Diagnostic::new(
            format!("{path}.confidence"),
            format!("must be within [0, 1], got {confidence}"),
        ));
    }
}
