// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Song data model.
//!
//! This module provides:
//! - Timeline entities: words, chords, notes, segments
//! - The song data file record and its metadata
//! - The song data store that owns one song's timeline

pub mod entity;
pub mod file;
pub mod store;

pub use entity::{
    Chord, Entity, EntityKind, InlineChord, Note, Segment, Timed, Validate, Word,
};
pub use file::{AlternativeLayer, Metadata, SongDataFile, SCHEMA_VERSION};
pub use store::{validate_file, SongStore};

/// Which annotation layer a consumer reads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Layer {
    #[default]
    Primary,
    Alternative,
}

impl SongStore {
    /// Words of the chosen layer
    pub fn words_of(&self, layer: Layer) -> &[Word] {
        match layer {
            Layer::Primary => self.words(),
            Layer::Alternative => &self.alternative().words,
        }
    }

    /// Chords of the chosen layer
    pub fn chords_of(&self, layer: Layer) -> &[Chord] {
        match layer {
            Layer::Primary => self.chords(),
            Layer::Alternative => &self.alternative().chords,
        }
    }
}
