// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Songsync: time-aligned song data editing.
//!
//! A song's words, chords, notes and segments live in a validated store.
//! The store is projected into fixed-width blocks for editing, kept
//! consistent with a per-entity table view, previewed through the audio
//! player and exported as ChordPro text, MIDI or song data JSON.

pub mod audio;
pub mod blocks;
pub mod config;
pub mod error;
pub mod export;
pub mod import;
pub mod model;
pub mod music;
pub mod pipeline;
pub mod session;
pub mod sync;

pub use blocks::{segment, Block, BlockCache};
pub use config::Settings;
pub use error::{
    Diagnostic, EditError, ExportError, PipelineError, PlaybackError, ValidationError,
};
pub use export::{LayerSelection, MidiEncoder};
pub use import::{ImportOutcome, SongDataImporter};
pub use model::{Layer, SongDataFile, SongStore};
pub use session::{Session, SessionEvent};
pub use sync::Synchronizer;
