// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Export encoders.
//!
//! This module provides:
//! - ChordPro text (inline `[chord]word` notation)
//! - Three-track standard MIDI files
//! - Song data JSON written back next to the audio
//!
//! The encoders are pure; the `export_*` helpers add file output.

pub mod chordpro;
pub mod midi;

pub use midi::MidiEncoder;

use std::fs;
use std::path::Path;

use tracing::info;

use crate::error::ExportError;
use crate::model::{Layer, SongStore};

/// Which layer each encoder field reads from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct LayerSelection {
    pub lyrics: Layer,
    pub chords: Layer,
}

impl LayerSelection {
    /// Both fields from the alternative layer
    pub fn alternative() -> Self {
        Self {
            lyrics: Layer::Alternative,
            chords: Layer::Alternative,
        }
    }
}

/// Write ChordPro text for the store
pub fn export_chordpro<P: AsRef<Path>>(
    store: &SongStore,
    layers: LayerSelection,
    path: P,
) -> Result<(), ExportError> {
    if store.words_of(layers.lyrics).is_empty() {
        return Err(ExportError::Empty("no words in the selected lyrics layer"));
    }
    let text = chordpro::encode(store, layers);
    write_file(path.as_ref(), text.as_bytes())?;
    info!("Exported ChordPro to {:?}", path.as_ref());
    Ok(())
}

/// Write a three-track MIDI file for the store
pub fn export_midi<P: AsRef<Path>>(
    store: &SongStore,
    layers: LayerSelection,
    encoder: &MidiEncoder,
    path: P,
) -> Result<(), ExportError> {
    let bytes = encoder.encode(store, layers);
    write_file(path.as_ref(), &bytes)?;
    info!("Exported MIDI to {:?} ({} bytes)", path.as_ref(), bytes.len());
    Ok(())
}

/// Write the store back out as song data JSON
pub fn export_song_data<P: AsRef<Path>>(store: &SongStore, path: P) -> Result<(), ExportError> {
    let json = store.serialize().to_json()?;
    write_file(path.as_ref(), json.as_bytes())?;
    info!("Exported song data to {:?}", path.as_ref());
    Ok(())
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), ExportError> {
    fs::write(path, contents).map_err(|source| ExportError::Write {
        path: path.to_path_buf(),
        source,
    })
}
