// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Music theory utilities: pitch classes, note naming, chord symbols.

pub mod chord;
pub mod note;

pub use chord::ChordSymbol;
pub use note::{pitch_name, MidiNote, PitchClass, CHORD_ROOT_BASE};
