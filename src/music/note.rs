// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Pitch classes and MIDI note naming.

use std::fmt;

/// MIDI note number type (0-127)
pub type MidiNote = u8;

/// MIDI number of the C that anchors chord-root pitches
pub const CHORD_ROOT_BASE: MidiNote = 60;

/// Pitch classes, sharps spelled
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PitchClass {
    C,
    Cs, // C# / Db
    D,
    Ds, // D# / Eb
    E,
    F,
    Fs, // F# / Gb
    G,
    Gs, // G# / Ab
    A,
    As, // A# / Bb
    B,
}

impl PitchClass {
    /// All pitch classes in chromatic order
    pub const ALL: [PitchClass; 12] = [
        PitchClass::C,
        PitchClass::Cs,
        PitchClass::D,
        PitchClass::Ds,
        PitchClass::E,
        PitchClass::F,
        PitchClass::Fs,
        PitchClass::G,
        PitchClass::Gs,
        PitchClass::A,
        PitchClass::As,
        PitchClass::B,
    ];

    /// Semitones above C (0-11)
    pub fn semitone(self) -> u8 {
        PitchClass::ALL
            .iter()
            .position(|&pc| pc == self)
            .unwrap_or(0) as u8
    }

    pub fn from_semitone(semitone: u8) -> Self {
        PitchClass::ALL[(semitone % 12) as usize]
    }

    /// Parse a root name such as "C", "C#", "Db" or "bb" (case-insensitive letter)
    pub fn parse(name: &str) -> Option<Self> {
        let mut chars = name.trim().chars();
        let letter = chars.next()?.to_ascii_uppercase();
        let natural: u8 = match letter {
            'C' => 0,
            'D' => 2,
            'E' => 4,
            'F' => 5,
            'G' => 7,
            'A' => 9,
            'B' => 11,
            _ => return None,
        };
        let rest: String = chars.collect();
        let offset: i8 = match rest.as_str() {
            "" => 0,
            "#" | "s" | "♯" => 1,
            "b" | "♭" => -1,
            _ => return None,
        };
        Some(Self::from_semitone((natural as i8 + offset).rem_euclid(12) as u8))
    }

    /// MIDI number in the octave starting at `base` (a C)
    pub fn midi_in_octave(self, base: MidiNote) -> MidiNote {
        base.saturating_add(self.semitone()).min(127)
    }
}

impl fmt::Display for PitchClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PitchClass::C => "C",
            PitchClass::Cs => "C#",
            PitchClass::D => "D",
            PitchClass::Ds => "D#",
            PitchClass::E => "E",
            PitchClass::F => "F",
            PitchClass::Fs => "F#",
            PitchClass::G => "G",
            PitchClass::Gs => "G#",
            PitchClass::A => "A",
            PitchClass::As => "A#",
            PitchClass::B => "B",
        };
        f.write_str(name)
    }
}

/// Scientific pitch name for a MIDI number, e.g. 60 -> "C4"
pub fn pitch_name(note: MidiNote) -> String {
    let octave = note as i16 / 12 - 1;
    format!("{}{}", PitchClass::from_semitone(note % 12), octave)
}
