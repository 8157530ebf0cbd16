// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Chord symbol parsing.
//!
//! Splits a symbol such as `F#m7/C#` into root, quality and optional bass.
//! A bare root is a major chord; `m`, `min` and `-` are minor.

use super::note::PitchClass;

/// A parsed chord symbol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChordSymbol {
    /// The symbol as written
    pub symbol: String,
    /// Root spelling as written (e.g. "Bb")
    pub root: String,
    /// Normalized quality ("maj", "min", or the raw suffix)
    pub quality: String,
    /// Slash bass, if any
    pub bass: Option<String>,
}

impl ChordSymbol {
    /// Parse a symbol. Returns `None` when the root is not a note name.
    pub fn parse(symbol: &str) -> Option<Self> {
        let symbol = symbol.trim();
        let (head, bass) = match symbol.split_once('/') {
            Some((head, bass)) => {
                PitchClass::parse(bass)?;
                (head, Some(bass.to_string()))
            }
            None => (symbol, None),
        };

        let root_len = root_length(head)?;
        let root = &head[..root_len];
        PitchClass::parse(root)?;

        let quality = match &head[root_len..] {
            "" | "maj" | "M" => "maj".to_string(),
            "m" | "min" | "-" => "min".to_string(),
            other => other.to_string(),
        };

        Some(Self {
            symbol: symbol.to_string(),
            root: root.to_string(),
            quality,
            bass,
        })
    }

    pub fn pitch_class(&self) -> Option<PitchClass> {
        PitchClass::parse(&self.root)
    }
}

/// Byte length of the root (letter plus optional accidental)
fn root_length(head: &str) -> Option<usize> {
    let mut chars = head.char_indices();
    let (_, letter) = chars.next()?;
    if !matches!(letter.to_ascii_uppercase(), 'A'..='G') {
        return None;
    }
    match chars.next() {
        Some((i, c)) if c == '#' || c == 'b' || c == '♯' || c == '♭' => Some(i + c.len_utf8()),
        Some((i, _)) => Some(i),
        None => Some(head.len()),
    }
}
