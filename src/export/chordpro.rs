// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! ChordPro / CCLI text export.
//!
//! Words are written in order, each prefixed by its inline chord in
//! brackets (`[Am]world`). Words are separated by single spaces; a new
//! line starts whenever the song enters a new segment.

use crate::model::{Segment, SongStore, Word};

use super::LayerSelection;

/// Encode the chosen lyrics layer as ChordPro text
pub fn encode(store: &SongStore, layers: LayerSelection) -> String {
    encode_words(store.words_of(layers.lyrics), store.segments())
}

/// Encode words, breaking lines at segment boundaries
pub fn encode_words(words: &[Word], segments: &[Segment]) -> String {
    let mut out = String::new();
    let mut current_segment: Option<usize> = None;

    for (i, word) in words.iter().enumerate() {
        let segment = segment_at(segments, word.start);
        if i > 0 {
            if segment != current_segment {
                out.push('\n');
            } else {
                out.push(' ');
            }
        }
        current_segment = segment;

        if let Some(chord) = &word.chord {
            out.push('[');
            out.push_str(&chord.symbol);
            out.push(']');
        }
        out.push_str(&word.text);
    }

    if !out.is_empty() {
        out.push('\n');
    }
    out
}

/// Index of the last segment starting at or before `time`
fn segment_at(segments: &[Segment], time: f64) -> Option<usize> {
    segments
        .iter()
        .enumerate()
        .filter(|(_, s)| s.start <= time)
        .max_by(|(ia, a), (ib, b)| a.start.total_cmp(&b.start).then(ia.cmp(ib)))
        .map(|(i, _)| i)
}
