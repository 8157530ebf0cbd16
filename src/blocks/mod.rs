// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Block segmentation: fixed-width time windows over the song timeline.
//!
//! Blocks are a derived view. They hold index ranges into the store's
//! sequences plus concatenated text, never entities of their own, and are
//! recomputed whenever the store changes.
//!
//! For a song of duration `D` (latest end time of any entity) and width
//! `W` there are `ceil(D / W)` blocks. Block `i` covers `[i*W, (i+1)*W)`
//! clipped to `D`; the last block also includes `D` itself.

use std::ops::Range;

use crate::model::{Chord, Layer, SongStore, Timed, Word};

/// Default block width in seconds
pub const DEFAULT_BLOCK_WIDTH: f64 = 20.0;

/// One fixed-width window of the timeline
#[derive(Debug, Clone, PartialEq)]
pub struct Block {
    pub index: usize,
    pub start: f64,
    pub end: f64,
    /// Primary words whose start lies in this block
    pub words: Range<usize>,
    /// Alternative-layer words whose start lies in this block
    pub alt_words: Range<usize>,
    /// Representative primary chord (index into the store's chords)
    pub chord: Option<usize>,
    /// Representative alternative chord
    pub alt_chord: Option<usize>,
    /// Primary word text joined with spaces
    pub text: String,
    /// Alternative word text joined with spaces
    pub alt_text: String,
}

impl Block {
    pub fn duration(&self) -> f64 {
        self.end - self.start
    }

    pub fn words_in<'a>(&self, store: &'a SongStore) -> &'a [Word] {
        &store.words()[self.words.clone()]
    }

    pub fn alt_words_in<'a>(&self, store: &'a SongStore) -> &'a [Word] {
        &store.alternative().words[self.alt_words.clone()]
    }

    /// The representative chord of the chosen layer
    pub fn chord_in<'a>(&self, store: &'a SongStore, layer: Layer) -> Option<&'a Chord> {
        let index = match layer {
            Layer::Primary => self.chord,
            Layer::Alternative => self.alt_chord,
        }?;
        store.chords_of(layer).get(index)
    }

    /// Symbol of the representative chord, empty when there is none
    pub fn chord_symbol<'a>(&self, store: &'a SongStore, layer: Layer) -> &'a str {
        self.chord_in(store, layer)
            .map(|c| c.symbol.as_str())
            .unwrap_or("")
    }

    /// Whether `time` falls inside this block, given whether it is the last
    pub fn contains(&self, time: f64, is_last: bool) -> bool {
        time >= self.start && (time < self.end || (is_last && time <= self.end))
    }
}

/// Split the store's timeline into blocks of `width` seconds
///
/// Returns no blocks for an empty timeline or a non-positive width.
pub fn segment(store: &SongStore, width: f64) -> Vec<Block> {
    let duration = store.duration();
    if !(width.is_finite() && width > 0.0) || duration <= 0.0 {
        return Vec::new();
    }

    let mut count = (duration / width).ceil() as usize;
    // Rounding can leave a zero-width block at D; the one before it is
    // closed at D and takes any word starting there.
    if count > 1 && (count - 1) as f64 * width >= duration {
        count -= 1;
    }
    let words = store.words();
    let alt_words = &store.alternative().words;

    (0..count)
        .map(|index| {
            let start = index as f64 * width;
            let end = ((index + 1) as f64 * width).min(duration);
            let is_last = index + 1 == count;

            let words_range = word_range(words, start, end, is_last);
            let alt_range = word_range(alt_words, start, end, is_last);

            Block {
                index,
                start,
                end,
                chord: representative_chord(store.chords(), start, end),
                alt_chord: representative_chord(&store.alternative().chords, start, end),
                text: join_text(&words[words_range.clone()]),
                alt_text: join_text(&alt_words[alt_range.clone()]),
                words: words_range,
                alt_words: alt_range,
            }
        })
        .collect()
}

/// Contiguous range of start-ordered words inside `[start, end)`
/// (or `[start, end]` for the last block)
fn word_range(words: &[Word], start: f64, end: f64, is_last: bool) -> Range<usize> {
    let lo = words.partition_point(|w| w.start < start);
    let hi = if is_last {
        words.partition_point(|w| w.start <= end)
    } else {
        words.partition_point(|w| w.start < end)
    };
    lo..hi.max(lo)
}

/// Chord with the largest overlap of `[start, end]`
///
/// Ties go to the earlier start, then the earlier sequence position.
/// Chords that only touch the window do not count.
pub fn representative_chord(chords: &[Chord], start: f64, end: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (index, chord) in chords.iter().enumerate() {
        let overlap = chord.overlap(start, end);
        if overlap <= 0.0 {
            continue;
        }
        let better = match best {
            None => true,
            Some((best_index, best_overlap)) => {
                overlap > best_overlap
                    || (overlap == best_overlap && chord.start < chords[best_index].start)
            }
        };
        if better {
            best = Some((index, overlap));
        }
    }
    best.map(|(index, _)| index)
}

fn join_text(words: &[Word]) -> String {
    words
        .iter()
        .map(|w| w.text.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Lazily computed blocks, dropped whenever the store changes
#[derive(Debug, Clone)]
pub struct BlockCache {
    width: f64,
    blocks: Option<Vec<Block>>,
}

impl BlockCache {
    pub fn new(width: f64) -> Self {
        Self {
            width,
            blocks: None,
        }
    }

    pub fn width(&self) -> f64 {
        self.width
    }

    /// Change the width; cached blocks are discarded
    pub fn set_width(&mut self, width: f64) {
        if width != self.width {
            self.width = width;
            self.blocks = None;
        }
    }

    pub fn invalidate(&mut self) {
        self.blocks = None;
    }

    pub fn is_valid(&self) -> bool {
        self.blocks.is_some()
    }

    /// Current blocks, recomputing from `store` if invalidated
    pub fn get(&mut self, store: &SongStore) -> &[Block] {
        let width = self.width;
        self.blocks.get_or_insert_with(|| segment(store, width))
    }
}

impl Default for BlockCache {
    fn default() -> Self {
        Self::new(DEFAULT_BLOCK_WIDTH)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::store::tests::{chord, sample_file};
    use crate::model::{AlternativeLayer, SongDataFile};

    fn store_with(words: Vec<Word>, chords: Vec<Chord>) -> SongStore {
        let mut file: SongDataFile = sample_file();
        file.words = words;
        file.chords = chords;
        file.notes.clear();
        file.segments.clear();
        SongStore::load(file).unwrap()
    }

    #[test]
    fn test_45_seconds_three_blocks() {
        let store = store_with(
            vec![Word::new("a", 0.0, 1.0, 0.9), Word::new("z", 44.0, 45.0, 0.9)],
            vec![],
        );
        let blocks = segment(&store, 20.0);
        let spans: Vec<_> = blocks.iter().map(|b| (b.start, b.end)).collect();
        assert_eq!(spans, vec![(0.0, 20.0), (20.0, 40.0), (40.0, 45.0)]);
    }

    #[test]
    fn test_boundary_word_goes_to_later_block() {
        let store = store_with(
            vec![
                Word::new("before", 19.5, 20.0, 0.9),
                Word::new("edge", 20.0, 21.0, 0.9),
                Word::new("end", 39.0, 40.0, 0.9),
            ],
            vec![],
        );
        let blocks = segment(&store, 20.0);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].text, "before");
        assert_eq!(blocks[1].text, "edge end");
    }

    #[test]
    fn test_last_block_closed_at_duration() {
        let store = store_with(vec![Word::new("a", 0.0, 1.0, 0.9), Word::new("tail", 5.0, 5.0, 0.9)], vec![]);
        let blocks = segment(&store, 20.0);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].end, 5.0);
        assert_eq!(blocks[0].words, 0..2);
    }

    #[test]
    fn test_no_zero_width_trailing_block() {
        let duration = 0.1 + 0.2;
        let store = store_with(
            vec![
                Word::new("a", 0.0, 0.1, 0.9),
                Word::new("b", 0.2, duration, 0.9),
                Word::new("c", duration, duration, 0.9),
            ],
            vec![],
        );
        let blocks = segment(&store, 0.1);
        assert_eq!(blocks.len(), 3);
        let last = &blocks[2];
        assert_eq!(last.end, duration);
        assert!(last.start < last.end);
        assert_eq!(last.text, "b c");
        let total: usize = blocks.iter().map(|b| b.words.len()).sum();
        assert_eq!(total, 3);
    }

    #[test]
    fn test_every_word_assigned_once() {
        let words: Vec<_> = (0..50)
            .map(|i| Word::new(format!("w{i}"), i as f64 * 1.3, i as f64 * 1.3 + 0.5, 0.9))
            .collect();
        let store = store_with(words, vec![]);
        let blocks = segment(&store, 7.0);
        let total: usize = blocks.iter().map(|b| b.words.len()).sum();
        assert_eq!(total, 50);
        for pair in blocks.windows(2) {
            assert_eq!(pair[0].words.end, pair[1].words.start);
        }
    }

    #[test]
    fn test_representative_chord_max_overlap() {
        let chords = vec![chord("C", 0.0, 5.0), chord("G", 5.0, 20.0), chord("Am", 18.0, 30.0)];
        assert_eq!(representative_chord(&chords, 0.0, 20.0), Some(1));
        assert_eq!(representative_chord(&chords, 20.0, 40.0), Some(2));
        assert_eq!(representative_chord(&chords, 40.0, 45.0), None);
    }

    #[test]
    fn test_representative_chord_tie_breaks() {
        // Equal overlap: earlier start wins regardless of order
        let chords = vec![chord("G", 10.0, 20.0), chord("C", 0.0, 10.0)];
        assert_eq!(representative_chord(&chords, 0.0, 20.0), Some(1));

        // Equal overlap and start: earlier index wins
        let chords = vec![chord("D", 0.0, 10.0), chord("E", 0.0, 10.0)];
        assert_eq!(representative_chord(&chords, 0.0, 20.0), Some(0));
    }

    #[test]
    fn test_touching_chord_not_representative() {
        let chords = vec![chord("C", 0.0, 20.0)];
        assert_eq!(representative_chord(&chords, 20.0, 40.0), None);
    }

    #[test]
    fn test_alternative_layer_segmented_independently() {
        let mut file = sample_file();
        file.words = vec![Word::new("one", 1.0, 2.0, 0.9), Word::new("two", 25.0, 26.0, 0.9)];
        file.chords = vec![chord("C", 0.0, 30.0)];
        file.notes.clear();
        file.segments.clear();
        file.alternative = AlternativeLayer {
            words: vec![Word::new("uno", 21.0, 22.0, 0.9)],
            chords: vec![chord("F", 20.0, 30.0)],
        };
        let store = SongStore::load(file).unwrap();
        let blocks = segment(&store, 20.0);

        assert_eq!(blocks[0].alt_text, "");
        assert_eq!(blocks[0].alt_chord, None);
        assert_eq!(blocks[1].alt_text, "uno");
        assert_eq!(blocks[1].chord_symbol(&store, Layer::Alternative), "F");
        assert_eq!(blocks[1].chord_symbol(&store, Layer::Primary), "C");
    }

    #[test]
    fn test_invalid_width() {
        let store = store_with(vec![Word::new("a", 0.0, 1.0, 0.9)], vec![]);
        assert!(segment(&store, 0.0).is_empty());
        assert!(segment(&store, f64::NAN).is_empty());
    }

    #[test]
    fn test_cache_invalidation() {
        let store = store_with(vec![Word::new("a", 0.0, 30.0, 0.9)], vec![]);
        let mut cache = BlockCache::default();
        assert!(!cache.is_valid());
        assert_eq!(cache.get(&store).len(), 2);
        assert!(cache.is_valid());

        cache.set_width(10.0);
        assert!(!cache.is_valid());
        assert_eq!(cache.get(&store).len(), 3);

        cache.invalidate();
        assert!(!cache.is_valid());
    }
}
