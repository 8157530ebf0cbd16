// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Dual-view synchronizer.
//!
//! The single point through which the song store is edited. Table edits
//! map straight onto the store; block edits are translated into entity
//! changes first. Each committed edit drops the cached blocks in the same
//! call, so no stale block view is ever returned afterwards.
//!
//! Block lyric edits are lossy: free text cannot recover per-word timing,
//! so regenerated words are spread evenly over the block and flagged as
//! approximate.

use tracing::{debug, error, warn};

use crate::blocks::{Block, BlockCache, DEFAULT_BLOCK_WIDTH};
use crate::error::EditError;
use crate::model::{AlternativeLayer, Chord, Entity, EntityKind, SongStore, Word};
use crate::music::ChordSymbol;

/// Confidence given to words whose timing was reconstructed
pub const APPROXIMATE_CONFIDENCE: f64 = 0.5;

/// Confidence of a chord entered by hand in the block view
const EDITED_CHORD_CONFIDENCE: f64 = 1.0;

/// Serializes edits to one song store
#[derive(Debug)]
pub struct Synchronizer {
    store: SongStore,
    cache: BlockCache,
    approximate_confidence: f64,
    revision: u64,
    poisoned: Option<String>,
}

impl Synchronizer {
    pub fn new(store: SongStore) -> Self {
        Self::with_settings(store, DEFAULT_BLOCK_WIDTH, APPROXIMATE_CONFIDENCE)
    }

    pub fn with_settings(store: SongStore, block_width: f64, approximate_confidence: f64) -> Self {
        Self {
            store,
            cache: BlockCache::new(block_width),
            approximate_confidence,
            revision: 0,
            poisoned: None,
        }
    }

    /// Read-only view of the committed store
    pub fn store(&self) -> &SongStore {
        &self.store
    }

    /// Give up the store, e.g. when the song is closed
    pub fn into_store(self) -> SongStore {
        self.store
    }

    /// Number of committed edits so far
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Set when a committed edit left the store inconsistent
    pub fn is_poisoned(&self) -> bool {
        self.poisoned.is_some()
    }

    pub fn block_width(&self) -> f64 {
        self.cache.width()
    }

    pub fn set_block_width(&mut self, width: f64) {
        self.cache.set_width(width);
    }

    /// Current block projection
    pub fn blocks(&mut self) -> &[Block] {
        self.cache.get(&self.store)
    }

    /// A single block, by index
    pub fn block(&mut self, index: usize) -> Result<Block, EditError> {
        let blocks = self.blocks();
        blocks.get(index).cloned().ok_or(EditError::BlockOutOfRange {
            index,
            count: blocks.len(),
        })
    }

    /// Replace an entity from the table view
    pub fn table_edit(&mut self, index: usize, entity: Entity) -> Result<(), EditError> {
        self.commit("table edit", |store| store.apply_edit(index, entity))
    }

    /// Insert an entity from the table view; returns its position
    pub fn table_append(&mut self, entity: Entity) -> Result<usize, EditError> {
        self.commit("table append", |store| store.append(entity))
    }

    /// Delete an entity from the table view
    pub fn table_remove(&mut self, kind: EntityKind, index: usize) -> Result<Entity, EditError> {
        self.commit("table remove", |store| store.remove(kind, index))
    }

    /// Set a block's chord
    ///
    /// Chords lying wholly inside the block are replaced by a single chord
    /// spanning the block; chords straddling its edges are left alone. The
    /// block's words are re-annotated: the first carries the new chord,
    /// the rest are cleared. An empty symbol only clears.
    pub fn block_chord_edit(&mut self, block_index: usize, symbol: &str) -> Result<(), EditError> {
        let block = self.block(block_index)?;
        let symbol = symbol.trim();

        let replacement = if symbol.is_empty() {
            None
        } else {
            let parsed = ChordSymbol::parse(symbol).ok_or_else(|| {
                EditError::invariant("chord.symbol", format!("unrecognized chord symbol {symbol:?}"))
            })?;
            Some(Chord {
                symbol: parsed.symbol,
                root: parsed.root,
                quality: parsed.quality,
                bass: parsed.bass,
                start: block.start,
                end: block.end,
                confidence: EDITED_CHORD_CONFIDENCE,
            })
        };
        let inline = replacement.as_ref().map(Chord::to_inline);

        self.commit("block chord edit", |store| {
            // Validate the annotation before any sequence changes
            let mut staged = store.clone();
            staged.replace_chords_within(block.start, block.end, replacement)?;
            for (offset, index) in block.words.clone().enumerate() {
                let chord = if offset == 0 { inline.clone() } else { None };
                staged.set_word_chord(index, chord)?;
            }
            *store = staged;
            Ok(())
        })
    }

    /// Replace a block's lyrics with free text
    ///
    /// This is one-way: the block's words are discarded and the text's
    /// whitespace-separated tokens become new words spread evenly across
    /// the block, flagged `timing_approximate`.
    pub fn block_lyrics_edit(&mut self, block_index: usize, text: &str) -> Result<(), EditError> {
        let block = self.block(block_index)?;
        let tokens: Vec<&str> = text.split_whitespace().collect();
        let words = spread_tokens(&tokens, block.start, block.end, self.approximate_confidence);

        self.commit("block lyrics edit", |store| {
            store.splice_words(block.words.clone(), words)
        })
    }

    /// Install the alternative layer produced by the rewrite service
    pub fn set_alternative(&mut self, layer: AlternativeLayer) -> Result<(), EditError> {
        self.commit("alternative layer", |store| store.set_alternative(layer))
    }

    /// Apply one edit, verify the store and drop the cached blocks
    fn commit<T>(
        &mut self,
        what: &str,
        edit: impl FnOnce(&mut SongStore) -> Result<T, EditError>,
    ) -> Result<T, EditError> {
        if let Some(reason) = &self.poisoned {
            return Err(EditError::StoreCorrupted(reason.clone()));
        }

        let value = match edit(&mut self.store) {
            Ok(value) => value,
            Err(err) => {
                warn!("Rejected {}: {}", what, err);
                return Err(err);
            }
        };
        self.cache.invalidate();
        self.revision += 1;

        if let Err(problem) = self.store.verify() {
            let reason = problem.to_string();
            error!("Store inconsistent after {}: {}", what, reason);
            self.poisoned = Some(reason.clone());
            return Err(EditError::StoreCorrupted(reason));
        }

        debug!("Committed {} (revision {})", what, self.revision);
        Ok(value)
    }
}

/// Words for `tokens`, evenly spaced across `[start, end]`
fn spread_tokens(tokens: &[&str], start: f64, end: f64, confidence: f64) -> Vec<Word> {
    let step = (end - start) / tokens.len().max(1) as f64;
    tokens
        .iter()
        .enumerate()
        .map(|(i, token)| {
            let word_start = start + step * i as f64;
            let word_end = if i + 1 == tokens.len() {
                end
            } else {
                start + step * (i + 1) as f64
            };
            let mut word = Word::new(*token, word_start, word_end, confidence);
            word.timing_approximate = true;
            word
        })
        .collect()
}
