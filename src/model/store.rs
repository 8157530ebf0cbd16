// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! The song data store: canonical timeline for one open song.
//!
//! Reads are public. Mutation is crate-private and goes through the
//! synchronizer, which serializes edits and keeps derived views fresh.
//! Every mutator validates before touching any sequence, so a rejected
//! edit leaves the store exactly as it was.

use std::ops::Range;

use super::entity::{Chord, Entity, EntityKind, InlineChord, Note, Segment, Timed, Validate, Word};
use super::file::{check_word_order, AlternativeLayer, Metadata, SongDataFile};
use crate::error::{Diagnostic, EditError, ValidationError};

/// In-memory song timeline
#[derive(Debug, Clone, PartialEq)]
pub struct SongStore {
    metadata: Metadata,
    words: Vec<Word>,
    chords: Vec<Chord>,
    notes: Vec<Note>,
    segments: Vec<Segment>,
    alternative: AlternativeLayer,
}

impl SongStore {
    /// Build a store from a parsed record, rejecting it whole on any problem
    pub fn load(file: SongDataFile) -> Result<Self, ValidationError> {
        let diagnostics = validate_file(&file);
        if !diagnostics.is_empty() {
            return Err(ValidationError::new(diagnostics));
        }
        Ok(Self {
            metadata: file.metadata,
            words: file.words,
            chords: file.chords,
            notes: file.notes,
            segments: file.segments,
            alternative: file.alternative,
        })
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    pub fn words(&self) -> &[Word] {
        &self.words
    }

    pub fn chords(&self) -> &[Chord] {
        &self.chords
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    pub fn alternative(&self) -> &AlternativeLayer {
        &self.alternative
    }

    /// Number of entries in the named sequence
    pub fn len_of(&self, kind: EntityKind) -> usize {
        match kind {
            EntityKind::Word => self.words.len(),
            EntityKind::Chord => self.chords.len(),
            EntityKind::Note => self.notes.len(),
            EntityKind::Segment => self.segments.len(),
        }
    }

    /// Latest end time over every entity, both layers included
    pub fn duration(&self) -> f64 {
        fn max_end<T: Timed>(items: &[T]) -> f64 {
            items.iter().map(Timed::end).fold(0.0, f64::max)
        }
        [
            max_end(&self.words),
            max_end(&self.chords),
            max_end(&self.notes),
            max_end(&self.segments),
            max_end(&self.alternative.words),
            max_end(&self.alternative.chords),
        ]
        .into_iter()
        .fold(0.0, f64::max)
    }

    /// Canonical record for export; `load(serialize())` reproduces the store
    pub fn serialize(&self) -> SongDataFile {
        SongDataFile {
            metadata: self.metadata.clone(),
            words: self.words.clone(),
            chords: self.chords.clone(),
            notes: self.notes.clone(),
            segments: self.segments.clone(),
            alternative: self.alternative.clone(),
        }
    }

    /// Re-check every invariant; `Err` means the store is corrupt
    pub fn verify(&self) -> Result<(), Diagnostic> {
        let diagnostics = diagnose(
            &self.metadata,
            &self.words,
            &self.chords,
            &self.notes,
            &self.segments,
            &self.alternative,
        );
        match diagnostics.into_iter().next() {
            Some(first) => Err(first),
            None => Ok(()),
        }
    }

    /// Replace the entity at `index` in the sequence matching its kind
    pub(crate) fn apply_edit(&mut self, index: usize, entity: Entity) -> Result<(), EditError> {
        let kind = entity.kind();
        let len = self.len_of(kind);
        if index >= len {
            return Err(EditError::IndexOutOfRange { kind, index, len });
        }
        reject_invalid_value(&entity, &format!("{kind}s[{index}]"))?;

        match entity {
            Entity::Word(word) => {
                self.check_word_slot(index, index + 1, &word)?;
                self.words[index] = word;
            }
            Entity::Chord(chord) => self.chords[index] = chord,
            Entity::Note(note) => self.notes[index] = note,
            Entity::Segment(segment) => self.segments[index] = segment,
        }
        Ok(())
    }

    /// Add an entity; words are placed after every word starting no later
    pub(crate) fn append(&mut self, entity: Entity) -> Result<usize, EditError> {
        let kind = entity.kind();
        reject_invalid_value(&entity, &format!("{kind}s[new]"))?;

        let index = match entity {
            Entity::Word(word) => {
                let index = self.words.partition_point(|w| w.start <= word.start);
                self.words.insert(index, word);
                index
            }
            Entity::Chord(chord) => {
                self.chords.push(chord);
                self.chords.len() - 1
            }
            Entity::Note(note) => {
                self.notes.push(note);
                self.notes.len() - 1
            }
            Entity::Segment(segment) => {
                self.segments.push(segment);
                self.segments.len() - 1
            }
        };
        Ok(index)
    }

    /// Remove and return the entity at `index`
    pub(crate) fn remove(&mut self, kind: EntityKind, index: usize) -> Result<Entity, EditError> {
        let len = self.len_of(kind);
        if index >= len {
            return Err(EditError::IndexOutOfRange { kind, index, len });
        }
        let removed = match kind {
            EntityKind::Word => {
                if len == 1 {
                    return Err(EditError::EmptyWords);
                }
                Entity::Word(self.words.remove(index))
            }
            EntityKind::Chord => Entity::Chord(self.chords.remove(index)),
            EntityKind::Note => Entity::Note(self.notes.remove(index)),
            EntityKind::Segment => Entity::Segment(self.segments.remove(index)),
        };
        Ok(removed)
    }

    /// Swap a contiguous run of words for a new run
    pub(crate) fn splice_words(
        &mut self,
        range: Range<usize>,
        replacement: Vec<Word>,
    ) -> Result<(), EditError> {
        if range.start > range.end || range.end > self.words.len() {
            return Err(EditError::IndexOutOfRange {
                kind: EntityKind::Word,
                index: range.end,
                len: self.words.len(),
            });
        }
        for (i, word) in replacement.iter().enumerate() {
            reject_invalid_value(word, &format!("words[{}]", range.start + i))?;
        }
        let mut order = Vec::new();
        check_word_order(&replacement, "words[new]", &mut order);
        if let Some(problem) = order.into_iter().next() {
            return Err(EditError::OutOfOrder(problem.reason));
        }
        if let (Some(first), Some(last)) = (replacement.first(), replacement.last()) {
            self.check_word_slot(range.start, range.end, first)?;
            self.check_word_slot(range.start, range.end, last)?;
        }
        if self.words.len() - range.len() + replacement.len() == 0 {
            return Err(EditError::EmptyWords);
        }

        self.words.splice(range, replacement);
        Ok(())
    }

    /// Drop chords lying wholly inside `[from, to]`, then insert `replacement`
    ///
    /// Returns how many chords were removed.
    pub(crate) fn replace_chords_within(
        &mut self,
        from: f64,
        to: f64,
        replacement: Option<Chord>,
    ) -> Result<usize, EditError> {
        if let Some(chord) = &replacement {
            reject_invalid_value(chord, "chords[new]")?;
        }
        let before = self.chords.len();
        self.chords.retain(|c| !(c.start >= from && c.end <= to));
        let removed = before - self.chords.len();

        if let Some(chord) = replacement {
            let index = self.chords.partition_point(|c| c.start < chord.start);
            self.chords.insert(index, chord);
        }
        Ok(removed)
    }

    /// Set or clear a word's inline chord
    pub(crate) fn set_word_chord(
        &mut self,
        index: usize,
        chord: Option<InlineChord>,
    ) -> Result<(), EditError> {
        let len = self.words.len();
        if index >= len {
            return Err(EditError::IndexOutOfRange {
                kind: EntityKind::Word,
                index,
                len,
            });
        }
        if let Some(chord) = &chord {
            reject_invalid_value(chord, &format!("words[{index}].chord"))?;
        }
        self.words[index].chord = chord;
        Ok(())
    }

    /// Replace the alternative layer wholesale
    pub(crate) fn set_alternative(&mut self, layer: AlternativeLayer) -> Result<(), EditError> {
        if let Some(first) = layer.diagnostics("alternative").into_iter().next() {
            return Err(EditError::Invariant(first));
        }
        self.alternative = layer;
        Ok(())
    }

    /// Check that `word` fits between the words before `lo` and from `hi` on
    fn check_word_slot(&self, lo: usize, hi: usize, word: &Word) -> Result<(), EditError> {
        if lo > 0 {
            let prev = &self.words[lo - 1];
            if word.start < prev.start {
                return Err(EditError::OutOfOrder(format!(
                    "start {} precedes previous word {:?} at {}",
                    word.start, prev.text, prev.start
                )));
            }
        }
        if let Some(next) = self.words.get(hi) {
            if word.start > next.start {
                return Err(EditError::OutOfOrder(format!(
                    "start {} follows next word {:?} at {}",
                    word.start, next.text, next.start
                )));
            }
        }
        Ok(())
    }
}

/// All schema problems of a parsed record, in document order
pub fn validate_file(file: &SongDataFile) -> Vec<Diagnostic> {
    diagnose(
        &file.metadata,
        &file.words,
        &file.chords,
        &file.notes,
        &file.segments,
        &file.alternative,
    )
}

fn diagnose(
    metadata: &Metadata,
    words: &[Word],
    chords: &[Chord],
    notes: &[Note],
    segments: &[Segment],
    alternative: &AlternativeLayer,
) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    metadata.check("metadata", &mut out);
    if words.is_empty() {
        out.push(Diagnostic::new("words", "must contain at least one word"));
    }
    check_all(words, "words", &mut out);
    check_word_order(words, "words", &mut out);
    check_all(chords, "chords", &mut out);
    check_all(notes, "notes", &mut out);
    check_all(segments, "segments", &mut out);
    alternative.check("alternative", &mut out);
    out
}

fn check_all<T: Validate>(items: &[T], name: &str, out: &mut Vec<Diagnostic>) {
    for (i, item) in items.iter().enumerate() {
        item.check(&format!("{name}[{i}]"), out);
    }
}

fn reject_invalid_value<T: Validate>(value: &T, path: &str) -> Result<(), EditError> {
    match value.diagnostics(path).into_iter().next() {
        Some(first) => Err(EditError::Invariant(first)),
        None => Ok(()),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn chord(symbol: &str, start: f64, end: f64) -> Chord {
        let parsed = crate::music::ChordSymbol::parse(symbol).unwrap();
        Chord {
            symbol: parsed.symbol,
            root: parsed.root,
            quality: parsed.quality,
            bass: parsed.bass,
            start,
            end,
            confidence: 0.8,
        }
    }

    pub(crate) fn segment(label: &str, start: f64, end: f64) -> Segment {
        Segment {
            kind: "verse".to_string(),
            label: label.to_string(),
            start,
            end,
            confidence: 0.9,
        }
    }

    pub(crate) fn sample_file() -> SongDataFile {
        SongDataFile {
            metadata: Metadata {
                version: "2.0.0".to_string(),
                created_at: "2024-08-15T14:30:00Z".to_string(),
                source_audio: "/music/test_song.wav".to_string(),
                processing_tool: Some("Test Tool".to_string()),
                confidence_threshold: Some(0.7),
            },
            words: vec![
                Word::new("Hello", 0.5, 0.8, 0.95).with_chord(chord("C", 0.0, 0.8).to_inline()),
                Word::new("world", 0.8, 1.2, 0.92).with_chord(chord("Am", 0.8, 1.2).to_inline()),
            ],
            chords: vec![chord("C", 0.0, 0.8), chord("Am", 0.8, 1.2)],
            notes: vec![Note {
                pitch_midi: 60,
                pitch_name: "C4".to_string(),
                start: 0.5,
                end: 0.8,
                velocity: 80,
                confidence: 0.85,
            }],
            segments: vec![segment("Verse 1", 0.5, 1.2)],
            alternative: AlternativeLayer::default(),
        }
    }

    pub(crate) fn sample_store() -> SongStore {
        SongStore::load(sample_file()).unwrap()
    }

    #[test]
    fn test_load_counts() {
        let store = sample_store();
        assert_eq!(store.words().len(), 2);
        assert_eq!(store.chords().len(), 2);
        assert_eq!(store.notes().len(), 1);
        assert_eq!(store.segments().len(), 1);
        assert_eq!(store.duration(), 1.2);
    }

    #[test]
    fn test_load_rejects_empty_words() {
        let mut file = sample_file();
        file.words.clear();
        let err = SongStore::load(file).unwrap_err();
        assert_eq!(err.diagnostics[0].field, "words");
    }

    #[test]
    fn test_load_collects_all_diagnostics() {
        let mut file = sample_file();
        file.words[0].end = 0.1;
        file.chords[1].confidence = 1.5;
        file.metadata.created_at = "not a date".to_string();
        let err = SongStore::load(file).unwrap_err();
        let fields: Vec<_> = err.diagnostics.iter().map(|d| d.field.as_str()).collect();
        assert_eq!(
            fields,
            vec!["metadata.created_at", "words[0].end", "chords[1].confidence"]
        );
    }

    #[test]
    fn test_serialize_round_trip() {
        let store = sample_store();
        assert_eq!(store.serialize(), sample_file());
        assert_eq!(SongStore::load(store.serialize()).unwrap(), store);
    }

    #[test]
    fn test_apply_edit_replaces() {
        let mut store = sample_store();
        let edited = Word::new("Hi", 0.5, 0.7, 1.0);
        store.apply_edit(0, Entity::Word(edited.clone())).unwrap();
        assert_eq!(store.words()[0], edited);
    }

    #[test]
    fn test_apply_edit_rejects_and_keeps_state() {
        let mut store = sample_store();
        let before = store.clone();

        let bad = Word::new("Hi", 0.9, 0.5, 1.0);
        let err = store.apply_edit(0, Entity::Word(bad)).unwrap_err();
        assert!(matches!(err, EditError::Invariant(ref d) if d.field == "words[0].end"));

        let out_of_order = Word::new("Hi", 1.0, 1.1, 1.0);
        let err = store.apply_edit(0, Entity::Word(out_of_order)).unwrap_err();
        assert!(matches!(err, EditError::OutOfOrder(_)));

        let err = store
            .apply_edit(5, Entity::Chord(chord("G", 0.0, 1.0)))
            .unwrap_err();
        assert_eq!(
            err,
            EditError::IndexOutOfRange {
                kind: EntityKind::Chord,
                index: 5,
                len: 2
            }
        );
        assert_eq!(store, before);
    }

    #[test]
    fn test_append_keeps_word_order() {
        let mut store = sample_store();
        let index = store
            .append(Entity::Word(Word::new("oh", 0.6, 0.7, 0.9)))
            .unwrap();
        assert_eq!(index, 1);
        let texts: Vec<_> = store.words().iter().map(|w| w.text.as_str()).collect();
        assert_eq!(texts, vec!["Hello", "oh", "world"]);
    }

    #[test]
    fn test_remove_last_word_rejected() {
        let mut store = sample_store();
        store.remove(EntityKind::Word, 0).unwrap();
        assert_eq!(store.remove(EntityKind::Word, 0), Err(EditError::EmptyWords));
        assert_eq!(store.words().len(), 1);
    }

    #[test]
    fn test_replace_chords_within() {
        let mut store = sample_store();
        let removed = store
            .replace_chords_within(0.0, 1.0, Some(chord("G", 0.0, 1.0)))
            .unwrap();
        // Am (0.8-1.2) straddles the span and survives
        assert_eq!(removed, 1);
        let symbols: Vec<_> = store.chords().iter().map(|c| c.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["G", "Am"]);
    }

    #[test]
    fn test_splice_words_checks_neighbours() {
        let mut store = sample_store();
        let before = store.clone();
        let err = store
            .splice_words(0..1, vec![Word::new("late", 2.0, 2.5, 0.5)])
            .unwrap_err();
        assert!(matches!(err, EditError::OutOfOrder(_)));
        assert_eq!(store, before);

        store
            .splice_words(0..1, vec![Word::new("a", 0.1, 0.2, 0.5), Word::new("b", 0.3, 0.4, 0.5)])
            .unwrap();
        assert_eq!(store.words().len(), 3);
        assert!(store.verify().is_ok());
    }

    #[test]
    fn test_set_alternative_validates() {
        let mut store = sample_store();
        let layer = AlternativeLayer {
            words: vec![Word::new("", 0.0, 1.0, 0.5)],
            chords: Vec::new(),
        };
        assert!(store.set_alternative(layer).is_err());
        assert!(store.alternative().is_empty());
    }
}
