// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Integration tests for songsync
//!
//! These tests drive import, editing, export and preview together through
//! the public API.

use std::fs;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use songsync::audio::{AudioBackend, PlaybackEvent, SegmentPlayer};
use songsync::export::{chordpro, MidiEncoder};
use songsync::import::{parse_song_data, ImportOutcome, SongDataImporter};
use songsync::model::{Entity, EntityKind, Word};
use songsync::pipeline::CancelToken;
use songsync::{
    EditError, LayerSelection, PlaybackError, Session, SessionEvent, Settings, SongStore,
    Synchronizer,
};
use tempfile::tempdir;

const SAMPLE: &str = r#"{
  "metadata": {
    "version": "2.0.0",
    "created_at": "2024-08-15T14:30:00Z",
    "source_audio": "/path/to/test_song.wav",
    "processing_tool": "Test Tool",
    "confidence_threshold": 0.7
  },
  "words": [
    {"text": "Hello", "start": 0.5, "end": 0.8, "confidence": 0.95,
     "chord": {"symbol": "C", "root": "C", "quality": "maj", "bass": null, "confidence": 0.88}},
    {"text": "world", "start": 0.8, "end": 1.2, "confidence": 0.92,
     "chord": {"symbol": "Am", "root": "A", "quality": "min", "bass": null, "confidence": 0.85}}
  ],
  "chords": [
    {"symbol": "C", "root": "C", "quality": "maj", "bass": null, "start": 0.0, "end": 0.8, "confidence": 0.88},
    {"symbol": "Am", "root": "A", "quality": "min", "bass": null, "start": 0.8, "end": 1.2, "confidence": 0.85}
  ],
  "notes": [
    {"pitch_midi": 60, "pitch_name": "C4", "start": 0.5, "end": 0.8, "velocity": 80, "confidence": 0.85}
  ],
  "segments": [
    {"type": "verse", "label": "Verse 1", "start": 0.5, "end": 1.2, "confidence": 0.92}
  ]
}"#;

/// 45 s song: one word every 5 s, no inline chords
fn long_song_json() -> String {
    let words: Vec<String> = (0..9)
        .map(|i| {
            let start = i as f64 * 5.0;
            format!(
                r#"{{"text": "w{}", "start": {:.1}, "end": {:.1}, "confidence": 0.9}}"#,
                i,
                start,
                start + 5.0
            )
        })
        .collect();
    let chord = |symbol: &str, root: &str, quality: &str, start: f64, end: f64| {
        format!(
            r#"{{"symbol": "{symbol}", "root": "{root}", "quality": "{quality}", "start": {start:.1}, "end": {end:.1}, "confidence": 0.8}}"#
        )
    };
    let chords = [
        chord("C", "C", "maj", 0.0, 10.0),
        chord("G", "G", "maj", 10.0, 20.0),
        chord("Am", "A", "min", 15.0, 25.0),
        chord("F", "F", "maj", 30.0, 45.0),
    ];
    format!(
        r#"{{
  "metadata": {{"version": "2.0.0", "created_at": "2024-08-15T14:30:00Z", "source_audio": "long.wav"}},
  "words": [{}],
  "chords": [{}]
}}"#,
        words.join(",\n"),
        chords.join(",\n")
    )
}

fn load(json: &str) -> SongStore {
    SongStore::load(parse_song_data(json).unwrap()).unwrap()
}

/// Decode one MTrk payload into (absolute tick, event bytes)
fn decode_track(data: &[u8]) -> Vec<(u64, Vec<u8>)> {
    fn vlq(data: &[u8], pos: &mut usize) -> u64 {
        let mut value = 0u64;
        loop {
            let byte = data[*pos];
            *pos += 1;
            value = (value << 7) | (byte & 0x7F) as u64;
            if byte & 0x80 == 0 {
                return value;
            }
        }
    }

    let mut events = Vec::new();
    let mut pos = 0;
    let mut tick = 0;
    while pos < data.len() {
        tick += vlq(data, &mut pos);
        let start = pos;
        if data[pos] == 0xFF {
            pos += 2;
            let len = vlq(data, &mut pos) as usize;
            pos += len;
        } else {
            pos += 3;
        }
        events.push((tick, data[start..pos].to_vec()));
    }
    events
}

fn split_tracks(bytes: &[u8]) -> Vec<Vec<(u64, Vec<u8>)>> {
    let mut tracks = Vec::new();
    let mut pos = 14;
    while pos < bytes.len() {
        assert_eq!(&bytes[pos..pos + 4], b"MTrk");
        let len = u32::from_be_bytes([bytes[pos + 4], bytes[pos + 5], bytes[pos + 6], bytes[pos + 7]])
            as usize;
        tracks.push(decode_track(&bytes[pos + 8..pos + 8 + len]));
        pos += 8 + len;
    }
    tracks
}

/// Note-on (tick, pitch) pairs of a decoded track
fn note_ons(track: &[(u64, Vec<u8>)]) -> Vec<(u64, u8)> {
    track
        .iter()
        .filter(|(_, data)| data[0] & 0xF0 == 0x90)
        .map(|(tick, data)| (*tick, data[1]))
        .collect()
}

#[test]
fn test_import_sample_counts() {
    let dir = tempdir().unwrap();
    let audio = dir.path().join("test_song.wav");
    fs::write(dir.path().join("test_song.song_data"), SAMPLE).unwrap();

    let outcome = SongDataImporter::new().import_for_audio(&audio);
    let store = outcome.into_store().expect("sample should import");
    assert_eq!(store.words().len(), 2);
    assert_eq!(store.chords().len(), 2);
    assert_eq!(store.notes().len(), 1);
    assert_eq!(store.segments().len(), 1);
}

#[test]
fn test_probe_finds_song_data_extension() {
    let dir = tempdir().unwrap();
    let audio = dir.path().join("song.mp3");
    fs::write(dir.path().join("song.song_data"), SAMPLE).unwrap();

    let importer = SongDataImporter::new();
    assert_eq!(
        importer.find_song_data_file(&audio),
        Some(dir.path().join("song.song_data"))
    );
    assert!(importer.import_for_audio(&audio).is_loaded());
}

#[test]
fn test_missing_song_data_is_fallback() {
    let dir = tempdir().unwrap();
    let outcome = SongDataImporter::new().import_for_audio(&dir.path().join("song.wav"));
    assert!(matches!(outcome, ImportOutcome::Fallback));
}

#[test]
fn test_invalid_song_data_lists_problems() {
    let dir = tempdir().unwrap();
    let audio = dir.path().join("song.wav");
    let bad = SAMPLE
        .replace(r#""start": 0.8, "end": 1.2, "confidence": 0.92,"#, r#""start": 0.8, "end": 0.1, "confidence": 0.92,"#)
        .replace(r#""velocity": 80"#, r#""velocity": 300"#);
    fs::write(dir.path().join("song.json"), bad).unwrap();

    match SongDataImporter::new().import_for_audio(&audio) {
        ImportOutcome::Invalid(err) => {
            assert!(err.diagnostics.len() >= 2);
            assert_eq!(err.path, Some(dir.path().join("song.json")));
        }
        other => panic!("expected Invalid, got {:?}", other),
    }
}

#[test]
fn test_round_trip_is_stable() {
    let store = load(SAMPLE);
    let json = store.serialize().to_json().unwrap();
    let again = load(&json);
    assert_eq!(again.serialize(), store.serialize());
    assert_eq!(again.serialize().to_json().unwrap(), json);
}

#[test]
fn test_45_second_song_has_three_blocks() {
    let mut sync = Synchronizer::new(load(&long_song_json()));
    let blocks = sync.blocks().to_vec();
    assert_eq!(blocks.len(), 3);
    assert_eq!((blocks[2].start, blocks[2].end), (40.0, 45.0));
    assert_eq!(blocks[0].text, "w0 w1 w2 w3");
    assert_eq!(blocks[1].text, "w4 w5 w6 w7");
    assert_eq!(blocks[2].text, "w8");

    let store = sync.store().clone();
    let symbols: Vec<_> = blocks
        .iter()
        .map(|b| b.chord_symbol(&store, songsync::Layer::Primary).to_string())
        .collect();
    // Block 0: C and G tie at 10 s, C starts first
    assert_eq!(symbols, vec!["C", "F", "F"]);
}

#[test]
fn test_block_chord_edit_flows_into_exports() {
    let mut sync = Synchronizer::new(load(&long_song_json()));
    sync.block_chord_edit(0, "D").unwrap();

    let store = sync.store();
    let symbols: Vec<_> = store.chords().iter().map(|c| c.symbol.as_str()).collect();
    assert_eq!(symbols, vec!["D", "Am", "F"]);

    assert_eq!(
        chordpro::encode(store, LayerSelection::default()),
        "[D]w0 w1 w2 w3 w4 w5 w6 w7 w8\n"
    );

    let bytes = MidiEncoder::new().encode(store, LayerSelection::default());
    let tracks = split_tracks(&bytes);
    assert_eq!(tracks.len(), 3);
    assert_eq!(
        note_ons(&tracks[2]),
        vec![(0, 62), (14_400, 69), (28_800, 65)]
    );
}

#[test]
fn test_midi_lyrics_and_markers() {
    let store = load(SAMPLE);
    let bytes = MidiEncoder::new().encode(&store, LayerSelection::default());
    assert_eq!(&bytes[8..14], &[0, 1, 0, 3, 0x01, 0xE0]);

    let tracks = split_tracks(&bytes);
    let lyrics: Vec<_> = tracks[1]
        .iter()
        .filter(|(_, d)| d[0] == 0xFF && d[1] == 0x05)
        .map(|(tick, d)| (*tick, String::from_utf8(d[3..].to_vec()).unwrap()))
        .collect();
    assert_eq!(lyrics, vec![(480, "Hello".to_string()), (768, "world".to_string())]);

    let markers: Vec<_> = tracks[0]
        .iter()
        .filter(|(_, d)| d[0] == 0xFF && d[1] == 0x06)
        .map(|(tick, _)| *tick)
        .collect();
    assert_eq!(markers, vec![480]);
}

#[test]
fn test_rejected_edits_leave_store_unchanged() {
    let mut sync = Synchronizer::new(load(SAMPLE));
    let before = sync.store().serialize();

    let backwards = Word::new("Hi", 0.8, 0.5, 0.9);
    assert!(matches!(
        sync.table_edit(0, Entity::Word(backwards)),
        Err(EditError::Invariant(_))
    ));
    let empty = Word::new("", 0.5, 0.8, 0.9);
    assert!(sync.table_edit(0, Entity::Word(empty)).is_err());
    assert!(matches!(
        sync.table_remove(EntityKind::Note, 4),
        Err(EditError::IndexOutOfRange { .. })
    ));
    assert!(sync.block_chord_edit(0, "not a chord").is_err());

    assert_eq!(sync.store().serialize(), before);
    assert_eq!(sync.revision(), 0);
}

#[test]
fn test_block_lyrics_edit_marks_words_approximate() {
    let mut sync = Synchronizer::new(load(&long_song_json()));
    sync.block_lyrics_edit(1, "new words here").unwrap();

    let blocks = sync.blocks().to_vec();
    assert_eq!(blocks[1].text, "new words here");
    let store = sync.store();
    for word in blocks[1].words_in(store) {
        assert!(word.timing_approximate);
        assert_eq!(word.confidence, 0.5);
    }
    assert_eq!(blocks[0].text, "w0 w1 w2 w3");
}

/// Backend that tracks how many clips play at once
#[derive(Default)]
struct CountingBackend {
    active: AtomicUsize,
    max_active: AtomicUsize,
}

impl AudioBackend for CountingBackend {
    fn play_clip(
        &self,
        _path: &Path,
        _start: f64,
        duration: f64,
        cancel: &CancelToken,
    ) -> Result<(), PlaybackError> {
        let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(now, Ordering::SeqCst);
        let mut waited = 0.0;
        while waited < duration * 10.0 && !cancel.is_cancelled() {
            std::thread::sleep(Duration::from_millis(1));
            waited += 1.0;
        }
        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }
}

#[test]
fn test_block_previews_never_overlap() {
    let dir = tempdir().unwrap();
    let audio = dir.path().join("long.wav");
    fs::write(dir.path().join("long.song_data"), long_song_json()).unwrap();

    let backend = Arc::new(CountingBackend::default());
    let mut session = Session::with_player(
        Settings::default(),
        SegmentPlayer::with_backend(backend.clone()),
    );
    let events = session.open(&audio);
    assert!(matches!(events.as_slice(), [SessionEvent::Loaded(_)]));

    session.play_block(0).unwrap();
    session.play_block(1).unwrap();
    let last = session.play_block(2).unwrap();
    assert_eq!(session.play_block(3), Err(PlaybackError::NoBlock(3)));

    let mut finished = false;
    for _ in 0..500 {
        for event in session.poll() {
            if let SessionEvent::Playback(PlaybackEvent::Finished(id)) = event {
                finished |= id == last;
            }
        }
        if finished {
            break;
        }
        std::thread::sleep(Duration::from_millis(10));
    }
    assert!(finished);
    assert_eq!(backend.max_active.load(Ordering::SeqCst), 1);
}

#[test]
fn test_session_exports() {
    let dir = tempdir().unwrap();
    let audio = dir.path().join("test_song.wav");
    fs::write(dir.path().join("test_song.json"), SAMPLE).unwrap();

    let mut session = Session::with_player(
        Settings::default(),
        SegmentPlayer::with_backend(Arc::new(CountingBackend::default())),
    );
    session.open(&audio);

    let cho = dir.path().join("out.cho");
    session.export_chordpro(LayerSelection::default(), &cho).unwrap();
    assert_eq!(fs::read_to_string(&cho).unwrap(), "[C]Hello [Am]world\n");

    let mid = dir.path().join("out.mid");
    session.export_midi(LayerSelection::default(), &mid).unwrap();
    assert_eq!(&fs::read(&mid).unwrap()[0..4], b"MThd");

    let data = session.export_song_data(None).unwrap();
    assert_eq!(data, dir.path().join("test_song.song_data"));
    let reparsed = parse_song_data(&fs::read_to_string(&data).unwrap()).unwrap();
    assert_eq!(reparsed.words.len(), 2);
}
