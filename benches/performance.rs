// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Performance benchmarks for songsync
//!
//! Run with: cargo bench
//!
//! These benchmarks measure:
//! - Block segmentation over long songs
//! - Block edits through the synchronizer
//! - ChordPro and MIDI encoding
//! - Song data parsing and validation

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use songsync::export::{chordpro, MidiEncoder};
use songsync::import::parse_song_data;
use songsync::model::{Chord, Metadata, SongDataFile, Word};
use songsync::{segment, LayerSelection, SongStore, Synchronizer};

const ROOTS: [&str; 7] = ["C", "D", "E", "F", "G", "A", "B"];

/// Song with `words` words, two per second, and a chord every 4 s
fn song(words: usize) -> SongStore {
    let duration = words as f64 * 0.5;
    let file = SongDataFile {
        metadata: Metadata::new("bench.wav", "bench"),
        words: (0..words)
            .map(|i| {
                let start = i as f64 * 0.5;
                Word::new(format!("word{i}"), start, start + 0.4, 0.9)
            })
            .collect(),
        chords: (0..(duration / 4.0).ceil() as usize)
            .map(|i| {
                let root = ROOTS[i % ROOTS.len()];
                Chord {
                    symbol: root.to_string(),
                    root: root.to_string(),
                    quality: "maj".to_string(),
                    bass: None,
                    start: i as f64 * 4.0,
                    end: (i as f64 + 1.0) * 4.0,
                    confidence: 0.8,
                }
            })
            .collect(),
        notes: Vec::new(),
        segments: Vec::new(),
        alternative: Default::default(),
    };
    SongStore::load(file).expect("bench song is valid")
}

/// Benchmark block segmentation (recomputed after every edit)
fn bench_segmentation(c: &mut Criterion) {
    let mut group = c.benchmark_group("segmentation");

    for size in [100, 1000, 10000].iter() {
        let store = song(*size);
        group.bench_with_input(BenchmarkId::new("segment", size), &store, |b, store| {
            b.iter(|| black_box(segment(black_box(store), 20.0)))
        });
    }

    group.finish();
}

/// Benchmark a block chord edit followed by a block refresh
fn bench_block_edit(c: &mut Criterion) {
    let store = song(1000);

    c.bench_function("block_chord_edit", |b| {
        b.iter_batched(
            || Synchronizer::new(store.clone()),
            |mut sync| {
                sync.block_chord_edit(3, "Am7").expect("edit applies");
                black_box(sync.blocks().len())
            },
            criterion::BatchSize::SmallInput,
        )
    });
}

/// Benchmark the encoders
fn bench_export(c: &mut Criterion) {
    let mut group = c.benchmark_group("export");
    let encoder = MidiEncoder::new();

    for size in [100, 1000, 10000].iter() {
        let store = song(*size);
        group.bench_with_input(BenchmarkId::new("midi", size), &store, |b, store| {
            b.iter(|| black_box(encoder.encode(store, LayerSelection::default())))
        });
        group.bench_with_input(BenchmarkId::new("chordpro", size), &store, |b, store| {
            b.iter(|| black_box(chordpro::encode(store, LayerSelection::default())))
        });
    }

    group.finish();
}

/// Benchmark parsing and validating song data JSON
fn bench_parse(c: &mut Criterion) {
    let json = song(1000)
        .serialize()
        .to_json()
        .expect("bench song serializes");

    c.bench_function("parse_song_data_1000", |b| {
        b.iter(|| black_box(parse_song_data(black_box(&json)).is_ok()))
    });
}

criterion_group!(
    benches,
    bench_segmentation,
    bench_block_edit,
    bench_export,
    bench_parse,
);

criterion_main!(benches);
