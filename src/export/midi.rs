// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Standard MIDI file export.
//!
//! Writes a Type 1 file with exactly three tracks:
//! - Track 0: track name, tempo, time signature and one marker per segment
//! - Track 1: one lyric meta event per word, at the word's start
//! - Track 2: one note per chord, pitched from the chord root
//!
//! Seconds are mapped to ticks at a fixed tempo, so identical input
//! always yields identical bytes.

use std::io::{self, Write};
use std::path::Path;

use tracing::warn;

use crate::model::{SongStore, Timed};
use crate::music::{MidiNote, PitchClass, CHORD_ROOT_BASE};

use super::LayerSelection;

/// Default ticks per quarter note
pub const DEFAULT_PPQN: u16 = 480;
/// Default tempo in BPM
pub const DEFAULT_TEMPO: f64 = 120.0;
/// Default velocity of chord notes
pub const DEFAULT_CHORD_VELOCITY: u8 = 80;

// Ordering of events sharing a tick
const ORDER_META: u8 = 0;
const ORDER_NOTE_OFF: u8 = 1;
const ORDER_NOTE_ON: u8 = 2;

/// MIDI event for export
#[derive(Debug, Clone, PartialEq)]
struct MidiExportEvent {
    /// Absolute tick
    tick: u64,
    /// Tie-break within a tick
    order: u8,
    /// Event data
    data: Vec<u8>,
}

impl MidiExportEvent {
    fn note_on(tick: u64, channel: u8, note: u8, velocity: u8) -> Self {
        Self {
            tick,
            order: ORDER_NOTE_ON,
            data: vec![0x90 | (channel & 0x0F), note & 0x7F, velocity & 0x7F],
        }
    }

    fn note_off(tick: u64, channel: u8, note: u8) -> Self {
        Self {
            tick,
            order: ORDER_NOTE_OFF,
            data: vec![0x80 | (channel & 0x0F), note & 0x7F, 0],
        }
    }

    fn tempo(tick: u64, bpm: f64) -> Self {
        let microseconds = (60_000_000.0 / bpm) as u32;
        Self {
            tick,
            order: ORDER_META,
            data: vec![
                0xFF,
                0x51,
                0x03,
                ((microseconds >> 16) & 0xFF) as u8,
                ((microseconds >> 8) & 0xFF) as u8,
                (microseconds & 0xFF) as u8,
            ],
        }
    }

    fn time_signature(tick: u64, numerator: u8, denominator: u8) -> Self {
        // Denominator is expressed as power of 2
        let denom_power = (denominator as f64).log2() as u8;
        Self {
            tick,
            order: ORDER_META,
            data: vec![
                0xFF, 0x58, 0x04,
                numerator,
                denom_power,
                24, // MIDI clocks per metronome click
                8,  // 32nd notes per MIDI quarter note
            ],
        }
    }

    /// Text-like meta event (FF `kind` len text)
    fn text(tick: u64, kind: u8, text: &str) -> Self {
        let bytes = text.as_bytes();
        let mut data = vec![0xFF, kind];
        push_variable_length(&mut data, bytes.len() as u32);
        data.extend_from_slice(bytes);
        Self {
            tick,
            order: ORDER_META,
            data,
        }
    }

    fn track_name(tick: u64, name: &str) -> Self {
        Self::text(tick, 0x03, name)
    }

    fn lyric(tick: u64, text: &str) -> Self {
        Self::text(tick, 0x05, text)
    }

    fn marker(tick: u64, label: &str) -> Self {
        Self::text(tick, 0x06, label)
    }
}

/// Three-track MIDI encoder for a song store
#[derive(Debug, Clone)]
pub struct MidiEncoder {
    /// PPQN (ticks per quarter note)
    ppqn: u16,
    /// Tempo in BPM
    tempo: f64,
    /// Time signature
    time_sig: (u8, u8),
    /// Velocity of chord notes
    chord_velocity: u8,
    /// MIDI number of C in the chord-root octave
    chord_octave_base: MidiNote,
    /// Channel for chord notes
    channel: u8,
}

impl MidiEncoder {
    pub fn new() -> Self {
        Self {
            ppqn: DEFAULT_PPQN,
            tempo: DEFAULT_TEMPO,
            time_sig: (4, 4),
            chord_velocity: DEFAULT_CHORD_VELOCITY,
            chord_octave_base: CHORD_ROOT_BASE,
            channel: 0,
        }
    }

    /// Set PPQN
    pub fn set_ppqn(&mut self, ppqn: u16) {
        self.ppqn = ppqn.max(1);
    }

    /// Get PPQN
    pub fn ppqn(&self) -> u16 {
        self.ppqn
    }

    /// Set tempo
    pub fn set_tempo(&mut self, bpm: f64) {
        self.tempo = bpm.clamp(20.0, 300.0);
    }

    /// Get tempo
    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    /// Set time signature
    pub fn set_time_signature(&mut self, numerator: u8, denominator: u8) {
        self.time_sig = (numerator.max(1), denominator.max(1));
    }

    pub fn set_chord_velocity(&mut self, velocity: u8) {
        self.chord_velocity = velocity.clamp(1, 127);
    }

    pub fn chord_velocity(&self) -> u8 {
        self.chord_velocity
    }

    /// Set the C that anchors chord roots (C=base … B=base+11)
    pub fn set_chord_octave_base(&mut self, base: MidiNote) {
        self.chord_octave_base = base.min(116);
    }

    /// Convert seconds to ticks at the encoder's tempo
    pub fn seconds_to_ticks(&self, seconds: f64) -> u64 {
        (seconds.max(0.0) * self.tempo / 60.0 * self.ppqn as f64).round() as u64
    }

    /// MIDI pitch for a chord root name, if it is one
    pub fn root_pitch(&self, root: &str) -> Option<MidiNote> {
        PitchClass::parse(root).map(|pc| pc.midi_in_octave(self.chord_octave_base))
    }

    /// Encode to bytes
    pub fn encode(&self, store: &SongStore, layers: LayerSelection) -> Vec<u8> {
        let mut buffer = Vec::new();
        // Writing into a Vec cannot fail
        let _ = self.write(store, layers, &mut buffer);
        buffer
    }

    /// Encode to a file
    pub fn export<P: AsRef<Path>>(
        &self,
        store: &SongStore,
        layers: LayerSelection,
        path: P,
    ) -> io::Result<()> {
        let bytes = self.encode(store, layers);
        std::fs::write(path, bytes)
    }

    /// Write MIDI data to writer
    pub fn write<W: Write>(
        &self,
        store: &SongStore,
        layers: LayerSelection,
        writer: &mut W,
    ) -> io::Result<()> {
        let tracks = [
            self.conductor_track(store),
            self.lyrics_track(store, layers),
            self.chord_track(store, layers),
        ];

        self.write_header(writer, 1, tracks.len() as u16)?;
        for events in &tracks {
            self.write_track(writer, events)?;
        }
        Ok(())
    }

    /// Track 0: name, tempo, time signature, segment markers
    fn conductor_track(&self, store: &SongStore) -> Vec<MidiExportEvent> {
        let name = Path::new(&store.metadata().source_audio)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();

        let mut events = vec![
            MidiExportEvent::track_name(0, &name),
            MidiExportEvent::tempo(0, self.tempo),
            MidiExportEvent::time_signature(0, self.time_sig.0, self.time_sig.1),
        ];
        for segment in store.segments() {
            events.push(MidiExportEvent::marker(
                self.seconds_to_ticks(segment.start),
                &segment.label,
            ));
        }
        sort_events(&mut events);
        events
    }

    /// Track 1: one lyric event per word
    fn lyrics_track(&self, store: &SongStore, layers: LayerSelection) -> Vec<MidiExportEvent> {
        let mut events = vec![MidiExportEvent::track_name(0, "Lyrics")];
        for word in store.words_of(layers.lyrics) {
            events.push(MidiExportEvent::lyric(self.seconds_to_ticks(word.start), &word.text));
        }
        sort_events(&mut events);
        events
    }

    /// Track 2: one note per chord spanning the chord
    fn chord_track(&self, store: &SongStore, layers: LayerSelection) -> Vec<MidiExportEvent> {
        let mut events = vec![MidiExportEvent::track_name(0, "Chords")];
        for chord in store.chords_of(layers.chords) {
            let Some(pitch) = self.root_pitch(&chord.root) else {
                warn!("Skipping chord {:?}: unknown root {:?}", chord.symbol, chord.root);
                continue;
            };
            let start = self.seconds_to_ticks(chord.start());
            let end = self.seconds_to_ticks(chord.end()).max(start + 1);
            events.push(MidiExportEvent::note_on(start, self.channel, pitch, self.chord_velocity));
            events.push(MidiExportEvent::note_off(end, self.channel, pitch));
        }
        sort_events(&mut events);
        events
    }

    /// Write MIDI file header chunk
    fn write_header<W: Write>(&self, writer: &mut W, format: u16, num_tracks: u16) -> io::Result<()> {
        // MThd
        writer.write_all(b"MThd")?;
        // Chunk length (always 6)
        writer.write_all(&[0, 0, 0, 6])?;
        // Format type
        writer.write_all(&format.to_be_bytes())?;
        // Number of tracks
        writer.write_all(&num_tracks.to_be_bytes())?;
        // PPQN
        writer.write_all(&self.ppqn.to_be_bytes())?;
        Ok(())
    }

    /// Write a track chunk
    fn write_track<W: Write>(&self, writer: &mut W, events: &[MidiExportEvent]) -> io::Result<()> {
        let mut track_data = Vec::new();
        let mut last_tick = 0u64;

        for event in events {
            let delta = event.tick.saturating_sub(last_tick);
            push_variable_length(&mut track_data, delta.min(0x0FFF_FFFF) as u32);
            track_data.extend_from_slice(&event.data);
            last_tick = event.tick;
        }

        // End of track
        push_variable_length(&mut track_data, 0);
        track_data.extend_from_slice(&[0xFF, 0x2F, 0x00]);

        // MTrk
        writer.write_all(b"MTrk")?;
        // Track length
        let length = track_data.len() as u32;
        writer.write_all(&length.to_be_bytes())?;
        // Track data
        writer.write_all(&track_data)?;

        Ok(())
    }
}

impl Default for MidiEncoder {
    fn default() -> Self {
        Self::new()
    }
}

/// Stable sort by tick, metas before note-offs before note-ons
fn sort_events(events: &mut [MidiExportEvent]) {
    events.sort_by_key(|e| (e.tick, e.order));
}

/// Append a variable-length quantity
fn push_variable_length(out: &mut Vec<u8>, mut value: u32) {
    let mut bytes = Vec::with_capacity(4);

    bytes.push((value & 0x7F) as u8);
    value >>= 7;

    while value > 0 {
        bytes.push((value & 0x7F) as u8 | 0x80);
        value >>= 7;
    }

    bytes.reverse();
    out.extend_from_slice(&bytes);
}
