// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Decoding of a time window from any supported audio file.
//!
//! Files are probed by content (the extension is only a hint), so MP3,
//! FLAC, AAC/M4A, Vorbis, AIFF and WAV all decode the same way. Output is
//! always interleaved stereo f32: mono is duplicated and wider layouts are
//! averaged down to two channels.

use std::fs::File;
use std::path::Path;

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{Decoder, DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::{FormatOptions, FormatReader, SeekMode, SeekTo};
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use symphonia::core::units::{Time, TimeBase};
use tracing::{debug, warn};

use crate::error::PlaybackError;

/// Channel count of every decoded clip
pub const OUTPUT_CHANNELS: u16 = 2;

/// Decoded interleaved samples of one audio window
#[derive(Debug, Clone, PartialEq)]
pub struct AudioClip {
    /// Interleaved samples in [-1, 1]
    pub samples: Vec<f32>,
    pub channels: u16,
    pub sample_rate: u32,
}

impl AudioClip {
    /// Number of frames (samples per channel)
    pub fn frames(&self) -> usize {
        self.samples.len() / self.channels.max(1) as usize
    }

    /// Length in seconds
    pub fn duration(&self) -> f64 {
        self.frames() as f64 / self.sample_rate.max(1) as f64
    }

    /// Same audio laid out for `channels` outputs
    ///
    /// Mono averages every input channel; wider layouts keep the first
    /// channels and leave the rest silent.
    pub fn remix(&self, channels: u16) -> AudioClip {
        let from = self.channels.max(1) as usize;
        let to = channels.max(1) as usize;
        if from == to {
            return self.clone();
        }

        let mut samples = Vec::with_capacity(self.frames() * to);
        for frame in self.samples.chunks_exact(from) {
            if to == 1 {
                samples.push(frame.iter().sum::<f32>() / from as f32);
            } else {
                samples.extend((0..to).map(|ch| frame.get(ch).copied().unwrap_or(0.0)));
            }
        }
        AudioClip {
            samples,
            channels: to as u16,
            sample_rate: self.sample_rate,
        }
    }
}

/// Open container and decoder for the default audio track
struct Source {
    format: Box<dyn FormatReader>,
    decoder: Box<dyn Decoder>,
    track_id: u32,
    sample_rate: u32,
    time_base: Option<TimeBase>,
    n_frames: Option<u64>,
}

impl Source {
    fn open(path: &Path) -> Result<Self, PlaybackError> {
        let file = File::open(path).map_err(|e| open_error(path, e))?;
        let mss = MediaSourceStream::new(Box::new(file), Default::default());

        let mut hint = Hint::new();
        if let Some(extension) = path.extension().and_then(|e| e.to_str()) {
            hint.with_extension(extension);
        }

        let probed = symphonia::default::get_probe()
            .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
            .map_err(|e| PlaybackError::Unsupported(format!("{}: {}", path.display(), e)))?;
        let format = probed.format;

        let track = format
            .tracks()
            .iter()
            .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
            .ok_or_else(|| PlaybackError::Unsupported(format!("{}: no audio track", path.display())))?;
        let params = track.codec_params.clone();
        let track_id = track.id;
        let sample_rate = params
            .sample_rate
            .filter(|rate| *rate > 0)
            .ok_or_else(|| PlaybackError::Unsupported(format!("{}: unknown sample rate", path.display())))?;

        let decoder = symphonia::default::get_codecs()
            .make(&params, &DecoderOptions::default())
            .map_err(|e| PlaybackError::Unsupported(format!("{}: {}", path.display(), e)))?;

        Ok(Self {
            format,
            decoder,
            track_id,
            sample_rate,
            time_base: params.time_base,
            n_frames: params.n_frames,
        })
    }

    /// Frame index of a timestamp in the track's time base
    fn frame_at(&self, ts: u64) -> u64 {
        match self.time_base {
            Some(base) => {
                let time = base.calc_time(ts);
                ((time.seconds as f64 + time.frac) * self.sample_rate as f64).round() as u64
            }
            None => ts,
        }
    }

    fn total_seconds(&self) -> Option<f64> {
        self.n_frames
            .map(|frames| frames as f64 / self.sample_rate as f64)
    }
}

/// Total length of an audio file in seconds
pub fn audio_duration(path: &Path) -> Result<f64, PlaybackError> {
    let mut source = Source::open(path)?;
    if let Some(seconds) = source.total_seconds() {
        return Ok(seconds);
    }

    // No frame count in the header; walk the packets
    let mut end: u64 = 0;
    loop {
        let packet = match source.format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(open_error(path, e)),
        };
        if packet.track_id() == source.track_id {
            end = end.max(source.frame_at(packet.ts() + packet.dur()));
        }
    }
    Ok(end as f64 / source.sample_rate as f64)
}

/// Decode `duration` seconds starting at `start` as interleaved stereo
///
/// The window is clipped to the end of the file. A start at or past the
/// end is `OutOfRange`.
pub fn read_slice(path: &Path, start: f64, duration: f64) -> Result<AudioClip, PlaybackError> {
    let mut source = Source::open(path)?;
    let rate = source.sample_rate as f64;
    let out_of_range = |total: f64| PlaybackError::OutOfRange {
        start,
        duration: total,
    };

    if !(start.is_finite() && start >= 0.0) {
        return Err(out_of_range(source.total_seconds().unwrap_or(0.0)));
    }
    if let Some(total) = source.total_seconds() {
        if start >= total {
            return Err(out_of_range(total));
        }
    }

    let first = (start * rate).floor() as u64;
    let last = first + (duration.max(0.0) * rate).round() as u64;
    if last == first {
        return Ok(AudioClip {
            samples: Vec::new(),
            channels: OUTPUT_CHANNELS,
            sample_rate: source.sample_rate,
        });
    }

    if first > 0 {
        let seek = SeekTo::Time {
            time: Time::from(start),
            track_id: Some(source.track_id),
        };
        match source.format.seek(SeekMode::Accurate, seek) {
            Ok(seeked) => {
                source.decoder.reset();
                debug!("Seeked {:?} to ts {}", path, seeked.actual_ts);
            }
            // Frames before the window are dropped below
            Err(e) => warn!("Seek failed in {:?}, decoding from the start: {}", path, e),
        }
    }

    let mut samples = Vec::new();
    let mut decoded_end: u64 = 0;
    loop {
        let packet = match source.format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(e)) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
            Err(e) => return Err(open_error(path, e)),
        };
        if packet.track_id() != source.track_id {
            continue;
        }

        let packet_start = source.frame_at(packet.ts());
        if packet_start >= last {
            break;
        }

        let decoded = match source.decoder.decode(&packet) {
            Ok(decoded) => decoded,
            Err(SymphoniaError::DecodeError(e)) => {
                warn!("Skipping undecodable packet in {:?}: {}", path, e);
                continue;
            }
            Err(e) => return Err(open_error(path, e)),
        };

        let channels = decoded.spec().channels.count();
        let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, *decoded.spec());
        buffer.copy_interleaved_ref(decoded);
        let stereo = to_stereo(buffer.samples(), channels);

        let frames = stereo.len() / 2;
        decoded_end = decoded_end.max(packet_start + frames as u64);
        let lo = first.saturating_sub(packet_start).min(frames as u64) as usize;
        let hi = last.saturating_sub(packet_start).min(frames as u64) as usize;
        if lo < hi {
            samples.extend_from_slice(&stereo[lo * 2..hi * 2]);
        }
    }

    if first >= decoded_end && samples.is_empty() {
        return Err(out_of_range(decoded_end as f64 / rate));
    }

    Ok(AudioClip {
        samples,
        channels: OUTPUT_CHANNELS,
        sample_rate: source.sample_rate,
    })
}

/// Interleaved stereo from `channels` interleaved channels
///
/// Mono is duplicated. Wider layouts average even channels into the left
/// side and odd channels into the right.
pub fn to_stereo(interleaved: &[f32], channels: usize) -> Vec<f32> {
    match channels {
        0 => Vec::new(),
        1 => interleaved.iter().flat_map(|&s| [s, s]).collect(),
        2 => interleaved.to_vec(),
        n => {
            let left_count = n.div_ceil(2) as f32;
            let right_count = (n / 2) as f32;
            let mut stereo = Vec::with_capacity(interleaved.len() / n * 2);
            for frame in interleaved.chunks_exact(n) {
                let left: f32 = frame.iter().step_by(2).sum();
                let right: f32 = frame.iter().skip(1).step_by(2).sum();
                stereo.push(left / left_count);
                stereo.push(right / right_count);
            }
            stereo
        }
    }
}

fn open_error(path: &Path, err: impl std::fmt::Display) -> PlaybackError {
    PlaybackError::Open {
        path: path.to_path_buf(),
        reason: err.to_string(),
    }
}
