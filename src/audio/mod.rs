// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Audio preview of song windows.
//!
//! This module provides:
//! - Window decoding of any supported format via symphonia
//! - Resampling to the output device rate via rubato
//! - Audio output via cpal
//! - The segment player, which previews one window at a time

pub mod decode;
pub mod output;
pub mod player;
pub mod resample;

pub use decode::{audio_duration, read_slice, AudioClip};
pub use output::{negotiate, AudioConfig, AudioOutput};
pub use player::{PlaybackEvent, SegmentPlayer};

use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::error::PlaybackError;
use crate::pipeline::CancelToken;

/// Plays a window of an audio file to completion or cancellation
pub trait AudioBackend: Send + Sync {
    /// Block until `duration` seconds from `start` have played, or `cancel`
    /// is set. All device resources are released before returning.
    fn play_clip(
        &self,
        path: &Path,
        start: f64,
        duration: f64,
        cancel: &CancelToken,
    ) -> Result<(), PlaybackError>;
}

/// Default backend: symphonia decoding into a cpal stream
#[derive(Debug, Clone, Default)]
pub struct CpalBackend {
    buffer_size: Option<u32>,
}

impl CpalBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use a fixed device buffer instead of the device default
    pub fn with_buffer_size(frames: u32) -> Self {
        Self {
            buffer_size: Some(frames.clamp(64, 4096)),
        }
    }
}

impl AudioBackend for CpalBackend {
    fn play_clip(
        &self,
        path: &Path,
        start: f64,
        duration: f64,
        cancel: &CancelToken,
    ) -> Result<(), PlaybackError> {
        let clip = read_slice(path, start, duration)?;
        if clip.samples.is_empty() {
            return Ok(());
        }

        let config = negotiate(&AudioConfig {
            sample_rate: clip.sample_rate,
            buffer_size: self.buffer_size,
            channels: clip.channels,
        })?;
        let clip = conform(&clip, &config)?;

        let length = clip.samples.len();
        let play_time = Duration::from_secs_f64(clip.duration());

        let samples = Arc::new(clip.samples);
        let position = Arc::new(AtomicUsize::new(0));
        let cb_samples = Arc::clone(&samples);
        let cb_position = Arc::clone(&position);

        let output = AudioOutput::new(config, move |buffer, _channels| {
            let from = cb_position.load(Ordering::Relaxed);
            let count = buffer.len().min(cb_samples.len().saturating_sub(from));
            buffer[..count].copy_from_slice(&cb_samples[from..from + count]);
            cb_position.store(from + count, Ordering::Relaxed);
        })?;

        // Grace period covers device latency
        let deadline = Instant::now() + play_time + Duration::from_millis(500);
        while !cancel.is_cancelled()
            && position.load(Ordering::Relaxed) < length
            && Instant::now() < deadline
        {
            std::thread::sleep(Duration::from_millis(10));
        }

        drop(output);
        Ok(())
    }
}

/// `clip` at the rate and channel count of `config`
pub fn conform(clip: &AudioClip, config: &AudioConfig) -> Result<AudioClip, PlaybackError> {
    let clip = resample::resample(clip, config.sample_rate)?;
    Ok(clip.remix(config.channels))
}
