// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Sample rate conversion of decoded clips.

use rubato::{FastFixedIn, PolynomialDegree, Resampler};
use tracing::debug;

use super::decode::AudioClip;
use crate::error::PlaybackError;

/// Convert `clip` to `rate` Hz, keeping its channel layout
pub fn resample(clip: &AudioClip, rate: u32) -> Result<AudioClip, PlaybackError> {
    if clip.sample_rate == rate || clip.samples.is_empty() {
        return Ok(AudioClip {
            sample_rate: if clip.samples.is_empty() { rate } else { clip.sample_rate },
            ..clip.clone()
        });
    }
    if rate == 0 || clip.sample_rate == 0 {
        return Err(PlaybackError::Unsupported(format!(
            "cannot resample {} Hz to {} Hz",
            clip.sample_rate, rate
        )));
    }

    let channels = clip.channels.max(1) as usize;
    let planar = deinterleave(&clip.samples, channels);
    let frames = planar[0].len();

    let mut resampler = FastFixedIn::<f32>::new(
        rate as f64 / clip.sample_rate as f64,
        1.0,
        PolynomialDegree::Septic,
        frames,
        channels,
    )
    .map_err(|e| PlaybackError::Unsupported(format!("resampler: {}", e)))?;

    let output = resampler
        .process(&planar, None)
        .map_err(|e| PlaybackError::Unsupported(format!("resampling failed: {}", e)))?;

    debug!(
        "Resampled {} frames at {} Hz to {} frames at {} Hz",
        frames,
        clip.sample_rate,
        output.first().map_or(0, Vec::len),
        rate
    );

    Ok(AudioClip {
        samples: interleave(&output),
        channels: clip.channels,
        sample_rate: rate,
    })
}

fn deinterleave(samples: &[f32], channels: usize) -> Vec<Vec<f32>> {
    (0..channels)
        .map(|ch| samples.iter().skip(ch).step_by(channels).copied().collect())
        .collect()
}

fn interleave(planar: &[Vec<f32>]) -> Vec<f32> {
    let frames = planar.iter().map(Vec::len).min().unwrap_or(0);
    (0..frames)
        .flat_map(|i| planar.iter().map(move |channel| channel[i]))
        .collect()
}
