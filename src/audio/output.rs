// Copyright (c) 2026 Robert L. Snyder, Sierra Vista, AZ
// Licensed under the MIT License. See LICENSE file in the project root for details.

//! Audio output via cpal.
//!
//! The stream pulls from a callback; dropping the `AudioOutput` stops the
//! stream and releases the device.

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{Device, Stream, StreamConfig};
use tracing::{debug, warn};

use crate::error::PlaybackError;

/// Audio output configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AudioConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Buffer size in frames, or the device default
    pub buffer_size: Option<u32>,
    /// Number of output channels
    pub channels: u16,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            sample_rate: 44100,
            buffer_size: None,
            channels: 2,
        }
    }
}

/// Audio output stream
pub struct AudioOutput {
    /// cpal stream
    _stream: Stream,
    /// Output device
    _device: Device,
    /// Current configuration
    config: AudioConfig,
}

impl AudioOutput {
    /// Open the default device and start pulling from `callback`
    pub fn new<F>(config: AudioConfig, mut callback: F) -> Result<Self, PlaybackError>
    where
        F: FnMut(&mut [f32], usize) + Send + 'static,
    {
        let host = cpal::default_host();

        let device = host
            .default_output_device()
            .ok_or(PlaybackError::NoDevice)?;

        let stream_config = StreamConfig {
            channels: config.channels,
            sample_rate: cpal::SampleRate(config.sample_rate),
            buffer_size: match config.buffer_size {
                Some(frames) => cpal::BufferSize::Fixed(frames),
                None => cpal::BufferSize::Default,
            },
        };

        let channels = config.channels as usize;

        let stream = device
            .build_output_stream(
                &stream_config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    // Silence anything the callback leaves unfilled
                    for sample in data.iter_mut() {
                        *sample = 0.0;
                    }
                    callback(data, channels);
                },
                move |err| {
                    warn!("Audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| PlaybackError::Device(format!("Failed to build stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| PlaybackError::Device(format!("Failed to start stream: {}", e)))?;

        Ok(Self {
            _stream: stream,
            _device: device,
            config,
        })
    }

    /// Get current configuration
    pub fn config(&self) -> &AudioConfig {
        &self.config
    }

    /// Calculate latency in milliseconds, if the buffer size is fixed
    pub fn latency_ms(&self) -> Option<f64> {
        latency_ms(&self.config)
    }
}

fn latency_ms(config: &AudioConfig) -> Option<f64> {
    config
        .buffer_size
        .map(|frames| frames as f64 / config.sample_rate as f64 * 1000.0)
}

/// Configuration the default device will accept, closest to `preferred`
///
/// Keeps `preferred` when some f32 config of the device covers its rate and
/// channel count; otherwise falls back to the device default.
pub fn negotiate(preferred: &AudioConfig) -> Result<AudioConfig, PlaybackError> {
    let host = cpal::default_host();
    let device = host
        .default_output_device()
        .ok_or(PlaybackError::NoDevice)?;

    let rate = cpal::SampleRate(preferred.sample_rate);
    let supported = device
        .supported_output_configs()
        .map(|mut configs| {
            configs.any(|c| {
                c.channels() == preferred.channels
                    && c.min_sample_rate() <= rate
                    && c.max_sample_rate() >= rate
                    && c.sample_format() == cpal::SampleFormat::F32
            })
        })
        .unwrap_or(false);
    if supported {
        return Ok(preferred.clone());
    }

    let default = device
        .default_output_config()
        .map_err(|e| PlaybackError::Device(format!("Failed to get default config: {}", e)))?;
    debug!(
        "Device has no {} Hz x{} f32 output; using {} Hz x{}",
        preferred.sample_rate,
        preferred.channels,
        default.sample_rate().0,
        default.channels()
    );
    Ok(AudioConfig {
        sample_rate: default.sample_rate().0,
        buffer_size: preferred.buffer_size,
        channels: default.channels(),
    })
}

/// List available audio output devices
pub fn list_devices() -> Vec<String> {
    let host = cpal::default_host();
    host.output_devices()
        .map(|devices| devices.filter_map(|d| d.name().ok()).collect())
        .unwrap_or_default()
}

/// Get default device name
pub fn default_device_name() -> Option<String> {
    let host = cpal::default_host();
    host.default_output_device().and_then(|d| d.name().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_audio_config_default() {
        let config = AudioConfig::default();
        assert_eq!(config.sample_rate, 44100);
        assert_eq!(config.buffer_size, None);
        assert_eq!(config.channels, 2);
    }

    #[test]
    fn test_latency_calculation() {
        let config = AudioConfig {
            sample_rate: 44100,
            buffer_size: Some(512),
            channels: 2,
        };
        let latency = latency_ms(&config).unwrap();
        assert!((latency - 11.6).abs() < 0.1);
        assert_eq!(latency_ms(&AudioConfig::default()), None);
    }

    #[test]
    fn test_device_queries_do_not_panic() {
        // May be empty without audio hardware
        let _ = list_devices();
        let _ = default_device_name();
    }
}
