//! Premium audio playback
//!
//! Decodes the base64/MP3 payload from the premium synthesis provider
//! and plays it on the default output device. Playback is blocking (run
//! it on a blocking thread) and honors a cancellation flag mid-stream.

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use crate::{Error, Result};

/// Decoded mono audio
#[derive(Debug, Clone)]
pub struct DecodedAudio {
    /// Samples in the -1.0..=1.0 range
    pub samples: Vec<f32>,
    /// Source sample rate
    pub sample_rate: u32,
}

/// Plays decoded audio to the default output device
pub struct AudioPlayer {
    _private: (),
}

impl AudioPlayer {
    /// Create a player, verifying an output device exists
    ///
    /// # Errors
    ///
    /// Returns error if no output device is available.
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device available".to_string()))?;

        tracing::debug!(
            device = device.name().unwrap_or_default(),
            "audio playback initialized"
        );
        Ok(Self { _private: () })
    }

    /// Play MP3 bytes, blocking until done or cancelled
    ///
    /// # Errors
    ///
    /// Returns error if decoding or playback fails.
    pub fn play_mp3(&self, mp3_data: &[u8], cancel: &Arc<AtomicBool>) -> Result<()> {
        let decoded = decode_mp3(mp3_data)?;
        self.play(&decoded, cancel)
    }

    /// Play decoded samples, blocking until done or cancelled
    ///
    /// # Errors
    ///
    /// Returns error if no suitable output config exists or the stream
    /// fails to start.
    pub fn play(&self, audio: &DecodedAudio, cancel: &Arc<AtomicBool>) -> Result<()> {
        if audio.samples.is_empty() {
            return Ok(());
        }

        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output device".to_string()))?;

        let config = output_config(&device, audio.sample_rate)?;
        let channels = usize::from(config.channels);

        let samples = Arc::new(audio.samples.clone());
        let position = Arc::new(AtomicUsize::new(0));
        let finished = Arc::new(AtomicBool::new(false));

        let cb_samples = Arc::clone(&samples);
        let cb_position = Arc::clone(&position);
        let cb_finished = Arc::clone(&finished);
        let cb_cancel = Arc::clone(cancel);

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let cancelled = cb_cancel.load(Ordering::Relaxed);
                    for frame in data.chunks_mut(channels) {
                        let pos = cb_position.load(Ordering::Relaxed);
                        let sample = if cancelled || pos >= cb_samples.len() {
                            cb_finished.store(true, Ordering::Relaxed);
                            0.0
                        } else {
                            cb_position.store(pos + 1, Ordering::Relaxed);
                            cb_samples[pos]
                        };
                        for out in frame.iter_mut() {
                            *out = sample;
                        }
                    }
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?;

        stream.play().map_err(|e| Error::Audio(e.to_string()))?;

        // Poll for completion, bounded by the audio duration plus margin.
        let duration_ms = (samples.len() as u64 * 1000) / u64::from(audio.sample_rate);
        let start = std::time::Instant::now();
        let timeout = std::time::Duration::from_millis(duration_ms + 500);

        while !finished.load(Ordering::Relaxed) {
            if cancel.load(Ordering::Relaxed) || start.elapsed() > timeout {
                break;
            }
            std::thread::sleep(std::time::Duration::from_millis(50));
        }

        drop(stream);

        if cancel.load(Ordering::Relaxed) {
            tracing::debug!("playback cancelled");
        } else {
            tracing::debug!(samples = samples.len(), "playback complete");
        }
        Ok(())
    }
}

/// Find an output config at the source rate, mono preferred
fn output_config(device: &cpal::Device, sample_rate: u32) -> Result<StreamConfig> {
    let rate = SampleRate(sample_rate);
    let supports = |channels: u16| {
        device.supported_output_configs().ok().and_then(|mut cfgs| {
            cfgs.find(|c| {
                c.channels() == channels && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate
            })
        })
    };

    supports(1)
        .or_else(|| supports(2))
        .map(|c| c.with_sample_rate(rate).config())
        .ok_or_else(|| Error::Audio(format!("no output config at {sample_rate} Hz")))
}

/// Decode MP3 bytes to mono f32 samples
///
/// # Errors
///
/// Returns error on malformed MP3 data or an empty stream.
pub fn decode_mp3(mp3_data: &[u8]) -> Result<DecodedAudio> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = 0u32;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                if sample_rate == 0 {
                    sample_rate = u32::try_from(frame.sample_rate.max(0)).unwrap_or(0);
                }
                if frame.channels == 2 {
                    // Stereo: average channels
                    samples.extend(frame.data.chunks(2).map(|chunk| {
                        let left = f32::from(chunk[0]) / 32768.0;
                        let right = f32::from(chunk.get(1).copied().unwrap_or(chunk[0])) / 32768.0;
                        f32::midpoint(left, right)
                    }));
                } else {
                    samples.extend(frame.data.iter().map(|&s| f32::from(s) / 32768.0));
                }
            }
            Err(minimp3::Error::Eof) => break,
            Err(e) => return Err(Error::Audio(format!("MP3 decode error: {e}"))),
        }
    }

    if samples.is_empty() || sample_rate == 0 {
        return Err(Error::Audio("empty MP3 stream".to_string()));
    }

    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_rejects_garbage() {
        assert!(decode_mp3(&[0u8; 16]).is_err());
    }

    #[test]
    fn test_decode_rejects_empty() {
        assert!(decode_mp3(&[]).is_err());
    }
}
