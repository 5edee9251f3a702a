//! Audio playback to speakers

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{SampleRate, StreamConfig};

use super::speech::DecodedAudio;
use crate::{Error, Result};

/// Sample rate probed at startup (matches common TTS output)
const PROBE_SAMPLE_RATE: u32 = 24000;

/// Plays decoded audio and resolves when playback ends
#[async_trait]
pub trait AudioOutput: Send + Sync {
    /// Whether the device can currently play audio
    ///
    /// An unavailable device is the suspended-output case: callers skip
    /// playback instead of failing.
    fn is_available(&self) -> bool;

    /// Play `audio` to completion
    async fn play(&self, audio: DecodedAudio) -> Result<()>;
}

/// Output that never plays anything (voice disabled or headless)
#[derive(Debug, Default, Clone, Copy)]
pub struct NullOutput;

#[async_trait]
impl AudioOutput for NullOutput {
    fn is_available(&self) -> bool {
        false
    }

    async fn play(&self, _audio: DecodedAudio) -> Result<()> {
        Ok(())
    }
}

/// Plays audio to the default output device
pub struct AudioPlayback {
    available: AtomicBool,
}

impl AudioPlayback {
    /// Probe the default output device
    ///
    /// A missing device is tolerated: the playback reports itself
    /// unavailable and every cue is skipped.
    #[must_use]
    pub fn new() -> Self {
        let available = match probe_output() {
            Ok(channels) => {
                tracing::debug!(channels, "audio playback initialized");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "audio output unavailable, audio feedback disabled");
                false
            }
        };

        Self {
            available: AtomicBool::new(available),
        }
    }

    /// Probe the default output device, failing if none is usable
    ///
    /// # Errors
    ///
    /// Returns error if audio device cannot be opened
    pub fn open() -> Result<Self> {
        probe_output()?;
        Ok(Self {
            available: AtomicBool::new(true),
        })
    }
}

impl Default for AudioPlayback {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AudioOutput for AudioPlayback {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::Acquire)
    }

    async fn play(&self, audio: DecodedAudio) -> Result<()> {
        if audio.samples.is_empty() {
            return Ok(());
        }

        // cpal streams aren't Send, so the whole stream lives on a blocking thread
        let result = tokio::task::spawn_blocking(move || play_samples_blocking(&audio))
            .await
            .map_err(|e| Error::Audio(format!("playback task failed: {e}")))?;

        if matches!(&result, Err(Error::Audio(message)) if message.starts_with("no output device")) {
            self.available.store(false, Ordering::Release);
        }

        result
    }
}

/// Find a stream config for `sample_rate`, preferring mono
fn output_config(device: &cpal::Device, sample_rate: u32) -> Result<StreamConfig> {
    let rate = SampleRate(sample_rate);
    let supported = device
        .supported_output_configs()
        .map_err(|e| Error::Audio(e.to_string()))?
        .find(|c| c.channels() == 1 && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate)
        .or_else(|| {
            // Fallback: try stereo
            device.supported_output_configs().ok()?.find(|c| {
                c.channels() == 2 && c.min_sample_rate() <= rate && c.max_sample_rate() >= rate
            })
        })
        .ok_or_else(|| Error::Audio(format!("no output config for {sample_rate} Hz")))?;

    Ok(supported.with_sample_rate(rate).config())
}

fn probe_output() -> Result<u16> {
    let device = cpal::default_host()
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device available".to_string()))?;
    let config = output_config(&device, PROBE_SAMPLE_RATE)?;
    Ok(config.channels)
}

/// Play samples in a blocking manner
fn play_samples_blocking(audio: &DecodedAudio) -> Result<()> {
    let device = cpal::default_host()
        .default_output_device()
        .ok_or_else(|| Error::Audio("no output device".to_string()))?;

    let config = output_config(&device, audio.sample_rate)?;
    let channels = usize::from(config.channels);

    let samples: Arc<[f32]> = Arc::from(audio.samples.as_slice());
    let position = Arc::new(AtomicUsize::new(0));
    let finished = Arc::new(AtomicBool::new(false));

    let stream = {
        let samples = Arc::clone(&samples);
        let position = Arc::clone(&position);
        let finished = Arc::clone(&finished);
        device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut pos = position.load(Ordering::Relaxed);
                    for frame in data.chunks_mut(channels) {
                        let sample = samples.get(pos).copied().unwrap_or_else(|| {
                            finished.store(true, Ordering::Release);
                            0.0
                        });
                        frame.fill(sample);
                        if pos < samples.len() {
                            pos += 1;
                        }
                    }
                    position.store(pos, Ordering::Relaxed);
                },
                |err| {
                    tracing::error!(error = %err, "audio playback error");
                },
                None,
            )
            .map_err(|e| Error::Audio(e.to_string()))?
    };

    stream.play().map_err(|e| Error::Audio(e.to_string()))?;

    // Poll for completion with timeout
    let start = Instant::now();
    let timeout = Duration::from_millis(audio.duration_ms() + 500);

    while !finished.load(Ordering::Acquire) {
        if start.elapsed() > timeout {
            tracing::warn!("playback did not report completion, giving up");
            break;
        }
        std::thread::sleep(Duration::from_millis(50));
    }

    // Small delay to ensure audio finishes
    std::thread::sleep(Duration::from_millis(100));

    drop(stream);
    tracing::debug!(samples = samples.len(), "playback complete");

    Ok(())
}
