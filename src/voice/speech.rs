//! Speech rendering and the announcement sequence
//!
//! Turns text into playable audio and plays it. Greeting and goodbye cues
//! go through [`Announcer`], which separates cosmetic audio failures from
//! failures the session logic has to react to.

use std::io::Cursor;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use super::playback::AudioOutput;
use crate::{Error, Result};

/// Mono PCM audio ready for playback
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl DecodedAudio {
    /// Playback duration in milliseconds
    #[must_use]
    pub fn duration_ms(&self) -> u64 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000) / u64::from(self.sample_rate)
    }
}

/// Produces playable audio for a piece of text
#[async_trait]
pub trait SpeechCapability: Send + Sync {
    /// Synthesize and decode `text`
    async fn render(&self, text: &str) -> Result<DecodedAudio>;
}

/// Outcome of a spoken cue
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Announcement {
    /// Audio was rendered and played to completion
    Played,
    /// Audio was not played; the caller continues as if it had been
    Skipped { reason: String },
}

impl Announcement {
    #[must_use]
    pub const fn was_played(&self) -> bool {
        matches!(self, Self::Played)
    }
}

/// Default bound on rendering plus playing one cue
pub const DEFAULT_CUE_TIMEOUT: Duration = Duration::from_secs(30);

/// Renders text and plays it on the audio output
#[derive(Clone)]
pub struct Announcer {
    speech: Arc<dyn SpeechCapability>,
    output: Arc<dyn AudioOutput>,
    timeout: Duration,
}

impl Announcer {
    #[must_use]
    pub fn new(speech: Arc<dyn SpeechCapability>, output: Arc<dyn AudioOutput>) -> Self {
        Self {
            speech,
            output,
            timeout: DEFAULT_CUE_TIMEOUT,
        }
    }

    /// Bound each cue to `timeout`
    #[must_use]
    pub const fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Speak `text`, returning once playback ends
    ///
    /// An unavailable output device is not an error: the cue is skipped.
    ///
    /// # Errors
    ///
    /// Returns error if synthesis, decoding, or playback fails, or if the
    /// cue does not finish within the configured timeout
    pub async fn speak(&self, text: &str) -> Result<Announcement> {
        if !self.output.is_available() {
            tracing::warn!(text, "audio output unavailable, skipping audio feedback");
            return Ok(Announcement::Skipped {
                reason: "audio output unavailable".to_string(),
            });
        }

        let cue = async {
            let audio = self.speech.render(text).await?;
            tracing::debug!(text, duration_ms = audio.duration_ms(), "playing announcement");
            self.output.play(audio).await
        };

        tokio::time::timeout(self.timeout, cue)
            .await
            .map_err(|_| Error::Timeout(format!("announcement after {:?}", self.timeout)))??;
        Ok(Announcement::Played)
    }

    /// Speak `text`, never failing
    ///
    /// Failures are logged and reported as [`Announcement::Skipped`].
    pub async fn announce(&self, text: &str) -> Announcement {
        match self.speak(text).await {
            Ok(announcement) => announcement,
            Err(e) => {
                tracing::warn!(error = %e, text, "failed to play announcement");
                Announcement::Skipped {
                    reason: e.to_string(),
                }
            }
        }
    }
}

/// Decode WAV or MP3 bytes to mono f32 samples
///
/// # Errors
///
/// Returns error if the data cannot be decoded or contains no audio
pub fn decode_audio(data: &[u8]) -> Result<DecodedAudio> {
    let audio = if data.starts_with(b"RIFF") {
        decode_wav(data)?
    } else {
        decode_mp3(data)?
    };

    if audio.samples.is_empty() {
        return Err(Error::Audio("no audio decoded".to_string()));
    }

    Ok(audio)
}

/// Decode MP3 bytes to f32 samples
fn decode_mp3(mp3_data: &[u8]) -> Result<DecodedAudio> {
    let mut decoder = minimp3::Decoder::new(Cursor::new(mp3_data));
    let mut samples = Vec::new();
    let mut sample_rate = 0u32;

    loop {
        match decoder.next_frame() {
            Ok(frame) => {
                sample_rate = u32::try_from(frame.sample_rate)
                    .map_err(|_| Error::Audio("invalid MP3 sample rate".to_string()))?;

                // Convert i16 samples to f32 and handle stereo to mono
                if frame.channels == 2 {
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

    Ok(DecodedAudio {
        samples,
        sample_rate,
    })
}

/// Decode WAV bytes to f32 samples
#[allow(clippy::cast_precision_loss)]
fn decode_wav(wav_data: &[u8]) -> Result<DecodedAudio> {
    let mut reader = hound::WavReader::new(Cursor::new(wav_data))
        .map_err(|e| Error::Audio(format!("WAV decode error: {e}")))?;
    let spec = reader.spec();

    let interleaved: Vec<f32> = match spec.sample_format {
        hound::SampleFormat::Float => reader
            .samples::<f32>()
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::Audio(format!("WAV decode error: {e}")))?,
        hound::SampleFormat::Int => {
            let scale = (1i64 << (spec.bits_per_sample - 1)) as f32;
            reader
                .samples::<i32>()
                .map(|s| s.map(|v| v as f32 / scale))
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::Audio(format!("WAV decode error: {e}")))?
        }
    };

    let channels = usize::from(spec.channels.max(1));
    let samples = if channels == 1 {
        interleaved
    } else {
        interleaved
            .chunks(channels)
            .map(|frame| frame.iter().sum::<f32>() / frame.len() as f32)
            .collect()
    };

    Ok(DecodedAudio {
        samples,
        sample_rate: spec.sample_rate,
    })
}
