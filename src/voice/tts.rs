//! Text-to-speech (TTS) processing

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::speech::{DecodedAudio, SpeechCapability, decode_audio};
use crate::{Error, Result};

/// Path of the speech endpoint exposed by the hosting service
pub const TTS_PATH: &str = "/api/tts";

/// Speech synthesis request body
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpeechRequest {
    pub input: String,
    pub voice: String,
    pub model: String,
}

/// Error body returned by the speech endpoint
#[derive(Debug, Deserialize)]
struct ErrorBody {
    error: String,
}

/// TTS provider backend
#[derive(Clone, Debug)]
enum TtsProvider {
    /// Hosting service `/api/tts` endpoint (no credentials)
    Gateway { base_url: String },
    /// `OpenAI` speech API
    OpenAI { api_key: String, base_url: String },
}

/// Synthesizes speech from text
#[derive(Clone, Debug)]
pub struct TextToSpeech {
    client: reqwest::Client,
    voice: String,
    model: String,
    provider: TtsProvider,
}

impl TextToSpeech {
    /// Create a TTS client for a service exposing `/api/tts`
    ///
    /// Each request is abandoned after `timeout`.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be built
    pub fn new_gateway(
        base_url: impl Into<String>,
        voice: String,
        model: String,
        timeout: Duration,
    ) -> Result<Self> {
        Ok(Self {
            client: http_client(timeout)?,
            voice,
            model,
            provider: TtsProvider::Gateway {
                base_url: base_url.into().trim_end_matches('/').to_string(),
            },
        })
    }

    /// Create a TTS client for the `OpenAI` speech API
    ///
    /// # Errors
    ///
    /// Returns error if API key is missing or the HTTP client cannot be built
    pub fn new_openai(
        api_key: String,
        base_url: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self> {
        if api_key.is_empty() {
            return Err(Error::Config("OpenAI API key required for TTS".to_string()));
        }

        Ok(Self {
            client: http_client(timeout)?,
            voice: "onyx".to_string(),
            model: "tts-1".to_string(),
            provider: TtsProvider::OpenAI {
                api_key,
                base_url: base_url.into().trim_end_matches('/').to_string(),
            },
        })
    }

    /// Synthesize text with the configured voice and model
    ///
    /// Returns audio bytes (MP3 format)
    ///
    /// # Errors
    ///
    /// Returns error if synthesis fails
    pub async fn synthesize(&self, text: &str) -> Result<Vec<u8>> {
        let request = SpeechRequest {
            input: text.to_string(),
            voice: self.voice.clone(),
            model: self.model.clone(),
        };
        self.synthesize_request(&request).await
    }

    /// Synthesize an explicit request
    ///
    /// # Errors
    ///
    /// Returns error if the request fails or the backend reports an error
    pub async fn synthesize_request(&self, request: &SpeechRequest) -> Result<Vec<u8>> {
        if request.input.trim().is_empty() {
            return Err(Error::Tts("empty input".to_string()));
        }

        match &self.provider {
            TtsProvider::Gateway { base_url } => self.synthesize_gateway(base_url, request).await,
            TtsProvider::OpenAI { api_key, base_url } => {
                self.synthesize_openai(api_key, base_url, request).await
            }
        }
    }

    /// Synthesize through the hosting service
    async fn synthesize_gateway(&self, base_url: &str, request: &SpeechRequest) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(format!("{base_url}{TTS_PATH}"))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            let message = serde_json::from_str::<ErrorBody>(&body).map_or(body, |b| b.error);
            return Err(Error::Tts(format!("speech endpoint error {status}: {message}")));
        }

        let audio = response.bytes().await?;
        tracing::debug!(bytes = audio.len(), "speech synthesized");
        Ok(audio.to_vec())
    }

    /// Synthesize using `OpenAI` TTS
    async fn synthesize_openai(
        &self,
        api_key: &str,
        base_url: &str,
        request: &SpeechRequest,
    ) -> Result<Vec<u8>> {
        let response = self
            .client
            .post(format!("{base_url}/audio/speech"))
            .header("Authorization", format!("Bearer {api_key}"))
            .json(request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Tts(format!("OpenAI TTS error {status}: {body}")));
        }

        let audio = response.bytes().await?;
        Ok(audio.to_vec())
    }
}

fn http_client(timeout: Duration) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(timeout)
        .build()
        .map_err(Error::Http)
}

#[async_trait]
impl SpeechCapability for TextToSpeech {
    async fn render(&self, text: &str) -> Result<DecodedAudio> {
        let bytes = self.synthesize(text).await?;
        decode_audio(&bytes)
    }
}
