//! Configuration management for Kiwi voice

pub mod file;

use std::time::Duration;

use crate::{Error, Result};
use file::KiwiConfigFile;

/// Default greeting spoken when a session starts
pub const DEFAULT_GREETING: &str = "Hey Woiferl, wie kann ich dir helfen?";

/// Default goodbye spoken when a session ends
pub const DEFAULT_GOODBYE: &str = "Auf Wiedersehen, bis zum nächsten Mal!";

/// Default quiet period before an active session is closed
pub const DEFAULT_IDLE_TIMEOUT_MS: u64 = 30_000;

/// Default bound on a single speech request
pub const DEFAULT_TTS_TIMEOUT_MS: u64 = 15_000;

/// Default bound on a whole greeting or goodbye (synthesis plus playback)
pub const DEFAULT_CUE_TIMEOUT_MS: u64 = 30_000;

/// Default API server port
pub const DEFAULT_PORT: u16 = 18790;

/// Kiwi voice configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Voice configuration
    pub voice: VoiceConfig,

    /// Session coordinator configuration
    pub session: SessionConfig,

    /// Wake word keywords
    pub wake_word: WakeWordConfig,

    /// HTTP API server configuration
    pub api_server: ApiServerConfig,
}

/// Voice processing configuration
#[derive(Debug, Clone)]
pub struct VoiceConfig {
    /// Enable wake word handling and audio output
    pub enabled: bool,

    /// TTS model (e.g. "tts-1")
    pub tts_model: String,

    /// TTS voice identifier
    pub tts_voice: String,

    /// Base URL of the service exposing `/api/tts`
    pub tts_url: String,

    /// Bound on each HTTP speech request
    pub tts_timeout: Duration,

    /// Bound on a spoken cue, after which it is skipped
    pub cue_timeout: Duration,
}

/// Session coordinator configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    /// Spoken on session start
    pub greeting: String,

    /// Spoken on session end
    pub goodbye: String,

    /// Quiet period before the session is ended
    pub idle_timeout: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            greeting: DEFAULT_GREETING.to_string(),
            goodbye: DEFAULT_GOODBYE.to_string(),
            idle_timeout: Duration::from_millis(DEFAULT_IDLE_TIMEOUT_MS),
        }
    }
}

/// Wake word keyword configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WakeWordConfig {
    /// Phrase that activates a session
    pub wake_phrase: String,

    /// Engine label reported for the wake phrase
    pub wake_label: String,

    /// Phrase that ends a session
    pub stop_phrase: String,

    /// Engine label reported for the stop phrase
    pub stop_label: String,
}

impl Default for WakeWordConfig {
    fn default() -> Self {
        Self {
            wake_phrase: "hey kiwi".to_string(),
            wake_label: "hey_kiwi".to_string(),
            stop_phrase: "kiwi stop".to_string(),
            stop_label: "kiwi_stop".to_string(),
        }
    }
}

/// HTTP API server configuration
#[derive(Debug, Clone)]
pub struct ApiServerConfig {
    /// Port to listen on
    pub port: u16,

    /// Key for the upstream speech API (from `OPENAI_API_KEY`)
    pub openai_api_key: Option<String>,

    /// Upstream speech API base URL
    pub openai_base_url: String,
}

impl Config {
    /// Load configuration from environment and the config file
    ///
    /// # Errors
    ///
    /// Returns error if the resolved configuration is invalid
    pub fn load() -> Result<Self> {
        Self::load_with_options(false)
    }

    /// Load configuration with explicit voice disable option
    ///
    /// # Errors
    ///
    /// Returns error if the resolved configuration is invalid
    pub fn load_with_options(disable_voice: bool) -> Result<Self> {
        let fc = file::load_config_file();
        let config = Self::resolve(fc, |key| std::env::var(key).ok(), disable_voice);

        if disable_voice {
            tracing::info!("voice explicitly disabled via --disable-voice");
        }

        config.validate()?;
        Ok(config)
    }

    /// Merge env, file, and defaults (env > toml > default)
    #[must_use]
    pub fn resolve(
        fc: KiwiConfigFile,
        env: impl Fn(&str) -> Option<String>,
        disable_voice: bool,
    ) -> Self {
        let port = env("KIWI_PORT")
            .and_then(|s| s.parse().ok())
            .or(fc.server.port)
            .unwrap_or(DEFAULT_PORT);

        let api_server = ApiServerConfig {
            port,
            openai_api_key: env("OPENAI_API_KEY").filter(|k| !k.is_empty()),
            openai_base_url: env("OPENAI_BASE_URL")
                .or(fc.server.openai_base_url)
                .unwrap_or_else(|| "https://api.openai.com/v1".to_string()),
        };

        let enabled = !disable_voice
            && env("KIWI_VOICE_ENABLED")
                .map(|s| s == "true" || s == "1")
                .or(fc.voice.enabled)
                .unwrap_or(true);

        let voice = VoiceConfig {
            enabled,
            tts_model: env("KIWI_TTS_MODEL")
                .or(fc.voice.tts_model)
                .unwrap_or_else(|| "tts-1".to_string()),
            tts_voice: env("KIWI_TTS_VOICE")
                .or(fc.voice.tts_voice)
                .unwrap_or_else(|| "onyx".to_string()),
            tts_url: env("KIWI_TTS_URL")
                .or(fc.voice.tts_url)
                .unwrap_or_else(|| format!("http://127.0.0.1:{port}")),
            tts_timeout: millis(
                env("KIWI_TTS_TIMEOUT_MS"),
                fc.voice.tts_timeout_ms,
                DEFAULT_TTS_TIMEOUT_MS,
            ),
            cue_timeout: millis(
                env("KIWI_CUE_TIMEOUT_MS"),
                fc.voice.cue_timeout_ms,
                DEFAULT_CUE_TIMEOUT_MS,
            ),
        };

        let defaults = SessionConfig::default();
        let session = SessionConfig {
            greeting: env("KIWI_GREETING")
                .or(fc.session.greeting)
                .unwrap_or(defaults.greeting),
            goodbye: env("KIWI_GOODBYE")
                .or(fc.session.goodbye)
                .unwrap_or(defaults.goodbye),
            idle_timeout: env("KIWI_IDLE_TIMEOUT_MS")
                .and_then(|s| s.parse().ok())
                .or(fc.session.idle_timeout_ms)
                .map_or(defaults.idle_timeout, Duration::from_millis),
        };

        let defaults = WakeWordConfig::default();
        let wake_word = WakeWordConfig {
            wake_phrase: fc.wake_word.wake_phrase.unwrap_or(defaults.wake_phrase),
            wake_label: fc.wake_word.wake_label.unwrap_or(defaults.wake_label),
            stop_phrase: fc.wake_word.stop_phrase.unwrap_or(defaults.stop_phrase),
            stop_label: fc.wake_word.stop_label.unwrap_or(defaults.stop_label),
        };

        Self {
            voice,
            session,
            wake_word,
            api_server,
        }
    }

    /// Check invariants the coordinator relies on
    ///
    /// # Errors
    ///
    /// Returns `Error::Config` describing the first invalid field
    pub fn validate(&self) -> Result<()> {
        if self.session.idle_timeout.is_zero() {
            return Err(Error::Config("session.idle_timeout_ms must be > 0".to_string()));
        }
        if self.voice.tts_timeout.is_zero() || self.voice.cue_timeout.is_zero() {
            return Err(Error::Config(
                "voice.tts_timeout_ms and voice.cue_timeout_ms must be > 0".to_string(),
            ));
        }
        if self.session.greeting.trim().is_empty() || self.session.goodbye.trim().is_empty() {
            return Err(Error::Config(
                "session greeting and goodbye must not be empty".to_string(),
            ));
        }

        let wake = self.wake_word.wake_phrase.trim().to_lowercase();
        let stop = self.wake_word.stop_phrase.trim().to_lowercase();
        if wake.is_empty() || stop.is_empty() {
            return Err(Error::Config("wake and stop phrases must not be empty".to_string()));
        }
        if wake == stop || self.wake_word.wake_label == self.wake_word.stop_label {
            return Err(Error::Config(
                "wake and stop keywords must be distinct".to_string(),
            ));
        }

        Ok(())
    }
}

/// Milliseconds from env, then file, then default
fn millis(env: Option<String>, file: Option<u64>, default: u64) -> Duration {
    Duration::from_millis(env.and_then(|s| s.parse().ok()).or(file).unwrap_or(default))
}
