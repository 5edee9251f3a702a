//! Error types for Kiwi voice

use thiserror::Error;

/// Result type alias for Kiwi operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in Kiwi voice
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error
    #[error("configuration error: {0}")]
    Config(String),

    /// Audio output or decode error
    #[error("audio error: {0}")]
    Audio(String),

    /// Text-to-speech error
    #[error("TTS error: {0}")]
    Tts(String),

    /// Wake word engine error
    #[error("wake word error: {0}")]
    WakeWord(String),

    /// Session coordinator error
    #[error("session error: {0}")]
    Session(String),

    /// An operation did not finish in time
    #[error("timed out: {0}")]
    Timeout(String),

    /// Tool call error
    #[error("tool error: {0}")]
    Tool(String),

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// HTTP error
    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// TOML parsing error
    #[error("toml error: {0}")]
    Toml(#[from] toml::de::Error),
}
