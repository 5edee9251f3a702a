//! TOML configuration file loading
//!
//! Supports `~/.config/kiwi/config.toml` as a persistent config source.
//! All fields are optional; the file is a partial overlay on top of defaults.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::Result;

/// Top-level TOML configuration file schema
#[derive(Debug, Default, Deserialize)]
pub struct KiwiConfigFile {
    /// Voice/audio configuration
    #[serde(default)]
    pub voice: VoiceFileConfig,

    /// Session behaviour
    #[serde(default)]
    pub session: SessionFileConfig,

    /// Wake word keywords
    #[serde(default)]
    pub wake_word: WakeWordFileConfig,

    /// Server/runtime configuration
    #[serde(default)]
    pub server: ServerFileConfig,
}

/// Voice processing configuration
#[derive(Debug, Default, Deserialize)]
pub struct VoiceFileConfig {
    /// Enable voice input/output
    pub enabled: Option<bool>,

    /// TTS model (e.g. "tts-1")
    pub tts_model: Option<String>,

    /// TTS voice identifier (e.g. "onyx")
    pub tts_voice: Option<String>,

    /// Base URL of the service exposing `/api/tts`
    pub tts_url: Option<String>,

    /// Per-request speech timeout
    pub tts_timeout_ms: Option<u64>,

    /// Timeout for a whole greeting or goodbye
    pub cue_timeout_ms: Option<u64>,
}

/// Session configuration
#[derive(Debug, Default, Deserialize)]
pub struct SessionFileConfig {
    pub greeting: Option<String>,
    pub goodbye: Option<String>,
    pub idle_timeout_ms: Option<u64>,
}

/// Wake word configuration
#[derive(Debug, Default, Deserialize)]
pub struct WakeWordFileConfig {
    pub wake_phrase: Option<String>,
    pub wake_label: Option<String>,
    pub stop_phrase: Option<String>,
    pub stop_label: Option<String>,
}

/// Server/runtime configuration
#[derive(Debug, Default, Deserialize)]
pub struct ServerFileConfig {
    /// API server port
    pub port: Option<u16>,

    /// Upstream speech API base URL
    pub openai_base_url: Option<String>,
}

/// Load the TOML config file from the standard path
///
/// Returns `KiwiConfigFile::default()` if the file doesn't exist or can't be parsed.
pub fn load_config_file() -> KiwiConfigFile {
    config_file_path().map_or_else(KiwiConfigFile::default, |path| load_from(&path))
}

/// Load a TOML config file from an explicit path
///
/// Missing or malformed files fall back to defaults.
pub fn load_from(path: &Path) -> KiwiConfigFile {
    if !path.exists() {
        return KiwiConfigFile::default();
    }

    match read_config_file(path) {
        Ok(config) => {
            tracing::info!(path = %path.display(), "loaded config file");
            config
        }
        Err(e) => {
            tracing::warn!(
                path = %path.display(),
                error = %e,
                "failed to load config file, using defaults"
            );
            KiwiConfigFile::default()
        }
    }
}

/// Read and parse a TOML config file
///
/// # Errors
///
/// Returns error if the file cannot be read or is not valid TOML
pub fn read_config_file(path: &Path) -> Result<KiwiConfigFile> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// Return the config file path: `~/.config/kiwi/config.toml`
pub fn config_file_path() -> Option<PathBuf> {
    directories::BaseDirs::new().map(|d| d.config_dir().join("kiwi").join("config.toml"))
}
