//! Kiwi voice - wake word driven voice sessions
//!
//! This library provides the session layer of a voice assistant:
//! - Session coordination (wake/stop detection, idle timeout, greeting and goodbye)
//! - Voice output (TTS over HTTP, MP3/WAV decoding, audio playback)
//! - Wake word subscription discipline
//! - An HTTP API with a TTS proxy, session control, and tools
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────┐
//! │                  Triggers                             │
//! │  Wake word  │  Stop word  │  Idle timer  │  HTTP API  │
//! └────────────────────┬─────────────────────────────────┘
//!                      │ mailbox
//! ┌────────────────────▼─────────────────────────────────┐
//! │               Session coordinator                     │
//! │   pause detector → start/end → resume detector        │
//! └────────────────────┬─────────────────────────────────┘
//!                      │
//! ┌────────────────────▼─────────────────────────────────┐
//! │     Announcer: TTS  →  decode  →  audio output        │
//! └──────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod config;
pub mod daemon;
pub mod error;
pub mod session;
pub mod tools;
pub mod voice;

pub use config::Config;
pub use daemon::Daemon;
pub use error::{Error, Result};
pub use session::{SessionCoordinator, SessionHandle, SessionSnapshot};
pub use tools::ToolRegistry;
