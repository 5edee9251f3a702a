//! Voice capabilities
//!
//! Speech synthesis, audio playback, and wake word detection. These are the
//! leaf collaborators driven by the session coordinator.

mod playback;
mod speech;
mod tts;
mod wake_word;

pub use playback::{AudioOutput, AudioPlayback, NullOutput};
pub use speech::{
    Announcement, Announcer, DEFAULT_CUE_TIMEOUT, DecodedAudio, SpeechCapability, decode_audio,
};
pub use tts::{SpeechRequest, TTS_PATH, TextToSpeech};
pub use wake_word::{DetectionEvent, DetectionFeed, Delivery, KeywordSpotter, WakeWordEngine};
