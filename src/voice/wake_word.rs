//! Wake word detection
//!
//! The engine delivers labeled detections over a channel registered at
//! construction. Delivery is gated by the subscription: while unsubscribed,
//! detections are dropped so the assistant's own voice cannot re-trigger it.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::config::WakeWordConfig;
use crate::{Error, Result};

/// A labeled detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionEvent {
    /// Wake phrase heard
    Wake,
    /// Stop phrase heard
    Stop,
}

impl fmt::Display for DetectionEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wake => write!(f, "wake"),
            Self::Stop => write!(f, "stop"),
        }
    }
}

/// An always-listening detector whose delivery can be paused
#[async_trait]
pub trait WakeWordEngine: Send + Sync {
    /// Start delivering detections
    async fn subscribe(&self) -> Result<()>;

    /// Stop delivering detections
    async fn unsubscribe(&self) -> Result<()>;

    /// Tear the engine down; no detections are delivered afterwards
    async fn release(&self) -> Result<()>;
}

/// What happened to a fed detection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "event", rename_all = "snake_case")]
pub enum Delivery {
    /// Forwarded to the registered channel
    Delivered(DetectionEvent),
    /// Matched, but the engine is paused or released
    Paused(DetectionEvent),
    /// Matched, but the channel is full or closed
    Dropped(DetectionEvent),
    /// Nothing matched
    NoMatch,
}

#[derive(Debug)]
struct Keyword {
    label: String,
    phrase: String,
    event: DetectionEvent,
}

struct SpotterState {
    keywords: Vec<Keyword>,
    subscribed: AtomicBool,
    released: AtomicBool,
    events: mpsc::Sender<DetectionEvent>,
}

/// Keyword-matching wake word engine
///
/// Maps engine labels or transcript text to detections by normalized
/// phrase containment.
pub struct KeywordSpotter {
    state: Arc<SpotterState>,
}

impl KeywordSpotter {
    /// Create a new keyword spotter delivering into `events`
    ///
    /// The spotter starts unsubscribed.
    ///
    /// # Errors
    ///
    /// Returns error if a phrase or label is empty
    pub fn new(config: &WakeWordConfig, events: mpsc::Sender<DetectionEvent>) -> Result<Self> {
        // Stop is checked first so "hey kiwi stop" ends rather than starts a session
        let keywords = [
            (&config.stop_label, &config.stop_phrase, DetectionEvent::Stop),
            (&config.wake_label, &config.wake_phrase, DetectionEvent::Wake),
        ]
        .into_iter()
        .map(|(label, phrase, event)| {
            let label = normalize(label);
            let phrase = normalize(phrase);
            if label.is_empty() || phrase.is_empty() {
                return Err(Error::WakeWord(format!("empty keyword for {event}")));
            }
            Ok(Keyword {
                label,
                phrase,
                event,
            })
        })
        .collect::<Result<Vec<_>>>()?;

        tracing::debug!(keywords = ?keywords, "keyword spotter initialized");

        Ok(Self {
            state: Arc::new(SpotterState {
                keywords,
                subscribed: AtomicBool::new(false),
                released: AtomicBool::new(false),
                events,
            }),
        })
    }

    /// Handle for feeding detections into the engine
    #[must_use]
    pub fn feed(&self) -> DetectionFeed {
        DetectionFeed {
            state: Arc::clone(&self.state),
        }
    }

    /// Whether detections are currently delivered
    #[must_use]
    pub fn is_subscribed(&self) -> bool {
        self.state.subscribed.load(Ordering::Acquire)
    }
}

#[async_trait]
impl WakeWordEngine for KeywordSpotter {
    async fn subscribe(&self) -> Result<()> {
        if self.state.released.load(Ordering::Acquire) {
            return Err(Error::WakeWord("engine released".to_string()));
        }
        self.state.subscribed.store(true, Ordering::Release);
        tracing::trace!("wake word delivery subscribed");
        Ok(())
    }

    async fn unsubscribe(&self) -> Result<()> {
        self.state.subscribed.store(false, Ordering::Release);
        tracing::trace!("wake word delivery unsubscribed");
        Ok(())
    }

    async fn release(&self) -> Result<()> {
        self.state.subscribed.store(false, Ordering::Release);
        self.state.released.store(true, Ordering::Release);
        tracing::debug!("keyword spotter released");
        Ok(())
    }
}

/// Cloneable input side of a [`KeywordSpotter`]
#[derive(Clone)]
pub struct DetectionFeed {
    state: Arc<SpotterState>,
}

impl DetectionFeed {
    /// Feed an engine label (e.g. `hey_kiwi`, or the canonical `wake`/`stop`)
    ///
    /// # Errors
    ///
    /// Returns error if the label is unknown
    pub fn detect_label(&self, label: &str) -> Result<Delivery> {
        let label = normalize(label);
        let event = self
            .state
            .keywords
            .iter()
            .find(|k| k.label == label || k.event.to_string() == label)
            .map(|k| k.event)
            .ok_or_else(|| Error::WakeWord(format!("unknown label: {label}")))?;

        tracing::info!(%label, %event, "detection label received");
        Ok(self.deliver(event))
    }

    /// Feed transcript text, matching configured phrases
    #[must_use]
    pub fn detect_transcript(&self, transcript: &str) -> Delivery {
        let normalized = normalize(transcript);

        match self
            .state
            .keywords
            .iter()
            .find(|k| normalized.contains(&k.phrase))
        {
            Some(keyword) => {
                tracing::info!(phrase = %keyword.phrase, transcript, "keyword detected");
                self.deliver(keyword.event)
            }
            None => Delivery::NoMatch,
        }
    }

    fn deliver(&self, event: DetectionEvent) -> Delivery {
        if self.state.released.load(Ordering::Acquire)
            || !self.state.subscribed.load(Ordering::Acquire)
        {
            tracing::debug!(%event, "detector paused, dropping detection");
            return Delivery::Paused(event);
        }

        match self.state.events.try_send(event) {
            Ok(()) => Delivery::Delivered(event),
            Err(e) => {
                tracing::warn!(%event, error = %e, "detection channel unavailable");
                Delivery::Dropped(event)
            }
        }
    }
}

fn normalize(text: &str) -> String {
    text.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spotter(capacity: usize) -> (KeywordSpotter, mpsc::Receiver<DetectionEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (KeywordSpotter::new(&WakeWordConfig::default(), tx).unwrap(), rx)
    }

    #[tokio::test]
    async fn delivers_only_while_subscribed() {
        let (engine, mut rx) = spotter(4);
        let feed = engine.feed();

        assert_eq!(feed.detect_label("hey_kiwi").unwrap(), Delivery::Paused(DetectionEvent::Wake));
        assert!(rx.try_recv().is_err());

        engine.subscribe().await.unwrap();
        assert!(engine.is_subscribed());
        assert_eq!(feed.detect_label("hey_kiwi").unwrap(), Delivery::Delivered(DetectionEvent::Wake));
        assert_eq!(rx.recv().await, Some(DetectionEvent::Wake));

        engine.unsubscribe().await.unwrap();
        assert_eq!(feed.detect_label("kiwi_stop").unwrap(), Delivery::Paused(DetectionEvent::Stop));
    }

    #[tokio::test]
    async fn canonical_labels_are_case_insensitive() {
        let (engine, mut rx) = spotter(4);
        engine.subscribe().await.unwrap();
        let feed = engine.feed();

        assert_eq!(feed.detect_label("STOP").unwrap(), Delivery::Delivered(DetectionEvent::Stop));
        assert_eq!(feed.detect_label(" Wake ").unwrap(), Delivery::Delivered(DetectionEvent::Wake));
        assert_eq!(rx.recv().await, Some(DetectionEvent::Stop));
        assert_eq!(rx.recv().await, Some(DetectionEvent::Wake));
    }

    #[test]
    fn unknown_label_is_an_error() {
        let (engine, _rx) = spotter(1);
        assert!(matches!(engine.feed().detect_label("hey_siri"), Err(Error::WakeWord(_))));
    }

    #[tokio::test]
    async fn transcript_matching_prefers_stop() {
        let (engine, mut rx) = spotter(4);
        engine.subscribe().await.unwrap();
        let feed = engine.feed();

        assert_eq!(feed.detect_transcript("hello world"), Delivery::NoMatch);
        assert_eq!(
            feed.detect_transcript("Hey Kiwi, wie spät ist es?"),
            Delivery::Delivered(DetectionEvent::Wake)
        );
        assert_eq!(
            feed.detect_transcript("hey KIWI STOP"),
            Delivery::Delivered(DetectionEvent::Stop)
        );
        assert_eq!(rx.recv().await, Some(DetectionEvent::Wake));
        assert_eq!(rx.recv().await, Some(DetectionEvent::Stop));
    }

    #[tokio::test]
    async fn full_channel_drops() {
        let (engine, _rx) = spotter(1);
        engine.subscribe().await.unwrap();
        let feed = engine.feed();

        assert_eq!(feed.detect_label("wake").unwrap(), Delivery::Delivered(DetectionEvent::Wake));
        assert_eq!(feed.detect_label("wake").unwrap(), Delivery::Dropped(DetectionEvent::Wake));
    }

    #[tokio::test]
    async fn released_engine_cannot_resubscribe() {
        let (engine, _rx) = spotter(1);
        engine.subscribe().await.unwrap();
        engine.release().await.unwrap();

        assert!(!engine.is_subscribed());
        assert!(engine.subscribe().await.is_err());
        assert_eq!(engine.feed().detect_label("wake").unwrap(), Delivery::Paused(DetectionEvent::Wake));
    }

    #[test]
    fn empty_phrase_fails_initialization() {
        let (tx, _rx) = mpsc::channel(1);
        let config = WakeWordConfig {
            wake_phrase: "   ".to_string(),
            ..WakeWordConfig::default()
        };
        assert!(KeywordSpotter::new(&config, tx).is_err());
    }
}
