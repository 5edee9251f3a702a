//! Shared test utilities

#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use kiwi_voice::config::SessionConfig;
use kiwi_voice::session::{DetectorSubscription, SessionCoordinator, SessionHandle};
use kiwi_voice::voice::{
    Announcer, AudioOutput, DecodedAudio, DetectionEvent, SpeechCapability, WakeWordEngine,
};
use kiwi_voice::{Error, Result};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// Ordered record of calls made into the fakes
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<String>>>);

impl CallLog {
    pub fn push(&self, entry: impl Into<String>) {
        self.0.lock().unwrap().push(entry.into());
    }

    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    pub fn clear(&self) {
        self.0.lock().unwrap().clear();
    }

    #[must_use]
    pub fn count(&self, entry: &str) -> usize {
        self.0.lock().unwrap().iter().filter(|e| *e == entry).count()
    }
}

/// Speech that records what it renders and fails on chosen texts
pub struct FakeSpeech {
    log: CallLog,
    failing: Mutex<HashSet<String>>,
    delay: Mutex<Duration>,
}

impl FakeSpeech {
    pub fn fail_on(&self, text: &str) {
        self.failing.lock().unwrap().insert(text.to_string());
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock().unwrap() = delay;
    }
}

#[async_trait]
impl SpeechCapability for FakeSpeech {
    async fn render(&self, text: &str) -> Result<DecodedAudio> {
        self.log.push(format!("speak:{text}"));

        let delay = *self.delay.lock().unwrap();
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }

        if self.failing.lock().unwrap().contains(text) {
            return Err(Error::Tts("synthesis failed".to_string()));
        }
        Ok(DecodedAudio {
            samples: vec![0.0; 240],
            sample_rate: 24_000,
        })
    }
}

/// Output device that can be unplugged
pub struct FakeOutput {
    log: CallLog,
    available: AtomicBool,
}

impl FakeOutput {
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }
}

#[async_trait]
impl AudioOutput for FakeOutput {
    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    async fn play(&self, _audio: DecodedAudio) -> Result<()> {
        self.log.push("play");
        Ok(())
    }
}

/// Engine that records subscription calls and can refuse to resubscribe
pub struct FakeEngine {
    log: CallLog,
    fail_subscribe: AtomicBool,
}

impl FakeEngine {
    pub fn fail_subscribe(&self, fail: bool) {
        self.fail_subscribe.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl WakeWordEngine for FakeEngine {
    async fn subscribe(&self) -> Result<()> {
        if self.fail_subscribe.load(Ordering::SeqCst) {
            self.log.push("subscribe-failed");
            return Err(Error::WakeWord("device lost".to_string()));
        }
        self.log.push("subscribe");
        Ok(())
    }

    async fn unsubscribe(&self) -> Result<()> {
        self.log.push("unsubscribe");
        Ok(())
    }

    async fn release(&self) -> Result<()> {
        self.log.push("release");
        Ok(())
    }
}

/// Coordinator wired to fakes
pub struct Harness {
    pub log: CallLog,
    pub speech: Arc<FakeSpeech>,
    pub output: Arc<FakeOutput>,
    pub engine: Arc<FakeEngine>,
}

impl Harness {
    #[must_use]
    pub fn new() -> Self {
        let log = CallLog::default();
        Self {
            speech: Arc::new(FakeSpeech {
                log: log.clone(),
                failing: Mutex::new(HashSet::new()),
                delay: Mutex::new(Duration::ZERO),
            }),
            output: Arc::new(FakeOutput {
                log: log.clone(),
                available: AtomicBool::new(true),
            }),
            engine: Arc::new(FakeEngine {
                log: log.clone(),
                fail_subscribe: AtomicBool::new(false),
            }),
            log,
        }
    }

    /// Attach, spawn, and clear the attach call from the log
    pub async fn spawn(
        &self,
        config: SessionConfig,
    ) -> (SessionHandle, mpsc::Sender<DetectionEvent>, JoinHandle<()>) {
        let announcer = Announcer::new(self.speech.clone(), self.output.clone());
        self.spawn_with(config, announcer).await
    }

    /// Like [`Harness::spawn`], speaking through `announcer`
    pub async fn spawn_with(
        &self,
        config: SessionConfig,
        announcer: Announcer,
    ) -> (SessionHandle, mpsc::Sender<DetectionEvent>, JoinHandle<()>) {
        let subscription = DetectorSubscription::attach(self.engine.clone())
            .await
            .expect("attach failed");
        let (events, detections) = mpsc::channel(8);
        let (handle, task) = SessionCoordinator::new(config, announcer, subscription).spawn(detections);
        self.log.clear();
        (handle, events, task)
    }
}

/// Session config with short, recognizable cues
#[must_use]
pub fn test_session_config(idle_timeout_ms: u64) -> SessionConfig {
    SessionConfig {
        greeting: "hello".to_string(),
        goodbye: "goodbye".to_string(),
        idle_timeout: Duration::from_millis(idle_timeout_ms),
    }
}
