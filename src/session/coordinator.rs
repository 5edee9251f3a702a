//! Session coordinator
//!
//! Owns the session, the idle timer, and the detector subscription. All
//! triggers (wake/stop detections, idle expiry, explicit requests) are
//! drained from one mailbox by one task, so a trigger's pause, act, resume
//! cycle completes before the next one starts. Triggers arriving meanwhile
//! queue up in FIFO order; an in-flight answer is never aborted.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use super::idle::IdleTimer;
use super::subscription::{DetectorSubscription, PauseGuard, SubscriptionState};
use crate::config::SessionConfig;
use crate::voice::{Announcer, DetectionEvent};
use crate::{Error, Result};

/// Mailbox capacity for explicit requests
const COMMAND_BUFFER: usize = 32;

/// Why a session ended
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EndReason {
    /// Stop phrase or explicit request
    Explicit,
    /// Idle timeout expired
    Idle,
    /// Detector could not be resumed
    Error,
    /// Coordinator stopped with the session still open
    Shutdown,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Explicit => write!(f, "explicit"),
            Self::Idle => write!(f, "idle"),
            Self::Error => write!(f, "error"),
            Self::Shutdown => write!(f, "shutdown"),
        }
    }
}

/// Activity that keeps a session alive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Activity {
    /// The user spoke
    UserSpeech,
    /// The assistant produced a response
    AssistantResponse,
    /// A tool call ran
    ToolCall,
}

/// Observable coordinator state
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SessionSnapshot {
    pub active: bool,
    pub subscription: SubscriptionState,
    #[serde(skip_serializing)]
    pub idle_deadline: Option<Instant>,
    /// Set once the detector failed to resume
    pub detector_fault: bool,
    pub sessions_started: u64,
    pub sessions_ended: u64,
    pub last_end_reason: Option<EndReason>,
}

impl SessionSnapshot {
    /// Time left before the idle timer fires
    #[must_use]
    pub fn idle_remaining(&self) -> Option<Duration> {
        self.idle_deadline
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }
}

#[derive(Debug)]
enum Command {
    Start,
    End,
    Activity(Activity),
    Detection(DetectionEvent),
    Shutdown,
}

struct Envelope {
    command: Command,
    reply: oneshot::Sender<SessionSnapshot>,
}

/// Cloneable handle for sending triggers to a running coordinator
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Envelope>,
    state: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// Start a session (greeting, then active)
    ///
    /// # Errors
    ///
    /// Returns error if the coordinator has stopped
    pub async fn start(&self) -> Result<SessionSnapshot> {
        self.send(Command::Start).await
    }

    /// End the current session
    ///
    /// # Errors
    ///
    /// Returns error if the coordinator has stopped
    pub async fn end(&self) -> Result<SessionSnapshot> {
        self.send(Command::End).await
    }

    /// Report activity, re-arming the idle timer of an active session
    ///
    /// # Errors
    ///
    /// Returns error if the coordinator has stopped
    pub async fn activity(&self, activity: Activity) -> Result<SessionSnapshot> {
        self.send(Command::Activity(activity)).await
    }

    /// Handle a detection as if the engine had delivered it
    ///
    /// # Errors
    ///
    /// Returns error if the coordinator has stopped
    pub async fn detect(&self, event: DetectionEvent) -> Result<SessionSnapshot> {
        self.send(Command::Detection(event)).await
    }

    /// Stop the coordinator after queued triggers are handled
    ///
    /// # Errors
    ///
    /// Returns error if the coordinator has already stopped
    pub async fn shutdown(&self) -> Result<SessionSnapshot> {
        self.send(Command::Shutdown).await
    }

    /// Latest published state
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    /// Watch state changes
    #[must_use]
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.state.clone()
    }

    async fn send(&self, command: Command) -> Result<SessionSnapshot> {
        let (reply, response) = oneshot::channel();
        self.commands
            .send(Envelope { command, reply })
            .await
            .map_err(|_| Error::Session("coordinator stopped".to_string()))?;
        response
            .await
            .map_err(|_| Error::Session("coordinator dropped request".to_string()))
    }
}

/// Single authority over the session lifecycle
pub struct SessionCoordinator {
    config: SessionConfig,
    announcer: Announcer,
    detector: DetectorSubscription,
    idle: IdleTimer,
    expiries: mpsc::UnboundedReceiver<u64>,
    active: bool,
    detector_fault: bool,
    sessions_started: u64,
    sessions_ended: u64,
    last_end_reason: Option<EndReason>,
    state: watch::Sender<SessionSnapshot>,
}

impl SessionCoordinator {
    /// Create a coordinator owning its collaborators
    #[must_use]
    pub fn new(config: SessionConfig, announcer: Announcer, detector: DetectorSubscription) -> Self {
        let (expiry_tx, expiries) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(SessionSnapshot {
            active: false,
            subscription: detector.state(),
            idle_deadline: None,
            detector_fault: false,
            sessions_started: 0,
            sessions_ended: 0,
            last_end_reason: None,
        });

        Self {
            config,
            announcer,
            detector,
            idle: IdleTimer::new(expiry_tx),
            expiries,
            active: false,
            detector_fault: false,
            sessions_started: 0,
            sessions_ended: 0,
            last_end_reason: None,
            state,
        }
    }

    /// Run the coordinator on its own task
    ///
    /// `detections` is the channel registered with the wake word engine.
    #[must_use]
    pub fn spawn(
        self,
        detections: mpsc::Receiver<DetectionEvent>,
    ) -> (SessionHandle, JoinHandle<()>) {
        let (commands, mailbox) = mpsc::channel(COMMAND_BUFFER);
        let handle = SessionHandle {
            commands,
            state: self.state.subscribe(),
        };
        let task = tokio::spawn(self.run(mailbox, detections));
        (handle, task)
    }

    async fn run(
        mut self,
        mut mailbox: mpsc::Receiver<Envelope>,
        mut detections: mpsc::Receiver<DetectionEvent>,
    ) {
        tracing::info!(
            idle_timeout_ms = self.config.idle_timeout.as_millis(),
            "session coordinator running"
        );
        let mut detections_open = true;

        loop {
            tokio::select! {
                envelope = mailbox.recv() => {
                    let Some(Envelope { command, reply }) = envelope else {
                        tracing::debug!("all session handles dropped");
                        break;
                    };
                    let shutdown = matches!(command, Command::Shutdown);
                    self.dispatch(command).await;
                    let _ = reply.send(self.snapshot());
                    if shutdown {
                        break;
                    }
                }
                event = detections.recv(), if detections_open => match event {
                    Some(event) => self.on_detection(event).await,
                    None => {
                        tracing::warn!("detection channel closed");
                        detections_open = false;
                    }
                },
                Some(generation) = self.expiries.recv() => {
                    if self.idle.take_expiry(generation) {
                        self.on_idle_expired().await;
                    }
                }
            }
        }

        self.deactivate(EndReason::Shutdown);
        self.publish();
        tracing::info!("session coordinator stopped");
    }

    async fn dispatch(&mut self, command: Command) {
        tracing::debug!(?command, "handling session request");
        match command {
            Command::Start => self.on_wake_detected().await,
            Command::End => self.on_stop_detected().await,
            Command::Activity(activity) => self.reset_idle_on(activity),
            Command::Detection(event) => self.on_detection(event).await,
            Command::Shutdown => {
                self.deactivate(EndReason::Shutdown);
            }
        }
    }

    async fn on_detection(&mut self, event: DetectionEvent) {
        match event {
            DetectionEvent::Wake => self.on_wake_detected().await,
            DetectionEvent::Stop => self.on_stop_detected().await,
        }
    }

    /// Answer a wake word: pause detection, start, resume
    async fn on_wake_detected(&mut self) {
        let guard = self.detector.pause().await;
        self.publish();
        self.start().await;
        self.finish_cycle(guard).await;
    }

    /// Stop phrase: pause detection, end, resume
    async fn on_stop_detected(&mut self) {
        let guard = self.detector.pause().await;
        self.publish();
        self.end(EndReason::Explicit).await;
        self.finish_cycle(guard).await;
    }

    /// Idle expiry: pause detection, end, resume
    async fn on_idle_expired(&mut self) {
        tracing::info!("session idle timeout expired");
        let guard = self.detector.pause().await;
        self.publish();
        self.end(EndReason::Idle).await;
        self.finish_cycle(guard).await;
    }

    /// Resume detection; a failed resume ends the session
    async fn finish_cycle(&mut self, guard: PauseGuard) {
        if guard.resume().await.is_err() {
            self.detector_fault = true;
            self.end(EndReason::Error).await;
        }
        self.publish();
    }

    /// Greet (best effort), then activate and arm the idle timer
    async fn start(&mut self) {
        if self.active {
            tracing::debug!("session already active");
            return;
        }

        let announcement = self.announcer.announce(&self.config.greeting).await;
        self.active = true;
        self.sessions_started += 1;
        self.idle.arm(self.config.idle_timeout);
        tracing::info!(played = announcement.was_played(), "session started");
        self.publish();
    }

    /// Deactivate, then say goodbye (best effort)
    async fn end(&mut self, reason: EndReason) {
        if !self.deactivate(reason) {
            return;
        }
        self.publish();

        let announcement = self.announcer.announce(&self.config.goodbye).await;
        tracing::info!(%reason, played = announcement.was_played(), "session ended");
    }

    /// Close the session without a cue; false if none was open
    fn deactivate(&mut self, reason: EndReason) -> bool {
        self.idle.clear();
        if !self.active {
            tracing::debug!(%reason, "no active session to end");
            return false;
        }

        self.active = false;
        self.sessions_ended += 1;
        self.last_end_reason = Some(reason);
        true
    }

    /// Push the idle deadline a full timeout past `activity`
    fn reset_idle_on(&mut self, activity: Activity) {
        if !self.active {
            tracing::trace!(?activity, "activity without active session ignored");
            return;
        }

        self.idle.arm(self.config.idle_timeout);
        tracing::debug!(?activity, "idle timer reset");
        self.publish();
    }

    fn snapshot(&self) -> SessionSnapshot {
        SessionSnapshot {
            active: self.active,
            subscription: self.detector.state(),
            idle_deadline: self.idle.deadline(),
            detector_fault: self.detector_fault,
            sessions_started: self.sessions_started,
            sessions_ended: self.sessions_ended,
            last_end_reason: self.last_end_reason,
        }
    }

    fn publish(&self) {
        self.state.send_replace(self.snapshot());
    }
}
