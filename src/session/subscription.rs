//! Pause/resume discipline over the wake word engine
//!
//! Every pause hands out a [`PauseGuard`]. Resuming consumes the guard; a
//! guard dropped without resuming (task cancelled, panic unwinding) schedules
//! the resume on the runtime so the detector is never left paused.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde::Serialize;

use crate::Result;
use crate::voice::WakeWordEngine;

/// Whether the detection stream is delivering events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SubscriptionState {
    Listening,
    Paused,
}

/// Exclusive owner of the engine subscription
pub struct DetectorSubscription {
    engine: Arc<dyn WakeWordEngine>,
    listening: Arc<AtomicBool>,
}

impl DetectorSubscription {
    /// Subscribe to `engine` and take ownership of its subscription
    ///
    /// # Errors
    ///
    /// Returns error if the initial subscribe fails
    pub async fn attach(engine: Arc<dyn WakeWordEngine>) -> Result<Self> {
        engine.subscribe().await?;
        tracing::info!("wake word detection subscribed");

        Ok(Self {
            engine,
            listening: Arc::new(AtomicBool::new(true)),
        })
    }

    #[must_use]
    pub fn state(&self) -> SubscriptionState {
        if self.listening.load(Ordering::Acquire) {
            SubscriptionState::Listening
        } else {
            SubscriptionState::Paused
        }
    }

    /// Stop delivery until the returned guard is resumed
    ///
    /// A failed unsubscribe is logged; the guard is still returned so the
    /// matching resume is attempted.
    pub async fn pause(&self) -> PauseGuard {
        match self.engine.unsubscribe().await {
            Ok(()) => self.listening.store(false, Ordering::Release),
            Err(e) => tracing::error!(error = %e, "failed to pause wake word detection"),
        }

        PauseGuard {
            engine: Arc::clone(&self.engine),
            listening: Arc::clone(&self.listening),
            pending: true,
        }
    }
}

/// Outstanding pause that must be matched by a resume
#[must_use = "a paused detector must be resumed"]
pub struct PauseGuard {
    engine: Arc<dyn WakeWordEngine>,
    listening: Arc<AtomicBool>,
    pending: bool,
}

impl PauseGuard {
    /// Resume delivery
    ///
    /// # Errors
    ///
    /// Returns error if the engine refuses to resubscribe; wake word handling
    /// stays disabled in that case.
    pub async fn resume(mut self) -> Result<()> {
        self.pending = false;
        resubscribe(self.engine.as_ref(), &self.listening).await
    }
}

impl Drop for PauseGuard {
    fn drop(&mut self) {
        if !self.pending {
            return;
        }

        let engine = Arc::clone(&self.engine);
        let listening = Arc::clone(&self.listening);
        if let Ok(handle) = tokio::runtime::Handle::try_current() {
            tracing::warn!("pause guard dropped without resume, resuming in background");
            handle.spawn(async move {
                let _ = resubscribe(engine.as_ref(), &listening).await;
            });
        } else {
            tracing::error!("pause guard dropped outside runtime, wake word detection left paused");
        }
    }
}

async fn resubscribe(engine: &dyn WakeWordEngine, listening: &AtomicBool) -> Result<()> {
    match engine.subscribe().await {
        Ok(()) => {
            listening.store(true, Ordering::Release);
            Ok(())
        }
        Err(e) => {
            tracing::error!(
                error = %e,
                "failed to resume wake word detection, wake word handling disabled"
            );
            Err(e)
        }
    }
}
