//! Daemon - the main voice service
//!
//! Wires the wake word engine, speech output, session coordinator, and HTTP
//! API together, and tears them down on Ctrl-C.

use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::api::ApiServerBuilder;
use crate::session::{DetectorSubscription, SessionCoordinator, SessionHandle};
use crate::tools::ToolRegistry;
use crate::voice::{
    Announcer, AudioOutput, AudioPlayback, DetectionFeed, KeywordSpotter, NullOutput,
    TextToSpeech, WakeWordEngine,
};
use crate::{Config, Result};

/// Capacity of the detection channel between engine and coordinator
const DETECTION_BUFFER: usize = 16;

/// Running voice session pieces
struct VoiceRuntime {
    engine: Arc<dyn WakeWordEngine>,
    feed: DetectionFeed,
    handle: SessionHandle,
    task: JoinHandle<()>,
}

/// The kiwi daemon
pub struct Daemon {
    config: Config,
}

impl Daemon {
    /// Create a new daemon instance
    #[must_use]
    pub const fn new(config: Config) -> Self {
        Self { config }
    }

    /// Upstream speech client for the `/api/tts` route
    fn init_speech_proxy(&self) -> Option<TextToSpeech> {
        let key = self.config.api_server.openai_api_key.clone()?;
        match TextToSpeech::new_openai(
            key,
            &self.config.api_server.openai_base_url,
            self.config.voice.tts_timeout,
        ) {
            Ok(tts) => {
                tracing::info!(
                    url = %self.config.api_server.openai_base_url,
                    "TTS proxy enabled"
                );
                Some(tts)
            }
            Err(e) => {
                tracing::warn!(error = %e, "TTS proxy disabled");
                None
            }
        }
    }

    /// Start the wake word engine and the session coordinator
    ///
    /// # Errors
    ///
    /// Returns error if the engine cannot be created or subscribed
    async fn init_voice(&self) -> Result<VoiceRuntime> {
        let (events, detections) = mpsc::channel(DETECTION_BUFFER);
        let spotter = KeywordSpotter::new(&self.config.wake_word, events)?;
        let feed = spotter.feed();
        let engine: Arc<dyn WakeWordEngine> = Arc::new(spotter);

        let speech = TextToSpeech::new_gateway(
            &self.config.voice.tts_url,
            self.config.voice.tts_voice.clone(),
            self.config.voice.tts_model.clone(),
            self.config.voice.tts_timeout,
        )?;
        let playback = AudioPlayback::new();
        let output: Arc<dyn AudioOutput> = if playback.is_available() {
            Arc::new(playback)
        } else {
            tracing::warn!("no audio output device, greetings will be skipped");
            Arc::new(NullOutput)
        };
        let announcer =
            Announcer::new(Arc::new(speech), output).with_timeout(self.config.voice.cue_timeout);

        let subscription = DetectorSubscription::attach(engine.clone()).await?;
        let coordinator =
            SessionCoordinator::new(self.config.session.clone(), announcer, subscription);
        let (handle, task) = coordinator.spawn(detections);

        tracing::info!(
            wake = %self.config.wake_word.wake_phrase,
            stop = %self.config.wake_word.stop_phrase,
            "listening for wake word"
        );

        Ok(VoiceRuntime {
            engine,
            feed,
            handle,
            task,
        })
    }

    /// Run until interrupted
    ///
    /// # Errors
    ///
    /// Returns error if startup fails or the API server exits with an error
    pub async fn run(self) -> Result<()> {
        let mut builder =
            ApiServerBuilder::new(self.config.api_server.port).tools(ToolRegistry::builtin());

        if let Some(proxy) = self.init_speech_proxy() {
            builder = builder.speech(proxy);
        } else {
            tracing::warn!("OPENAI_API_KEY not set, /api/tts will return 503");
        }

        let voice = if self.config.voice.enabled {
            let runtime = self.init_voice().await?;
            builder = builder
                .session(runtime.handle.clone())
                .detections(runtime.feed.clone());
            Some(runtime)
        } else {
            tracing::info!("voice disabled, running API only");
            None
        };

        let mut api = builder.build().spawn();

        let shutdown = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!(error = %e, "failed to listen for Ctrl-C");
                std::future::pending::<()>().await;
            }
        };

        let result = tokio::select! {
            () = shutdown => {
                tracing::info!("shutdown requested");
                api.abort();
                Ok(())
            }
            exit = &mut api => match exit {
                Ok(result) => result,
                Err(e) => {
                    tracing::error!(error = %e, "API server task failed");
                    Ok(())
                }
            },
        };

        if let Some(voice) = voice {
            shutdown_voice(voice).await;
        }

        tracing::info!("kiwi stopped");
        result
    }
}

/// Stop the coordinator, then release the engine
async fn shutdown_voice(voice: VoiceRuntime) {
    if let Err(e) = voice.handle.shutdown().await {
        tracing::debug!(error = %e, "coordinator already stopped");
    }
    drop(voice.handle);
    if let Err(e) = voice.task.await {
        tracing::warn!(error = %e, "coordinator task failed");
    }
    if let Err(e) = voice.engine.release().await {
        tracing::warn!(error = %e, "failed to release wake word engine");
    }
}
