use super::voice::Voice;
use async_trait::async_trait;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::info;

/// Identity of one utterance handed to the playback manager.
///
/// Lifecycle events carry the token of their originating utterance so that
/// stale events can be rejected by comparison, never by trusting the engine
/// to cancel cleanly.
pub type PlaybackToken = u64;

/// Fixed prosody parameters applied to an utterance
#[derive(Debug, Clone, Copy)]
pub struct Prosody {
    /// Speaking rate relative to the engine default (1.0)
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
}

impl Default for Prosody {
    fn default() -> Self {
        Self {
            rate: 0.85,
            pitch: 1.0,
            volume: 1.0,
        }
    }
}

/// A single synthesized-speech playback request
#[derive(Debug, Clone)]
pub struct Utterance {
    pub token: PlaybackToken,
    pub text: String,
    pub voice: Option<Voice>,
    pub language: String,
    pub prosody: Prosody,
}

/// Lifecycle events reported by a speech engine for one utterance
#[derive(Debug, Clone)]
pub enum PlaybackEvent {
    Started,
    Ended,
    /// Playback failed. `interrupted` marks the cancel-for-new-utterance
    /// path, which is never a user-visible error.
    Error { interrupted: bool, message: String },
}

/// Errors raised while submitting an utterance to the engine
#[derive(Debug, Clone, Error)]
pub enum SpeechError {
    #[error("speech engine unavailable: {0}")]
    EngineUnavailable(String),
}

/// Speech output device trait
///
/// The engine owns a single global "current utterance" slot. Callers must
/// assume stale lifecycle events can still arrive after `cancel` and filter
/// them by token.
#[async_trait]
pub trait SpeechEngine: Send + Sync {
    /// Observe the voice catalog. Engines may populate or repopulate the
    /// list after a delay; the channel notifies on every change.
    fn voices(&self) -> watch::Receiver<Vec<Voice>>;

    /// Start speaking. Returns the receiver for this utterance's lifecycle
    /// events.
    async fn speak(&self, utterance: Utterance) -> Result<mpsc::Receiver<PlaybackEvent>, SpeechError>;

    /// Cancel the current utterance, if any. The cancelled utterance
    /// receives an interrupted error event.
    async fn cancel(&self);

    /// Engine name for logging
    fn name(&self) -> &str;
}

/// What a simulated utterance did, for assertions
#[derive(Debug, Clone)]
pub struct SpokenRecord {
    pub token: PlaybackToken,
    pub text: String,
    pub voice: Option<Voice>,
}

struct ActiveUtterance {
    token: PlaybackToken,
    events: mpsc::Sender<PlaybackEvent>,
    driver: JoinHandle<()>,
}

struct EngineInner {
    current: Option<ActiveUtterance>,
    spoken: Vec<SpokenRecord>,
}

/// An in-process speech engine for tests and demos.
///
/// Utterances emit Started after `start_delay` and Ended after
/// `utterance_duration`. A superseding `speak` does NOT silence the previous
/// utterance by itself; only `cancel` does, which mirrors engines that keep
/// delivering events for replaced utterances.
pub struct SimulatedSpeechEngine {
    voices_tx: watch::Sender<Vec<Voice>>,
    inner: Arc<Mutex<EngineInner>>,
    start_delay: Duration,
    utterance_duration: Duration,
    fail_next: AtomicBool,
}

impl SimulatedSpeechEngine {
    pub fn new() -> Self {
        Self::with_voices(Vec::new())
    }

    pub fn with_voices(voices: Vec<Voice>) -> Self {
        let (voices_tx, _) = watch::channel(voices);
        Self {
            voices_tx,
            inner: Arc::new(Mutex::new(EngineInner {
                current: None,
                spoken: Vec::new(),
            })),
            start_delay: Duration::from_millis(10),
            utterance_duration: Duration::from_millis(50),
            fail_next: AtomicBool::new(false),
        }
    }

    pub fn with_pacing(mut self, start_delay: Duration, utterance_duration: Duration) -> Self {
        self.start_delay = start_delay;
        self.utterance_duration = utterance_duration;
        self
    }

    /// Replace the voice catalog, notifying subscribers. Engines report
    /// voices asynchronously; calling this after a delay models that.
    pub fn set_voices(&self, voices: Vec<Voice>) {
        self.voices_tx.send_replace(voices);
    }

    /// Make the next utterance fail with a genuine (non-interrupted) error
    pub fn fail_next_utterance(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    /// Every utterance submitted so far, in order
    pub async fn spoken(&self) -> Vec<SpokenRecord> {
        self.inner.lock().await.spoken.clone()
    }

    /// Whether the engine's current-utterance slot is empty
    pub async fn is_idle(&self) -> bool {
        self.inner.lock().await.current.is_none()
    }
}

impl Default for SimulatedSpeechEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SpeechEngine for SimulatedSpeechEngine {
    fn voices(&self) -> watch::Receiver<Vec<Voice>> {
        self.voices_tx.subscribe()
    }

    async fn speak(&self, utterance: Utterance) -> Result<mpsc::Receiver<PlaybackEvent>, SpeechError> {
        let (tx, rx) = mpsc::channel(8);
        let mut inner = self.inner.lock().await;

        inner.spoken.push(SpokenRecord {
            token: utterance.token,
            text: utterance.text.clone(),
            voice: utterance.voice.clone(),
        });

        let token = utterance.token;
        let fail = self.fail_next.swap(false, Ordering::SeqCst);
        let events = tx.clone();
        let start_delay = self.start_delay;
        let duration = self.utterance_duration;
        let slot = Arc::clone(&self.inner);

        let driver = tokio::spawn(async move {
            tokio::time::sleep(start_delay).await;
            if fail {
                let _ = events
                    .send(PlaybackEvent::Error {
                        interrupted: false,
                        message: "synthesis failed".to_string(),
                    })
                    .await;
            } else {
                let _ = events.send(PlaybackEvent::Started).await;
                tokio::time::sleep(duration).await;
                let _ = events.send(PlaybackEvent::Ended).await;
            }

            // Free the slot if this utterance still owns it
            let mut inner = slot.lock().await;
            if inner.current.as_ref().map(|c| c.token) == Some(token) {
                inner.current = None;
            }
        });

        // A new utterance takes the slot; the superseded driver keeps
        // running until cancelled, like a real engine queue would.
        inner.current = Some(ActiveUtterance {
            token,
            events: tx,
            driver,
        });

        info!("simulated engine speaking utterance {token}");
        Ok(rx)
    }

    async fn cancel(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(current) = inner.current.take() {
            current.driver.abort();
            let _ = current
                .events
                .send(PlaybackEvent::Error {
                    interrupted: true,
                    message: "interrupted".to_string(),
                })
                .await;
            info!("simulated engine cancelled utterance {}", current.token);
        }
    }

    fn name(&self) -> &str {
        "simulated"
    }
}
