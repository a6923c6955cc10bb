use super::engine::{PlaybackEvent, PlaybackToken, Prosody, SpeechEngine, SpeechError, Utterance};
use super::voice::{select_voice, Voice};
use serde::{Deserialize, Serialize};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// Playback configuration: target locale, prosody and voice preference
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpeechSettings {
    /// Locale for voice selection and the utterance language tag
    pub language: String,
    /// Speaking rate, slower than normal for learners
    pub rate: f32,
    pub pitch: f32,
    pub volume: f32,
    /// Prefer voices the engine marks as feminine
    pub prefer_feminine_voice: bool,
}

impl Default for SpeechSettings {
    fn default() -> Self {
        Self {
            language: "nl-NL".to_string(),
            rate: 0.85,
            pitch: 1.0,
            volume: 1.0,
            prefer_feminine_voice: true,
        }
    }
}

/// Observable playback state
#[derive(Debug, Clone, Default)]
pub struct PlaybackStatus {
    pub speaking: bool,
    /// Message of the last genuine playback failure; interrupted utterances
    /// never set this.
    pub last_error: Option<String>,
}

struct CurrentPlayback {
    token: PlaybackToken,
    forwarder: JoinHandle<()>,
}

struct ManagerInner {
    current: Option<CurrentPlayback>,
    voices: Vec<Voice>,
    next_token: PlaybackToken,
}

/// Owns at most one active spoken-utterance lifecycle at a time.
///
/// Every utterance gets a fresh token; lifecycle events are honored only
/// while their token is still current, so events from a superseded utterance
/// can never affect state.
#[derive(Clone)]
pub struct PlaybackManager {
    engine: Arc<dyn SpeechEngine>,
    settings: SpeechSettings,
    inner: Arc<Mutex<ManagerInner>>,
    voices_task: Arc<StdMutex<Option<JoinHandle<()>>>>,
    status_tx: watch::Sender<PlaybackStatus>,
}

impl PlaybackManager {
    pub fn new(engine: Arc<dyn SpeechEngine>, settings: SpeechSettings) -> Self {
        let voices = engine.voices().borrow().clone();
        let inner = Arc::new(Mutex::new(ManagerInner {
            current: None,
            voices,
            next_token: 0,
        }));
        let (status_tx, _) = watch::channel(PlaybackStatus::default());

        // Track asynchronous voice-catalog population until shutdown
        let mut voices_rx = engine.voices();
        let listener_inner = Arc::clone(&inner);
        let listener = tokio::spawn(async move {
            while voices_rx.changed().await.is_ok() {
                let voices = voices_rx.borrow_and_update().clone();
                info!("voice catalog updated: {} voices", voices.len());
                listener_inner.lock().await.voices = voices;
            }
        });

        Self {
            engine,
            settings,
            inner,
            voices_task: Arc::new(StdMutex::new(Some(listener))),
            status_tx,
        }
    }

    /// Subscribe to playback status changes
    pub fn status(&self) -> watch::Receiver<PlaybackStatus> {
        self.status_tx.subscribe()
    }

    /// Speak `text`, superseding any current utterance.
    ///
    /// The previous utterance is cancelled at the engine and its event
    /// forwarder detached first, so its late events are inert.
    pub async fn speak(&self, text: &str) -> Result<PlaybackToken, SpeechError> {
        let mut inner = self.inner.lock().await;

        if let Some(current) = inner.current.take() {
            current.forwarder.abort();
        }
        self.engine.cancel().await;

        inner.next_token += 1;
        let token = inner.next_token;

        let utterance = Utterance {
            token,
            text: normalize_speech_text(text),
            voice: select_voice(
                &inner.voices,
                &self.settings.language,
                self.settings.prefer_feminine_voice,
            ),
            language: self.settings.language.clone(),
            prosody: Prosody {
                rate: self.settings.rate,
                pitch: self.settings.pitch,
                volume: self.settings.volume,
            },
        };

        let events = self.engine.speak(utterance).await?;
        let forwarder = tokio::spawn(Self::forward_events(
            events,
            token,
            Arc::clone(&self.inner),
            self.status_tx.clone(),
        ));

        inner.current = Some(CurrentPlayback { token, forwarder });
        info!("playback started for utterance {token}");
        Ok(token)
    }

    async fn forward_events(
        mut events: mpsc::Receiver<PlaybackEvent>,
        token: PlaybackToken,
        inner: Arc<Mutex<ManagerInner>>,
        status_tx: watch::Sender<PlaybackStatus>,
    ) {
        while let Some(event) = events.recv().await {
            let mut inner = inner.lock().await;

            // Stale utterance: its events must not touch state
            if inner.current.as_ref().map(|c| c.token) != Some(token) {
                warn!("ignoring lifecycle event from superseded utterance {token}");
                break;
            }

            match event {
                PlaybackEvent::Started => {
                    status_tx.send_modify(|s| s.speaking = true);
                }
                PlaybackEvent::Ended => {
                    inner.current = None;
                    status_tx.send_modify(|s| s.speaking = false);
                    break;
                }
                PlaybackEvent::Error { interrupted: true, .. } => {
                    // Cancelled for a new utterance, not a user-visible error
                    inner.current = None;
                    status_tx.send_modify(|s| s.speaking = false);
                    break;
                }
                PlaybackEvent::Error {
                    interrupted: false,
                    message,
                } => {
                    warn!("playback failed for utterance {token}: {message}");
                    inner.current = None;
                    status_tx.send_modify(|s| {
                        s.speaking = false;
                        s.last_error = Some(message);
                    });
                    break;
                }
            }
        }
    }

    /// Whether an utterance currently owns the playback slot
    pub async fn is_active(&self) -> bool {
        self.inner.lock().await.current.is_some()
    }

    /// Cancel playback, detach handlers and stop observing the voice
    /// catalog. Called on session exit and on level change.
    pub async fn shutdown(&self) {
        let mut inner = self.inner.lock().await;
        if let Some(current) = inner.current.take() {
            current.forwarder.abort();
        }
        self.engine.cancel().await;
        if let Ok(mut slot) = self.voices_task.lock() {
            if let Some(task) = slot.take() {
                task.abort();
            }
        }
        self.status_tx.send_modify(|s| s.speaking = false);
        info!("playback manager shut down");
    }
}

/// Normalize text for slow, clear speech: a breathing space after sentence
/// punctuation, all whitespace collapsed.
pub fn normalize_speech_text(text: &str) -> String {
    let mut spaced = String::with_capacity(text.len() + 8);
    for ch in text.chars() {
        spaced.push(ch);
        if matches!(ch, '.' | ',' | '!' | '?') {
            spaced.push(' ');
        }
    }
    spaced.split_whitespace().collect::<Vec<_>>().join(" ")
}
