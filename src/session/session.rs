use super::config::SessionConfig;
use super::error::SessionError;
use super::guard::RequestGuard;
use super::level::ProficiencyLevel;
use super::screen::Screen;
use super::state::{RecordingState, StopReason};
use super::status::{Notice, SessionSnapshot};
use super::turn::Turn;
use crate::audio::{CaptureError, FragmentBuffer, Microphone};
use crate::services::{GenerationError, ReplyGenerator, ReplyRequest, Transcriber};
use crate::speech::{PlaybackManager, SpeechEngine};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

/// How long the level-not-selected warning stays visible
const NOTICE_TTL: Duration = Duration::from_secs(3);

/// Grace period for buffered fragments to drain after capture stops
const FRAGMENT_DRAIN: Duration = Duration::from_millis(250);

struct ActiveRecording {
    turn_id: u64,
    buffer: Arc<Mutex<FragmentBuffer>>,
    collector: JoinHandle<()>,
    countdown: JoinHandle<()>,
}

struct PlaybackBinding {
    manager: PlaybackManager,
    /// Task mirroring playback status into the session snapshot
    mirror: JoinHandle<()>,
}

struct Inner {
    screen: Screen,
    level: Option<ProficiencyLevel>,
    recording_state: RecordingState,
    seconds_remaining: u32,
    turn: Turn,
    next_turn_id: u64,
    notice: Option<Notice>,
    next_notice_id: u64,
    guard: RequestGuard,
    active_recording: Option<ActiveRecording>,
    playback: Option<PlaybackBinding>,
    speaking: bool,
}

impl Inner {
    fn new(config: &SessionConfig) -> Self {
        Self {
            screen: Screen::Selection,
            level: None,
            recording_state: RecordingState::Idle,
            seconds_remaining: config.countdown_secs,
            turn: Turn::new(1),
            next_turn_id: 1,
            notice: None,
            next_notice_id: 0,
            guard: RequestGuard::new(),
            active_recording: None,
            playback: None,
            speaking: false,
        }
    }
}

fn snapshot(inner: &Inner) -> SessionSnapshot {
    SessionSnapshot {
        screen: inner.screen,
        level: inner.level,
        recording: inner.recording_state,
        seconds_remaining: inner.seconds_remaining,
        transcript: inner.turn.transcript.clone(),
        reply: inner.turn.reply.clone(),
        speaking: inner.speaking,
        notice: inner.notice.as_ref().map(|n| n.text.clone()),
    }
}

fn publish(inner: &Inner, tx: &watch::Sender<SessionSnapshot>) {
    tx.send_replace(snapshot(inner));
}

fn not_available(inner: &Inner) -> SessionError {
    SessionError::NotAvailable {
        screen: inner.screen,
        state: inner.recording_state,
    }
}

/// The conversation session controller.
///
/// Sequences microphone capture, transcription, reply generation and speech
/// playback for one user session, and owns the screen state machine that
/// gates them. All collaborating services are injected as trait objects.
///
/// Overlapping asynchronous completions are rejected by identity: turn ids
/// for transcription, the request guard for generation, playback tokens for
/// speech. Presentation observes the session through [`subscribe`].
///
/// [`subscribe`]: ConversationSession::subscribe
#[derive(Clone)]
pub struct ConversationSession {
    config: SessionConfig,
    microphone: Arc<Mutex<Box<dyn Microphone>>>,
    transcriber: Arc<dyn Transcriber>,
    generator: Arc<dyn ReplyGenerator>,
    engine: Arc<dyn SpeechEngine>,
    inner: Arc<Mutex<Inner>>,
    state_tx: watch::Sender<SessionSnapshot>,
}

impl ConversationSession {
    pub fn new(
        config: SessionConfig,
        microphone: Box<dyn Microphone>,
        transcriber: Arc<dyn Transcriber>,
        generator: Arc<dyn ReplyGenerator>,
        engine: Arc<dyn SpeechEngine>,
    ) -> Self {
        info!("creating conversation session: {}", config.session_id);

        let inner = Inner::new(&config);
        let (state_tx, _) = watch::channel(snapshot(&inner));

        Self {
            config,
            microphone: Arc::new(Mutex::new(microphone)),
            transcriber,
            generator,
            engine,
            inner: Arc::new(Mutex::new(inner)),
            state_tx,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Subscribe to session snapshots. A new snapshot is published after
    /// every transition.
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.state_tx.subscribe()
    }

    /// Current snapshot
    pub async fn snapshot(&self) -> SessionSnapshot {
        snapshot(&*self.inner.lock().await)
    }

    // ------------------------------------------------------------------
    // Screen state machine
    // ------------------------------------------------------------------

    /// Selection → DetailedRules
    pub async fn open_rules(&self) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().await;
        if inner.screen != Screen::Selection {
            return Err(not_available(&inner));
        }
        inner.screen = Screen::DetailedRules;
        publish(&inner, &self.state_tx);
        Ok(())
    }

    /// Selection → LevelSelection
    pub async fn open_level_selection(&self) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().await;
        if inner.screen != Screen::Selection {
            return Err(not_available(&inner));
        }
        inner.screen = Screen::LevelSelection;
        publish(&inner, &self.state_tx);
        Ok(())
    }

    /// DetailedRules | LevelSelection → Selection
    pub async fn back_to_selection(&self) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().await;
        match inner.screen {
            Screen::DetailedRules | Screen::LevelSelection => {}
            _ => return Err(not_available(&inner)),
        }
        inner.screen = Screen::Selection;
        publish(&inner, &self.state_tx);
        Ok(())
    }

    /// LevelSelection → Chat, fixing the proficiency level and fetching the
    /// level's greeting.
    pub async fn choose_level(&self, level: ProficiencyLevel) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().await;
        if inner.screen != Screen::LevelSelection {
            return Err(not_available(&inner));
        }
        inner.level = Some(level);
        info!("proficiency level selected: {level}");
        self.enter_chat(&mut inner);
        publish(&inner, &self.state_tx);
        Ok(())
    }

    /// Selection → Chat directly. Requires a level from an earlier visit;
    /// without one, only the level warning is raised.
    pub async fn quick_start(&self) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().await;
        if inner.screen != Screen::Selection {
            return Err(not_available(&inner));
        }
        if inner.level.is_none() {
            let err = SessionError::LevelNotSelected;
            self.set_notice(&mut inner, &err, true);
            publish(&inner, &self.state_tx);
            return Err(err);
        }
        self.enter_chat(&mut inner);
        publish(&inner, &self.state_tx);
        Ok(())
    }

    /// Chat → Selection. Stops playback and capture, aborts the in-flight
    /// request and clears transient state.
    pub async fn leave_chat(&self) -> Result<(), SessionError> {
        {
            let inner = self.inner.lock().await;
            if inner.screen != Screen::Chat {
                return Err(not_available(&inner));
            }
        }
        self.abort_recording().await;

        let mut inner = self.inner.lock().await;
        self.teardown_chat(&mut inner).await;
        inner.screen = Screen::Selection;
        inner.recording_state = RecordingState::Idle;
        inner.seconds_remaining = self.config.countdown_secs;
        inner.next_turn_id += 1;
        inner.turn = Turn::new(inner.next_turn_id);
        info!("left chat, back to selection");
        publish(&inner, &self.state_tx);
        Ok(())
    }

    /// Switch proficiency level mid-chat: same teardown as leaving, then a
    /// fresh greeting for the new level. A stale greeting for the old level
    /// can never play: its request is aborted and its handle invalidated.
    pub async fn change_level(&self, level: ProficiencyLevel) -> Result<(), SessionError> {
        {
            let inner = self.inner.lock().await;
            if inner.screen != Screen::Chat {
                return Err(not_available(&inner));
            }
        }
        self.abort_recording().await;

        let mut inner = self.inner.lock().await;
        self.teardown_chat(&mut inner).await;
        inner.level = Some(level);
        inner.recording_state = RecordingState::Idle;
        inner.seconds_remaining = self.config.countdown_secs;
        inner.next_turn_id += 1;
        inner.turn = Turn::new(inner.next_turn_id);
        info!("proficiency level changed to {level}");
        self.enter_chat(&mut inner);
        publish(&inner, &self.state_tx);
        Ok(())
    }

    fn enter_chat(&self, inner: &mut Inner) {
        inner.screen = Screen::Chat;
        self.bind_playback(inner);
        if let Some(level) = inner.level {
            self.dispatch_generation(inner, ReplyRequest::greeting(level), false);
        }
        info!("chat opened");
    }

    // ------------------------------------------------------------------
    // Recording session
    // ------------------------------------------------------------------

    /// Start a new recording turn.
    ///
    /// Requires a chosen proficiency level; the microphone is never touched
    /// without one. Any unconfirmed prior transcript is discarded.
    pub async fn start_recording(&self) -> Result<(), SessionError> {
        let turn_id = {
            let mut inner = self.inner.lock().await;

            if inner.level.is_none() {
                warn!("recording refused: no proficiency level selected");
                let err = SessionError::LevelNotSelected;
                self.set_notice(&mut inner, &err, true);
                publish(&inner, &self.state_tx);
                return Err(err);
            }
            if inner.screen != Screen::Chat {
                return Err(not_available(&inner));
            }
            match inner.recording_state {
                RecordingState::Idle | RecordingState::AwaitingConfirmation => {}
                _ => return Err(not_available(&inner)),
            }

            inner.notice = None;
            inner.next_turn_id += 1;
            inner.turn = Turn::new(inner.next_turn_id);
            publish(&inner, &self.state_tx);
            inner.turn.id
        };

        // Acquire the device without holding the session lock
        let chunks = {
            let mut microphone = self.microphone.lock().await;
            match microphone.start().await {
                Ok(chunks) => chunks,
                Err(e) => {
                    let err = match e {
                        CaptureError::AccessDenied(m) => SessionError::DeviceAccessDenied(m),
                        CaptureError::Unavailable(m) => SessionError::DeviceUnavailable(m),
                    };
                    warn!("recording aborted: {err}");
                    let mut inner = self.inner.lock().await;
                    inner.recording_state = RecordingState::Idle;
                    self.set_notice(&mut inner, &err, false);
                    publish(&inner, &self.state_tx);
                    return Err(err);
                }
            }
        };

        let buffer = Arc::new(Mutex::new(FragmentBuffer::new()));
        let collector = {
            let buffer = Arc::clone(&buffer);
            let mut chunks = chunks;
            tokio::spawn(async move {
                while let Some(chunk) = chunks.recv().await {
                    buffer.lock().await.push(chunk.bytes);
                }
            })
        };

        let mut inner = self.inner.lock().await;
        if inner.active_recording.is_some() {
            // A concurrent start won the race; back out and release the device
            collector.abort();
            drop(inner);
            self.release_microphone().await;
            let inner = self.inner.lock().await;
            return Err(not_available(&inner));
        }

        let countdown = self.spawn_countdown(turn_id);
        inner.recording_state = RecordingState::Recording;
        inner.seconds_remaining = self.config.countdown_secs;
        inner.active_recording = Some(ActiveRecording {
            turn_id,
            buffer,
            collector,
            countdown,
        });
        info!(
            "recording started (turn {turn_id}, limit {}s)",
            self.config.countdown_secs
        );
        publish(&inner, &self.state_tx);
        Ok(())
    }

    /// Stop the current recording and hand it to the transcription service.
    ///
    /// Idempotent: the timer-forced stop and a racing manual stop result in
    /// exactly one execution.
    pub async fn stop_recording(&self) -> Result<(), SessionError> {
        self.stop_recording_inner(StopReason::Manual).await
    }

    async fn stop_recording_inner(&self, reason: StopReason) -> Result<(), SessionError> {
        // Taking the slot is the idempotence point: the loser of a
        // timer/manual race finds it empty and returns.
        let mut active = {
            let mut inner = self.inner.lock().await;
            match inner.active_recording.take() {
                Some(active) => active,
                None => return Ok(()),
            }
        };

        info!("stopping recording ({reason:?})");
        if reason == StopReason::Manual {
            active.countdown.abort();
        }

        self.release_microphone().await;

        // Let buffered fragments drain; delivery may lag the stop slightly
        if tokio::time::timeout(FRAGMENT_DRAIN, &mut active.collector)
            .await
            .is_err()
        {
            warn!("fragment collector did not settle in time");
            active.collector.abort();
        }

        let mut inner = self.inner.lock().await;
        inner.seconds_remaining = self.config.countdown_secs;

        let assembled = active.buffer.lock().await.assemble(&self.config.mime_type);
        let Some(audio) = assembled else {
            warn!("no audio fragments recorded for this session");
            inner.recording_state = RecordingState::Idle;
            let err = SessionError::NoAudioCaptured;
            self.set_notice(&mut inner, &err, false);
            publish(&inner, &self.state_tx);
            return Err(err);
        };

        info!("recording assembled: {} bytes", audio.len());
        inner.turn.recorded_audio = Some(audio.clone());
        inner.recording_state = RecordingState::Processing;
        publish(&inner, &self.state_tx);
        drop(inner);

        let turn_id = active.turn_id;
        let session = self.clone();
        tokio::spawn(async move {
            let result = session
                .transcriber
                .transcribe(&audio, &session.config.language)
                .await;

            let mut inner = session.inner.lock().await;
            if inner.turn.id != turn_id {
                warn!("discarding transcript for superseded turn {turn_id}");
                return;
            }

            match result {
                Ok(text) => {
                    info!("transcript received: {} chars", text.len());
                    inner.turn.transcript = Some(text);
                    inner.recording_state = RecordingState::AwaitingConfirmation;
                }
                Err(e) => {
                    warn!("transcription failed: {e}");
                    inner.recording_state = RecordingState::Idle;
                    let err = SessionError::TranscriptionFailed(e.to_string());
                    session.set_notice(&mut inner, &err, false);
                }
            }
            publish(&inner, &session.state_tx);
        });

        Ok(())
    }

    fn spawn_countdown(&self, turn_id: u64) -> JoinHandle<()> {
        let session = self.clone();
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(1));
            // the first tick completes immediately
            interval.tick().await;
            loop {
                interval.tick().await;
                let timed_out = {
                    let mut inner = session.inner.lock().await;
                    if inner.active_recording.as_ref().map(|a| a.turn_id) != Some(turn_id) {
                        break;
                    }
                    if inner.seconds_remaining > 0 {
                        inner.seconds_remaining -= 1;
                    }
                    publish(&inner, &session.state_tx);
                    inner.seconds_remaining == 0
                };
                if timed_out {
                    info!("recording time limit reached, forcing stop");
                    if let Err(e) = session.stop_recording_inner(StopReason::Timeout).await {
                        warn!("forced stop: {e}");
                    }
                    break;
                }
            }
        })
    }

    /// Abort an active capture without transcribing, releasing the device.
    async fn abort_recording(&self) {
        let active = self.inner.lock().await.active_recording.take();
        if let Some(active) = active {
            info!("aborting active recording (turn {})", active.turn_id);
            active.countdown.abort();
            active.collector.abort();
            self.release_microphone().await;
        }
    }

    /// Release the capture device. Every stop and abort path ends here.
    async fn release_microphone(&self) {
        let mut microphone = self.microphone.lock().await;
        if let Err(e) = microphone.stop().await {
            warn!("failed to release microphone: {e}");
        }
    }

    // ------------------------------------------------------------------
    // Turn pipeline
    // ------------------------------------------------------------------

    /// Confirm the transcript shown to the user and request the baker's
    /// reply.
    pub async fn confirm_and_send(&self) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().await;
        if inner.screen != Screen::Chat
            || inner.recording_state != RecordingState::AwaitingConfirmation
        {
            return Err(not_available(&inner));
        }
        let Some(level) = inner.level else {
            let err = SessionError::LevelNotSelected;
            self.set_notice(&mut inner, &err, true);
            publish(&inner, &self.state_tx);
            return Err(err);
        };

        let text = inner.turn.transcript.clone().unwrap_or_default();
        if text.trim().is_empty() {
            let err = SessionError::EmptyInput;
            self.set_notice(&mut inner, &err, false);
            publish(&inner, &self.state_tx);
            return Err(err);
        }

        inner.turn.confirmed = true;
        inner.recording_state = RecordingState::Submitted;
        inner.notice = None;
        self.dispatch_generation(&mut inner, ReplyRequest::message(text, level), true);
        publish(&inner, &self.state_tx);
        Ok(())
    }

    /// Submit typed text directly, without a prior recording.
    pub async fn submit_typed_text(&self, text: &str) -> Result<(), SessionError> {
        let mut inner = self.inner.lock().await;
        if inner.screen != Screen::Chat {
            return Err(not_available(&inner));
        }
        match inner.recording_state {
            RecordingState::Idle | RecordingState::AwaitingConfirmation => {}
            _ => return Err(not_available(&inner)),
        }
        let Some(level) = inner.level else {
            let err = SessionError::LevelNotSelected;
            self.set_notice(&mut inner, &err, true);
            publish(&inner, &self.state_tx);
            return Err(err);
        };

        if text.trim().is_empty() {
            let err = SessionError::EmptyInput;
            self.set_notice(&mut inner, &err, false);
            publish(&inner, &self.state_tx);
            return Err(err);
        }

        inner.next_turn_id += 1;
        inner.turn = Turn::new(inner.next_turn_id);
        inner.turn.transcript = Some(text.trim().to_string());
        inner.turn.confirmed = true;
        inner.recording_state = RecordingState::Submitted;
        inner.notice = None;
        self.dispatch_generation(
            &mut inner,
            ReplyRequest::message(text.trim().to_string(), level),
            true,
        );
        publish(&inner, &self.state_tx);
        Ok(())
    }

    /// Replay the current reply
    pub async fn repeat_reply(&self) -> Result<(), SessionError> {
        let (playback, reply) = {
            let inner = self.inner.lock().await;
            let playback = inner.playback.as_ref().map(|b| b.manager.clone());
            (playback, inner.turn.reply.clone())
        };
        match (playback, reply) {
            (Some(playback), Some(reply)) => {
                if let Err(e) = playback.speak(&reply).await {
                    let err = SessionError::PlaybackFailed(e.to_string());
                    let mut inner = self.inner.lock().await;
                    self.set_notice(&mut inner, &err, false);
                    publish(&inner, &self.state_tx);
                    return Err(err);
                }
                Ok(())
            }
            _ => {
                let inner = self.inner.lock().await;
                Err(not_available(&inner))
            }
        }
    }

    /// Issue a generate/greeting request under the cancellation guard.
    ///
    /// Any in-flight request is invalidated and aborted first. The spawned
    /// task re-checks the guard at resolution time, so a superseded request
    /// that still settles can never mutate reply or playback state.
    fn dispatch_generation(&self, inner: &mut Inner, request: ReplyRequest, surface_failure: bool) {
        let handle = inner.guard.begin();
        let session = self.clone();

        let task = tokio::spawn(async move {
            let result = session.generator.generate(&request).await;

            let mut inner = session.inner.lock().await;
            if !inner.guard.is_active(handle) {
                warn!("discarding settled reply for superseded request");
                return;
            }
            inner.guard.finish(handle);

            match result {
                Ok(reply) => {
                    info!("reply received ({} chars)", reply.len());
                    inner.turn.reply = Some(reply.clone());
                    if inner.recording_state == RecordingState::Submitted {
                        inner.recording_state = RecordingState::Idle;
                    }
                    let playback = inner.playback.as_ref().map(|b| b.manager.clone());
                    publish(&inner, &session.state_tx);
                    drop(inner);

                    if let Some(playback) = playback {
                        if let Err(e) = playback.speak(&reply).await {
                            warn!("speech playback failed: {e}");
                            let err = SessionError::PlaybackFailed(e.to_string());
                            let mut inner = session.inner.lock().await;
                            session.set_notice(&mut inner, &err, false);
                            publish(&inner, &session.state_tx);
                        }
                    }
                }
                Err(GenerationError::Cancelled) => {
                    info!("generation request cancelled");
                    if inner.recording_state == RecordingState::Submitted {
                        inner.recording_state = RecordingState::Idle;
                    }
                    publish(&inner, &session.state_tx);
                }
                Err(e) => {
                    warn!("reply generation failed: {e}");
                    if inner.recording_state == RecordingState::Submitted {
                        inner.recording_state = RecordingState::Idle;
                    }
                    if surface_failure {
                        session.set_notice(&mut inner, &SessionError::GenerationFailed, false);
                    }
                    publish(&inner, &session.state_tx);
                }
            }
        });

        inner.guard.attach(handle, task);
    }

    // ------------------------------------------------------------------
    // Playback binding and teardown
    // ------------------------------------------------------------------

    fn bind_playback(&self, inner: &mut Inner) {
        let manager = PlaybackManager::new(Arc::clone(&self.engine), self.config.speech.clone());
        let mut status_rx = manager.status();
        let session = self.clone();

        let mirror = tokio::spawn(async move {
            let mut seen_error: Option<String> = None;
            while status_rx.changed().await.is_ok() {
                let status = status_rx.borrow_and_update().clone();
                let mut inner = session.inner.lock().await;
                inner.speaking = status.speaking;
                if status.last_error != seen_error {
                    if let Some(message) = &status.last_error {
                        let err = SessionError::PlaybackFailed(message.clone());
                        session.set_notice(&mut inner, &err, false);
                    }
                    seen_error = status.last_error.clone();
                }
                publish(&inner, &session.state_tx);
            }
        });

        inner.playback = Some(PlaybackBinding { manager, mirror });
    }

    async fn teardown_chat(&self, inner: &mut Inner) {
        if let Some(binding) = inner.playback.take() {
            binding.mirror.abort();
            binding.manager.shutdown().await;
        }
        inner.guard.invalidate();
        inner.notice = None;
        inner.speaking = false;
    }

    // ------------------------------------------------------------------
    // Notices
    // ------------------------------------------------------------------

    fn set_notice(&self, inner: &mut Inner, error: &SessionError, auto_clear: bool) {
        let Some(text) = error.user_message() else {
            return;
        };
        inner.next_notice_id += 1;
        let id = inner.next_notice_id;
        inner.notice = Some(Notice { id, text });

        if auto_clear {
            let session = self.clone();
            tokio::spawn(async move {
                tokio::time::sleep(NOTICE_TTL).await;
                let mut inner = session.inner.lock().await;
                if inner.notice.as_ref().map(|n| n.id) == Some(id) {
                    inner.notice = None;
                    publish(&inner, &session.state_tx);
                }
            });
        }
    }
}
