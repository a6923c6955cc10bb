// Integration tests for the recording session
//
// These tests verify the proficiency-level gate, fragment accumulation
// order, the empty-buffer stop path, and the countdown-forced stop racing
// a manual stop.

use praatmaat::audio::{MicrophoneAccess, ScriptedMicrophone, ScriptedMicrophoneHandle};
use praatmaat::services::{ScriptedReplyGenerator, ScriptedTranscriber};
use praatmaat::speech::SimulatedSpeechEngine;
use praatmaat::{
    ConversationSession, ProficiencyLevel, RecordingState, SessionConfig, SessionError,
    SessionSnapshot, Voice,
};
use std::sync::Arc;
use std::time::Duration;

struct Harness {
    session: ConversationSession,
    mic: ScriptedMicrophoneHandle,
    transcriber: Arc<ScriptedTranscriber>,
}

fn harness(config: SessionConfig, transcriber: ScriptedTranscriber) -> Harness {
    harness_with_access(config, transcriber, MicrophoneAccess::Granted)
}

fn harness_with_access(
    config: SessionConfig,
    transcriber: ScriptedTranscriber,
    access: MicrophoneAccess,
) -> Harness {
    let microphone = ScriptedMicrophone::with_access(access);
    let mic = microphone.handle();
    let transcriber = Arc::new(transcriber);
    let engine = Arc::new(SimulatedSpeechEngine::with_voices(vec![Voice::new(
        "Ans", "nl-NL", true,
    )]));

    let session = ConversationSession::new(
        config,
        Box::new(microphone),
        Arc::clone(&transcriber) as Arc<dyn praatmaat::Transcriber>,
        Arc::new(ScriptedReplyGenerator::new()),
        Arc::clone(&engine) as Arc<dyn praatmaat::SpeechEngine>,
    );

    Harness {
        session,
        mic,
        transcriber,
    }
}

async fn enter_chat(session: &ConversationSession, level: ProficiencyLevel) {
    session.open_level_selection().await.expect("level screen");
    session.choose_level(level).await.expect("enter chat");
}

async fn wait_until(
    session: &ConversationSession,
    predicate: impl Fn(&SessionSnapshot) -> bool,
) -> SessionSnapshot {
    let mut snapshots = session.subscribe();
    tokio::time::timeout(Duration::from_secs(30), async {
        loop {
            let snapshot = snapshots.borrow_and_update().clone();
            if predicate(&snapshot) {
                return snapshot;
            }
            snapshots.changed().await.expect("session dropped");
        }
    })
    .await
    .expect("condition not reached in time")
}

#[tokio::test(start_paused = true)]
async fn no_level_start_never_acquires_microphone() {
    let h = harness(SessionConfig::default(), ScriptedTranscriber::new());

    let result = h.session.start_recording().await;
    assert!(matches!(result, Err(SessionError::LevelNotSelected)));
    assert_eq!(h.mic.start_calls(), 0, "microphone must not be touched");

    let snapshot = h.session.snapshot().await;
    assert_eq!(
        snapshot.notice.as_deref(),
        Some("Kies eerst een niveau voordat u begint met spreken.")
    );

    // The warning auto-clears after a few seconds
    tokio::time::sleep(Duration::from_secs(4)).await;
    let snapshot = h.session.snapshot().await;
    assert_eq!(snapshot.notice, None);
}

#[tokio::test(start_paused = true)]
async fn fragments_assemble_in_delivery_order() {
    let h = harness(
        SessionConfig::default(),
        ScriptedTranscriber::new().transcript("ik wil een brood"),
    );
    enter_chat(&h.session, ProficiencyLevel::A2).await;

    h.session.start_recording().await.expect("start");
    assert!(h.mic.deliver(vec![1u8; 40]).await);
    assert!(h.mic.deliver(vec![2u8; 35]).await);
    h.mic.deliver(Vec::new()).await; // empty fragment is a no-op
    assert!(h.mic.deliver(vec![3u8; 25]).await);
    tokio::task::yield_now().await;

    h.session.stop_recording().await.expect("stop");
    wait_until(&h.session, |s| {
        s.recording == RecordingState::AwaitingConfirmation
    })
    .await;

    let received = h.transcriber.received().await;
    assert_eq!(received.len(), 1);
    let (audio, language) = &received[0];
    assert_eq!(language, "nl");
    assert_eq!(audio.mime_type, "audio/webm;codecs=opus");

    let mut expected = vec![1u8; 40];
    expected.extend_from_slice(&[2u8; 35]);
    expected.extend_from_slice(&[3u8; 25]);
    assert_eq!(audio.bytes, expected, "fragment order must equal delivery order");
}

#[tokio::test(start_paused = true)]
async fn empty_stop_reports_no_audio_and_skips_transcription() {
    let h = harness(SessionConfig::default(), ScriptedTranscriber::new());
    enter_chat(&h.session, ProficiencyLevel::A2).await;

    h.session.start_recording().await.expect("start");
    let result = h.session.stop_recording().await;

    assert!(matches!(result, Err(SessionError::NoAudioCaptured)));
    assert_eq!(h.transcriber.calls(), 0, "no network call on empty buffer");

    let snapshot = h.session.snapshot().await;
    assert_eq!(snapshot.recording, RecordingState::Idle);
    assert_eq!(
        snapshot.notice.as_deref(),
        Some("Geen audio opgenomen. Probeer opnieuw.")
    );
    assert_eq!(h.mic.stop_calls(), 1, "device released");
}

#[tokio::test(start_paused = true)]
async fn countdown_reaches_zero_and_forces_a_single_stop() {
    let config = SessionConfig {
        countdown_secs: 3,
        ..SessionConfig::default()
    };
    let h = harness(config, ScriptedTranscriber::new().transcript("dag meneer"));
    enter_chat(&h.session, ProficiencyLevel::A1).await;

    h.session.start_recording().await.expect("start");
    h.mic.deliver(vec![7u8; 64]).await;

    let snapshot = h.session.snapshot().await;
    assert_eq!(snapshot.seconds_remaining, 3);

    // Sleep past the ceiling; the timer must stop the recording by itself
    tokio::time::sleep(Duration::from_secs(5)).await;

    let snapshot = wait_until(&h.session, |s| {
        s.recording == RecordingState::AwaitingConfirmation
    })
    .await;
    assert_eq!(snapshot.transcript.as_deref(), Some("dag meneer"));
    assert_eq!(h.transcriber.calls(), 1);
    assert_eq!(h.mic.stop_calls(), 1);
    // Countdown is reset for the next turn
    assert_eq!(snapshot.seconds_remaining, 3);
}

#[tokio::test(start_paused = true)]
async fn timer_and_manual_stop_race_executes_stop_once() {
    let config = SessionConfig {
        countdown_secs: 1,
        ..SessionConfig::default()
    };
    let h = harness(config, ScriptedTranscriber::new().transcript("hallo"));
    enter_chat(&h.session, ProficiencyLevel::A2).await;

    h.session.start_recording().await.expect("start");
    h.mic.deliver(vec![9u8; 16]).await;
    tokio::task::yield_now().await;

    // Let the countdown expire while a manual stop is issued concurrently
    let manual = {
        let session = h.session.clone();
        tokio::spawn(async move { session.stop_recording().await })
    };
    tokio::time::sleep(Duration::from_secs(3)).await;
    manual.await.expect("join").expect("manual stop is fine either way");

    wait_until(&h.session, |s| {
        s.recording == RecordingState::AwaitingConfirmation
    })
    .await;

    assert_eq!(h.transcriber.calls(), 1, "exactly one stop reached the service");
    assert_eq!(h.mic.stop_calls(), 1, "device released exactly once");
}

#[tokio::test(start_paused = true)]
async fn new_recording_uses_a_fresh_buffer_and_discards_old_transcript() {
    let h = harness(
        SessionConfig::default(),
        ScriptedTranscriber::new()
            .transcript("eerste antwoord")
            .transcript("tweede antwoord"),
    );
    enter_chat(&h.session, ProficiencyLevel::B1).await;

    h.session.start_recording().await.expect("start");
    h.mic.deliver(vec![1u8; 10]).await;
    tokio::task::yield_now().await;
    h.session.stop_recording().await.expect("stop");
    wait_until(&h.session, |s| {
        s.transcript.as_deref() == Some("eerste antwoord")
    })
    .await;

    // Re-recording discards the unconfirmed transcript immediately
    h.session.start_recording().await.expect("restart");
    let snapshot = h.session.snapshot().await;
    assert_eq!(snapshot.transcript, None);

    h.mic.deliver(vec![2u8; 20]).await;
    tokio::task::yield_now().await;
    h.session.stop_recording().await.expect("stop");
    wait_until(&h.session, |s| {
        s.transcript.as_deref() == Some("tweede antwoord")
    })
    .await;

    let received = h.transcriber.received().await;
    assert_eq!(received[1].0.bytes, vec![2u8; 20], "no carryover from the prior buffer");
}

#[tokio::test(start_paused = true)]
async fn denied_microphone_surfaces_error_and_stays_idle() {
    let h = harness_with_access(
        SessionConfig::default(),
        ScriptedTranscriber::new(),
        MicrophoneAccess::Denied,
    );
    enter_chat(&h.session, ProficiencyLevel::A2).await;

    let result = h.session.start_recording().await;
    assert!(matches!(result, Err(SessionError::DeviceAccessDenied(_))));

    let snapshot = h.session.snapshot().await;
    assert_eq!(snapshot.recording, RecordingState::Idle);
    assert_eq!(
        snapshot.notice.as_deref(),
        Some("Geen toegang tot de microfoon. Controleer uw instellingen.")
    );
}
