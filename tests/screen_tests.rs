// Tests for the session screen state machine
//
// These tests verify the navigation transitions, the proficiency-level gate
// on the quick-start affordance, and the teardown invariants when leaving
// the chat.

use praatmaat::audio::ScriptedMicrophone;
use praatmaat::services::{ScriptedReplyGenerator, ScriptedTranscriber};
use praatmaat::speech::SimulatedSpeechEngine;
use praatmaat::{
    ConversationSession, ProficiencyLevel, RecordingState, Screen, SessionConfig, SessionError,
    SessionSnapshot, Voice,
};
use std::sync::Arc;
use std::time::Duration;

fn session_with(generator: ScriptedReplyGenerator) -> (ConversationSession, Arc<ScriptedReplyGenerator>) {
    let generator = Arc::new(generator);
    let engine = Arc::new(SimulatedSpeechEngine::with_voices(vec![Voice::new(
        "Ans", "nl-NL", true,
    )]));
    let session = ConversationSession::new(
        SessionConfig::default(),
        Box::new(ScriptedMicrophone::granted()),
        Arc::new(ScriptedTranscriber::new()) as Arc<dyn praatmaat::Transcriber>,
        Arc::clone(&generator) as Arc<dyn praatmaat::ReplyGenerator>,
        engine,
    );
    (session, generator)
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
async fn navigation_walks_selection_rules_levels_chat() {
    let (session, generator) = session_with(ScriptedReplyGenerator::new());

    assert_eq!(session.snapshot().await.screen, Screen::Selection);

    session.open_rules().await.expect("rules");
    assert_eq!(session.snapshot().await.screen, Screen::DetailedRules);

    session.back_to_selection().await.expect("back");
    session.open_level_selection().await.expect("levels");
    assert_eq!(session.snapshot().await.screen, Screen::LevelSelection);

    session
        .choose_level(ProficiencyLevel::A1)
        .await
        .expect("chat");
    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.screen, Screen::Chat);
    assert_eq!(snapshot.level, Some(ProficiencyLevel::A1));

    // Entering the chat fetched the greeting for the chosen level
    wait_until(&session, |s| s.reply.is_some()).await;
    let requests = generator.received().await;
    assert_eq!(requests.len(), 1);
    assert!(requests[0].initial_greeting);
    assert_eq!(requests[0].level, ProficiencyLevel::A1);
}

#[tokio::test(start_paused = true)]
async fn quick_start_requires_a_level() {
    let (session, generator) = session_with(ScriptedReplyGenerator::new());

    let result = session.quick_start().await;
    assert!(matches!(result, Err(SessionError::LevelNotSelected)));

    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.screen, Screen::Selection, "screen unchanged");
    assert_eq!(
        snapshot.notice.as_deref(),
        Some("Kies eerst een niveau voordat u begint met spreken.")
    );

    // Once a level was chosen on an earlier visit, quick start works
    session.open_level_selection().await.expect("levels");
    session
        .choose_level(ProficiencyLevel::B1)
        .await
        .expect("chat");
    session.leave_chat().await.expect("leave");

    session.quick_start().await.expect("quick start");
    assert_eq!(session.snapshot().await.screen, Screen::Chat);

    wait_until(&session, |s| s.reply.is_some()).await;
    let requests = generator.received().await;
    assert_eq!(requests.len(), 2, "a fresh greeting per chat entry");
    assert!(requests.iter().all(|r| r.level == ProficiencyLevel::B1));
}

#[tokio::test(start_paused = true)]
async fn operations_unreachable_from_the_wrong_screen_are_refused() {
    let (session, _) = session_with(ScriptedReplyGenerator::new());

    assert!(matches!(
        session.back_to_selection().await,
        Err(SessionError::NotAvailable { .. })
    ));
    assert!(matches!(
        session.leave_chat().await,
        Err(SessionError::NotAvailable { .. })
    ));
    assert!(matches!(
        session.submit_typed_text("hallo").await,
        Err(SessionError::NotAvailable { .. })
    ));

    session.open_rules().await.expect("rules");
    assert!(matches!(
        session.open_level_selection().await,
        Err(SessionError::NotAvailable { .. })
    ));
}

#[tokio::test(start_paused = true)]
async fn leaving_chat_clears_transient_state() {
    let (session, _) = session_with(
        ScriptedReplyGenerator::new().failure(
            praatmaat::services::GenerationError::Service("boom".to_string()),
        ),
    );

    session.open_level_selection().await.expect("levels");
    session
        .choose_level(ProficiencyLevel::A2)
        .await
        .expect("chat");
    wait_until(&session, |s| s.reply.is_some()).await;

    // Produce a visible error notice
    session
        .submit_typed_text("mag ik een wit brood")
        .await
        .expect("submit");
    wait_until(&session, |s| s.notice.is_some()).await;

    session.leave_chat().await.expect("leave");

    let snapshot = session.snapshot().await;
    assert_eq!(snapshot.screen, Screen::Selection);
    assert_eq!(snapshot.recording, RecordingState::Idle);
    assert_eq!(snapshot.notice, None, "transient error state is reset");
    assert_eq!(snapshot.transcript, None);
    assert_eq!(snapshot.reply, None);
    assert!(!snapshot.speaking);
    // The level survives for a later quick start
    assert_eq!(snapshot.level, Some(ProficiencyLevel::A2));
}
