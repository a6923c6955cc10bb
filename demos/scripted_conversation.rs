//! Walk the whole screen flow with scripted collaborators: rules, level
//! choice, a spoken turn, a typed turn, a level change mid-chat, and the
//! teardown on leaving.
//!
//! Run with: cargo run --example scripted_conversation

use anyhow::Result;
use praatmaat::audio::ScriptedMicrophone;
use praatmaat::services::{ScriptedReplyGenerator, ScriptedTranscriber};
use praatmaat::speech::SimulatedSpeechEngine;
use praatmaat::{ConversationSession, ProficiencyLevel, RecordingState, SessionConfig, Voice};
use std::sync::Arc;
use std::time::Duration;

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let microphone = ScriptedMicrophone::granted();
    let mic = microphone.handle();

    let transcriber = Arc::new(ScriptedTranscriber::new().transcript("mag ik twee croissants"));
    let generator = Arc::new(
        ScriptedReplyGenerator::new()
            .reply("Natuurlijk! Twee croissants. Dat is twee euro.")
            .reply("Wij zijn open van acht tot vijf."),
    );
    let engine = Arc::new(SimulatedSpeechEngine::with_voices(vec![
        Voice::new("Ans", "nl-NL", true),
        Voice::new("Xander", "nl-NL", false),
    ]));

    let session = ConversationSession::new(
        SessionConfig::default(),
        Box::new(microphone),
        transcriber,
        Arc::clone(&generator) as Arc<dyn praatmaat::ReplyGenerator>,
        Arc::clone(&engine) as Arc<dyn praatmaat::SpeechEngine>,
    );

    // Read the rules, then pick a level
    session.open_rules().await?;
    session.back_to_selection().await?;
    session.open_level_selection().await?;
    session.choose_level(ProficiencyLevel::A1).await?;
    settle().await;
    println!("greeting: {:?}", session.snapshot().await.reply);

    // Spoken turn
    session.start_recording().await?;
    mic.deliver(vec![10u8; 40]).await;
    mic.deliver(vec![11u8; 35]).await;
    mic.deliver(vec![12u8; 25]).await;
    settle().await;
    session.stop_recording().await?;
    wait_for(&session, |s| s.recording == RecordingState::AwaitingConfirmation).await;
    println!("transcript: {:?}", session.snapshot().await.transcript);

    session.confirm_and_send().await?;
    wait_for(&session, |s| s.reply.is_some() && s.recording == RecordingState::Idle).await;
    println!("reply: {:?}", session.snapshot().await.reply);

    // Typed turn
    session
        .submit_typed_text("hoe laat bent u open vandaag")
        .await?;
    wait_for(&session, |s| s.reply.is_some() && s.recording == RecordingState::Idle).await;
    println!("reply: {:?}", session.snapshot().await.reply);

    // Switch to a harder level: fresh greeting, old state torn down
    session.change_level(ProficiencyLevel::B1).await?;
    settle().await;
    println!("greeting after level change: {:?}", session.snapshot().await.reply);

    session.leave_chat().await?;
    println!("spoken utterances: {}", engine.spoken().await.len());
    println!("engine idle: {}", engine.is_idle().await);

    Ok(())
}

async fn settle() {
    tokio::time::sleep(Duration::from_millis(150)).await;
}

async fn wait_for(
    session: &ConversationSession,
    predicate: impl Fn(&praatmaat::SessionSnapshot) -> bool,
) {
    let mut snapshots = session.subscribe();
    loop {
        if predicate(&snapshots.borrow_and_update().clone()) {
            return;
        }
        if snapshots.changed().await.is_err() {
            return;
        }
    }
}
