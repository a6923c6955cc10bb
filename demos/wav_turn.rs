//! Drive one turn from a real WAV file: a generated tone is replayed through
//! the file-backed microphone, assembled and handed to a scripted
//! transcriber.
//!
//! Run with: cargo run --example wav_turn

use anyhow::Result;
use praatmaat::audio::WavFileMicrophone;
use praatmaat::services::{ScriptedReplyGenerator, ScriptedTranscriber};
use praatmaat::speech::SimulatedSpeechEngine;
use praatmaat::{ConversationSession, ProficiencyLevel, RecordingState, SessionConfig, Voice};
use std::f32::consts::TAU;
use std::sync::Arc;
use std::time::Duration;

fn write_tone(path: &std::path::Path) -> Result<()> {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut writer = hound::WavWriter::create(path, spec)?;
    for n in 0..16000 {
        let t = n as f32 / 16000.0;
        let sample = (TAU * 440.0 * t).sin() * 0.4;
        writer.write_sample((sample * i16::MAX as f32) as i16)?;
    }
    writer.finalize()?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let wav_path = std::env::temp_dir().join("praatmaat-demo-tone.wav");
    write_tone(&wav_path)?;

    let microphone = WavFileMicrophone::new(&wav_path, Duration::from_millis(100));
    let transcriber = Arc::new(ScriptedTranscriber::new().transcript("ik wil een brood"));
    let generator =
        Arc::new(ScriptedReplyGenerator::new().reply("Hier is uw brood alstublieft."));
    let engine = Arc::new(SimulatedSpeechEngine::with_voices(vec![Voice::new(
        "Ans", "nl-NL", true,
    )]));

    let mut config = SessionConfig::default();
    config.mime_type = "audio/wav".to_string();

    let session = ConversationSession::new(
        config,
        Box::new(microphone),
        Arc::clone(&transcriber) as Arc<dyn praatmaat::Transcriber>,
        generator,
        engine,
    );

    session.open_level_selection().await?;
    session.choose_level(ProficiencyLevel::A2).await?;

    session.start_recording().await?;
    // Let the file replay for half a second before stopping
    tokio::time::sleep(Duration::from_millis(500)).await;
    session.stop_recording().await?;

    let mut snapshots = session.subscribe();
    loop {
        if snapshots.borrow_and_update().recording == RecordingState::AwaitingConfirmation {
            break;
        }
        snapshots.changed().await?;
    }

    let (audio, language) = transcriber.received().await.remove(0);
    println!(
        "assembled {} bytes of {} for language {language}",
        audio.len(),
        audio.mime_type
    );
    println!("transcript: {:?}", session.snapshot().await.transcript);

    session.leave_chat().await?;
    Ok(())
}
