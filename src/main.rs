use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use praatmaat::audio::ScriptedMicrophone;
use praatmaat::services::{
    OpenAiReplyGenerator, OpenAiTextCorrector, OpenAiTranscriber, ScriptedReplyGenerator,
    ScriptedTranscriber,
};
use praatmaat::speech::SimulatedSpeechEngine;
use praatmaat::{
    AppState, Config, ConversationSession, ProficiencyLevel, RecordingState, Voice,
};
use std::sync::Arc;
use tracing::info;

#[derive(Parser)]
#[command(name = "praatmaat", about = "Oefen Nederlands spreken met de bakker")]
struct Cli {
    /// Path to the configuration file (without extension)
    #[arg(long, default_value = "config/praatmaat")]
    config: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API backed by OpenAI-compatible services
    Serve,
    /// Run one scripted conversation turn end-to-end, without devices or
    /// network
    Demo,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let cfg = Config::load(&cli.config)?;

    info!("praatmaat v0.1.0");
    info!("loaded config: {}", cfg.service.name);

    match cli.command {
        Command::Serve => serve(cfg).await,
        Command::Demo => demo(cfg).await,
    }
}

async fn serve(cfg: Config) -> Result<()> {
    let api_key =
        std::env::var("OPENAI_API_KEY").context("OPENAI_API_KEY environment variable not set")?;

    let state = AppState::new(
        Arc::new(OpenAiTranscriber::new(
            cfg.openai.api_base.clone(),
            api_key.clone(),
            cfg.openai.transcription_model.clone(),
        )),
        Arc::new(OpenAiReplyGenerator::new(
            cfg.openai.api_base.clone(),
            api_key.clone(),
            cfg.openai.chat_model.clone(),
        )),
        Arc::new(OpenAiTextCorrector::new(
            cfg.openai.api_base.clone(),
            api_key,
            cfg.openai.chat_model.clone(),
        )),
        cfg.recording.language.clone(),
    );

    let addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);
    info!("HTTP server listening on {addr}");

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    axum::serve(listener, praatmaat::create_router(state))
        .await
        .context("HTTP server failed")?;

    Ok(())
}

async fn demo(cfg: Config) -> Result<()> {
    let microphone = ScriptedMicrophone::granted();
    let mic = microphone.handle();

    let transcriber = Arc::new(ScriptedTranscriber::new().transcript("ik wil een brood"));
    let generator =
        Arc::new(ScriptedReplyGenerator::new().reply("Hier is uw brood alstublieft."));
    let engine = Arc::new(SimulatedSpeechEngine::with_voices(vec![
        Voice::new("Ans", "nl-NL", true),
        Voice::new("Xander", "nl-NL", false),
    ]));

    let session = ConversationSession::new(
        cfg.session_config(),
        Box::new(microphone),
        transcriber,
        generator,
        engine,
    );
    let mut snapshots = session.subscribe();

    // Selection → LevelSelection → Chat (greeting plays)
    session.open_level_selection().await?;
    session.choose_level(ProficiencyLevel::A2).await?;

    // One spoken turn
    session.start_recording().await?;
    for fragment in [vec![1u8; 40], vec![2u8; 35], vec![3u8; 25]] {
        mic.deliver(fragment).await;
    }
    tokio::time::sleep(std::time::Duration::from_millis(50)).await;
    session.stop_recording().await?;

    // Follow the snapshot stream: confirm once the transcript lands, finish
    // once the spoken reply has ended
    let mut confirmed = false;
    let mut reply_spoke = false;
    loop {
        snapshots.changed().await?;
        let snapshot = snapshots.borrow_and_update().clone();
        info!(
            "screen={:?} recording={:?} transcript={:?} reply={:?} speaking={}",
            snapshot.screen,
            snapshot.recording,
            snapshot.transcript,
            snapshot.reply,
            snapshot.speaking
        );
        if !confirmed && snapshot.recording == RecordingState::AwaitingConfirmation {
            confirmed = true;
            session.confirm_and_send().await?;
        }
        if confirmed && snapshot.reply.is_some() && snapshot.speaking {
            reply_spoke = true;
        }
        if reply_spoke && !snapshot.speaking {
            break;
        }
    }

    session.leave_chat().await?;
    info!("demo finished");
    Ok(())
}
