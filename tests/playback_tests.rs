// Tests for the speech playback manager
//
// These tests verify that only the current utterance's lifecycle events are
// observable, that cancellation-induced errors stay silent, and that voice
// selection follows the preference order.

use praatmaat::speech::{
    normalize_speech_text, select_voice, PlaybackManager, SimulatedSpeechEngine, SpeechSettings,
    Voice,
};
use std::sync::Arc;
use std::time::Duration;

fn dutch_voices() -> Vec<Voice> {
    vec![
        Voice::new("Thomas", "de-DE", false),
        Voice::new("Xander", "nl-NL", false),
        Voice::new("Ans", "nl-NL", true),
        Voice::new("Emma", "en-GB", true),
    ]
}

#[tokio::test(start_paused = true)]
async fn speak_twice_only_second_utterance_is_observable() {
    let engine = Arc::new(SimulatedSpeechEngine::with_voices(dutch_voices()));
    let manager = PlaybackManager::new(
        Arc::clone(&engine) as Arc<dyn praatmaat::SpeechEngine>,
        SpeechSettings::default(),
    );
    let status = manager.status();

    let first = manager.speak("eerste zin").await.expect("speak");
    let second = manager.speak("tweede zin").await.expect("speak");
    assert_ne!(first, second, "each utterance gets a fresh token");

    tokio::time::sleep(Duration::from_millis(500)).await;

    let snapshot = status.borrow().clone();
    assert!(!snapshot.speaking, "second utterance finished");
    assert_eq!(
        snapshot.last_error, None,
        "the interrupted first utterance must not surface an error"
    );
    assert!(engine.is_idle().await);
    assert!(!manager.is_active().await);

    let spoken = engine.spoken().await;
    assert_eq!(spoken.len(), 2);
    assert_eq!(spoken[1].text, "tweede zin");
}

#[tokio::test(start_paused = true)]
async fn genuine_playback_failure_is_reported() {
    let engine = Arc::new(SimulatedSpeechEngine::with_voices(dutch_voices()));
    let manager = PlaybackManager::new(
        Arc::clone(&engine) as Arc<dyn praatmaat::SpeechEngine>,
        SpeechSettings::default(),
    );
    let status = manager.status();

    engine.fail_next_utterance();
    manager.speak("dit gaat mis").await.expect("speak");

    tokio::time::sleep(Duration::from_millis(200)).await;

    let snapshot = status.borrow().clone();
    assert!(!snapshot.speaking);
    assert_eq!(snapshot.last_error.as_deref(), Some("synthesis failed"));
    assert!(!manager.is_active().await);
}

#[tokio::test(start_paused = true)]
async fn shutdown_detaches_and_leaves_engine_idle() {
    let engine = Arc::new(
        SimulatedSpeechEngine::with_voices(dutch_voices())
            .with_pacing(Duration::from_millis(10), Duration::from_secs(30)),
    );
    let manager = PlaybackManager::new(
        Arc::clone(&engine) as Arc<dyn praatmaat::SpeechEngine>,
        SpeechSettings::default(),
    );
    let status = manager.status();

    manager.speak("een heel lang verhaal").await.expect("speak");
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(status.borrow().speaking);

    manager.shutdown().await;

    assert!(engine.is_idle().await);
    assert!(!status.borrow().speaking);
    assert_eq!(status.borrow().last_error, None);

    // Nothing arrives after teardown
    tokio::time::sleep(Duration::from_secs(60)).await;
    assert!(!status.borrow().speaking);
    assert_eq!(engine.spoken().await.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn voice_catalog_may_populate_late() {
    let engine = Arc::new(SimulatedSpeechEngine::new());
    let manager = PlaybackManager::new(
        Arc::clone(&engine) as Arc<dyn praatmaat::SpeechEngine>,
        SpeechSettings::default(),
    );

    manager.speak("zonder stemmen").await.expect("speak");
    let spoken = engine.spoken().await;
    assert_eq!(spoken[0].voice, None, "no catalog yet");

    // Voices arrive later, as real engines do
    engine.set_voices(dutch_voices());
    tokio::time::sleep(Duration::from_millis(100)).await;

    manager.speak("met stemmen").await.expect("speak");
    let spoken = engine.spoken().await;
    assert_eq!(
        spoken[1].voice.as_ref().map(|v| v.name.as_str()),
        Some("Ans"),
        "refreshed catalog is used for the next utterance"
    );
}

#[test]
fn voice_selection_prefers_feminine_locale_match() {
    let voices = dutch_voices();

    let voice = select_voice(&voices, "nl-NL", true).expect("voice");
    assert_eq!(voice.name, "Ans");

    // Without the feminine hint, the first locale match wins
    let voice = select_voice(&voices, "nl-NL", false).expect("voice");
    assert_eq!(voice.name, "Xander");

    // No locale match: fall back to the engine's first voice
    let voice = select_voice(&voices, "fr-FR", true).expect("voice");
    assert_eq!(voice.name, "Thomas");

    assert_eq!(select_voice(&[], "nl-NL", true), None);
}

#[test]
fn speech_text_is_normalized_for_slow_playback() {
    assert_eq!(
        normalize_speech_text("Dag meneer!Wat wilt u?  Een brood,of twee?"),
        "Dag meneer! Wat wilt u? Een brood, of twee?"
    );
    assert_eq!(normalize_speech_text("  hallo   daar  "), "hallo daar");
    assert_eq!(normalize_speech_text("Hier is uw brood."), "Hier is uw brood.");
}
