// Tests for the service collaborators
//
// These tests verify the text-correction precondition and verdict protocol,
// the scripted greetings, and the level-parameterized system prompt.

use praatmaat::services::{
    level_system_prompt, parse_verdict, scripted_greeting, word_count, CorrectionError,
    CorrectionVerdict, ScriptedTextCorrector, TextCorrector,
};
use praatmaat::ProficiencyLevel;

#[test]
fn word_count_splits_on_any_whitespace() {
    assert_eq!(word_count("ik wil een brood"), 4);
    assert_eq!(word_count("  ik   wil\teen\nbrood  kopen "), 5);
    assert_eq!(word_count(""), 0);
}

#[tokio::test]
async fn answers_below_the_word_minimum_are_rejected_without_a_request() {
    let corrector = ScriptedTextCorrector::new();

    let result = corrector.correct("te kort antwoord").await;
    assert!(matches!(result, Err(CorrectionError::TooFewWords)));
}

#[tokio::test]
async fn long_enough_answers_reach_the_service() {
    let corrector = ScriptedTextCorrector::new().verdict(CorrectionVerdict {
        corrected_text: "Ik wil graag een brood kopen.".to_string(),
        is_correct: false,
    });

    let verdict = corrector
        .correct("ik wil graag brood kopen")
        .await
        .expect("verdict");
    assert!(!verdict.is_correct);
    assert_eq!(verdict.corrected_text, "Ik wil graag een brood kopen.");
}

#[test]
fn correct_prefix_passes_the_original_text_through() {
    let verdict = parse_verdict(
        "ik wil graag een brood kopen",
        "CORRECT: ik wil graag een brood kopen",
    );
    assert!(verdict.is_correct);
    assert_eq!(verdict.corrected_text, "ik wil graag een brood kopen");
}

#[test]
fn verbeterd_prefix_yields_the_corrected_text() {
    let verdict = parse_verdict(
        "ik willen een brood",
        "VERBETERD: Ik wil een brood.",
    );
    assert!(!verdict.is_correct);
    assert_eq!(verdict.corrected_text, "Ik wil een brood.");
}

#[test]
fn protocol_violations_fall_back_to_comparison() {
    // Model echoed the input without a prefix
    let verdict = parse_verdict("ik wil een brood", "Ik wil een brood");
    assert!(verdict.is_correct, "case-insensitive echo counts as correct");

    // Model answered with something else entirely
    let verdict = parse_verdict("ik willen brood", "Ik wil graag een brood.");
    assert!(!verdict.is_correct);
    assert_eq!(verdict.corrected_text, "Ik wil graag een brood.");
}

#[test]
fn greetings_differ_per_level_and_open_the_bakery_conversation() {
    let a1 = scripted_greeting(ProficiencyLevel::A1);
    let a2 = scripted_greeting(ProficiencyLevel::A2);
    let b1 = scripted_greeting(ProficiencyLevel::B1);

    assert_ne!(a1, a2);
    assert_ne!(a2, b1);
    for greeting in [a1, a2, b1] {
        assert!(greeting.contains("brood"), "greeting stays in the bakery domain");
    }
}

#[test]
fn system_prompt_is_parameterized_by_level() {
    let a1 = level_system_prompt(ProficiencyLevel::A1);
    let b1 = level_system_prompt(ProficiencyLevel::B1);

    assert!(a1.contains("niveau A1"));
    assert!(b1.contains("niveau B1"));
    assert_ne!(a1, b1, "guidance differs per level");
    for prompt in [&a1, &b1] {
        assert!(prompt.contains("bakker"));
        assert!(prompt.contains("maximaal 2 zinnen"));
    }
}
