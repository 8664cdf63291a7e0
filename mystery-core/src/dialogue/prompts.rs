//! Prompt construction for characters, the scene narrator, and accusations.

use crate::case::{CaseState, Verdict};
use crate::character::CharacterCard;
use crate::clues::InvestigationResult;
use crate::world::CrimeScene;

const CHARACTER_GREETING: &str = include_str!("prompts/character_greeting.txt");
const SCENE_OPENING: &str = include_str!("prompts/scene_opening.txt");
const SCENE_INVESTIGATION: &str = include_str!("prompts/scene_investigation.txt");
const ACCUSATION_GUILTY: &str = include_str!("prompts/accusation_guilty.txt");
const ACCUSATION_INNOCENT: &str = include_str!("prompts/accusation_innocent.txt");

/// A character's persona, with the killer's secret appended for the killer.
pub(crate) fn persona_block(card: &CharacterCard, case: &CaseState) -> String {
    let mut prompt = card.to_prompt();
    if case.is_killer(&card.name) {
        prompt.push_str("\n\n");
        prompt.push_str(&case.killer_secret());
    }
    prompt
}

/// First words with a character.
pub(crate) fn greeting(persona: &str) -> String {
    format!("{persona}\n\n{}\nResponse:", CHARACTER_GREETING.trim_end())
}

/// A player line addressed to a character.
pub(crate) fn character_reply(persona: &str, recent: &[String], input: &str) -> String {
    let mut prompt = String::from(persona);
    if !recent.is_empty() {
        prompt.push_str("\n\nRecent conversation:\n");
        prompt.push_str(&recent.join("\n"));
    }
    prompt.push_str(&format!("\n\nPlayer: {input}\nResponse:"));
    prompt
}

/// The narrator's first look at a scene.
pub(crate) fn scene_opening(narrator: &CharacterCard, scene: &CrimeScene) -> String {
    let mut prompt = format!("{}\n\n{}", narrator.to_prompt(), SCENE_OPENING.trim_end());
    if let Some(victim) = scene.victim() {
        prompt.push_str(&format!(
            " The body of {} lies here. Their last words were: \"{}\"",
            victim.name,
            scene.evidence()
        ));
    }
    prompt.push_str(" Player: observe scene\nResponse:");
    prompt
}

/// The narrator dramatizing the result of an investigation step.
///
/// Only the result's message and options reach the model.
pub(crate) fn scene_investigation(
    narrator: &CharacterCard,
    scene: &CrimeScene,
    input: &str,
    result: &InvestigationResult,
) -> String {
    let place = match scene.victim() {
        Some(victim) => format!("the murder scene of {} in Hell", victim.name),
        None => "a murder scene in Hell".to_string(),
    };
    format!(
        "{}\n\nContext: The detective is investigating {place}. They just {input}.\n\
         Available actions: {}\n\
         Factual information: {}\n\n\
         {}\nResponse:",
        narrator.to_prompt(),
        result.options.join(", "),
        result.message,
        SCENE_INVESTIGATION.trim_end()
    )
}

/// A suspect reacting to being accused.
pub(crate) fn accusation(persona: &str, verdict: Verdict) -> String {
    let framing = match verdict {
        Verdict::Win => ACCUSATION_GUILTY,
        Verdict::Lose => ACCUSATION_INNOCENT,
    };
    format!("{persona}\n\n{}\nResponse:", framing.trim_end())
}
