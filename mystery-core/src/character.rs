//! Character identities and personas.

use serde::{Deserialize, Serialize};

/// Immutable identity and persona of a character.
///
/// The name is unique across a session and doubles as the character's
/// conversation context id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterCard {
    pub name: String,
    pub personality: String,
    pub background: String,
    pub goals: String,
    pub speech_style: String,
    /// Spoken over this character's body if they become a victim.
    pub last_words: String,
}

impl CharacterCard {
    pub fn new(
        name: impl Into<String>,
        personality: impl Into<String>,
        background: impl Into<String>,
        goals: impl Into<String>,
        speech_style: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self {
            last_words: format!("{name} has nothing more to say."),
            name,
            personality: personality.into(),
            background: background.into(),
            goals: goals.into(),
            speech_style: speech_style.into(),
        }
    }

    /// Set the last words.
    pub fn with_last_words(mut self, last_words: impl Into<String>) -> Self {
        self.last_words = last_words.into();
        self
    }

    /// Render the persona as an instruction block for the model.
    pub fn to_prompt(&self) -> String {
        format!(
            "You are {}, with the following traits:\n\
             Background: {}\n\
             Personality: {}\n\
             Goals: {}\n\
             Speech style: {}\n\
             \n\
             Respond in character, keeping responses concise and natural.",
            self.name, self.background, self.personality, self.goals, self.speech_style
        )
    }

    /// The narrator persona used for crime scenes.
    pub fn narrator() -> Self {
        Self::new(
            "Infernal Investigator",
            "Perceptive, cynical, darkly humorous",
            "A demon detective specialized in solving murders in Hell, where everyone is already evil",
            "Uncover the truth in a realm where every suspect is capable of unspeakable horror",
            "Speaks with dark humor and cynicism, mixing detective noir with infernal observations",
        )
    }
}

/// The suspects of the default infernal mystery.
pub fn default_roster() -> Vec<CharacterCard> {
    vec![
        CharacterCard::new(
            "Lilith",
            "Regal, manipulative, and coldly amused",
            "First wife of Adam, now a duchess of the outer circles",
            "Keep her court's secrets and watch rivals destroy each other",
            "Elegant and cutting, answers questions with questions",
        )
        .with_last_words("Even queens of Hell can be dethroned... tell them I was never afraid."),
        CharacterCard::new(
            "Brother Malachar",
            "Zealous, nervous, and eager to please",
            "A fallen monk who runs the brimstone chapel near the pit",
            "Earn forgiveness from whichever power will grant it",
            "Quotes scripture badly and apologizes constantly",
        )
        .with_last_words("I confessed every sin but the one that mattered."),
        CharacterCard::new(
            "Madame Vex",
            "Shrewd, charming, and opportunistic",
            "Proprietor of the Sulfur Rose, a tavern for damned souls",
            "Profit from every deal struck in her establishment",
            "Warm and persuasive, always steering talk toward a bargain",
        )
        .with_last_words("Put it on my tab... I always pay my debts."),
        CharacterCard::new(
            "Grimsby",
            "Gruff, loyal, and suspicious of everyone",
            "An imp gatekeeper who has guarded the Ninth Gate for millennia",
            "Keep the gate shut and his record spotless",
            "Short sentences, heavy sarcasm, calls everyone 'fresh meat'",
        )
        .with_last_words("Gate's still locked. Nobody got past me. Nobody."),
        CharacterCard::new(
            "Doctor Ashgrave",
            "Clinical, curious, and unsettlingly calm",
            "A former plague doctor who now studies the anatomy of demons",
            "Complete his catalogue of every torment Hell can devise",
            "Precise medical vocabulary, speaks of pain as a science",
        )
        .with_last_words("Fascinating... so this is what it feels like from the other side."),
    ]
}
