//! The facts of the murder case.
//!
//! A [`CaseState`] is generated once per session from the suspect roster and
//! an injectable random source, then stays read-only. It decides who the killer
//! is, what evidence each suspect carries, and how an accusation is judged.

use std::collections::{BTreeMap, HashMap, HashSet};

use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::character::CharacterCard;

/// Name of the first victim, found at the primary crime scene.
pub const DEFAULT_VICTIM: &str = "Damned Soul #471";

/// Evidence category holding what is found on the body.
pub const BODY_EVIDENCE: &str = "body";

/// Errors that prevent a case from being set up.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SetupError {
    #[error("Cannot set up a case without suspects")]
    EmptyRoster,

    #[error("Duplicate character name: {0}")]
    DuplicateName(String),

    #[error("Killer '{0}' is not in the roster")]
    KillerMissing(String),
}

/// A way the victim could have been killed, with the traces it leaves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MurderMethod {
    pub weapon: &'static str,
    /// What the body shows.
    pub evidence: &'static str,
    /// The first two stick to the killer; the third stays at the scene.
    pub traces: [&'static str; 3],
}

/// Every murder method a case can draw from.
pub const MURDER_METHODS: [MurderMethod; 3] = [
    MurderMethod {
        weapon: "cursed dagger",
        evidence: "stabbing wounds with unholy residue",
        traces: [
            "traces of sulfur on hands",
            "small cuts on fingers",
            "dagger sheath fragment",
        ],
    },
    MurderMethod {
        weapon: "soul-draining crystal",
        evidence: "completely drained life force",
        traces: [
            "crystal dust residue",
            "magical burns on hands",
            "faint ethereal glow",
        ],
    },
    MurderMethod {
        weapon: "demonic poison",
        evidence: "corrupted blood vessels",
        traces: ["alchemical stains", "rare herb fragments", "distinctive smell"],
    },
];

/// Evidence anyone in Hell might be carrying.
pub const COMMON_EVIDENCE: [&str; 5] = [
    "traces of brimstone",
    "common hell-flower pollen",
    "ash marks",
    "burnt clothing",
    "infernal residue",
];

/// Outcome of accusing a suspect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Win,
    Lose,
}

/// Session-scoped facts of the murder.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CaseState {
    killer: String,
    weapon: String,
    cause_of_death: String,
    victim: String,
    character_evidence: HashMap<String, Vec<String>>,
    scene_evidence: BTreeMap<String, Vec<String>>,
}

impl CaseState {
    /// Pick a killer and a murder method uniformly at random and distribute
    /// the evidence.
    pub fn generate<R: Rng + ?Sized>(roster: &[CharacterCard], rng: &mut R) -> Result<Self, SetupError> {
        validate_roster(roster)?;
        let killer = roster.choose(rng).ok_or(SetupError::EmptyRoster)?;
        Self::build(roster, &killer.name, rng)
    }

    /// Like [`CaseState::generate`], with a chosen killer.
    pub fn generate_with_killer<R: Rng + ?Sized>(
        roster: &[CharacterCard],
        killer: &str,
        rng: &mut R,
    ) -> Result<Self, SetupError> {
        validate_roster(roster)?;
        if !roster.iter().any(|c| c.name == killer) {
            return Err(SetupError::KillerMissing(killer.to_string()));
        }
        Self::build(roster, killer, rng)
    }

    fn build<R: Rng + ?Sized>(roster: &[CharacterCard], killer: &str, rng: &mut R) -> Result<Self, SetupError> {
        let method = MURDER_METHODS
            .choose(rng)
            .copied()
            .unwrap_or(MURDER_METHODS[0]);

        let mut character_evidence = HashMap::new();
        for card in roster {
            let mut items: Vec<String> = Vec::new();
            let mut seen = HashSet::new();
            let mut add = |item: &str, items: &mut Vec<String>| {
                if seen.insert(item.to_string()) {
                    items.push(item.to_string());
                }
            };

            if card.name == killer {
                add(method.traces[0], &mut items);
                add(method.traces[1], &mut items);
            }

            let draws = 1 + rng.gen_range(0..2);
            for _ in 0..draws {
                if let Some(item) = COMMON_EVIDENCE.choose(rng) {
                    add(*item, &mut items);
                }
            }

            character_evidence.insert(card.name.clone(), items);
        }

        let mut scene_evidence = BTreeMap::new();
        scene_evidence.insert(
            BODY_EVIDENCE.to_string(),
            vec![
                method.evidence.to_string(),
                method.traces[2].to_string(),
                "signs of a struggle".to_string(),
                "scorch marks on the ground".to_string(),
            ],
        );

        Ok(Self {
            killer: killer.to_string(),
            weapon: method.weapon.to_string(),
            cause_of_death: method.evidence.to_string(),
            victim: DEFAULT_VICTIM.to_string(),
            character_evidence,
            scene_evidence,
        })
    }

    /// Name of the killer.
    pub fn killer(&self) -> &str {
        &self.killer
    }

    pub fn is_killer(&self, name: &str) -> bool {
        self.killer == name
    }

    pub fn weapon(&self) -> &str {
        &self.weapon
    }

    pub fn cause_of_death(&self) -> &str {
        &self.cause_of_death
    }

    /// Name of the first victim.
    pub fn victim(&self) -> &str {
        &self.victim
    }

    /// Evidence carried by a character, in discovery order.
    pub fn evidence_for(&self, name: &str) -> &[String] {
        self.character_evidence
            .get(name)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Evidence at the primary scene for a category.
    pub fn scene_evidence(&self, category: &str) -> &[String] {
        self.scene_evidence
            .get(category)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Judge an accusation.
    pub fn judge(&self, accused: &str) -> Verdict {
        if self.is_killer(accused) {
            Verdict::Win
        } else {
            Verdict::Lose
        }
    }

    /// Aside shown when first approaching a character.
    pub fn approach_hint(&self, name: &str) -> Option<String> {
        self.evidence_for(name)
            .first()
            .map(|item| format!("You notice {item} as you approach."))
    }

    /// Aside shown when first approaching the primary scene.
    pub fn scene_hint(&self) -> String {
        let body = self.scene_evidence(BODY_EVIDENCE);
        let atmosphere = body.get(3).map(String::as_str).unwrap_or("The silence is deafening");
        format!(
            "The body of {} lies before you, showing {}. {}.",
            self.victim,
            self.cause_of_death,
            capitalize(atmosphere)
        )
    }

    /// Aside for a player looking closely at a character.
    ///
    /// Fires when the input mentions examining, looking or inspecting and
    /// either names the evidence's first word or asks to look closely.
    pub fn closer_inspection(&self, name: &str, input: &str) -> Option<String> {
        let input = input.to_lowercase();
        if !["examine", "look", "inspect"].iter().any(|verb| input.contains(verb)) {
            return None;
        }
        self.evidence_for(name)
            .iter()
            .find(|item| {
                let first_word = item.split_whitespace().next().unwrap_or_default();
                input.contains("closely") || (!first_word.is_empty() && input.contains(first_word))
            })
            .map(|item| format!("Upon closer inspection, you notice {item}."))
    }

    /// Secret instructions appended to the killer's persona.
    pub fn killer_secret(&self) -> String {
        format!(
            "Secret: you murdered {} with a {}. Never admit it unless the detective confronts you with proof. \
             Deflect suspicion onto others.",
            self.victim, self.weapon
        )
    }
}

fn validate_roster(roster: &[CharacterCard]) -> Result<(), SetupError> {
    if roster.is_empty() {
        return Err(SetupError::EmptyRoster);
    }
    let mut names = HashSet::new();
    for card in roster {
        if !names.insert(card.name.as_str()) {
            return Err(SetupError::DuplicateName(card.name.clone()));
        }
    }
    Ok(())
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::character::default_roster;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn case(seed: u64) -> CaseState {
        CaseState::generate(&default_roster(), &mut StdRng::seed_from_u64(seed)).unwrap()
    }

    #[test]
    fn test_empty_roster_is_fatal() {
        let mut rng = StdRng::seed_from_u64(1);
        assert_eq!(CaseState::generate(&[], &mut rng).unwrap_err(), SetupError::EmptyRoster);
    }

    #[test]
    fn test_duplicate_names_are_fatal() {
        let mut roster = default_roster();
        roster.push(roster[0].clone());
        let err = CaseState::generate(&roster, &mut StdRng::seed_from_u64(1)).unwrap_err();
        assert_eq!(err, SetupError::DuplicateName("Lilith".to_string()));
    }

    #[test]
    fn test_chosen_killer_must_exist() {
        let err = CaseState::generate_with_killer(&default_roster(), "Nobody", &mut StdRng::seed_from_u64(1))
            .unwrap_err();
        assert_eq!(err, SetupError::KillerMissing("Nobody".to_string()));
    }

    #[test]
    fn test_same_seed_same_case() {
        let a = case(42);
        let b = case(42);
        assert_eq!(a.killer(), b.killer());
        assert_eq!(a.weapon(), b.weapon());
        for card in default_roster() {
            assert_eq!(a.evidence_for(&card.name), b.evidence_for(&card.name));
        }
    }

    #[test]
    fn test_killer_carries_incriminating_traces() {
        for seed in 0..20 {
            let case = case(seed);
            let method = MURDER_METHODS.iter().find(|m| m.weapon == case.weapon()).unwrap();
            let evidence = case.evidence_for(case.killer());

            assert_eq!(evidence[0], method.traces[0]);
            assert_eq!(evidence[1], method.traces[1]);
            assert!(evidence.len() <= 4);
        }
    }

    #[test]
    fn test_everyone_gets_common_evidence() {
        let case = case(7);
        for card in default_roster() {
            let evidence = case.evidence_for(&card.name);
            assert!(!evidence.is_empty());
            if !case.is_killer(&card.name) {
                assert!(evidence.len() <= 2);
                assert!(evidence.iter().all(|e| COMMON_EVIDENCE.contains(&e.as_str())));
            }
        }
    }

    #[test]
    fn test_scene_evidence() {
        let case = case(3);
        let body = case.scene_evidence(BODY_EVIDENCE);
        assert_eq!(body.len(), 4);
        assert_eq!(body[0], case.cause_of_death());
        assert_eq!(body[2], "signs of a struggle");
        assert!(case.scene_evidence("elsewhere").is_empty());
    }

    #[test]
    fn test_judge() {
        let case = case(11);
        assert_eq!(case.judge(case.killer()), Verdict::Win);
        for card in default_roster() {
            if card.name != case.killer() {
                assert_eq!(case.judge(&card.name), Verdict::Lose);
            }
        }
    }

    #[test]
    fn test_hints() {
        let case = CaseState::generate_with_killer(&default_roster(), "Grimsby", &mut StdRng::seed_from_u64(5))
            .unwrap();
        let first = case.evidence_for("Grimsby")[0].clone();

        assert_eq!(
            case.approach_hint("Grimsby"),
            Some(format!("You notice {first} as you approach."))
        );
        assert_eq!(case.approach_hint("Stranger"), None);

        let scene = case.scene_hint();
        assert!(scene.starts_with("The body of Damned Soul #471 lies before you, showing "));
        assert!(scene.ends_with("Scorch marks on the ground."));
    }

    #[test]
    fn test_closer_inspection() {
        let case = CaseState::generate_with_killer(&default_roster(), "Lilith", &mut StdRng::seed_from_u64(9))
            .unwrap();
        let first = case.evidence_for("Lilith")[0].clone();

        assert_eq!(case.closer_inspection("Lilith", "Hello there"), None);
        assert_eq!(
            case.closer_inspection("Lilith", "I look at you closely"),
            Some(format!("Upon closer inspection, you notice {first}."))
        );
    }
}
