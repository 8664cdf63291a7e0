//! Crime scene clues.
//!
//! A [`ClueGraph`] is the static description of what can be investigated at a
//! scene: top-level actions, each with a discovery text and a set of detail
//! sub-topics. An [`Investigation`] is the mutable per-scene state over a
//! shared graph. Disclosure is two-phase: the first time an action is
//! investigated its description is revealed and it is marked found forever;
//! after that, its details can be drilled into repeatedly without side effects.

use std::collections::HashMap;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

/// One investigable action at a scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClueEntry {
    /// Text revealed on first discovery.
    pub description: String,
    /// Detail name (lower-case) to fixed detail text, in presentation order.
    details: Vec<(String, String)>,
}

impl ClueEntry {
    /// Create an entry. Detail names are lower-cased; a repeated name replaces
    /// the earlier text.
    pub fn new<'a>(
        description: impl Into<String>,
        details: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> Self {
        let mut entry = Self {
            description: description.into(),
            details: Vec::new(),
        };
        for (name, text) in details {
            let name = normalize(name);
            match entry.details.iter_mut().find(|(existing, _)| *existing == name) {
                Some(slot) => slot.1 = text.to_string(),
                None => entry.details.push((name, text.to_string())),
            }
        }
        entry
    }

    /// Look up a detail by name, case-insensitively.
    pub fn detail(&self, name: &str) -> Option<&str> {
        let name = normalize(name);
        self.details
            .iter()
            .find(|(key, _)| *key == name)
            .map(|(_, text)| text.as_str())
    }

    /// Detail names in presentation order.
    pub fn detail_names(&self) -> Vec<String> {
        self.details.iter().map(|(name, _)| name.clone()).collect()
    }
}

/// Static mapping from action name to clue entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClueGraph {
    entries: Vec<(String, ClueEntry)>,
}

impl ClueGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an action. The name is lower-cased; re-adding a name replaces its
    /// entry in place.
    pub fn with_clue(mut self, action: &str, entry: ClueEntry) -> Self {
        let action = normalize(action);
        match self.entries.iter_mut().find(|(name, _)| *name == action) {
            Some(slot) => slot.1 = entry,
            None => self.entries.push((action, entry)),
        }
        self
    }

    /// Look up an action, case-insensitively.
    pub fn get(&self, action: &str) -> Option<&ClueEntry> {
        self.position(action).map(|i| &self.entries[i].1)
    }

    /// Top-level action names in presentation order.
    pub fn actions(&self) -> Vec<String> {
        self.entries.iter().map(|(name, _)| name.clone()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn position(&self, action: &str) -> Option<usize> {
        let action = normalize(action);
        self.entries.iter().position(|(name, _)| *name == action)
    }

    /// The built-in clue graph for a murder in Hell.
    pub fn infernal() -> Arc<ClueGraph> {
        Arc::clone(&INFERNAL_CLUES)
    }
}

lazy_static::lazy_static! {
    static ref INFERNAL_CLUES: Arc<ClueGraph> = Arc::new(
        ClueGraph::new()
            .with_clue(
                "examine body",
                ClueEntry::new(
                    "A high-ranking demon lies mutilated in an unusually artistic manner, their essence still crackling in the sulfurous air.",
                    [
                        ("check wounds", "Multiple precise cuts form a complex ritual pattern. The killer combined torture methods from different eras of human history."),
                        ("examine face", "The victim's expression is frozen in a mix of ecstasy and agony. Their eyes have been replaced with burning crystals."),
                        ("inspect markings", "Ritualistic symbols carved into the flesh, some from ancient torture techniques, others from modern serial killers."),
                        ("check hands", "Fingers positioned in an unusual gesture, like conducting an orchestra of pain. Several fingers bear rings from different victims."),
                        ("analyze mutilations", "The mutilations show signs of multiple torture styles - clinical precision, artistic flair, and religious symbolism all present."),
                    ],
                ),
            )
            .with_clue(
                "search area",
                ClueEntry::new(
                    "The hellscape around the body has been transformed into a grotesque display of suffering artistry.",
                    [
                        ("examine altar", "A makeshift altar of bones and flesh, suggesting the murder was part of a ritual. Various torture implements are arranged with theatrical precision."),
                        ("check symbols", "Blood-drawn symbols combine medical diagrams with theatrical staging marks and religious iconography."),
                        ("inspect offerings", "Various 'trophies' from other victims arranged carefully - bottles of breath, preserved screams, and crystallized pain."),
                        ("analyze atmosphere", "The air itself seems charged with residual agony, suggesting multiple participants in this elaborate death scene."),
                    ],
                ),
            )
            .with_clue(
                "study evidence",
                ClueEntry::new(
                    "Various implements and items tell a story of premeditated, collaborative murder.",
                    [
                        ("check tools", "A combination of surgical tools, theatrical props, and religious implements, all used in the killing."),
                        ("examine notes", "Scattered pages contain medical observations, stage directions, and prayers - all focused on perfecting the art of torture."),
                        ("analyze residue", "Traces of various torture methods overlap: chemical burns, holy water marks, and theatrical smoke residue."),
                        ("inspect container", "A specialized container designed to capture and preserve the victim's final moments of suffering."),
                    ],
                ),
            ),
    );
}

/// What an [`Investigation::investigate`] call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InvestigationKind {
    /// No action given; lists the top-level actions.
    Prompt,
    /// The action is not part of this scene.
    UnknownAction,
    /// First-time discovery of an action.
    Discovered,
    /// The action was already found and no detail was asked for.
    AlreadyFound,
    /// A detail of a found action.
    Detail,
    /// The detail is not part of the action.
    UnknownDetail,
}

/// Result of investigating a scene.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InvestigationResult {
    pub message: String,
    pub options: Vec<String>,
    pub kind: InvestigationKind,
}

/// Mutable discovery state for one crime scene.
#[derive(Debug, Clone)]
pub struct Investigation {
    graph: Arc<ClueGraph>,
    found: HashMap<String, bool>,
    /// Last action successfully investigated; bare detail names route to it.
    focus: Option<String>,
}

impl Investigation {
    /// Start an investigation with every clue undiscovered.
    pub fn new(graph: Arc<ClueGraph>) -> Self {
        let found = graph.actions().into_iter().map(|a| (a, false)).collect();
        Self {
            graph,
            found,
            focus: None,
        }
    }

    pub fn graph(&self) -> &ClueGraph {
        &self.graph
    }

    /// Investigate an action, optionally drilling into one of its details.
    ///
    /// Discovery is the only mutation: the first call for an action flips its
    /// found flag and returns its description. Every later call is read-only.
    pub fn investigate(&mut self, action: Option<&str>, detail: Option<&str>) -> InvestigationResult {
        let Some(action) = action.map(normalize).filter(|a| !a.is_empty()) else {
            let actions = self.graph.actions();
            return InvestigationResult {
                message: format!("What would you like to do? ({})", actions.join(", ")),
                options: actions,
                kind: InvestigationKind::Prompt,
            };
        };

        let Some(entry) = self.graph.get(&action) else {
            let actions = self.graph.actions();
            return InvestigationResult {
                message: format!("You can't do that here. Try {}.", quoted_list(&actions)),
                options: actions,
                kind: InvestigationKind::UnknownAction,
            };
        };

        let options = entry.detail_names();
        self.focus = Some(action.clone());

        let found = self.found.entry(action).or_insert(false);
        if !*found {
            *found = true;
            return InvestigationResult {
                message: entry.description.clone(),
                options,
                kind: InvestigationKind::Discovered,
            };
        }

        match detail.map(normalize).filter(|d| !d.is_empty()) {
            Some(detail) => match entry.detail(&detail) {
                Some(text) => InvestigationResult {
                    message: text.to_string(),
                    options,
                    kind: InvestigationKind::Detail,
                },
                None => InvestigationResult {
                    message: format!(
                        "You can't do that. Try one of these actions: {}",
                        options.join(", ")
                    ),
                    options,
                    kind: InvestigationKind::UnknownDetail,
                },
            },
            None => InvestigationResult {
                message: "What would you like to examine more closely?".to_string(),
                options,
                kind: InvestigationKind::AlreadyFound,
            },
        }
    }

    /// Investigate from free player text.
    ///
    /// Text starting with an action name is split into action and detail.
    /// Otherwise, a detail name of the focused action drills into that action.
    /// Anything else is treated as an action and rejected if unknown.
    pub fn investigate_input(&mut self, input: &str) -> InvestigationResult {
        let input = normalize(input);
        if input.is_empty() {
            return self.investigate(None, None);
        }

        let mut actions = self.graph.actions();
        actions.sort_by_key(|a| std::cmp::Reverse(a.len()));
        for action in actions {
            if input == action {
                return self.investigate(Some(&action), None);
            }
            if let Some(rest) = input.strip_prefix(&action).and_then(|r| r.strip_prefix(' ')) {
                return self.investigate(Some(&action), Some(rest));
            }
        }

        if let Some(focus) = self.focus.clone() {
            let is_detail = self
                .graph
                .get(&focus)
                .is_some_and(|entry| entry.detail(&input).is_some());
            if is_detail {
                return self.investigate(Some(&focus), Some(&input));
            }
        }

        self.investigate(Some(&input), None)
    }

    /// Whether an action has been discovered.
    pub fn is_found(&self, action: &str) -> bool {
        self.found.get(&normalize(action)).copied().unwrap_or(false)
    }

    /// Number of discovered actions.
    pub fn found_count(&self) -> usize {
        self.found.values().filter(|f| **f).count()
    }

    /// Snapshot of every found flag.
    pub fn found_flags(&self) -> HashMap<String, bool> {
        self.found.clone()
    }

    /// The action most recently investigated.
    pub fn focus(&self) -> Option<&str> {
        self.focus.as_deref()
    }
}

fn normalize(s: &str) -> String {
    s.trim().to_lowercase()
}

/// `'a'`, `'a' or 'b'`, `'a', 'b', or 'c'`.
fn quoted_list(items: &[String]) -> String {
    let quoted: Vec<String> = items.iter().map(|i| format!("'{i}'")).collect();
    match quoted.as_slice() {
        [] => String::new(),
        [one] => one.clone(),
        [first, second] => format!("{first} or {second}"),
        [init @ .., last] => format!("{}, or {last}", init.join(", ")),
    }
}
