//! The playable world: suspects, crime scenes, and click hit-testing.
//!
//! Crime scenes are append-only. Once a scene exists it is never removed, so a
//! [`SceneId`] stays valid for the whole session.

use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::character::CharacterCard;
use crate::clues::{ClueGraph, Investigation};

/// Side length of a character's clickable square.
pub const CHARACTER_SIZE: f32 = 32.0;

/// Side length of a crime scene's clickable square (2x2 tiles).
pub const SCENE_SIZE: f32 = 64.0;

/// Top-left corner of an entity, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub x: f32,
    pub y: f32,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    fn covers(&self, size: f32, x: f32, y: f32) -> bool {
        x >= self.x && x <= self.x + size && y >= self.y && y <= self.y + size
    }
}

/// A suspect standing in the world.
#[derive(Debug, Clone)]
pub struct Character {
    pub card: CharacterCard,
    pub position: Position,
}

impl Character {
    pub fn new(card: CharacterCard, position: Position) -> Self {
        Self { card, position }
    }

    pub fn name(&self) -> &str {
        &self.card.name
    }
}

/// Stable identifier of a crime scene.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SceneId(usize);

impl SceneId {
    /// The conversation context id for this scene.
    pub fn context_id(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for SceneId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "crime-scene-{}", self.0)
    }
}

/// A place where a murder happened.
#[derive(Debug, Clone)]
pub struct CrimeScene {
    id: SceneId,
    position: Position,
    investigation: Investigation,
    victim: Option<CharacterCard>,
    evidence: String,
    investigated: bool,
}

impl CrimeScene {
    pub fn id(&self) -> SceneId {
        self.id
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn investigation(&self) -> &Investigation {
        &self.investigation
    }

    pub fn investigation_mut(&mut self) -> &mut Investigation {
        &mut self.investigation
    }

    /// The character murdered here, if this is not the primary scene.
    pub fn victim(&self) -> Option<&CharacterCard> {
        self.victim.as_ref()
    }

    /// Narrative evidence text for the scene.
    pub fn evidence(&self) -> &str {
        &self.evidence
    }

    /// Whether this is the original scene with no known victim.
    pub fn is_primary(&self) -> bool {
        self.victim.is_none()
    }

    /// Whether the player has investigated here.
    pub fn is_investigated(&self) -> bool {
        self.investigated
    }
}

/// What a click landed on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClickTarget {
    Character(String),
    CrimeScene(SceneId),
}

/// Suspects and crime scenes of one session.
#[derive(Debug, Clone)]
pub struct World {
    characters: Vec<Character>,
    scenes: Vec<CrimeScene>,
    clues: Arc<ClueGraph>,
    has_investigated_scene: bool,
}

impl World {
    /// Create a world with one primary crime scene.
    pub fn new(
        characters: Vec<Character>,
        primary_scene: Position,
        primary_evidence: impl Into<String>,
        clues: Arc<ClueGraph>,
    ) -> Self {
        let mut world = Self {
            characters,
            scenes: Vec::new(),
            clues,
            has_investigated_scene: false,
        };
        world.push_scene(primary_scene, None, primary_evidence.into());
        world
    }

    /// Lay out a roster on the default map with the infernal clue graph.
    pub fn from_roster(roster: Vec<CharacterCard>, primary_evidence: impl Into<String>) -> Self {
        let characters = roster
            .into_iter()
            .enumerate()
            .map(|(i, card)| {
                let column = (i % 4) as f32;
                let row = (i / 4) as f32;
                Character::new(
                    card,
                    Position::new(288.0 + column * 128.0, 128.0 + row * 160.0 + (i % 2) as f32 * 64.0),
                )
            })
            .collect();
        Self::new(characters, Position::new(96.0, 416.0), primary_evidence, ClueGraph::infernal())
    }

    /// Find what is under a point. Characters are checked before scenes.
    pub fn handle_click(&self, x: f32, y: f32) -> Option<ClickTarget> {
        if let Some(character) = self
            .characters
            .iter()
            .find(|c| c.position.covers(CHARACTER_SIZE, x, y))
        {
            return Some(ClickTarget::Character(character.name().to_string()));
        }
        self.scenes
            .iter()
            .find(|s| s.position.covers(SCENE_SIZE, x, y))
            .map(|s| ClickTarget::CrimeScene(s.id))
    }

    /// Living suspects.
    pub fn characters(&self) -> &[Character] {
        &self.characters
    }

    pub fn character(&self, name: &str) -> Option<&Character> {
        self.characters.iter().find(|c| c.name() == name)
    }

    /// Every crime scene, oldest first.
    pub fn scenes(&self) -> &[CrimeScene] {
        &self.scenes
    }

    pub fn scene(&self, id: SceneId) -> Option<&CrimeScene> {
        self.scenes.get(id.0)
    }

    pub fn scene_mut(&mut self, id: SceneId) -> Option<&mut CrimeScene> {
        self.scenes.get_mut(id.0)
    }

    /// The scene with no victim.
    pub fn primary_scene(&self) -> Option<&CrimeScene> {
        self.scenes.iter().find(|s| s.is_primary())
    }

    /// Murder a character: remove them from the living and add a new scene
    /// where they stood, with a fresh investigation.
    pub fn create_new_crime_scene(&mut self, name: &str) -> Option<SceneId> {
        let index = self.characters.iter().position(|c| c.name() == name)?;
        let victim = self.characters.remove(index);
        let evidence = victim.card.last_words.clone();
        Some(self.push_scene(victim.position, Some(victim.card), evidence))
    }

    /// Whether any scene has been investigated.
    pub fn has_investigated_scene(&self) -> bool {
        self.has_investigated_scene
    }

    /// Record that the player investigated a scene.
    pub fn mark_investigated(&mut self, id: SceneId) {
        if let Some(scene) = self.scenes.get_mut(id.0) {
            scene.investigated = true;
            self.has_investigated_scene = true;
        }
    }

    fn push_scene(&mut self, position: Position, victim: Option<CharacterCard>, evidence: String) -> SceneId {
        let id = SceneId(self.scenes.len());
        self.scenes.push(CrimeScene {
            id,
            position,
            investigation: Investigation::new(Arc::clone(&self.clues)),
            victim,
            evidence,
            investigated: false,
        });
        id
    }
}
