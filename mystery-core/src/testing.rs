//! Testing utilities for the mystery engine.
//!
//! This module provides tools for integration testing:
//! - `ScriptedBackend` for deterministic replies without a model server
//! - `TestHarness` for scripted game scenarios

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use ollama::SnapshotStream;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::case::{CaseState, SetupError};
use crate::character::default_roster;
use crate::dialogue::{CompletionBackend, DialogueError, DialogueOrchestrator, DialogueTarget, OutcomeEvent, Turn};
use crate::session::SessionConfig;
use crate::world::{SceneId, World};

#[derive(Debug, Clone)]
enum ScriptedReply {
    /// Text chunks, replayed as cumulative snapshots.
    Chunks(Vec<String>),
    /// A reply that never produces anything.
    Stalled,
}

#[derive(Debug)]
struct Script {
    replies: VecDeque<ScriptedReply>,
    prompts: Vec<String>,
    default_reply: String,
}

/// A backend that returns scripted replies in order.
///
/// Clones share the same script, so a test can keep a handle after moving the
/// backend into an orchestrator. Once the queue is empty every prompt gets the
/// default reply as a single snapshot.
#[derive(Debug, Clone)]
pub struct ScriptedBackend {
    script: Arc<Mutex<Script>>,
}

impl ScriptedBackend {
    pub fn new() -> Self {
        Self {
            script: Arc::new(Mutex::new(Script {
                replies: VecDeque::new(),
                prompts: Vec::new(),
                default_reply: "Hmph.".to_string(),
            })),
        }
    }

    /// Queue a reply streamed as the cumulative concatenation of `chunks`.
    pub fn queue_reply<I, S>(&self, chunks: I) -> &Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let chunks = chunks.into_iter().map(Into::into).collect();
        self.lock().replies.push_back(ScriptedReply::Chunks(chunks));
        self
    }

    /// Queue a reply that never yields.
    pub fn queue_stalled(&self) -> &Self {
        self.lock().replies.push_back(ScriptedReply::Stalled);
        self
    }

    /// Set the reply used when the queue is empty.
    pub fn set_default_reply(&self, text: impl Into<String>) {
        self.lock().default_reply = text.into();
    }

    /// Every prompt received so far.
    pub fn prompts(&self) -> Vec<String> {
        self.lock().prompts.clone()
    }

    /// The most recent prompt.
    pub fn last_prompt(&self) -> Option<String> {
        self.lock().prompts.last().cloned()
    }

    fn lock(&self) -> MutexGuard<'_, Script> {
        self.script.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl CompletionBackend for ScriptedBackend {
    fn stream_completion(&self, prompt: &str) -> SnapshotStream {
        let mut script = self.lock();
        script.prompts.push(prompt.to_string());

        match script.replies.pop_front() {
            Some(ScriptedReply::Chunks(chunks)) => {
                let mut text = String::new();
                let snapshots: Vec<String> = chunks
                    .into_iter()
                    .map(|chunk| {
                        text.push_str(&chunk);
                        text.clone()
                    })
                    .collect();
                SnapshotStream::from_snapshots(snapshots)
            }
            Some(ScriptedReply::Stalled) => SnapshotStream::new(futures::stream::pending()),
            None => SnapshotStream::from_snapshots(vec![script.default_reply.clone()]),
        }
    }
}

/// Test harness for running mystery scenarios.
pub struct TestHarness {
    /// Shared handle on the orchestrator's backend.
    pub backend: ScriptedBackend,
    pub orchestrator: DialogueOrchestrator,
}

impl TestHarness {
    /// Default roster with a seeded random case and no verdict delay.
    pub fn new(seed: u64) -> Result<Self, SetupError> {
        let backend = ScriptedBackend::new();
        let config = Self::config(seed);
        let orchestrator = DialogueOrchestrator::new(backend.clone(), &config)?;
        Ok(Self { backend, orchestrator })
    }

    /// Default roster with a chosen killer.
    pub fn with_killer(killer: &str, seed: u64) -> Result<Self, SetupError> {
        let backend = ScriptedBackend::new();
        let config = Self::config(seed);
        let case = CaseState::generate_with_killer(&config.roster, killer, &mut StdRng::seed_from_u64(seed))?;
        let world = World::from_roster(config.roster.clone(), case.scene_hint());
        let orchestrator = DialogueOrchestrator::from_parts(backend.clone(), world, case, &config)?;
        Ok(Self { backend, orchestrator })
    }

    fn config(seed: u64) -> SessionConfig {
        SessionConfig::new()
            .with_roster(default_roster())
            .with_seed(seed)
            .with_verdict_delay(Duration::ZERO)
    }

    /// Open a dialogue and stream its greeting, if any. Returns the aside.
    pub async fn open(&mut self, target: impl Into<DialogueTarget>) -> Result<Option<String>, DialogueError> {
        let turn = self.orchestrator.open_dialogue(target)?;
        Ok(self.finish(turn).await)
    }

    /// Submit input and stream the reply. Returns the aside.
    pub async fn say(&mut self, input: &str) -> Result<Option<String>, DialogueError> {
        let turn = self.orchestrator.submit_input(input)?;
        Ok(self.finish(turn).await)
    }

    /// Open the primary crime scene and investigate once.
    pub async fn investigate_primary(&mut self, input: &str) -> Result<(), DialogueError> {
        let id = self.primary_scene();
        self.open(DialogueTarget::CrimeScene(id)).await?;
        self.say(input).await?;
        Ok(())
    }

    /// Open a suspect's dialogue and accuse them.
    pub async fn accuse(&mut self, name: &str) -> Result<OutcomeEvent, DialogueError> {
        self.open(DialogueTarget::Character(name.to_string())).await?;
        self.orchestrator.request_accusation().await
    }

    pub fn primary_scene(&self) -> SceneId {
        self.orchestrator.world().scenes()[0].id()
    }

    /// Text of the last message in a context.
    pub fn last_text(&self, context: &str) -> Option<String> {
        self.orchestrator
            .store()
            .last(context)
            .map(|m| m.text().to_string())
    }

    async fn finish(&mut self, turn: Turn) -> Option<String> {
        if let Some(reply) = turn.reply {
            self.orchestrator.drive(reply).await;
        }
        turn.aside
    }
}
