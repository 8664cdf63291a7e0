//! The dialogue orchestrator.
//!
//! The DialogueOrchestrator owns every piece of mutable session state: the
//! conversation store, the world, and the case. It builds prompts, opens reply
//! streams through a [`CompletionBackend`], and writes snapshots back into
//! the transcript. Only one dialogue is open at a time; each open bumps a
//! generation counter so replies belonging to an earlier dialogue are dropped.

use std::collections::HashSet;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use ollama::FALLBACK_TEXT;
use rand::SeedableRng;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::backend::CompletionBackend;
use super::prompts;
use super::{
    DialogueError, DialogueState, DialogueTarget, OutcomeEvent, OutcomeKind, PendingReply,
    ReplyTicket, SessionPhase, Turn, ACCUSATION_LINE, LOADING_MARKER, PLAYER_SPEAKER,
};
use crate::case::{CaseState, SetupError, Verdict};
use crate::character::CharacterCard;
use crate::clues::InvestigationKind;
use crate::conversation::{ConversationStore, Message};
use crate::session::SessionConfig;
use crate::world::{CrimeScene, SceneId, World};

#[derive(Debug, Clone)]
struct ActiveDialogue {
    target: DialogueTarget,
    context: String,
    generation: u64,
}

/// Drives conversations, investigations, and accusations for one session.
pub struct DialogueOrchestrator {
    session_id: Uuid,
    backend: Box<dyn CompletionBackend>,
    store: ConversationStore,
    world: World,
    case: CaseState,
    narrator: CharacterCard,
    rng: StdRng,
    verdict_delay: Duration,
    prompt_history: usize,
    active: Option<ActiveDialogue>,
    state: DialogueState,
    generation: u64,
    /// Replies whose placeholder has not received a snapshot yet.
    unresolved: Vec<ReplyTicket>,
    /// Contexts whose first-contact aside has been shown.
    greeted: HashSet<String>,
    phase: SessionPhase,
}

impl DialogueOrchestrator {
    /// Set up a fresh case over the configured roster.
    pub fn new(backend: impl CompletionBackend + 'static, config: &SessionConfig) -> Result<Self, SetupError> {
        let mut rng = seeded_rng(config.seed);
        let case = CaseState::generate(&config.roster, &mut rng)?;
        let world = World::from_roster(config.roster.clone(), case.scene_hint());
        Ok(Self::assemble(Box::new(backend), world, case, rng, config))
    }

    /// Use a prepared world and case. The killer must be alive in the world.
    pub fn from_parts(
        backend: impl CompletionBackend + 'static,
        world: World,
        case: CaseState,
        config: &SessionConfig,
    ) -> Result<Self, SetupError> {
        if world.character(case.killer()).is_none() {
            return Err(SetupError::KillerMissing(case.killer().to_string()));
        }
        let rng = seeded_rng(config.seed);
        Ok(Self::assemble(Box::new(backend), world, case, rng, config))
    }

    fn assemble(
        backend: Box<dyn CompletionBackend>,
        world: World,
        case: CaseState,
        rng: StdRng,
        config: &SessionConfig,
    ) -> Self {
        let store = match config.history_limit {
            Some(limit) => ConversationStore::with_limit(limit),
            None => ConversationStore::new(),
        };
        let session_id = Uuid::new_v4();
        info!(session = %session_id, suspects = world.characters().len(), "mystery session started");

        Self {
            session_id,
            backend,
            store,
            world,
            case,
            narrator: CharacterCard::narrator(),
            rng,
            verdict_delay: config.verdict_delay,
            prompt_history: config.prompt_history,
            active: None,
            state: DialogueState::Idle,
            generation: 0,
            unresolved: Vec::new(),
            greeted: HashSet::new(),
            phase: SessionPhase::Playing,
        }
    }

    /// Open a dialogue with a character or crime scene.
    ///
    /// An empty conversation gets a placeholder message and a streaming
    /// greeting. An existing conversation is replayed as is.
    pub fn open_dialogue(&mut self, target: impl Into<DialogueTarget>) -> Result<Turn, DialogueError> {
        self.ensure_playing()?;
        let target = target.into();
        let context = self.context_for(&target)?;

        self.abandon_placeholders();
        self.generation += 1;
        self.active = Some(ActiveDialogue {
            target: target.clone(),
            context: context.clone(),
            generation: self.generation,
        });
        self.state = DialogueState::Idle;

        let aside = if self.greeted.insert(context.clone()) {
            self.first_contact_aside(&target)
        } else {
            None
        };

        if self.store.has_history(&context) {
            debug!(session = %self.session_id, context = %context, "replaying conversation");
            self.state = DialogueState::Open;
            return Ok(Turn { reply: None, aside });
        }

        let (speaker, prompt) = match &target {
            DialogueTarget::Character(name) => {
                let persona = prompts::persona_block(self.card(name)?, &self.case);
                (name.clone(), prompts::greeting(&persona))
            }
            DialogueTarget::CrimeScene(id) => {
                let scene = self.scene(*id)?;
                (self.narrator.name.clone(), prompts::scene_opening(&self.narrator, scene))
            }
        };

        let reply = self.start_reply(&context, speaker, &prompt)?;
        self.state = DialogueState::AwaitingFirstResponse;
        Ok(Turn {
            reply: Some(reply),
            aside,
        })
    }

    /// Say something in the open dialogue.
    ///
    /// To a character this is free talk. At a crime scene it is an
    /// investigation step that the narrator dramatizes.
    pub fn submit_input(&mut self, input: &str) -> Result<Turn, DialogueError> {
        self.ensure_playing()?;
        let active = self.active.clone().ok_or(DialogueError::NoActiveDialogue)?;
        let input = input.trim();
        if input.is_empty() {
            return Err(DialogueError::EmptyInput);
        }

        match &active.target {
            DialogueTarget::Character(name) => {
                let recent = if self.prompt_history > 0 {
                    self.store.formatted_history(&active.context, self.prompt_history)
                } else {
                    Vec::new()
                };
                self.store.append(&active.context, PLAYER_SPEAKER, input);

                let aside = self.case.closer_inspection(name, input);
                let persona = prompts::persona_block(self.card(name)?, &self.case);
                let prompt = prompts::character_reply(&persona, &recent, input);
                let reply = self.start_reply(&active.context, name.clone(), &prompt)?;
                Ok(Turn {
                    reply: Some(reply),
                    aside,
                })
            }
            DialogueTarget::CrimeScene(id) => {
                self.store.append(&active.context, PLAYER_SPEAKER, input);

                let result = self
                    .world
                    .scene_mut(*id)
                    .ok_or_else(|| DialogueError::UnknownTarget(id.to_string()))?
                    .investigation_mut()
                    .investigate_input(input);
                if matches!(
                    result.kind,
                    InvestigationKind::Discovered | InvestigationKind::AlreadyFound | InvestigationKind::Detail
                ) {
                    self.world.mark_investigated(*id);
                }
                debug!(session = %self.session_id, scene = %id, kind = ?result.kind, "investigated");

                let prompt = prompts::scene_investigation(&self.narrator, self.scene(*id)?, input, &result);
                let speaker = self.narrator.name.clone();
                let reply = self.start_reply(&active.context, speaker, &prompt)?;
                Ok(Turn { reply: Some(reply), aside: None })
            }
        }
    }

    /// Write a snapshot into the reply's message.
    ///
    /// Returns `false` if the ticket is stale or the message is gone; the
    /// caller should stop consuming that reply.
    pub fn apply_snapshot(&mut self, ticket: &ReplyTicket, text: &str) -> bool {
        let current = self
            .active
            .as_ref()
            .is_some_and(|a| a.generation == ticket.generation && a.context == ticket.context);
        if !current {
            debug!(session = %self.session_id, context = %ticket.context, "discarding stale snapshot");
            return false;
        }

        if !self.store.replace_text(&ticket.context, ticket.message, text) {
            debug!(session = %self.session_id, context = %ticket.context, "reply message no longer exists");
            return false;
        }

        self.unresolved.retain(|t| t != ticket);
        if self.state == DialogueState::AwaitingFirstResponse {
            self.state = DialogueState::Open;
        }
        true
    }

    /// Stream a reply to completion, applying every snapshot in order.
    ///
    /// Returns the final text, or `None` if the reply went stale. A reply
    /// that ends without any snapshot leaves the fallback text in place of
    /// its placeholder.
    pub async fn drive(&mut self, mut reply: PendingReply) -> Option<String> {
        let mut last = None;
        while let Some(snapshot) = reply.next_snapshot().await {
            if !self.apply_snapshot(reply.ticket(), &snapshot) {
                reply.cancel();
                return None;
            }
            last = Some(snapshot);
        }

        let ticket = reply.ticket();
        let current = self
            .active
            .as_ref()
            .is_some_and(|a| a.generation == ticket.generation);
        if !current {
            return None;
        }

        if last.is_none() && self.unresolved.contains(ticket) {
            warn!(session = %self.session_id, context = %ticket.context, "reply ended without text");
            self.unresolved.retain(|t| t != ticket);
            self.store.replace_text(&ticket.context, ticket.message, FALLBACK_TEXT);
            last = Some(FALLBACK_TEXT.to_string());
        }
        if self.state == DialogueState::AwaitingFirstResponse {
            self.state = DialogueState::Open;
        }
        last
    }

    /// Whether the open dialogue allows an accusation.
    ///
    /// Needs a suspect's dialogue open and a scene where the player actually
    /// turned up a clue; rejected actions do not count.
    pub fn accusation_available(&self) -> bool {
        self.phase == SessionPhase::Playing
            && self.world.has_investigated_scene()
            && matches!(
                self.active.as_ref().map(|a| &a.target),
                Some(DialogueTarget::Character(_))
            )
    }

    /// Accuse the character in the open dialogue.
    ///
    /// Their reaction streams into the transcript, then after the configured
    /// delay the outcome resolves. A wrong accusation murders another innocent
    /// while any remain.
    pub async fn request_accusation(&mut self) -> Result<OutcomeEvent, DialogueError> {
        self.ensure_playing()?;
        let active = self.active.clone().ok_or(DialogueError::NoActiveDialogue)?;
        let DialogueTarget::Character(accused) = active.target else {
            return Err(DialogueError::AccusationUnavailable(
                "only suspects can be accused".to_string(),
            ));
        };
        if !self.world.has_investigated_scene() {
            return Err(DialogueError::AccusationUnavailable(
                "investigate a crime scene first".to_string(),
            ));
        }

        let verdict = self.case.judge(&accused);
        self.store.append(&active.context, PLAYER_SPEAKER, ACCUSATION_LINE);

        let persona = prompts::persona_block(self.card(&accused)?, &self.case);
        let prompt = prompts::accusation(&persona, verdict);
        let reply = self.start_reply(&active.context, accused.clone(), &prompt)?;
        self.drive(reply).await;

        tokio::time::sleep(self.verdict_delay).await;
        Ok(self.resolve(&accused, verdict))
    }

    /// Close the open dialogue. In-flight replies become stale and their
    /// unanswered placeholders are withdrawn.
    pub fn close_dialogue(&mut self) {
        self.abandon_placeholders();
        if self.active.take().is_some() {
            self.generation += 1;
            self.state = DialogueState::Closed;
        }
    }

    /// Forget a conversation entirely, closing it if it is open.
    pub fn reset_conversation(&mut self, target: impl Into<DialogueTarget>) -> Result<(), DialogueError> {
        let context = self.context_for(&target.into())?;
        if self.active.as_ref().is_some_and(|a| a.context == context) {
            self.close_dialogue();
        }
        self.store.clear(&context);
        self.greeted.remove(&context);
        Ok(())
    }

    /// Transcript of the open dialogue.
    pub fn transcript(&self) -> Vec<Message> {
        self.active
            .as_ref()
            .map(|a| self.store.history(&a.context))
            .unwrap_or_default()
    }

    /// Transcript of any context.
    pub fn history(&self, context: &str) -> Vec<Message> {
        self.store.history(context)
    }

    pub fn state(&self) -> DialogueState {
        self.state
    }

    pub fn phase(&self) -> SessionPhase {
        self.phase
    }

    pub fn active_target(&self) -> Option<&DialogueTarget> {
        self.active.as_ref().map(|a| &a.target)
    }

    pub fn world(&self) -> &World {
        &self.world
    }

    pub fn case(&self) -> &CaseState {
        &self.case
    }

    pub fn store(&self) -> &ConversationStore {
        &self.store
    }

    pub fn session_id(&self) -> Uuid {
        self.session_id
    }

    fn start_reply(&mut self, context: &str, speaker: String, prompt: &str) -> Result<PendingReply, DialogueError> {
        let Some(message) = self.store.append(context, speaker, LOADING_MARKER) else {
            return Err(DialogueError::EmptyInput);
        };
        debug!(session = %self.session_id, context = %context, prompt_len = prompt.len(), "requesting reply");

        let stream = self.backend.stream_completion(prompt);
        let ticket = ReplyTicket {
            context: context.to_string(),
            message,
            generation: self.generation,
        };
        self.unresolved.push(ticket.clone());
        Ok(PendingReply::new(ticket, stream))
    }

    /// Withdraw placeholders that never got a snapshot. A trailing one is
    /// removed so the target greets afresh on reopen; one buried under later
    /// messages shows the fallback text instead.
    fn abandon_placeholders(&mut self) {
        let abandoned = std::mem::take(&mut self.unresolved);
        for ticket in abandoned.into_iter().rev() {
            if !self.store.remove_last(&ticket.context, ticket.message) {
                self.store.replace_text(&ticket.context, ticket.message, FALLBACK_TEXT);
            }
            debug!(session = %self.session_id, context = %ticket.context, "withdrew unanswered placeholder");
        }
    }

    fn resolve(&mut self, accused: &str, verdict: Verdict) -> OutcomeEvent {
        self.close_dialogue();

        match verdict {
            Verdict::Win => {
                self.phase = SessionPhase::Won;
                info!(session = %self.session_id, killer = accused, "killer caught");
                OutcomeEvent {
                    result: OutcomeKind::Win,
                    message: format!("Congratulations! You caught the killer: {accused}!"),
                }
            }
            Verdict::Lose => {
                let wrong = format!("Wrong accusation! {accused} was innocent.");
                match self.rotate_victim() {
                    Some(victim) => OutcomeEvent {
                        result: OutcomeKind::NewMurder,
                        message: format!(
                            "{wrong}\n\n{victim} has been murdered! A new crime scene has appeared."
                        ),
                    },
                    None => {
                        self.phase = SessionPhase::Lost;
                        info!(session = %self.session_id, accused, "no innocents left");
                        OutcomeEvent {
                            result: OutcomeKind::Lose,
                            message: format!("{wrong}\n\nEveryone is dead! Game Over."),
                        }
                    }
                }
            }
        }
    }

    /// Murder a random surviving innocent. The killer is never chosen.
    fn rotate_victim(&mut self) -> Option<String> {
        let candidates: Vec<String> = self
            .world
            .characters()
            .iter()
            .filter(|c| !self.case.is_killer(c.name()))
            .map(|c| c.name().to_string())
            .collect();
        let victim = candidates.choose(&mut self.rng)?.clone();
        let scene = self.world.create_new_crime_scene(&victim)?;
        info!(session = %self.session_id, victim = %victim, scene = %scene, "new murder");
        Some(victim)
    }

    fn first_contact_aside(&self, target: &DialogueTarget) -> Option<String> {
        match target {
            DialogueTarget::Character(name) => self.case.approach_hint(name),
            DialogueTarget::CrimeScene(id) => {
                let scene = self.world.scene(*id)?;
                Some(match scene.victim() {
                    Some(victim) => format!(
                        "The body of {} lies before you. Their last words still hang in the air: \"{}\"",
                        victim.name,
                        scene.evidence()
                    ),
                    None => self.case.scene_hint(),
                })
            }
        }
    }

    fn context_for(&self, target: &DialogueTarget) -> Result<String, DialogueError> {
        match target {
            DialogueTarget::Character(name) => {
                self.card(name)?;
                Ok(name.clone())
            }
            DialogueTarget::CrimeScene(id) => Ok(self.scene(*id)?.id().context_id()),
        }
    }

    fn card(&self, name: &str) -> Result<&CharacterCard, DialogueError> {
        self.world
            .character(name)
            .map(|c| &c.card)
            .ok_or_else(|| DialogueError::UnknownTarget(name.to_string()))
    }

    fn scene(&self, id: SceneId) -> Result<&CrimeScene, DialogueError> {
        self.world
            .scene(id)
            .ok_or_else(|| DialogueError::UnknownTarget(id.to_string()))
    }

    fn ensure_playing(&self) -> Result<(), DialogueError> {
        match self.phase {
            SessionPhase::Playing => Ok(()),
            SessionPhase::Won | SessionPhase::Lost => Err(DialogueError::SessionOver),
        }
    }
}

fn seeded_rng(seed: Option<u64>) -> StdRng {
    match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_entropy(),
    }
}
