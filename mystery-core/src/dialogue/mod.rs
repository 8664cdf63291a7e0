//! Dialogue orchestration.
//!
//! Contains the orchestrator that drives conversations with suspects and the
//! crime scene narrator, the backend seam it streams replies through, and
//! the prompt builders.

mod backend;
mod orchestrator;
mod prompts;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::conversation::MessageId;
use crate::world::{ClickTarget, SceneId};
use ollama::SnapshotStream;

pub use backend::CompletionBackend;
pub use orchestrator::DialogueOrchestrator;

/// Text shown in a reply's message until the first snapshot arrives.
pub const LOADING_MARKER: &str = "...";

/// Speaker name for the player's own lines.
pub const PLAYER_SPEAKER: &str = "You";

/// What the player says when accusing a suspect.
pub const ACCUSATION_LINE: &str = "I know you're the killer!";

/// Errors from misusing the dialogue API.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DialogueError {
    #[error("No dialogue is open")]
    NoActiveDialogue,

    #[error("The session is over")]
    SessionOver,

    #[error("Accusation unavailable: {0}")]
    AccusationUnavailable(String),

    #[error("Unknown dialogue target: {0}")]
    UnknownTarget(String),

    #[error("Input is empty")]
    EmptyInput,
}

/// Who a dialogue is with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogueTarget {
    Character(String),
    CrimeScene(SceneId),
}

impl From<ClickTarget> for DialogueTarget {
    fn from(target: ClickTarget) -> Self {
        match target {
            ClickTarget::Character(name) => DialogueTarget::Character(name),
            ClickTarget::CrimeScene(id) => DialogueTarget::CrimeScene(id),
        }
    }
}

/// Lifecycle of the dialogue window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogueState {
    /// Nothing has been opened yet, or the target was just selected.
    Idle,
    /// A first reply is streaming into an empty conversation.
    AwaitingFirstResponse,
    Open,
    Closed,
}

/// Overall progress of the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionPhase {
    Playing,
    Won,
    Lost,
}

/// How an accusation ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OutcomeKind {
    /// The killer was caught. Terminal.
    Win,
    /// Wrong accusation with nobody left to kill. Terminal.
    Lose,
    /// Wrong accusation; another suspect was murdered and play continues.
    NewMurder,
}

impl OutcomeKind {
    /// Whether the accusation was wrong.
    pub fn is_loss(&self) -> bool {
        !matches!(self, OutcomeKind::Win)
    }

    /// Whether the session ends.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, OutcomeKind::NewMurder)
    }
}

/// Event for the shell to render after an accusation resolves.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutcomeEvent {
    pub result: OutcomeKind,
    pub message: String,
}

/// Identifies where a streamed reply may be written.
///
/// A ticket goes stale as soon as its dialogue is closed or another target is
/// opened; snapshots applied with a stale ticket are discarded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReplyTicket {
    pub(crate) context: String,
    pub(crate) message: MessageId,
    pub(crate) generation: u64,
}

impl ReplyTicket {
    /// Conversation context the reply belongs to.
    pub fn context(&self) -> &str {
        &self.context
    }

    /// The placeholder message being replaced.
    pub fn message(&self) -> MessageId {
        self.message
    }
}

/// A reply that is streaming (or about to stream) into the transcript.
///
/// The shell awaits snapshots from it and hands them back to the orchestrator
/// with [`DialogueOrchestrator::apply_snapshot`], or lets
/// [`DialogueOrchestrator::drive`] do both.
#[derive(Debug)]
pub struct PendingReply {
    ticket: ReplyTicket,
    stream: SnapshotStream,
}

impl PendingReply {
    pub(crate) fn new(ticket: ReplyTicket, stream: SnapshotStream) -> Self {
        Self { ticket, stream }
    }

    pub fn ticket(&self) -> &ReplyTicket {
        &self.ticket
    }

    /// Await the next cumulative snapshot.
    pub async fn next_snapshot(&mut self) -> Option<String> {
        self.stream.next_snapshot().await
    }

    /// Abandon the reply and release its connection.
    pub fn cancel(self) {
        self.stream.cancel();
    }
}

/// Result of opening a dialogue or saying something.
#[derive(Debug)]
pub struct Turn {
    /// The reply to stream, if one was requested.
    pub reply: Option<PendingReply>,
    /// A "Detective's Mind" aside, kept out of the transcript.
    pub aside: Option<String>,
}
