//! Infernal murder-mystery engine with language-model suspects.
//!
//! This crate provides:
//! - A case generator (killer, weapon, evidence) over a suspect roster
//! - Crime scenes with a clue graph the player investigates
//! - Per-character conversations streamed from a local Ollama server
//! - Accusations, with a new murder after every wrong guess
//!
//! # Quick Start
//!
//! ```ignore
//! use mystery_core::{new_session, DialogueTarget, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut game = new_session(&SessionConfig::from_env()?)?;
//!
//!     let turn = game.open_dialogue(DialogueTarget::Character("Lilith".into()))?;
//!     if let Some(reply) = turn.reply {
//!         game.drive(reply).await;
//!     }
//!     for message in game.transcript() {
//!         println!("{}: {}", message.speaker(), message.text());
//!     }
//!     Ok(())
//! }
//! ```

pub mod case;
pub mod character;
pub mod clues;
pub mod conversation;
pub mod dialogue;
pub mod session;
pub mod testing;
pub mod world;

// Primary public API
pub use case::{CaseState, SetupError, Verdict};
pub use character::{default_roster, CharacterCard};
pub use clues::{ClueEntry, ClueGraph, Investigation, InvestigationKind, InvestigationResult};
pub use conversation::{wrap_text, ConversationStore, Message, MessageId};
pub use dialogue::{
    CompletionBackend, DialogueError, DialogueOrchestrator, DialogueState, DialogueTarget, OutcomeEvent,
    OutcomeKind, PendingReply, ReplyTicket, SessionPhase, Turn,
};
pub use session::{new_session, new_session_checked, SessionConfig, SessionError};
pub use testing::{ScriptedBackend, TestHarness};
pub use world::{ClickTarget, CrimeScene, Position, SceneId, World};
