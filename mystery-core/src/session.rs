//! Session setup: configuration and wiring the orchestrator to a model server.

use std::time::Duration;

use ollama::Ollama;
use thiserror::Error;
use tracing::{info, warn};

use crate::case::SetupError;
use crate::character::{default_roster, CharacterCard};
use crate::dialogue::DialogueOrchestrator;

/// Default pause between an accused suspect's reaction and the verdict.
pub const DEFAULT_VERDICT_DELAY: Duration = Duration::from_secs(2);

/// Errors from session setup.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Setup error: {0}")]
    Setup(#[from] SetupError),

    #[error("Model server error: {0}")]
    Backend(#[from] ollama::Error),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

/// Configuration for creating a new mystery session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// Model server address. `None` reads `OLLAMA_HOST`.
    pub base_url: Option<String>,

    /// Model name. `None` reads `OLLAMA_MODEL`.
    pub model: Option<String>,

    /// Seed for the case and victim selection. `None` uses entropy.
    pub seed: Option<u64>,

    /// Pause before an accusation resolves.
    pub verdict_delay: Duration,

    /// Cap on messages kept per conversation.
    pub history_limit: Option<usize>,

    /// Recent transcript lines included in character prompts.
    pub prompt_history: usize,

    /// The suspects.
    pub roster: Vec<CharacterCard>,
}

impl SessionConfig {
    pub fn new() -> Self {
        Self {
            base_url: None,
            model: None,
            seed: None,
            verdict_delay: DEFAULT_VERDICT_DELAY,
            history_limit: None,
            prompt_history: 0,
            roster: default_roster(),
        }
    }

    /// Read `MYSTERY_SEED` from the environment on top of the defaults.
    pub fn from_env() -> Result<Self, SessionError> {
        let mut config = Self::new();
        if let Ok(seed) = std::env::var("MYSTERY_SEED") {
            let seed = seed
                .trim()
                .parse()
                .map_err(|_| SessionError::InvalidConfig(format!("MYSTERY_SEED is not a number: {seed}")))?;
            config.seed = Some(seed);
        }
        Ok(config)
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_verdict_delay(mut self, delay: Duration) -> Self {
        self.verdict_delay = delay;
        self
    }

    pub fn with_history_limit(mut self, limit: usize) -> Self {
        self.history_limit = Some(limit);
        self
    }

    pub fn with_prompt_history(mut self, lines: usize) -> Self {
        self.prompt_history = lines;
        self
    }

    pub fn with_roster(mut self, roster: Vec<CharacterCard>) -> Self {
        self.roster = roster;
        self
    }

    /// Build the model client this config points at.
    pub fn client(&self) -> Ollama {
        let client = match &self.base_url {
            Some(url) => Ollama::new(url.clone()),
            None => Ollama::from_env(),
        };
        match &self.model {
            Some(model) => client.with_model(model.clone()),
            None => client,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Start a session against the configured model server.
pub fn new_session(config: &SessionConfig) -> Result<DialogueOrchestrator, SessionError> {
    let client = config.client();
    info!(base_url = client.base_url(), model = client.model(), "connecting to model server");
    Ok(DialogueOrchestrator::new(client, config)?)
}

/// Check that the model server answers before starting a session.
pub async fn new_session_checked(config: &SessionConfig) -> Result<DialogueOrchestrator, SessionError> {
    let client = config.client();
    if let Err(e) = client.generate("Say hello.").await {
        warn!(error = %e, base_url = client.base_url(), "model server unavailable");
        return Err(e.into());
    }
    Ok(DialogueOrchestrator::new(client, config)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = SessionConfig::new();
        assert_eq!(config.verdict_delay, Duration::from_secs(2));
        assert_eq!(config.prompt_history, 0);
        assert_eq!(config.history_limit, None);
        assert_eq!(config.roster.len(), 5);
    }

    #[test]
    fn test_config_builder() {
        let config = SessionConfig::new()
            .with_base_url("http://example:1234")
            .with_model("tiny")
            .with_seed(7)
            .with_history_limit(10)
            .with_prompt_history(4)
            .with_verdict_delay(Duration::ZERO);

        let client = config.client();
        assert_eq!(client.base_url(), "http://example:1234");
        assert_eq!(client.model(), "tiny");
        assert_eq!(config.seed, Some(7));
        assert_eq!(config.history_limit, Some(10));
    }

    #[test]
    fn test_new_session_rejects_empty_roster() {
        let config = SessionConfig::new().with_base_url("http://localhost:1").with_roster(Vec::new());
        assert!(matches!(
            new_session(&config),
            Err(SessionError::Setup(SetupError::EmptyRoster))
        ));
    }

    #[test]
    fn test_new_session_seeded() {
        let config = SessionConfig::new().with_base_url("http://localhost:1").with_seed(11);
        let a = new_session(&config).unwrap();
        let b = new_session(&config).unwrap();
        assert_eq!(a.case().killer(), b.case().killer());
        assert_eq!(a.case().weapon(), b.case().weapon());
    }
}
