//! Tests against a real local Ollama server.
//!
//! These need a running server (`OLLAMA_HOST`, default localhost:11434) with
//! the configured model pulled.
//! Run with: `cargo test -p mystery-core --test live_ollama -- --ignored`

use mystery_core::{new_session_checked, DialogueTarget, SessionConfig};

/// Load environment variables from .env file
fn setup() {
    let _ = dotenvy::dotenv();
}

#[tokio::test]
#[ignore] // Run with: cargo test -p mystery-core --test live_ollama -- --ignored
async fn test_suspect_greets_detective() {
    setup();
    let config = SessionConfig::from_env().expect("valid config").with_seed(1);
    let mut game = match new_session_checked(&config).await {
        Ok(game) => game,
        Err(e) => {
            eprintln!("Skipping test: {e}");
            return;
        }
    };

    let turn = game
        .open_dialogue(DialogueTarget::Character("Grimsby".to_string()))
        .expect("Grimsby is in the default roster");
    let text = game.drive(turn.reply.expect("fresh dialogue streams a greeting")).await;

    let text = text.expect("model should reply");
    assert!(!text.trim().is_empty());
    assert_ne!(text, "...");
    assert_eq!(game.transcript().len(), 1);
    println!("Grimsby: {text}");
}
