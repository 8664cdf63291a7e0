//! Plays a short scripted mystery against a local Ollama server.
//!
//! Run with: `cargo run -p mystery-core --example headless_mystery`

use mystery_core::{new_session_checked, wrap_text, DialogueOrchestrator, DialogueTarget, SessionConfig, Turn};
use tracing_subscriber::EnvFilter;

async fn show(game: &mut DialogueOrchestrator, turn: Turn) {
    if let Some(aside) = turn.aside {
        println!("   [Detective's Mind] {aside}");
    }
    if let Some(reply) = turn.reply {
        game.drive(reply).await;
    }
    if let Some(message) = game.transcript().last() {
        println!("   {}:", message.speaker());
        for line in wrap_text(message.text(), 70).lines() {
            println!("      {line}");
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let _ = dotenvy::dotenv();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("=== Murder in Hell ===\n");

    let config = SessionConfig::from_env()?;
    let mut game = new_session_checked(&config).await?;

    println!("1. Investigating the crime scene...");
    let scene = game.world().scenes()[0].id();
    let turn = game.open_dialogue(DialogueTarget::CrimeScene(scene))?;
    show(&mut game, turn).await;
    for input in ["examine body", "check wounds"] {
        println!("\n   > {input}");
        let turn = game.submit_input(input)?;
        show(&mut game, turn).await;
    }

    println!("\n2. Questioning the suspects...");
    let suspects: Vec<String> = game.world().characters().iter().map(|c| c.name().to_string()).collect();
    for name in &suspects {
        println!();
        let turn = game.open_dialogue(DialogueTarget::Character(name.clone()))?;
        show(&mut game, turn).await;
        let turn = game.submit_input("Where were you when the soul was murdered?")?;
        show(&mut game, turn).await;
    }

    let Some(accused) = suspects.first() else {
        return Ok(());
    };
    println!("\n3. Accusing {accused}...");
    game.open_dialogue(DialogueTarget::Character(accused.clone()))?;
    let outcome = game.request_accusation().await?;
    if let Some(message) = game.history(accused).last() {
        println!("   {}: {}", message.speaker(), message.text());
    }
    println!("\n   {}", outcome.message);
    println!("\n   The killer was {}.", game.case().killer());

    Ok(())
}
