//! Accusation outcomes and victim rotation.

use mystery_core::{DialogueError, DialogueTarget, OutcomeKind, SessionPhase, TestHarness, Verdict};

const SUSPECTS: [&str; 5] = ["Lilith", "Brother Malachar", "Madame Vex", "Grimsby", "Doctor Ashgrave"];

#[tokio::test]
async fn test_only_killer_wins() {
    for killer in SUSPECTS {
        let h = TestHarness::with_killer(killer, 7).unwrap();
        for suspect in SUSPECTS {
            let expected = if suspect == killer { Verdict::Win } else { Verdict::Lose };
            assert_eq!(h.orchestrator.case().judge(suspect), expected);
        }
    }
}

#[tokio::test]
async fn test_rotation_never_kills_the_killer() {
    for seed in 0..20 {
        let mut h = TestHarness::with_killer("Doctor Ashgrave", seed).unwrap();
        h.investigate_primary("search area").await.unwrap();

        let before = h.orchestrator.world().characters().len();
        let scenes_before = h.orchestrator.world().scenes().len();

        let outcome = h.accuse("Lilith").await.unwrap();
        assert_eq!(outcome.result, OutcomeKind::NewMurder);
        assert!(outcome.result.is_loss());

        let world = h.orchestrator.world();
        assert_eq!(world.characters().len(), before - 1);
        assert_eq!(world.scenes().len(), scenes_before + 1);
        assert!(world.character("Doctor Ashgrave").is_some());

        let victim = world.scenes().last().unwrap().victim().unwrap();
        assert_ne!(victim.name, "Doctor Ashgrave");
        assert!(outcome.message.contains(&format!("{} has been murdered!", victim.name)));
    }
}

#[tokio::test]
async fn test_everyone_dies_then_game_over() {
    let mut h = TestHarness::with_killer("Grimsby", 3).unwrap();
    h.investigate_primary("examine body").await.unwrap();

    for _ in 0..4 {
        let accused = h
            .orchestrator
            .world()
            .characters()
            .iter()
            .map(|c| c.name().to_string())
            .find(|name| name != "Grimsby");

        match accused {
            Some(name) => {
                let outcome = h.accuse(&name).await.unwrap();
                assert_eq!(outcome.result, OutcomeKind::NewMurder);
            }
            None => break,
        }
    }

    let survivors: Vec<String> = h
        .orchestrator
        .world()
        .characters()
        .iter()
        .map(|c| c.name().to_string())
        .collect();
    assert_eq!(survivors, vec!["Grimsby".to_string()]);
    assert_eq!(h.orchestrator.world().scenes().len(), 5);
    assert_eq!(h.orchestrator.phase(), SessionPhase::Playing);
}

#[tokio::test]
async fn test_last_innocent_becomes_victim() {
    use mystery_core::{CaseState, CharacterCard, DialogueOrchestrator, ScriptedBackend, SessionConfig, World};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use std::time::Duration;

    let roster = vec![
        CharacterCard::new("Azazel", "proud", "fallen", "power", "grand"),
        CharacterCard::new("Belial", "sly", "tempter", "souls", "smooth"),
    ];
    let config = SessionConfig::new()
        .with_roster(roster.clone())
        .with_seed(1)
        .with_verdict_delay(Duration::ZERO);
    let case = CaseState::generate_with_killer(&roster, "Azazel", &mut StdRng::seed_from_u64(1)).unwrap();
    let world = World::from_roster(roster, case.scene_hint());
    let mut game = DialogueOrchestrator::from_parts(ScriptedBackend::new(), world, case, &config).unwrap();

    let scene = game.world().scenes()[0].id();
    let turn = game.open_dialogue(DialogueTarget::CrimeScene(scene)).unwrap();
    game.drive(turn.reply.unwrap()).await;
    let turn = game.submit_input("examine body").unwrap();
    game.drive(turn.reply.unwrap()).await;

    let turn = game.open_dialogue(DialogueTarget::Character("Belial".to_string())).unwrap();
    game.drive(turn.reply.unwrap()).await;
    let outcome = game.request_accusation().await.unwrap();

    // Belial was the only innocent and becomes the new victim.
    assert_eq!(outcome.result, OutcomeKind::NewMurder);
    assert!(game.world().character("Belial").is_none());
    assert_eq!(game.phase(), SessionPhase::Playing);

    let victim_scene = game.world().scenes()[1].id();
    let turn = game.open_dialogue(DialogueTarget::CrimeScene(victim_scene)).unwrap();
    game.drive(turn.reply.unwrap()).await;

    let err = game.request_accusation().await.unwrap_err();
    assert!(matches!(err, DialogueError::AccusationUnavailable(_)));
}
