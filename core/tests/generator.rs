//! Generator contract tests.
//!
//! Tests cover: tier briefs, system instruction assembly, hint prompt,
//! request token gating, rulebook loading.

use dojo_core::{
    config::DojoConfig,
    error::DojoError,
    generator::{
        fallback_scenario, hint_prompt, GenerationRequest, HintFallbacks, ScenarioFeed,
        HINT_WORD_LIMIT,
    },
    rng::DojoRng,
    tenure::Tier,
};

fn request(tier: Tier) -> GenerationRequest {
    GenerationRequest {
        tier,
        topic: "Double Payment (Cash + Online)".into(),
        rulebook: DojoConfig::default_test().rulebook,
    }
}

#[test]
fn each_tier_renders_its_own_brief() {
    let tiers = [Tier::Rookie, Tier::Associate, Tier::Expert];
    let instructions: Vec<String> = tiers.iter().map(|t| request(*t).system_instruction()).collect();

    assert!(instructions[0].contains("ROOKIE"));
    assert!(instructions[1].contains("ASSOCIATE"));
    assert!(instructions[2].contains("EXPERT"));
    for (i, instruction) in instructions.iter().enumerate() {
        assert!(instruction.contains(request(tiers[i]).difficulty_brief()));
        for (j, tier) in tiers.iter().enumerate() {
            if i != j {
                assert!(!instruction.contains(request(*tier).difficulty_brief()));
            }
        }
    }
}

#[test]
fn instruction_carries_rulebook_and_answer_rules() {
    let req = request(Tier::Associate);
    let instruction = req.system_instruction();
    assert!(instruction.starts_with(req.rulebook.trim()));
    assert!(instruction.contains("SEVERITY"));
    assert!(instruction.contains("POLICY_CHECK"));
    assert!(instruction.contains("REQUIRED_PROOF"));
    assert!(instruction.contains("correctAnswer MUST appear verbatim"));
    assert!(instruction.contains("correctAction MUST appear verbatim"));
}

#[test]
fn prompt_names_the_topic() {
    assert_eq!(
        request(Tier::Rookie).prompt(),
        "Generate a detailed scenario about: Double Payment (Cash + Online)."
    );
}

#[test]
fn hint_prompt_quotes_context_and_caps_length() {
    let prompt = hint_prompt("Captain asked for extra cash");
    assert!(prompt.contains("\"Captain asked for extra cash\""));
    assert!(prompt.contains(&format!("under {HINT_WORD_LIMIT} words")));
}

#[test]
fn feed_resolves_each_token_once() {
    let mut feed = ScenarioFeed::new();
    let mut rng = DojoRng::new(7, 0);
    assert!(feed.current().is_none());

    let token = feed.begin();
    assert!(feed.is_awaiting(token));
    assert!(feed.resolve(token, Ok(fallback_scenario()), &mut rng).is_some());
    assert!(feed.is_current(token));
    assert!(!feed.is_awaiting(token));

    let repeat = Err(DojoError::GeneratorUnavailable { reason: "late".into() });
    assert!(feed.resolve(token, repeat, &mut rng).is_none());

    let next = feed.begin();
    assert!(feed.resolve(token, Ok(fallback_scenario()), &mut rng).is_none());
    assert!(feed.resolve(next, Ok(fallback_scenario()), &mut rng).is_some());
}

#[test]
fn config_loads_rulebook_from_data_dir() {
    let dir = std::env::temp_dir().join(format!("dojo-config-{}", std::process::id()));
    std::fs::create_dir_all(&dir).unwrap();
    let data_dir = dir.to_string_lossy().to_string();
    std::fs::write(dir.join("topics.json"), r#"{"topics": ["Toll Charges"]}"#).unwrap();
    let _ = std::fs::remove_file(dir.join("sop_rulebook.md"));

    let err = DojoConfig::load(&data_dir).unwrap_err();
    assert!(err.to_string().contains("sop_rulebook.md"), "{err}");

    std::fs::write(dir.join("sop_rulebook.md"), "KEY SOP RULES:\n1. Refund tolls.\n").unwrap();
    let config = DojoConfig::load(&data_dir).unwrap();
    assert_eq!(config.topics, vec!["Toll Charges"]);
    assert!(config.rulebook.contains("Refund tolls."));
    assert_eq!(config.hint_fallbacks, HintFallbacks::default());

    let _ = std::fs::remove_dir_all(&dir);
}
