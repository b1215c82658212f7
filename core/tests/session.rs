//! Session orchestration tests.
//!
//! Tests cover: login outcomes, restore from the store, fetch with guard
//! and fallback, stale responses, hints, grading once, persistence,
//! event log, command replies.

use std::cell::RefCell;

use chrono::{DateTime, TimeZone, Utc};
use dojo_core::{
    command::{CommandReply, SessionCommand},
    config::DojoConfig,
    error::{DojoError, DojoResult},
    generator::{
        GenerationRequest, HintSource, ScenarioSource, ScriptedSource, FALLBACK_SCENARIO_ID,
    },
    grader::Selection,
    ledger::{seed, CONSISTENT_SOLVER},
    roster::InlineRoster,
    scenario::{CaptainDetails, DecisionType, PrimaryDecision, Scenario},
    session::DojoSession,
    store::DojoStore,
    tenure::Tier,
};

const ROSTER: &str = "Mail ID,Joining date\n\
asha@example.com,31/01/2023\n\
new@example.com,2024-05-20\n\
zero@example.com,TBD\n";

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 0).unwrap()
}

fn store() -> DojoStore {
    let _ = env_logger::builder().is_test(true).try_init();
    let store = DojoStore::in_memory().expect("in-memory store");
    store.migrate().expect("migration");
    store
}

fn login(identity: &str, store: DojoStore, seed: u64) -> DojoResult<DojoSession> {
    DojoSession::login(
        &InlineRoster::new(ROSTER),
        identity,
        now(),
        store,
        DojoConfig::default_test(),
        seed,
    )
}

fn scenario(id: &str, correct: &str) -> Scenario {
    Scenario {
        id: id.into(),
        customer_name: "Arjun".into(),
        sentiment: "Angry".into(),
        ride_type: "Bike".into(),
        context: format!("context for {id}"),
        captain_details: CaptainDetails::default(),
        primary_decision: PrimaryDecision {
            decision_type: DecisionType::Severity,
            question: "Identify the Issue Severity".into(),
            correct_answer: correct.into(),
            options: vec!["P1".into(), "P2".into(), "P3".into(), "General".into()],
        },
        correct_action: "Suspend".into(),
        explanation: "Zero tolerance".into(),
        action_options: vec!["Warn".into(), "Suspend".into(), "Refund".into(), "Coins".into()],
    }
}

struct Offline;

impl ScenarioSource for Offline {
    fn generate(&self, _request: &GenerationRequest) -> DojoResult<Scenario> {
        Err(DojoError::GeneratorUnavailable { reason: "offline".into() })
    }
}

impl HintSource for Offline {
    fn hint(&self, _context: &str) -> DojoResult<String> {
        Err(DojoError::HintUnavailable { reason: "offline".into() })
    }
}

#[test]
fn login_denies_unknown_agents() {
    let err = login("ghost@example.com", store(), 1).err().expect("denied");
    assert!(matches!(err, DojoError::AgentNotFound { .. }));
}

#[test]
fn login_seeds_first_time_agents() {
    let session = login("asha@example.com", store(), 1).unwrap();
    assert_eq!(session.profile().tier(), Tier::Associate);
    let expected = seed(session.profile());
    assert_eq!(session.stats().xp, expected.xp);
    assert_eq!(session.stats().badges, expected.badges);
}

#[test]
fn fetched_scenarios_are_repaired_before_display() {
    let mut session = login("asha@example.com", store(), 5).unwrap();
    let source = ScriptedSource::from_scenarios(vec![scenario("drunk-1", "P0")]);
    let shown = session.fetch_scenario(&source).unwrap();
    assert!(shown.primary_decision.options.contains(&"P0".to_string()));
    assert_eq!(shown.repairs().len(), 1);

    let store = session.store();
    assert_eq!(store.event_count("asha@example.com", "scenario_repaired").unwrap(), 1);
}

#[test]
fn generator_failure_presents_fallback() {
    let mut session = login("asha@example.com", store(), 5).unwrap();
    let shown = session.fetch_scenario(&Offline).unwrap();
    assert_eq!(shown.id(), FALLBACK_SCENARIO_ID);
    assert!(shown.repairs().is_empty());
}

#[test]
fn stale_responses_are_discarded() {
    let mut session = login("asha@example.com", store(), 5).unwrap();
    let (first, _) = session.begin_fetch();
    let (second, request) = session.begin_fetch();
    assert!(DojoConfig::default_test().topics.contains(&request.topic));
    assert_eq!(request.tier, Tier::Associate);

    assert!(session.complete_fetch(second, Ok(scenario("new", "P1"))).unwrap());
    assert!(!session.complete_fetch(first, Ok(scenario("old", "P1"))).unwrap());
    assert_eq!(session.active().unwrap().scenario.id(), "new");

    // A late hint for a replaced scenario is dropped too.
    let (hint_token, _) = session.begin_hint().unwrap();
    session.fetch_scenario(&ScriptedSource::from_scenarios(vec![scenario("next", "P1")])).unwrap();
    assert!(session.complete_hint(hint_token, "late".into()).is_none());
    assert!(session.active().unwrap().hint_text.is_none());
}

#[test]
fn repeated_response_cannot_regrade_a_request() {
    let mut session = login("asha@example.com", store(), 5).unwrap();
    let (token, _) = session.begin_fetch();
    assert!(session.complete_fetch(token, Ok(scenario("first", "P1"))).unwrap());
    let first = session.submit(&Selection::new("P1", "Suspend")).unwrap();
    assert_eq!(first.xp_award, 150);
    let after_first = session.stats().clone();

    assert!(!session.complete_fetch(token, Ok(scenario("dup", "P1"))).unwrap());
    assert_eq!(session.active().unwrap().scenario.id(), "first");
    let err = session.submit(&Selection::new("P1", "Suspend")).unwrap_err();
    assert!(matches!(err, DojoError::AlreadyGraded { .. }));
    assert_eq!(session.stats(), &after_first);

    let store = session.store();
    assert_eq!(store.event_count("asha@example.com", "stale_response_discarded").unwrap(), 1);
    assert_eq!(store.event_count("asha@example.com", "scenario_graded").unwrap(), 1);
}

/// Remembers the last request it rendered.
struct Recording {
    instruction: RefCell<String>,
    prompt: RefCell<String>,
}

impl ScenarioSource for Recording {
    fn generate(&self, request: &GenerationRequest) -> DojoResult<Scenario> {
        *self.instruction.borrow_mut() = request.system_instruction();
        *self.prompt.borrow_mut() = request.prompt();
        Ok(scenario("rec", "P1"))
    }
}

#[test]
fn requests_carry_rulebook_and_tier_brief() {
    let config = DojoConfig::default_test();
    let source = Recording { instruction: RefCell::default(), prompt: RefCell::default() };

    let mut rookie = login("zero@example.com", store(), 5).unwrap();
    rookie.fetch_scenario(&source).unwrap();
    let instruction = source.instruction.borrow().clone();
    assert!(instruction.contains(config.rulebook.trim()));
    assert!(instruction.contains("ROOKIE"));
    assert!(config.topics.iter().any(|t| source.prompt.borrow().contains(t.as_str())));

    let mut associate = login("asha@example.com", store(), 5).unwrap();
    associate.fetch_scenario(&source).unwrap();
    assert!(source.instruction.borrow().contains("ASSOCIATE"));
}

#[test]
fn hint_forfeits_bonus_even_when_service_fails() {
    let mut session = login("asha@example.com", store(), 5).unwrap();
    session.fetch_scenario(&ScriptedSource::from_scenarios(vec![scenario("s", "P1")])).unwrap();
    let text = session.request_hint(&Offline).unwrap();
    assert_eq!(text, "Review the SOP details regarding this issue.");

    let outcome = session.submit(&Selection::new("P1", "Suspend")).unwrap();
    assert!(outcome.is_correct);
    assert_eq!(outcome.xp_award, 100);
}

#[test]
fn scripted_hint_is_returned_once_and_cached() {
    let mut session = login("asha@example.com", store(), 5).unwrap();
    let entry: dojo_core::generator::ScriptEntry = serde_json::from_value(serde_json::json!({
        "id": "h", "customerName": "A", "customerSentiment": "Neutral", "rideType": "Cab",
        "context": "AC not working",
        "primaryDecision": {"type": "POLICY_CHECK", "question": "q", "correctAnswer": "a", "options": ["a"]},
        "correctAction": "b", "explanation": "e", "actionOptions": ["b"],
        "hint": "Check the AC rule"
    }))
    .unwrap();
    let source = ScriptedSource::new(vec![entry]);
    session.fetch_scenario(&source).unwrap();
    assert_eq!(session.request_hint(&source).unwrap(), "Check the AC rule");
    assert_eq!(session.request_hint(&Offline).unwrap(), "Check the AC rule");
    assert_eq!(session.store().event_count("asha@example.com", "hint_requested").unwrap(), 1);
}

#[test]
fn submission_grades_once_and_persists() {
    let mut session = login("asha@example.com", store(), 5).unwrap();
    let before = session.stats().clone();
    session.fetch_scenario(&ScriptedSource::from_scenarios(vec![scenario("s", "P1")])).unwrap();

    let outcome = session.submit(&Selection::new("P1", "Suspend")).unwrap();
    assert_eq!(outcome.xp_award, 150);
    assert_eq!(session.stats().xp, before.xp + 150);
    assert_eq!(session.stats().scenarios_completed, before.scenarios_completed + 1);

    let err = session.submit(&Selection::new("P1", "Suspend")).unwrap_err();
    assert!(matches!(err, DojoError::AlreadyGraded { .. }));

    let raw = session.store().load_stats_raw("asha@example.com").unwrap().expect("persisted");
    assert!(raw.contains("\"scenariosCompleted\""));
}

#[test]
fn nothing_is_persisted_before_first_completion() {
    let session = login("asha@example.com", store(), 5).unwrap();
    assert!(session.store().load_stats_raw("asha@example.com").unwrap().is_none());
}

#[test]
fn submit_without_scenario_or_selection_is_refused() {
    let mut session = login("asha@example.com", store(), 5).unwrap();
    let err = session.submit(&Selection::new("P1", "Suspend")).unwrap_err();
    assert!(matches!(err, DojoError::NoActiveScenario));

    session.fetch_scenario(&ScriptedSource::from_scenarios(vec![scenario("s", "P1")])).unwrap();
    let half = Selection { primary: Some("P1".into()), action: None };
    assert!(matches!(session.submit(&half).unwrap_err(), DojoError::IncompleteSubmission));
}

#[test]
fn progress_survives_relogin() {
    let db = std::env::temp_dir().join(format!("dojo-relogin-{}.db", std::process::id()));
    let path = db.to_string_lossy().to_string();
    let _ = std::fs::remove_file(&db);

    let open = || {
        let store = DojoStore::open(&path).unwrap();
        store.migrate().unwrap();
        store
    };

    let source = ScriptedSource::from_scenarios(vec![scenario("s", "P1")]);
    let after_play = {
        let mut session = login("new@example.com", open(), 9).unwrap();
        for _ in 0..3 {
            session.fetch_scenario(&source).unwrap();
            session.submit(&Selection::new("P1", "Suspend")).unwrap();
        }
        session.stats().clone()
    };

    let session = login("NEW@example.com", open(), 10).unwrap();
    let restored = session.stats();
    assert_eq!(restored.xp, after_play.xp);
    assert_eq!(restored.level, after_play.level);
    assert_eq!(restored.streak, after_play.streak);
    assert_eq!(restored.scenarios_completed, after_play.scenarios_completed);
    assert_eq!(restored.badges, after_play.badges);
    assert_eq!(restored.weekly_history, after_play.weekly_history);
    assert!((restored.accuracy - after_play.accuracy).abs() < 1e-12);
    let _ = std::fs::remove_file(&db);
}

#[test]
fn badges_are_logged_as_they_unlock() {
    // Unreadable join date: zero tenure, zero seeded completions.
    let mut session = login("zero@example.com", store(), 3).unwrap();
    assert_eq!(session.stats().scenarios_completed, 0);
    let source = ScriptedSource::from_scenarios(vec![scenario("s", "P1")]);
    while session.stats().scenarios_completed < 15 {
        session.fetch_scenario(&source).unwrap();
        session.submit(&Selection::new("P1", "Suspend")).unwrap();
    }
    assert!(session.stats().has_badge(CONSISTENT_SOLVER));
    let badge_events = session.store().event_count("zero@example.com", "badge_unlocked").unwrap();
    assert_eq!(badge_events, 2);
}

#[test]
fn same_seed_repairs_the_same_slot() {
    let slot = |seed| {
        let mut session = login("asha@example.com", store(), seed).unwrap();
        let source = ScriptedSource::from_scenarios(vec![scenario("drunk", "P0")]);
        let repaired = session.fetch_scenario(&source).unwrap().repairs()[0].slot;
        repaired
    };
    assert_eq!(slot(0xDEAD_BEEF), slot(0xDEAD_BEEF));
}

#[test]
fn commands_drive_a_full_round() {
    let mut session = login("asha@example.com", store(), 5).unwrap();
    let source = ScriptedSource::from_scenarios(vec![scenario("cmd", "P1")]);

    let early = session
        .apply(SessionCommand::Submit { primary: Some("P1".into()), action: Some("Suspend".into()) }, &source)
        .unwrap();
    assert!(matches!(early, CommandReply::Rejected { .. }));

    let cmd: SessionCommand = serde_json::from_str(r#"{"type": "next"}"#).unwrap();
    assert_eq!(
        session.apply(cmd, &source).unwrap(),
        CommandReply::Presented { scenario_id: "cmd".into() }
    );

    let submit: SessionCommand =
        serde_json::from_str(r#"{"type": "submit", "primary": "P1", "action": "Suspend"}"#).unwrap();
    match session.apply(submit, &source).unwrap() {
        CommandReply::Graded { outcome } => assert_eq!(outcome.xp_award, 150),
        other => panic!("unexpected reply {other:?}"),
    }
    assert_eq!(session.apply(SessionCommand::Quit, &source).unwrap(), CommandReply::Closed);
}

#[test]
fn event_log_is_sequenced_per_session() {
    let mut session = login("asha@example.com", store(), 5).unwrap();
    session.fetch_scenario(&Offline).unwrap();
    let entries = session.store().events_for_session(&session.session_id).unwrap();
    let types: Vec<&str> = entries.iter().map(|e| e.event_type.as_str()).collect();
    assert_eq!(types, vec!["session_started", "stats_restored", "scenario_presented"]);
    assert!(entries.windows(2).all(|w| w[0].seq + 1 == w[1].seq));
}
