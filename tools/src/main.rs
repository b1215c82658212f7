//! dojo-runner: headless driver for the training dojo engine.
//!
//! Usage:
//!   dojo-runner --identity asha.rao@example.com --rounds 20 --skill 0.8
//!   dojo-runner --identity asha.rao@example.com --ipc-mode

use anyhow::Result;
use dojo_core::{
    command::{CommandReply, SessionCommand},
    config::DojoConfig,
    error::DojoError,
    generator::ScriptedSource,
    grader::Selection,
    ledger::AgentStats,
    rng::{RngBank, StreamSlot},
    roster::CsvFileRoster,
    session::{ActiveScenario, DojoSession},
    store::DojoStore,
};
use std::env;
use std::io::{self, BufRead, Write};

#[derive(serde::Serialize)]
struct UiState<'a> {
    identity: &'a str,
    tier: &'static str,
    tenure_months: u32,
    stats: &'a AgentStats,
    level_xp: u64,
    level_span: u64,
    active: Option<&'a ActiveScenario>,
    reply: &'a CommandReply,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let seed = parse_arg(&args, "--seed", wall_clock_seed());
    let rounds = parse_arg(&args, "--rounds", 15u64);
    let skill = parse_arg(&args, "--skill", 0.8f64);
    let ipc_mode = args.iter().any(|a| a == "--ipc-mode");
    let identity = str_arg(&args, "--identity", "");
    let roster_path = str_arg(&args, "--roster", "./data/roster.csv");
    let script_path = str_arg(&args, "--script", "./data/scenarios.json");
    let db = str_arg(&args, "--db", ":memory:");
    let data_dir = str_arg(&args, "--data-dir", "./data");

    if identity.is_empty() {
        anyhow::bail!("--identity is required");
    }

    if !ipc_mode {
        println!("Training Dojo: dojo-runner");
        println!("  identity:  {identity}");
        println!("  seed:      {seed}");
        println!("  rounds:    {rounds}");
        println!("  skill:     {skill}");
        println!("  db:        {db}");
        println!();
    }

    let config = DojoConfig::load(data_dir)?;
    let source = ScriptedSource::load(script_path)?;
    let store = DojoStore::open(db)?;
    store.migrate()?;

    let roster = CsvFileRoster::new(roster_path);
    let mut session = match DojoSession::login(
        &roster,
        identity,
        chrono::Utc::now(),
        store,
        config,
        seed,
    ) {
        Ok(session) => session,
        Err(DojoError::AgentNotFound { identity }) => {
            anyhow::bail!("Access denied: {identity} is not on the active roster.")
        }
        Err(DojoError::RosterUnavailable { reason }) => {
            anyhow::bail!("Could not verify credentials against the roster: {reason}")
        }
        Err(e) => return Err(e.into()),
    };

    if ipc_mode {
        run_ipc_loop(&mut session, &source)?;
    } else {
        autoplay(&mut session, &source, rounds, skill, seed)?;
        print_summary(&session)?;
    }

    Ok(())
}

fn run_ipc_loop(session: &mut DojoSession, source: &ScriptedSource) -> Result<()> {
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    let mut handle = stdin.lock();
    let mut buffer = String::new();

    loop {
        buffer.clear();
        let bytes_read = handle.read_line(&mut buffer)?;
        if bytes_read == 0 {
            break; // EOF
        }

        let cmd: SessionCommand = match serde_json::from_str(&buffer) {
            Ok(c) => c,
            Err(e) => {
                let err_json = serde_json::json!({ "error": e.to_string() });
                writeln!(stdout, "{}", err_json)?;
                stdout.flush()?;
                continue;
            }
        };

        let reply = session.apply(cmd, source)?;
        writeln!(stdout, "{}", serde_json::to_string(&ui_state(session, &reply))?)?;
        stdout.flush()?;
        if reply == CommandReply::Closed {
            break;
        }
    }
    Ok(())
}

/// Play `rounds` scenarios, answering both steps correctly with
/// probability `skill` and asking for a hint a fifth of the time.
fn autoplay(
    session: &mut DojoSession,
    source: &ScriptedSource,
    rounds: u64,
    skill: f64,
    seed: u64,
) -> Result<()> {
    let mut rng = RngBank::new(seed).for_stream(StreamSlot::Autoplay);
    for _ in 0..rounds {
        let scenario = session.fetch_scenario(source)?.clone();
        if rng.chance(0.2) {
            session.request_hint(source)?;
        }
        let primary = &scenario.primary_decision;
        let selection = if rng.chance(skill) {
            Selection::new(&primary.correct_answer, &scenario.correct_action)
        } else {
            let wrong = primary
                .options
                .iter()
                .find(|o| **o != primary.correct_answer)
                .unwrap_or(&primary.correct_answer);
            let action = scenario
                .action_options
                .iter()
                .find(|o| **o != scenario.correct_action)
                .unwrap_or(&scenario.correct_action);
            Selection::new(wrong, action)
        };
        let outcome = session.submit(&selection)?;
        log::debug!("{} -> {:?}", scenario.id(), outcome);
    }
    Ok(())
}

fn ui_state<'a>(session: &'a DojoSession, reply: &'a CommandReply) -> UiState<'a> {
    let profile = session.profile();
    let (level_xp, level_span) = session.stats().level_progress();
    UiState {
        identity: profile.identity(),
        tier: profile.tier().label(),
        tenure_months: profile.tenure_months(),
        stats: session.stats(),
        level_xp,
        level_span,
        active: session.active(),
        reply,
    }
}

fn print_summary(session: &DojoSession) -> Result<()> {
    let profile = session.profile();
    let stats = session.stats();
    let identity = profile.identity();
    let graded = session.store().event_count(identity, "scenario_graded")?;
    let repaired = session.store().event_count(identity, "scenario_repaired")?;
    let (level_xp, level_span) = stats.level_progress();

    println!("=== SESSION SUMMARY ===");
    println!("  session:        {}", session.session_id);
    println!("  agent:          {identity}");
    println!("  tier:           {} ({} months)", profile.tier().label(), profile.tenure_months());
    println!("  graded:         {graded}");
    println!("  repaired:       {repaired}");
    println!("  xp:             {}", stats.xp);
    println!("  level:          {} ({level_xp}/{level_span} XP)", stats.level);
    println!("  streak:         {}", stats.streak);
    println!("  completed:      {}", stats.scenarios_completed);
    println!("  accuracy:       {:.1}%", stats.accuracy * 100.0);
    println!("  badges:         {}", stats.badges.join(", "));

    println!();
    println!("=== WEEKLY TREND ===");
    for point in &stats.weekly_history {
        println!("  {} | {:>3}", point.day_label, point.score);
    }
    Ok(())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}

fn str_arg<'a>(args: &'a [String], flag: &str, default: &'a str) -> &'a str {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
        .unwrap_or(default)
}

fn wall_clock_seed() -> u64 {
    use std::time::{SystemTime, UNIX_EPOCH};
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0)
}
