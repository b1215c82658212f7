//! Progression ledger.
//!
//! Two entry points:
//!   - `seed`:  deterministic synthetic history for an agent, keyed only by
//!     the identity string (same identity, same stats, every time).
//!   - `fold`:  the single-step transition applied after each grading.
//!
//! `restore` combines the seed with whatever was persisted for the agent.
//! The ledger never touches storage itself.
//!
//! INVARIANT: after any fold or restore, `level == xp / LEVEL_XP + 1`.

use serde::{Deserialize, Serialize};

use crate::{
    grader::{GradeOutcome, BASE_XP},
    rng::seed_stream,
    tenure::{AgentProfile, Tier},
    types::WEEK_DAYS,
};

pub const LEVEL_XP: u64 = 2000;

pub const CONSISTENT_SOLVER: &str = "Consistent Solver";
pub const P0_SPECIALIST: &str = "P0 Specialist";
/// Completion count that unlocks `CONSISTENT_SOLVER`.
pub const CONSISTENT_SOLVER_AT: u64 = 15;

pub const EXPERT_STARTER_BADGES: [&str; 2] = ["Veteran Badge", "SOP Master"];
pub const ASSOCIATE_STARTER_BADGES: [&str; 1] = ["Fast Learner"];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyPoint {
    #[serde(rename = "name")]
    pub day_label: String,
    pub score: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentStats {
    pub xp: u64,
    pub level: u32,
    pub streak: u32,
    pub scenarios_completed: u64,
    pub accuracy: f64,
    pub badges: Vec<String>,
    pub weekly_history: Vec<WeeklyPoint>,
}

impl AgentStats {
    pub fn has_badge(&self, badge: &str) -> bool {
        self.badges.iter().any(|b| b == badge)
    }

    /// XP earned inside the current level, and the XP span of a level.
    pub fn level_progress(&self) -> (u64, u64) {
        (self.xp % LEVEL_XP, LEVEL_XP)
    }

    fn award_badge(&mut self, badge: &str) {
        if !self.has_badge(badge) {
            self.badges.push(badge.to_string());
        }
    }
}

pub fn level_for_xp(xp: u64) -> u32 {
    u32::try_from(xp / LEVEL_XP + 1).unwrap_or(u32::MAX)
}

/// Synthesize a believable starting history for `profile`.
///
/// Draw order is fixed: seven weekly scores, accuracy, productivity, XP
/// jitter, streak. Changing it changes every seeded agent.
pub fn seed(profile: &AgentProfile) -> AgentStats {
    let mut draws = seed_stream(profile.identity());
    let mut next = move || draws.next().unwrap_or_default();

    let weekly_history = WEEK_DAYS
        .iter()
        .map(|day| WeeklyPoint {
            day_label: (*day).to_string(),
            score: (60.0 + next() * 35.0).floor() as u32,
        })
        .collect();

    let tenure = u64::from(profile.tenure_months());
    let accuracy = 0.75 + next() * 0.2;
    let productivity = 20 + (next() * 10.0).floor() as u64;
    let xp = tenure * 150 + (next() * 500.0).floor() as u64;
    let streak = (next() * 10.0).floor() as u32;

    let badges = match profile.tier() {
        Tier::Expert => EXPERT_STARTER_BADGES.iter().map(|b| b.to_string()).collect(),
        Tier::Associate => ASSOCIATE_STARTER_BADGES.iter().map(|b| b.to_string()).collect(),
        Tier::Rookie => Vec::new(),
    };

    AgentStats {
        xp,
        level: profile.tenure_months().div_ceil(6).max(1),
        streak,
        scenarios_completed: tenure * productivity,
        accuracy,
        badges,
        weekly_history,
    }
}

/// Apply one grading outcome.
pub fn fold(stats: &AgentStats, outcome: GradeOutcome) -> AgentStats {
    let mut next = stats.clone();
    let hit = if outcome.is_correct { 1.0 } else { 0.0 };

    next.xp = stats.xp.saturating_add(outcome.xp_award);
    next.scenarios_completed = stats.scenarios_completed.saturating_add(1);
    next.accuracy = (stats.accuracy * stats.scenarios_completed as f64 + hit)
        / next.scenarios_completed as f64;
    next.streak = if outcome.is_correct { stats.streak.saturating_add(1) } else { 0 };
    next.level = level_for_xp(next.xp);

    if let Some(last) = next.weekly_history.last_mut() {
        last.score = (next.accuracy * 100.0).round() as u32;
    }

    if next.scenarios_completed == CONSISTENT_SOLVER_AT {
        next.award_badge(CONSISTENT_SOLVER);
    }
    if outcome.is_correct && outcome.xp_award > BASE_XP {
        next.award_badge(P0_SPECIALIST);
    }

    next
}

/// Fields a persisted record may override. Anything absent keeps the
/// seeded value; unknown keys are ignored.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PersistedStats {
    pub xp: Option<u64>,
    pub level: Option<u32>,
    pub streak: Option<u32>,
    pub scenarios_completed: Option<u64>,
    pub accuracy: Option<f64>,
    pub badges: Option<Vec<String>>,
    pub weekly_history: Option<Vec<WeeklyPoint>>,
}

impl PersistedStats {
    /// Persisted values win, field by field.
    pub fn overlay(self, mut base: AgentStats) -> AgentStats {
        if let Some(xp) = self.xp {
            base.xp = xp;
        }
        if let Some(level) = self.level {
            base.level = level;
        }
        if let Some(streak) = self.streak {
            base.streak = streak;
        }
        if let Some(completed) = self.scenarios_completed {
            base.scenarios_completed = completed;
        }
        if let Some(accuracy) = self.accuracy {
            base.accuracy = accuracy.clamp(0.0, 1.0);
        }
        if let Some(badges) = self.badges {
            base.badges = badges;
        }
        if let Some(history) = self.weekly_history {
            base.weekly_history = history;
        }
        base
    }
}

/// Outcome of rehydrating an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RestoreSource {
    Seeded,
    Merged,
    DiscardedCorrupt,
}

/// Seed, overlay persisted fields, then re-derive `level` from `xp`.
pub fn restore(profile: &AgentProfile, persisted: Option<&str>) -> (AgentStats, RestoreSource) {
    let seeded = seed(profile);
    let (mut stats, source) = match persisted {
        None => (seeded, RestoreSource::Seeded),
        Some(raw) => match serde_json::from_str::<PersistedStats>(raw) {
            Ok(saved) => (saved.overlay(seeded), RestoreSource::Merged),
            Err(e) => {
                log::warn!(
                    "discarding unreadable stats for {}: {e}",
                    profile.identity()
                );
                (seeded, RestoreSource::DiscardedCorrupt)
            }
        },
    };
    stats.level = level_for_xp(stats.xp);
    (stats, source)
}
