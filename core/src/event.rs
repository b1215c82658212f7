//! The session event log.
//!
//! Every observable step of a session is recorded as a DojoEvent and
//! appended to the store in sequence order.

use crate::{
    generator::RequestToken,
    grader::GradeOutcome,
    ledger::RestoreSource,
    scenario::Repair,
    tenure::Tier,
    types::{Identity, SessionId},
};
use serde::{Deserialize, Serialize};

/// Variants are appended only, never removed or reordered.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DojoEvent {
    SessionStarted {
        identity: Identity,
        tier: Tier,
        tenure_months: u32,
        seed: u64,
    },
    StatsRestored {
        source: RestoreSource,
        xp: u64,
        level: u32,
    },
    ScenarioPresented {
        token: RequestToken,
        scenario_id: String,
        topic: String,
        fallback: bool,
    },
    ScenarioRepaired {
        scenario_id: String,
        repairs: Vec<Repair>,
    },
    StaleResponseDiscarded {
        token: RequestToken,
    },
    HintRequested {
        scenario_id: String,
    },
    ScenarioGraded {
        scenario_id: String,
        outcome: GradeOutcome,
        xp: u64,
        level: u32,
        streak: u32,
        accuracy: f64,
    },
    BadgeUnlocked {
        badge: String,
    },
}

impl DojoEvent {
    /// Stable name for the event_type column.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::SessionStarted { .. } => "session_started",
            Self::StatsRestored { .. } => "stats_restored",
            Self::ScenarioPresented { .. } => "scenario_presented",
            Self::ScenarioRepaired { .. } => "scenario_repaired",
            Self::StaleResponseDiscarded { .. } => "stale_response_discarded",
            Self::HintRequested { .. } => "hint_requested",
            Self::ScenarioGraded { .. } => "scenario_graded",
            Self::BadgeUnlocked { .. } => "badge_unlocked",
        }
    }
}

/// The event log entry as persisted to SQLite.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id: Option<i64>,
    pub session_id: SessionId,
    pub seq: u64,
    pub identity: Identity,
    pub event_type: String,
    pub payload: String, // JSON-serialized DojoEvent
}
