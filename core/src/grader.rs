//! Decision grader: pure scoring of a two-step submission.

use serde::{Deserialize, Serialize};

use crate::{
    error::{DojoError, DojoResult},
    scenario::ValidatedScenario,
};

/// XP for a fully correct grading.
pub const BASE_XP: u64 = 100;
/// Added when no hint was requested for the scenario.
pub const PRECISION_BONUS_XP: u64 = 50;

/// The agent's two selections. Either may still be unset in the UI.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selection {
    pub primary: Option<String>,
    pub action: Option<String>,
}

impl Selection {
    pub fn new(primary: impl Into<String>, action: impl Into<String>) -> Self {
        Self {
            primary: Some(primary.into()),
            action: Some(action.into()),
        }
    }

    /// Both selections must be present before grading.
    pub fn complete(&self) -> DojoResult<(&str, &str)> {
        match (&self.primary, &self.action) {
            (Some(p), Some(a)) => Ok((p.as_str(), a.as_str())),
            _ => Err(DojoError::IncompleteSubmission),
        }
    }
}

/// Hint usage for the current scenario. Once used, always used.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintLatch {
    used: bool,
}

impl HintLatch {
    pub fn mark_used(&mut self) {
        self.used = true;
    }

    pub fn used(&self) -> bool {
        self.used
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GradeOutcome {
    pub is_correct: bool,
    pub xp_award: u64,
}

/// Grade both selections by exact string equality. No partial credit.
pub fn grade(
    scenario: &ValidatedScenario,
    chosen_primary: &str,
    chosen_action: &str,
    hint: HintLatch,
) -> GradeOutcome {
    let is_correct = chosen_primary == scenario.primary_decision.correct_answer
        && chosen_action == scenario.correct_action;
    GradeOutcome {
        is_correct,
        xp_award: xp_award(is_correct, hint),
    }
}

/// Grade a UI selection, refusing one that is not yet complete.
pub fn grade_selection(
    scenario: &ValidatedScenario,
    selection: &Selection,
    hint: HintLatch,
) -> DojoResult<GradeOutcome> {
    let (primary, action) = selection.complete()?;
    Ok(grade(scenario, primary, action, hint))
}

fn xp_award(is_correct: bool, hint: HintLatch) -> u64 {
    match (is_correct, hint.used()) {
        (false, _) => 0,
        (true, true) => BASE_XP,
        (true, false) => BASE_XP + PRECISION_BONUS_XP,
    }
}
