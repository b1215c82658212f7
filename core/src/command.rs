use serde::{Deserialize, Serialize};

use crate::{
    error::{DojoError, DojoResult},
    generator::{HintSource, ScenarioSource},
    grader::{GradeOutcome, Selection},
    session::DojoSession,
};

/// Agent-issued commands.
/// Variants added over time, never removed or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionCommand {
    GetState,
    Next,
    Hint,
    Submit {
        #[serde(default)]
        primary: Option<String>,
        #[serde(default)]
        action:  Option<String>,
    },
    Quit,
}

/// What a command produced, beyond the updated session state.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "reply", rename_all = "snake_case")]
pub enum CommandReply {
    State,
    Presented { scenario_id: String },
    Hint { text: String },
    Graded { outcome: GradeOutcome },
    Rejected { reason: String },
    Closed,
}

impl DojoSession {
    /// Apply one command against a generator that also serves hints.
    /// Session misuse (nothing active, graded twice, half a selection) is a
    /// rejection, not an error; storage failures still propagate.
    pub fn apply<S>(&mut self, command: SessionCommand, source: &S) -> DojoResult<CommandReply>
    where
        S: ScenarioSource + HintSource,
    {
        let result = match command {
            SessionCommand::GetState => Ok(CommandReply::State),
            SessionCommand::Quit => Ok(CommandReply::Closed),
            SessionCommand::Next => self
                .fetch_scenario(source)
                .map(|s| CommandReply::Presented { scenario_id: s.id().to_string() }),
            SessionCommand::Hint => self
                .request_hint(source)
                .map(|text| CommandReply::Hint { text }),
            SessionCommand::Submit { primary, action } => self
                .submit(&Selection { primary, action })
                .map(|outcome| CommandReply::Graded { outcome }),
        };
        match result {
            Err(
                e @ (DojoError::NoActiveScenario
                | DojoError::AlreadyGraded { .. }
                | DojoError::IncompleteSubmission),
            ) => Ok(CommandReply::Rejected { reason: e.to_string() }),
            other => other,
        }
    }
}
