use thiserror::Error;

#[derive(Error, Debug)]
pub enum DojoError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Agent '{identity}' not found in roster")]
    AgentNotFound { identity: String },

    #[error("Roster service unavailable: {reason}")]
    RosterUnavailable { reason: String },

    #[error("Scenario generator unavailable: {reason}")]
    GeneratorUnavailable { reason: String },

    #[error("Hint service unavailable: {reason}")]
    HintUnavailable { reason: String },

    #[error("No scenario is currently active")]
    NoActiveScenario,

    #[error("Scenario '{scenario_id}' has already been graded")]
    AlreadyGraded { scenario_id: String },

    #[error("Submission requires both a primary decision and an action")]
    IncompleteSubmission,

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

pub type DojoResult<T> = Result<T, DojoError>;
