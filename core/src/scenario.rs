//! Scenario schema as produced by the external generator.
//!
//! `Scenario` is the raw, untrusted shape. Only the integrity guard can
//! produce a `ValidatedScenario`, which is the only shape that can be
//! presented or graded.

use serde::{Deserialize, Serialize};

use crate::error::{DojoError, DojoResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DecisionType {
    Severity,
    PolicyCheck,
    RequiredProof,
    RootCause,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CaptainDetails {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub rating: f64,
    #[serde(default)]
    pub history: String,
}

/// Step one of the two-step decision (severity, policy, proof or root cause).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrimaryDecision {
    #[serde(rename = "type")]
    pub decision_type: DecisionType,
    pub question: String,
    pub correct_answer: String,
    pub options: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    pub id: String,
    pub customer_name: String,
    #[serde(rename = "customerSentiment")]
    pub sentiment: String,
    pub ride_type: String,
    pub context: String,
    #[serde(default)]
    pub captain_details: CaptainDetails,
    pub primary_decision: PrimaryDecision,
    pub correct_action: String,
    pub explanation: String,
    pub action_options: Vec<String>,
}

impl Scenario {
    pub fn primary_answerable(&self) -> bool {
        self.primary_decision
            .options
            .contains(&self.primary_decision.correct_answer)
    }

    pub fn action_answerable(&self) -> bool {
        self.action_options.contains(&self.correct_action)
    }
}

/// Parse a generator response body. Empty or malformed text is a
/// generator failure.
pub fn parse_scenario_payload(text: &str) -> DojoResult<Scenario> {
    if text.trim().is_empty() {
        return Err(DojoError::GeneratorUnavailable {
            reason: "empty response".into(),
        });
    }
    serde_json::from_str(text).map_err(|e| DojoError::GeneratorUnavailable {
        reason: format!("unparseable scenario: {e}"),
    })
}

/// Which option list a repair touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OptionList {
    PrimaryOptions,
    ActionOptions,
}

/// One slot overwritten by the guard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Repair {
    pub list: OptionList,
    pub slot: usize,
    /// The option that was displaced, `None` when the list was empty.
    pub displaced: Option<String>,
}

/// A scenario whose correct answers are guaranteed selectable.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ValidatedScenario {
    scenario: Scenario,
    repairs: Vec<Repair>,
}

impl ValidatedScenario {
    pub(crate) fn new(scenario: Scenario, repairs: Vec<Repair>) -> Self {
        debug_assert!(scenario.primary_answerable() && scenario.action_answerable());
        Self { scenario, repairs }
    }

    pub fn scenario(&self) -> &Scenario {
        &self.scenario
    }

    pub fn id(&self) -> &str {
        &self.scenario.id
    }

    pub fn repairs(&self) -> &[Repair] {
        &self.repairs
    }

    pub fn into_scenario(self) -> Scenario {
        self.scenario
    }
}

impl std::ops::Deref for ValidatedScenario {
    type Target = Scenario;

    fn deref(&self) -> &Scenario {
        &self.scenario
    }
}
