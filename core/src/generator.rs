//! External scenario and hint generators, as consumed by the engine.
//!
//! RULE: Generator output is untrusted. Every successful response goes
//! through the integrity guard; every failure is replaced by the fixed
//! fallback scenario. Nothing from a generator reaches the agent raw.
//!
//! Responses are matched to requests by `RequestToken`. Only the most
//! recently issued token is current; anything else is stale and dropped.

use serde::{Deserialize, Serialize};

use crate::{
    error::{DojoError, DojoResult},
    guard,
    rng::DojoRng,
    scenario::{CaptainDetails, DecisionType, PrimaryDecision, Scenario, ValidatedScenario},
    tenure::Tier,
};

pub const FALLBACK_SCENARIO_ID: &str = "fallback-error";

/// Upper bound the hint prompt asks the hint service to respect.
pub const HINT_WORD_LIMIT: usize = 15;

const DECISION_TYPE_RULES: &str = "\
PRIMARY DECISION RULES:
1. A safety threat (drunk captain, harassment, violence) MUST use primaryDecision.type \
SEVERITY, ask \"Identify the Issue Severity\" and include P0 among the options.
2. An operational, refund or tech issue MUST use POLICY_CHECK (for example \"Is this \
eligible for refund?\") or REQUIRED_PROOF (for example \"What specific proof is missing?\").";

const CONSISTENCY_RULES: &str = "\
DATA CONSISTENCY RULES:
1. primaryDecision.correctAnswer MUST appear verbatim in primaryDecision.options.
2. correctAction MUST appear verbatim in actionOptions.
3. Options must be tricky but distinct.";

/// What the engine asks the generator for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub tier: Tier,
    pub topic: String,
    /// SOP rulebook every generated scenario must be grounded in.
    pub rulebook: String,
}

impl GenerationRequest {
    pub fn difficulty_brief(&self) -> &'static str {
        match self.tier {
            Tier::Rookie => {
                "The agent is a ROOKIE (< 6 months tenure). Generate a clear, standard \
                 scenario without edge cases, focused on basic refunds and general \
                 severity issues, with a straightforward SOP answer."
            }
            Tier::Associate => {
                "The agent is an ASSOCIATE. Generate a moderate difficulty scenario \
                 mixing refund and safety issues."
            }
            Tier::Expert => {
                "The agent is an EXPERT (> 2 years tenure). Generate a complex or \
                 ambiguous scenario: P0 safety issues, high value delivery claims, or \
                 a customer who may be lying. Make the options close to test precision."
            }
        }
    }

    /// Standing instructions for the generator: rulebook, tenure brief,
    /// decision-type rules, consistency rules.
    pub fn system_instruction(&self) -> String {
        format!(
            "{}\n\nTENURE ADAPTATION: {}\n\n{DECISION_TYPE_RULES}\n\n{CONSISTENCY_RULES}",
            self.rulebook.trim(),
            self.difficulty_brief()
        )
    }

    pub fn prompt(&self) -> String {
        format!("Generate a detailed scenario about: {}.", self.topic)
    }
}

/// Prompt sent to the hint service for a scenario's context text.
pub fn hint_prompt(context: &str) -> String {
    format!(
        "The agent is stuck on this customer scenario: \"{context}\". Give a short, helpful \
         hint based on the SOPs. Focus on the specific policy rule or check they need to \
         perform. Keep it under {HINT_WORD_LIMIT} words."
    )
}

/// Producer of raw scenarios.
pub trait ScenarioSource {
    fn generate(&self, request: &GenerationRequest) -> DojoResult<Scenario>;
}

/// Producer of short hints from scenario context text.
pub trait HintSource {
    fn hint(&self, context: &str) -> DojoResult<String>;
}

/// Hint text used when the hint service gives nothing back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HintFallbacks {
    pub empty: String,
    pub failed: String,
}

impl Default for HintFallbacks {
    fn default() -> Self {
        Self {
            empty: "Check the SOP guidelines for this specific issue category.".into(),
            failed: "Review the SOP details regarding this issue.".into(),
        }
    }
}

/// Ask for a hint; never fails.
pub fn hint_or_fallback(source: &dyn HintSource, context: &str, fallbacks: &HintFallbacks) -> String {
    match source.hint(context) {
        Ok(text) if !text.trim().is_empty() => text,
        Ok(_) => fallbacks.empty.clone(),
        Err(e) => {
            log::warn!("hint generation failed: {e}");
            fallbacks.failed.clone()
        }
    }
}

/// Shown when the generator cannot be reached. Its answers are consistent.
pub fn fallback_scenario() -> Scenario {
    let options = |items: [&str; 4]| items.iter().map(|s| s.to_string()).collect::<Vec<_>>();
    Scenario {
        id: FALLBACK_SCENARIO_ID.into(),
        customer_name: "System".into(),
        sentiment: "Neutral".into(),
        ride_type: "Bike".into(),
        context: "The scenario service is currently unavailable. Please check your API key \
                  or connection."
            .into(),
        captain_details: CaptainDetails {
            name: "N/A".into(),
            rating: 0.0,
            history: "N/A".into(),
        },
        primary_decision: PrimaryDecision {
            decision_type: DecisionType::RootCause,
            question: "What is the likely cause of this error?".into(),
            correct_answer: "API Key or Connectivity Issue".into(),
            options: options([
                "Captain Phone Off",
                "API Key or Connectivity Issue",
                "Customer App Crash",
                "GPS Glitch",
            ]),
        },
        correct_action: "Retry connection or check settings".into(),
        explanation: "Without the scenario service, no scenarios can be generated.".into(),
        action_options: options([
            "Retry connection or check settings",
            "Refund customer",
            "Suspend Captain",
            "Call Supervisor",
        ]),
    }
}

/// Identifies one in-flight generator request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RequestToken(u64);

impl RequestToken {
    pub fn value(&self) -> u64 {
        self.0
    }
}

/// Issues request tokens and gates responses on them. Each token is
/// resolved at most once.
#[derive(Debug, Default)]
pub struct ScenarioFeed {
    issued: u64,
    fulfilled: Option<RequestToken>,
}

impl ScenarioFeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a new request. Every earlier token becomes stale.
    pub fn begin(&mut self) -> RequestToken {
        self.issued += 1;
        RequestToken(self.issued)
    }

    pub fn current(&self) -> Option<RequestToken> {
        (self.issued > 0).then_some(RequestToken(self.issued))
    }

    pub fn is_current(&self, token: RequestToken) -> bool {
        token.0 == self.issued
    }

    /// Current and not yet answered.
    pub fn is_awaiting(&self, token: RequestToken) -> bool {
        self.is_current(token) && self.fulfilled != Some(token)
    }

    /// Accept a response for `token`. Stale or repeated responses yield
    /// `None`; failures yield the sanitized fallback.
    pub fn resolve(
        &mut self,
        token: RequestToken,
        response: DojoResult<Scenario>,
        rng: &mut DojoRng,
    ) -> Option<ValidatedScenario> {
        if !self.is_awaiting(token) {
            log::debug!(
                "discarding scenario response for token {} (current {}, fulfilled {:?})",
                token.0,
                self.issued,
                self.fulfilled.map(|t| t.0)
            );
            return None;
        }
        self.fulfilled = Some(token);
        let raw = match response {
            Ok(scenario) => scenario,
            Err(e) => {
                log::warn!("scenario generation failed, using fallback: {e}");
                fallback_scenario()
            }
        };
        Some(guard::sanitize(raw, rng))
    }
}

/// One entry of a scripted scenario file.
#[derive(Debug, Clone, Deserialize)]
pub struct ScriptEntry {
    #[serde(flatten)]
    pub scenario: Scenario,
    #[serde(default)]
    pub hint: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ScriptFile {
    scenarios: Vec<ScriptEntry>,
}

/// Offline generator that replays a fixed list of scenarios in order,
/// wrapping around. Hints are matched by scenario context.
pub struct ScriptedSource {
    entries: Vec<ScriptEntry>,
    cursor: std::cell::Cell<usize>,
}

impl ScriptedSource {
    pub fn new(entries: Vec<ScriptEntry>) -> Self {
        Self {
            entries,
            cursor: std::cell::Cell::new(0),
        }
    }

    pub fn from_scenarios(scenarios: Vec<Scenario>) -> Self {
        Self::new(
            scenarios
                .into_iter()
                .map(|scenario| ScriptEntry { scenario, hint: None })
                .collect(),
        )
    }

    /// Load `{"scenarios": [...]}` from a JSON file.
    pub fn load(path: &str) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| anyhow::anyhow!("Cannot read {path}: {e}"))?;
        let file: ScriptFile = serde_json::from_str(&content)?;
        Ok(Self::new(file.scenarios))
    }
}

impl ScenarioSource for ScriptedSource {
    fn generate(&self, request: &GenerationRequest) -> DojoResult<Scenario> {
        if self.entries.is_empty() {
            return Err(DojoError::GeneratorUnavailable {
                reason: "script has no scenarios".into(),
            });
        }
        let index = self.cursor.get() % self.entries.len();
        self.cursor.set(index + 1);
        log::debug!("scripted scenario #{index} for prompt {:?}", request.prompt());
        log::trace!("system instruction:\n{}", request.system_instruction());
        Ok(self.entries[index].scenario.clone())
    }
}

impl HintSource for ScriptedSource {
    fn hint(&self, context: &str) -> DojoResult<String> {
        log::debug!("scripted hint for prompt {:?}", hint_prompt(context));
        self.entries
            .iter()
            .find(|e| e.scenario.context == context)
            .and_then(|e| e.hint.clone())
            .ok_or_else(|| DojoError::HintUnavailable {
                reason: "no scripted hint for this scenario".into(),
            })
    }
}
