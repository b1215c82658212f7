//! The training session: the loop that drives the engine.
//!
//! CONTROL FLOW (fixed, strictly sequential):
//!   1. Login:    roster lookup → tenure classification
//!   2. Restore:  seed → overlay persisted stats
//!   3. Fetch:    issue request token → generator → guard (or fallback)
//!   4. Hint:     optional, irreversible for the active scenario
//!   5. Submit:   grade once → fold → persist → fetch next
//!
//! RULES:
//!   - A scenario is only ever held in its validated form.
//!   - Responses for anything but the current request token are dropped.
//!   - Stats are persisted after every fold, never before the first one.
//!   - Every step is appended to the event log.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::{
    config::DojoConfig,
    error::{DojoError, DojoResult},
    event::{DojoEvent, EventLogEntry},
    generator::{
        hint_or_fallback, GenerationRequest, HintSource, RequestToken, ScenarioFeed,
        ScenarioSource, FALLBACK_SCENARIO_ID,
    },
    grader::{self, GradeOutcome, HintLatch, Selection},
    ledger::{self, AgentStats},
    rng::{DojoRng, RngBank, StreamSlot},
    roster::{self, RosterSource},
    scenario::{Scenario, ValidatedScenario},
    store::DojoStore,
    tenure::AgentProfile,
    types::SessionId,
};

/// The scenario currently in front of the agent.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveScenario {
    pub token: RequestToken,
    pub topic: String,
    pub scenario: ValidatedScenario,
    pub hint: HintLatch,
    pub hint_text: Option<String>,
    pub outcome: Option<GradeOutcome>,
}

pub struct DojoSession {
    pub session_id: SessionId,
    profile: AgentProfile,
    stats: AgentStats,
    config: DojoConfig,
    store: DojoStore,
    feed: ScenarioFeed,
    guard_rng: DojoRng,
    topic_rng: DojoRng,
    pending: Option<GenerationRequest>,
    active: Option<ActiveScenario>,
    seq: u64,
}

impl DojoSession {
    /// Authenticate against the roster, then start a session.
    /// Not-found and roster-unavailable both deny access.
    pub fn login(
        roster: &dyn RosterSource,
        identity: &str,
        now: DateTime<Utc>,
        store: DojoStore,
        config: DojoConfig,
        seed: u64,
    ) -> DojoResult<Self> {
        let profile = roster::authenticate(roster, identity, now)?;
        Self::start(profile, store, config, seed)
    }

    /// Start a session for an already classified agent.
    pub fn start(
        profile: AgentProfile,
        store: DojoStore,
        config: DojoConfig,
        seed: u64,
    ) -> DojoResult<Self> {
        let persisted = store.load_stats_raw(profile.identity())?;
        let (stats, source) = ledger::restore(&profile, persisted.as_deref());
        let bank = RngBank::new(seed);

        let mut session = Self {
            session_id: Uuid::new_v4().to_string(),
            stats,
            config,
            store,
            feed: ScenarioFeed::new(),
            guard_rng: bank.for_stream(StreamSlot::Guard),
            topic_rng: bank.for_stream(StreamSlot::Topic),
            pending: None,
            active: None,
            seq: 0,
            profile,
        };

        session.record(DojoEvent::SessionStarted {
            identity: session.profile.identity().to_string(),
            tier: session.profile.tier(),
            tenure_months: session.profile.tenure_months(),
            seed,
        })?;
        session.record(DojoEvent::StatsRestored {
            source,
            xp: session.stats.xp,
            level: session.stats.level,
        })?;
        log::info!(
            "session {} started for {} ({:?}, xp={} level={})",
            session.session_id,
            session.profile.identity(),
            source,
            session.stats.xp,
            session.stats.level
        );
        Ok(session)
    }

    pub fn profile(&self) -> &AgentProfile {
        &self.profile
    }

    pub fn stats(&self) -> &AgentStats {
        &self.stats
    }

    pub fn active(&self) -> Option<&ActiveScenario> {
        self.active.as_ref()
    }

    pub fn store(&self) -> &DojoStore {
        &self.store
    }

    // ── Scenario fetch ─────────────────────────────────────────

    /// Start a new scenario request. The active scenario is dropped and any
    /// earlier request becomes stale.
    pub fn begin_fetch(&mut self) -> (RequestToken, GenerationRequest) {
        let topic = match self.config.topics.len() {
            0 => String::new(),
            n => self.config.topics[self.topic_rng.next_index(n)].clone(),
        };
        let request = GenerationRequest {
            tier: self.profile.tier(),
            topic,
            rulebook: self.config.rulebook.clone(),
        };
        let token = self.feed.begin();
        self.active = None;
        self.pending = Some(request.clone());
        log::debug!("scenario request {} for {:?}", token.value(), request.topic);
        (token, request)
    }

    /// Deliver a generator response. Returns false if the response was
    /// stale and discarded.
    pub fn complete_fetch(
        &mut self,
        token: RequestToken,
        response: DojoResult<Scenario>,
    ) -> DojoResult<bool> {
        let Some(scenario) = self.feed.resolve(token, response, &mut self.guard_rng) else {
            self.record(DojoEvent::StaleResponseDiscarded { token })?;
            return Ok(false);
        };
        let topic = self.pending.take().map(|r| r.topic).unwrap_or_default();

        self.record(DojoEvent::ScenarioPresented {
            token,
            scenario_id: scenario.id().to_string(),
            topic: topic.clone(),
            fallback: scenario.id() == FALLBACK_SCENARIO_ID,
        })?;
        if !scenario.repairs().is_empty() {
            self.record(DojoEvent::ScenarioRepaired {
                scenario_id: scenario.id().to_string(),
                repairs: scenario.repairs().to_vec(),
            })?;
        }

        self.active = Some(ActiveScenario {
            token,
            topic,
            scenario,
            hint: HintLatch::default(),
            hint_text: None,
            outcome: None,
        });
        Ok(true)
    }

    /// Request and deliver in one step.
    pub fn fetch_scenario(&mut self, source: &dyn ScenarioSource) -> DojoResult<&ValidatedScenario> {
        let (token, request) = self.begin_fetch();
        let response = source.generate(&request);
        self.complete_fetch(token, response)?;
        self.active
            .as_ref()
            .map(|a| &a.scenario)
            .ok_or(DojoError::NoActiveScenario)
    }

    // ── Hints ──────────────────────────────────────────────────

    /// Mark the hint as used and return the context to ask about.
    /// The precision bonus is forfeited from this point on, whatever the
    /// hint service later does.
    pub fn begin_hint(&mut self) -> DojoResult<(RequestToken, String)> {
        let active = self.active.as_mut().ok_or(DojoError::NoActiveScenario)?;
        let first_request = !active.hint.used();
        active.hint.mark_used();
        let token = active.token;
        let context = active.scenario.context.clone();
        let scenario_id = active.scenario.id().to_string();
        if first_request {
            self.record(DojoEvent::HintRequested { scenario_id })?;
        }
        Ok((token, context))
    }

    /// Attach hint text to the scenario it was asked for. Hints for a
    /// scenario that is no longer active are dropped.
    pub fn complete_hint(&mut self, token: RequestToken, text: String) -> Option<&str> {
        let active = self.active.as_mut().filter(|a| a.token == token)?;
        active.hint_text = Some(text);
        active.hint_text.as_deref()
    }

    /// Ask for a hint. Never fails once a scenario is active; a failing
    /// hint service degrades to a generic hint.
    pub fn request_hint(&mut self, hints: &dyn HintSource) -> DojoResult<String> {
        if let Some(text) = self.active.as_ref().and_then(|a| a.hint_text.clone()) {
            return Ok(text);
        }
        let (token, context) = self.begin_hint()?;
        let text = hint_or_fallback(hints, &context, &self.config.hint_fallbacks);
        self.complete_hint(token, text.clone());
        Ok(text)
    }

    // ── Submission ─────────────────────────────────────────────

    /// Grade the active scenario once, fold the outcome into the stats and
    /// persist them.
    pub fn submit(&mut self, selection: &Selection) -> DojoResult<GradeOutcome> {
        let active = self.active.as_ref().ok_or(DojoError::NoActiveScenario)?;
        if active.outcome.is_some() {
            return Err(DojoError::AlreadyGraded {
                scenario_id: active.scenario.id().to_string(),
            });
        }
        let outcome = grader::grade_selection(&active.scenario, selection, active.hint)?;
        let scenario_id = active.scenario.id().to_string();

        let next = ledger::fold(&self.stats, outcome);
        let unlocked: Vec<String> = next.badges[self.stats.badges.len()..].to_vec();
        self.store.save_stats(self.profile.identity(), &next)?;
        self.stats = next;

        if let Some(active) = self.active.as_mut() {
            active.outcome = Some(outcome);
        }

        self.record(DojoEvent::ScenarioGraded {
            scenario_id: scenario_id.clone(),
            outcome,
            xp: self.stats.xp,
            level: self.stats.level,
            streak: self.stats.streak,
            accuracy: self.stats.accuracy,
        })?;
        for badge in unlocked {
            log::info!("{} unlocked badge {badge:?}", self.profile.identity());
            self.record(DojoEvent::BadgeUnlocked { badge })?;
        }
        log::debug!(
            "graded {scenario_id}: correct={} +{}xp",
            outcome.is_correct,
            outcome.xp_award
        );
        Ok(outcome)
    }

    fn record(&mut self, event: DojoEvent) -> DojoResult<()> {
        self.seq += 1;
        let entry = EventLogEntry {
            id: None,
            session_id: self.session_id.clone(),
            seq: self.seq,
            identity: self.profile.identity().to_string(),
            event_type: event.type_name().to_string(),
            payload: serde_json::to_string(&event)?,
        };
        self.store.append_event(&entry)
    }
}
