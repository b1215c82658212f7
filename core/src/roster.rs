//! Roster lookup: authenticates an identity against the HR roster export.
//!
//! RULE: A transport failure is never an authentication. "Not found" and
//! "unavailable" are distinct errors so the caller can word them apart.

use chrono::{DateTime, Utc};

use crate::{
    error::{DojoError, DojoResult},
    tenure::AgentProfile,
};

/// Source of the roster CSV document.
pub trait RosterSource {
    fn fetch_csv(&self) -> DojoResult<String>;
}

/// Roster read from a CSV file on disk.
pub struct CsvFileRoster {
    path: String,
}

impl CsvFileRoster {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

impl RosterSource for CsvFileRoster {
    fn fetch_csv(&self) -> DojoResult<String> {
        std::fs::read_to_string(&self.path).map_err(|e| DojoError::RosterUnavailable {
            reason: format!("cannot read {}: {e}", self.path),
        })
    }
}

/// Roster held in memory.
pub struct InlineRoster {
    csv: String,
}

impl InlineRoster {
    pub fn new(csv: impl Into<String>) -> Self {
        Self { csv: csv.into() }
    }
}

impl RosterSource for InlineRoster {
    fn fetch_csv(&self) -> DojoResult<String> {
        Ok(self.csv.clone())
    }
}

/// One roster row: `[identity, join_date_raw, ...]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RosterRow {
    pub identity: String,
    pub join_date_raw: String,
}

/// Split a CSV document into rows of trimmed, unquoted cells.
/// Commas inside double quotes do not split.
pub fn parse_csv(text: &str) -> Vec<Vec<String>> {
    text.lines().map(parse_csv_line).collect()
}

fn parse_csv_line(line: &str) -> Vec<String> {
    let mut cells = Vec::new();
    let mut current = String::new();
    let mut in_quote = false;
    for ch in line.chars() {
        match ch {
            '"' => in_quote = !in_quote,
            ',' if !in_quote => cells.push(std::mem::take(&mut current)),
            _ => current.push(ch),
        }
    }
    cells.push(current);
    cells
        .into_iter()
        .map(|cell| cell.trim().trim_matches('"').to_string())
        .collect()
}

/// Case-insensitive exact match on the identity column.
pub fn find_row(text: &str, identity: &str) -> Option<RosterRow> {
    let wanted = identity.trim().to_lowercase();
    parse_csv(text).into_iter().find_map(|cells| {
        let first = cells.first()?;
        if first.is_empty() || first.trim().to_lowercase() != wanted {
            return None;
        }
        Some(RosterRow {
            identity: first.clone(),
            join_date_raw: cells.get(1).cloned().unwrap_or_default(),
        })
    })
}

/// Look up `identity` and classify the matching agent.
pub fn authenticate(
    source: &dyn RosterSource,
    identity: &str,
    now: DateTime<Utc>,
) -> DojoResult<AgentProfile> {
    let csv = source.fetch_csv().inspect_err(|e| {
        log::error!("roster fetch failed for {identity}: {e}");
    })?;
    let row = find_row(&csv, identity).ok_or_else(|| {
        log::warn!("access attempt: {identity} not found in roster");
        DojoError::AgentNotFound {
            identity: identity.to_string(),
        }
    })?;
    let profile = AgentProfile::classify(row.identity, &row.join_date_raw, now);
    log::info!(
        "authenticated {} tenure={}m tier={}",
        profile.identity(),
        profile.tenure_months(),
        profile.tier().label()
    );
    Ok(profile)
}
