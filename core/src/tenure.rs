//! Tenure classifier.
//!
//! Turns a roster join date of unknown format into whole months of tenure
//! and a proficiency tier. Never fails: a date that cannot be read at all
//! is treated as "joined now" so a bad roster cell never blocks login.

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::types::Identity;

const DAY_MS: i64 = 24 * 60 * 60 * 1000;
const MONTH_MS: i64 = 30 * DAY_MS;

/// Months above which an agent is an Associate.
pub const ASSOCIATE_AFTER_MONTHS: u32 = 6;
/// Months above which an agent is an Expert.
pub const EXPERT_AFTER_MONTHS: u32 = 24;

/// Datetime layouts tried first, month-first like a default date parser.
const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
];

const DATE_FORMATS: &[&str] = &[
    "%Y-%m-%d",
    "%Y/%m/%d",
    "%m/%d/%Y",
    "%m-%d-%Y",
    "%B %d, %Y",
    "%b %d, %Y",
    "%B %d %Y",
    "%b %d %Y",
    "%d %B %Y",
    "%d %b %Y",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Tier {
    Rookie,
    Associate,
    Expert,
}

impl Tier {
    /// Boundaries map to the lower tier: 6 is Rookie, 24 is Associate.
    pub fn from_tenure(tenure_months: u32) -> Self {
        if tenure_months > EXPERT_AFTER_MONTHS {
            Self::Expert
        } else if tenure_months > ASSOCIATE_AFTER_MONTHS {
            Self::Associate
        } else {
            Self::Rookie
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Rookie => "Rookie",
            Self::Associate => "Associate",
            Self::Expert => "Expert",
        }
    }
}

/// Identity plus derived tier. Built once per login, immutable after.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentProfile {
    identity: Identity,
    joined_at: DateTime<Utc>,
    tenure_months: u32,
    tier: Tier,
}

impl AgentProfile {
    /// Classify an agent from the raw roster join-date cell.
    pub fn classify(identity: impl Into<Identity>, raw_join_date: &str, now: DateTime<Utc>) -> Self {
        let identity = identity.into();
        let joined_at = parse_join_date(raw_join_date, now);
        Self::from_join_date(identity, joined_at, now)
    }

    pub fn from_join_date(identity: Identity, joined_at: DateTime<Utc>, now: DateTime<Utc>) -> Self {
        let tenure_months = tenure_months(joined_at, now);
        Self {
            identity,
            joined_at,
            tenure_months,
            tier: Tier::from_tenure(tenure_months),
        }
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }

    pub fn joined_at(&self) -> DateTime<Utc> {
        self.joined_at
    }

    pub fn tenure_months(&self) -> u32 {
        self.tenure_months
    }

    pub fn tier(&self) -> Tier {
        self.tier
    }
}

/// `ceil(|now - joined| / 30 days)`. A future join date still yields a
/// non-negative tenure.
pub fn tenure_months(joined_at: DateTime<Utc>, now: DateTime<Utc>) -> u32 {
    let elapsed_ms = (now - joined_at).num_milliseconds().unsigned_abs();
    let months = elapsed_ms.div_ceil(MONTH_MS as u64);
    u32::try_from(months).unwrap_or(u32::MAX)
}

/// Parse a join date of unknown format.
///
/// Order: default (month-first) formats, then day/month/year when the text
/// is slash separated, then `now`.
pub fn parse_join_date(raw: &str, now: DateTime<Utc>) -> DateTime<Utc> {
    let text = raw.trim();
    if let Some(parsed) = parse_default(text) {
        return parsed;
    }
    if text.contains('/') {
        if let Some(parsed) = parse_day_first(text) {
            log::debug!("join date {text:?} read as day/month/year");
            return parsed;
        }
    }
    log::warn!("unreadable join date {raw:?}, treating as joined now");
    now
}

fn parse_default(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(text) {
        return Some(dt.with_timezone(&Utc));
    }
    for fmt in DATETIME_FORMATS {
        if let Ok(naive) = NaiveDateTime::parse_from_str(text, fmt) {
            return widen_year(naive).map(|n| n.and_utc());
        }
    }
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(text, fmt).ok())
        .and_then(widen_year)
        .and_then(midnight_utc)
}

/// Regional roster format: DD/MM/YYYY, trailing time text ignored.
fn parse_day_first(text: &str) -> Option<DateTime<Utc>> {
    let parts: Vec<&str> = text.split('/').collect();
    if parts.len() != 3 {
        return None;
    }
    let day = leading_int(parts[0])?;
    let month = leading_int(parts[1])?;
    let year = leading_int(parts[2])?;
    let date = NaiveDate::from_ymd_opt(year, u32::try_from(month).ok()?, u32::try_from(day).ok()?)?;
    widen_year(date).and_then(midnight_utc)
}

/// Two-digit years: 00-49 are 20xx, 50-99 are 19xx.
fn widen_year<D: Datelike>(value: D) -> Option<D> {
    match value.year() {
        year @ 0..=49 => value.with_year(year + 2000),
        year @ 50..=99 => value.with_year(year + 1900),
        _ => Some(value),
    }
}

fn leading_int(part: &str) -> Option<i32> {
    let digits: String = part
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

fn midnight_utc(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc())
}
