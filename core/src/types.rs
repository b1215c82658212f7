//! Shared primitive types used across the engine.

/// An agent's roster handle (email-like). Compared case-insensitively
/// at roster lookup; used verbatim as the persistence key.
pub type Identity = String;

/// A unique identifier for one play session.
pub type SessionId = String;

/// Fixed calendar-day labels for the weekly trend.
pub const WEEK_DAYS: [&str; 7] = ["Mon", "Tue", "Wed", "Thu", "Fri", "Sat", "Sun"];
