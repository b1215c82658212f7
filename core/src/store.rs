//! SQLite persistence layer.
//!
//! RULE: Only store.rs talks to the database.
//! The ledger and grader never see SQL; the session calls store methods.

use rusqlite::{params, Connection, OptionalExtension};
use crate::{
    error::DojoResult,
    event::EventLogEntry,
    ledger::AgentStats,
};

pub struct DojoStore {
    conn: Connection,
}

impl DojoStore {
    /// Open (or create) the database at `path`.
    pub fn open(path: &str) -> DojoResult<Self> {
        let conn = Connection::open(path)?;
        // WAL mode: readers do not block the session's writes.
        conn.execute_batch("PRAGMA journal_mode=WAL;")?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (used in tests).
    pub fn in_memory() -> DojoResult<Self> {
        let conn = Connection::open_in_memory()?;
        Ok(Self { conn })
    }

    /// Apply all schema migrations in order.
    pub fn migrate(&self) -> DojoResult<()> {
        self.conn.execute_batch(include_str!("../../migrations/001_foundation.sql"))?;
        Ok(())
    }

    // ── Agent stats ────────────────────────────────────────────

    pub fn save_stats(&self, identity: &str, stats: &AgentStats) -> DojoResult<()> {
        let json = serde_json::to_string(stats)?;
        self.save_stats_raw(identity, &json)
    }

    /// Store a stats record verbatim. Used by tooling and tests that need
    /// partial or hand-written records.
    pub fn save_stats_raw(&self, identity: &str, stats_json: &str) -> DojoResult<()> {
        self.conn.execute(
            "INSERT INTO agent_stats (identity, stats_json) VALUES (?1, ?2)
             ON CONFLICT(identity) DO UPDATE SET stats_json = excluded.stats_json",
            params![identity, stats_json],
        )?;
        Ok(())
    }

    /// The stored record text, unparsed. The ledger decides whether it is
    /// readable.
    pub fn load_stats_raw(&self, identity: &str) -> DojoResult<Option<String>> {
        let raw = self.conn.query_row(
            "SELECT stats_json FROM agent_stats WHERE identity = ?1",
            params![identity],
            |row| row.get::<_, String>(0),
        ).optional()?;
        Ok(raw)
    }

    // ── Event log ──────────────────────────────────────────────

    pub fn append_event(&self, entry: &EventLogEntry) -> DojoResult<()> {
        self.conn.execute(
            "INSERT INTO event_log (session_id, seq, identity, event_type, payload)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                entry.session_id,
                entry.seq as i64,
                entry.identity,
                entry.event_type,
                entry.payload,
            ],
        )?;
        Ok(())
    }

    pub fn events_for_session(&self, session_id: &str) -> DojoResult<Vec<EventLogEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, session_id, seq, identity, event_type, payload
             FROM event_log WHERE session_id = ?1
             ORDER BY seq ASC"
        )?;
        let entries = stmt.query_map(params![session_id], |row| {
            Ok(EventLogEntry {
                id:         Some(row.get(0)?),
                session_id: row.get(1)?,
                seq:        row.get::<_, i64>(2)? as u64,
                identity:   row.get(3)?,
                event_type: row.get(4)?,
                payload:    row.get(5)?,
            })
        })?.collect::<Result<Vec<_>, _>>()?;
        Ok(entries)
    }

    /// Number of events of one type recorded for an agent (for tests and
    /// summaries).
    pub fn event_count(&self, identity: &str, event_type: &str) -> DojoResult<i64> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM event_log WHERE identity = ?1 AND event_type = ?2",
            params![identity, event_type],
            |row| row.get(0),
        )?;
        Ok(count)
    }
}
