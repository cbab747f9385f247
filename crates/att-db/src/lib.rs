//! Storage layer for attendance records.
//!
//! Persists raw badge records using `rusqlite` and serves them back by time
//! window through [`EventLoader`].
//!
//! # Thread Safety
//!
//! The [`Database`] type wraps a `rusqlite::Connection`, which is `Send` but not `Sync`.
//! A `Database` instance can be moved between threads but cannot be shared
//! across threads without external synchronization.
//!
//! # Schema
//!
//! ## Timestamp Format
//!
//! Each row keeps the timestamp exactly as the source wrote it (`timestamp`)
//! alongside the normalized instant (`recorded_at`), stored as UTC ISO 8601
//! with millisecond precision (e.g. `2024-01-15T10:30:00.000Z`). Only
//! `recorded_at` is used for range queries; its fixed format makes
//! lexicographic ordering match chronological ordering.
//!
//! ## Record Identity
//!
//! Row IDs are UUIDv5 digests of every raw record field plus an occurrence
//! number. Identical swipes within one export are distinct rows numbered in
//! export order ([`ImportBatch`]), so importing the same export twice does not
//! duplicate rows.

use std::collections::HashMap;
use std::path::Path;

use att_core::{EventLoader, RawRecord, TimeWindow};
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{Connection, Row, params};
use thiserror::Error;
use uuid::Uuid;

/// Database errors.
#[derive(Debug, Error)]
pub enum DbError {
    /// An error from the underlying database.
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    /// A stored metadata payload is not valid JSON.
    #[error("invalid metadata for record {record_id}")]
    InvalidMetadata {
        record_id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Database connection wrapper.
///
/// See the [module documentation](self) for thread safety considerations.
pub struct Database {
    conn: Connection,
}

/// A badge record as stored in the database.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttendanceRow {
    pub id: String,
    pub position: String,
    pub action: String,
    /// Timestamp as written by the source.
    pub timestamp: String,
    /// Normalized UTC instant.
    pub recorded_at: String,
    pub subject: Option<String>,
    /// JSON payload.
    pub raw_metadata: Option<String>,
}

impl AttendanceRow {
    /// Builds a row from a raw record and its normalized instant.
    ///
    /// The row is the first occurrence of its content; use [`ImportBatch`]
    /// when an export may repeat a record.
    pub fn from_raw(record: &RawRecord, instant: DateTime<Utc>) -> Self {
        Self::occurrence(record, &record_content(record), 0, instant)
    }

    fn occurrence(
        record: &RawRecord,
        content: &str,
        occurrence: u32,
        instant: DateTime<Utc>,
    ) -> Self {
        Self {
            id: record_id(content, occurrence),
            position: record.position.clone(),
            action: record.action.clone(),
            timestamp: record.timestamp.clone(),
            recorded_at: format_timestamp(instant),
            subject: record.subject.clone(),
            raw_metadata: record.raw_metadata.as_ref().map(ToString::to_string),
        }
    }

    /// Converts the row back into the record the source produced.
    pub fn into_raw(self) -> Result<RawRecord, DbError> {
        let raw_metadata = self
            .raw_metadata
            .as_deref()
            .map(serde_json::from_str)
            .transpose()
            .map_err(|source| DbError::InvalidMetadata {
                record_id: self.id.clone(),
                source,
            })?;
        Ok(RawRecord {
            position: self.position,
            action: self.action,
            timestamp: self.timestamp,
            subject: self.subject,
            raw_metadata,
        })
    }

    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            position: row.get(1)?,
            action: row.get(2)?,
            timestamp: row.get(3)?,
            recorded_at: row.get(4)?,
            subject: row.get(5)?,
            raw_metadata: row.get(6)?,
        })
    }
}

/// Rows for one export, in export order.
///
/// Repeats of an identical record are numbered by how many times the same
/// content appeared earlier in the batch, so each swipe gets its own row and
/// re-importing the export yields the same IDs.
#[derive(Debug, Default)]
pub struct ImportBatch {
    rows: Vec<AttendanceRow>,
    seen: HashMap<String, u32>,
}

impl ImportBatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, record: &RawRecord, instant: DateTime<Utc>) {
        let content = record_content(record);
        let count = self.seen.entry(content.clone()).or_insert(0);
        let occurrence = *count;
        *count += 1;
        self.rows
            .push(AttendanceRow::occurrence(record, &content, occurrence, instant));
    }

    pub fn rows(&self) -> &[AttendanceRow] {
        &self.rows
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Event count and latest event per position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionSummary {
    pub position: String,
    pub events: i64,
    pub last_event: String,
}

impl Database {
    /// Opens a database at the given path, creating it if necessary.
    ///
    /// The database schema is automatically initialized on first open.
    pub fn open(path: &Path) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Opens an in-memory database.
    ///
    /// Useful for testing. The database is destroyed when the connection closes.
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        let db = Self { conn };
        db.init()?;
        Ok(db)
    }

    /// Initializes the database schema.
    ///
    /// This is idempotent - safe to call on an already-initialized database.
    fn init(&self) -> Result<(), DbError> {
        self.conn.execute_batch(
            "
            -- attendance: raw badge records
            -- timestamp: as written by the source (offset optional)
            -- recorded_at: normalized UTC instant, e.g. '2024-01-15T10:30:00.000Z'
            CREATE TABLE IF NOT EXISTS attendance (
                id TEXT PRIMARY KEY,
                position TEXT NOT NULL,
                action TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                recorded_at TEXT NOT NULL,
                subject TEXT,
                raw_metadata TEXT
            );

            CREATE INDEX IF NOT EXISTS idx_attendance_recorded_at ON attendance(recorded_at);
            CREATE INDEX IF NOT EXISTS idx_attendance_position ON attendance(position);
            ",
        )?;
        Ok(())
    }

    /// Inserts a batch of records, ignoring duplicates by ID.
    pub fn insert_records(&mut self, records: &[AttendanceRow]) -> Result<usize, DbError> {
        if records.is_empty() {
            return Ok(0);
        }
        let tx = self.conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "
                INSERT OR IGNORE INTO attendance
                (id, position, action, timestamp, recorded_at, subject, raw_metadata)
                VALUES (?, ?, ?, ?, ?, ?, ?)
                ",
            )?;
            for record in records {
                inserted += stmt.execute(params![
                    record.id,
                    record.position,
                    record.action,
                    record.timestamp,
                    record.recorded_at,
                    record.subject,
                    record.raw_metadata,
                ])?;
            }
        }
        tx.commit()?;
        tracing::debug!(inserted, total = records.len(), "inserted attendance records");
        Ok(inserted)
    }

    /// Lists records within a time range.
    ///
    /// The range is inclusive of `start` and exclusive of `end`. Records with
    /// the same instant come back in insertion order.
    pub fn list_records_in_range(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<AttendanceRow>, DbError> {
        if end <= start {
            return Ok(Vec::new());
        }
        let start = format_timestamp(start);
        let end = format_timestamp(end);
        let mut stmt = self.conn.prepare(
            "
            SELECT id, position, action, timestamp, recorded_at, subject, raw_metadata
            FROM attendance
            WHERE recorded_at >= ? AND recorded_at < ?
            ORDER BY recorded_at ASC, rowid ASC
            ",
        )?;
        let rows = stmt.query_map([start, end], AttendanceRow::from_row)?;
        let mut records = Vec::new();
        for row in rows {
            records.push(row?);
        }
        Ok(records)
    }

    /// Event count and latest event per position, ordered by position.
    pub fn position_summaries(&self) -> Result<Vec<PositionSummary>, DbError> {
        let mut stmt = self.conn.prepare(
            "
            SELECT position, COUNT(*), MAX(recorded_at)
            FROM attendance
            GROUP BY position
            ORDER BY position ASC
            ",
        )?;
        let rows = stmt.query_map([], |row| {
            Ok(PositionSummary {
                position: row.get(0)?,
                events: row.get(1)?,
                last_event: row.get(2)?,
            })
        })?;
        let mut summaries = Vec::new();
        for row in rows {
            summaries.push(row?);
        }
        Ok(summaries)
    }
}

impl EventLoader for Database {
    type Error = DbError;

    fn load(&self, window: &TimeWindow) -> Result<Vec<RawRecord>, Self::Error> {
        let rows = self.list_records_in_range(window.start(), window.end())?;
        tracing::debug!(
            records = rows.len(),
            start = %window.start(),
            end = %window.end(),
            "loaded attendance window"
        );
        rows.into_iter().map(AttendanceRow::into_raw).collect()
    }
}

/// Unambiguous encoding of every raw field (a JSON array).
fn record_content(record: &RawRecord) -> String {
    serde_json::json!([
        record.position,
        record.action,
        record.timestamp,
        record.subject,
        record.raw_metadata,
    ])
    .to_string()
}

fn record_id(content: &str, occurrence: u32) -> String {
    let name = format!("attendance:{occurrence}:{content}");
    Uuid::new_v5(&Uuid::NAMESPACE_OID, name.as_bytes()).to_string()
}

fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
}
