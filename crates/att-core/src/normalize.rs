//! Normalization of raw badge records into canonical-timezone events.
//!
//! Sources disagree on timestamp formats: some write RFC 3339, some the
//! PostgreSQL text form with a short offset (`2025-01-15 08:00:00+00`), and
//! some write naive wall-clock times. Naive values are read as wall-clock
//! time in the canonical timezone, never as UTC.

use std::collections::HashSet;

use chrono::offset::LocalResult;
use chrono::{DateTime, NaiveDateTime, TimeZone};
use chrono_tz::Tz;
use thiserror::Error;

use crate::action::{Action, UnknownAction};
use crate::event::{Event, RawRecord};
use crate::types::{PositionId, SubjectId};

/// Formats for timestamps that carry an explicit offset.
const OFFSET_FORMATS: &[&str] = &["%Y-%m-%d %H:%M:%S%.f%#z", "%Y-%m-%dT%H:%M:%S%.f%#z"];

/// Formats for naive wall-clock timestamps.
const NAIVE_FORMATS: &[&str] = &[
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

/// Why a single record was excluded from a batch.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum NormalizeError {
    /// The record's timestamp or position could not be interpreted.
    #[error("malformed record: {reason}")]
    MalformedRecord { reason: String },

    /// The action string matched neither canonical verb.
    #[error(transparent)]
    UnknownAction(#[from] UnknownAction),

    /// The position is not in the monitored set.
    #[error("position is not monitored: {0}")]
    UnknownPosition(PositionId),
}

impl NormalizeError {
    fn malformed(reason: impl Into<String>) -> Self {
        Self::MalformedRecord {
            reason: reason.into(),
        }
    }
}

/// A record that was dropped during normalization.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    /// Position of the record in the input batch.
    pub index: usize,
    pub error: NormalizeError,
}

/// Output of normalizing a batch.
#[derive(Debug, Clone, Default)]
pub struct Normalized {
    /// Accepted events, in input order.
    pub events: Vec<Event>,
    pub rejected: Vec<Rejection>,
}

impl Normalized {
    /// Number of records dropped for the given reason.
    pub fn count_rejected(&self, predicate: impl Fn(&NormalizeError) -> bool) -> usize {
        self.rejected.iter().filter(|r| predicate(&r.error)).count()
    }
}

/// Converts raw records into [`Event`]s in a single canonical timezone.
#[derive(Debug, Clone)]
pub struct Normalizer {
    timezone: Tz,
    /// Monitored positions. Empty accepts every position.
    positions: HashSet<PositionId>,
}

impl Normalizer {
    /// Creates a normalizer that accepts every position.
    pub fn new(timezone: Tz) -> Self {
        Self {
            timezone,
            positions: HashSet::new(),
        }
    }

    /// Restricts accepted records to the given monitored positions.
    #[must_use]
    pub fn with_positions(mut self, positions: impl IntoIterator<Item = PositionId>) -> Self {
        self.positions = positions.into_iter().collect();
        self
    }

    /// The canonical timezone.
    pub const fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Normalizes one record.
    pub fn normalize_record(&self, record: &RawRecord) -> Result<Event, NormalizeError> {
        let position = PositionId::new(record.position.as_str())
            .map_err(|e| NormalizeError::malformed(e.to_string()))?;
        let timestamp = parse_timestamp(&record.timestamp, self.timezone)?;
        let action: Action = record.action.parse()?;

        if !self.positions.is_empty() && !self.positions.contains(&position) {
            return Err(NormalizeError::UnknownPosition(position));
        }

        let subject = record
            .subject
            .as_deref()
            .and_then(|s| SubjectId::new(s).ok());

        Ok(Event {
            position,
            action,
            timestamp,
            subject,
        })
    }

    /// Normalizes a batch. Bad records are dropped and reported; they never
    /// abort the rest of the batch.
    pub fn normalize(&self, records: &[RawRecord]) -> Normalized {
        let mut normalized = Normalized::default();
        for (index, record) in records.iter().enumerate() {
            match self.normalize_record(record) {
                Ok(event) => normalized.events.push(event),
                Err(error) => {
                    tracing::warn!(
                        index,
                        position = %record.position,
                        timestamp = %record.timestamp,
                        error = %error,
                        "dropping attendance record"
                    );
                    normalized.rejected.push(Rejection { index, error });
                }
            }
        }
        tracing::debug!(
            accepted = normalized.events.len(),
            rejected = normalized.rejected.len(),
            "normalized attendance records"
        );
        normalized
    }
}

/// Parses a timestamp string into the canonical timezone.
///
/// Offset-carrying values keep their instant. Naive values are read as
/// wall-clock time in `timezone`; an ambiguous wall-clock time (DST fall-back)
/// resolves to the earlier instant and a nonexistent one is malformed.
pub fn parse_timestamp(raw: &str, timezone: Tz) -> Result<DateTime<Tz>, NormalizeError> {
    let raw = raw.trim();

    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt.with_timezone(&timezone));
    }
    for format in OFFSET_FORMATS {
        if let Ok(dt) = DateTime::parse_from_str(raw, format) {
            return Ok(dt.with_timezone(&timezone));
        }
    }

    let naive = NAIVE_FORMATS
        .iter()
        .find_map(|format| NaiveDateTime::parse_from_str(raw, format).ok())
        .ok_or_else(|| NormalizeError::malformed(format!("unparsable timestamp {raw:?}")))?;

    match timezone.from_local_datetime(&naive) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => Ok(dt),
        LocalResult::None => Err(NormalizeError::malformed(format!(
            "timestamp {raw:?} does not exist in {timezone}"
        ))),
    }
}
