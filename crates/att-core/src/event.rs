//! Raw badge records and normalized attendance events.

use chrono::{DateTime, NaiveDate, NaiveTime};
use chrono_tz::Tz;
use serde::{Deserialize, Serialize};

use crate::action::Action;
use crate::types::{PositionId, SubjectId};

/// A badge record as produced by an event source, before normalization.
///
/// Every field is kept as the source wrote it; the timestamp may or may not
/// carry an offset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawRecord {
    pub position: String,
    pub action: String,
    pub timestamp: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
    /// Source-specific payload, carried through untouched.
    #[serde(default, alias = "metadata", skip_serializing_if = "Option::is_none")]
    pub raw_metadata: Option<serde_json::Value>,
}

/// One observed badge action, normalized into the canonical timezone.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Event {
    pub position: PositionId,
    pub action: Action,
    /// Always carries the canonical timezone.
    pub timestamp: DateTime<Tz>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<SubjectId>,
}

impl Event {
    /// The day this event belongs to, in the canonical timezone.
    pub fn calendar_date(&self) -> NaiveDate {
        self.timestamp.date_naive()
    }

    /// Time of day in the canonical timezone.
    pub fn clock_time(&self) -> NaiveTime {
        self.timestamp.time()
    }
}

/// An event that can be fed to the pairing algorithm.
///
/// This trait allows pairing to work with different event representations
/// (e.g. normalized [`Event`]s or lightweight test fixtures).
pub trait PairableEvent {
    /// Returns the event's timestamp in the canonical timezone.
    fn timestamp(&self) -> DateTime<Tz>;

    /// Returns whether this is an arrival or a departure.
    fn action(&self) -> Action;
}

impl<E: PairableEvent + ?Sized> PairableEvent for &E {
    fn timestamp(&self) -> DateTime<Tz> {
        (**self).timestamp()
    }

    fn action(&self) -> Action {
        (**self).action()
    }
}

impl PairableEvent for Event {
    fn timestamp(&self) -> DateTime<Tz> {
        self.timestamp
    }

    fn action(&self) -> Action {
        self.action
    }
}
