//! Core reconciliation logic for the attendance dashboard.
//!
//! This crate contains the pure, I/O-free parts of the system:
//! - Normalization: raw badge records into canonical-timezone events
//! - Pairing: arrival/departure events into attendance intervals
//! - Shift windows: optional per-shift scoping of the pairing
//! - The loader contract the storage layer implements

pub mod action;
mod engine;
pub mod event;
pub mod loader;
pub mod normalize;
pub mod pairing;
pub mod shift;
pub mod types;

pub use action::{Action, UnknownAction};
pub use chrono_tz::Tz;
pub use engine::{
    DayReport, Diagnostics, ReconcileOptions, Reconciliation, reconcile_events, reconcile_records,
};
pub use event::{Event, PairableEvent, RawRecord};
pub use loader::{EventLoader, TimeWindow, WindowError};
pub use normalize::{NormalizeError, Normalized, Normalizer, Rejection, parse_timestamp};
pub use pairing::{AttendanceInterval, IntervalStatus, pair_events};
pub use shift::{ShiftError, ShiftPlan, ShiftReconciliation, ShiftWindow, pair_by_shift};
pub use types::{PositionId, SubjectId, ValidationError};
