//! Arrival/departure pairing.
//!
//! # Algorithm Summary
//!
//! Events for one position and one day are matched greedily in time order:
//!
//! 1. Stable-sort events by timestamp (ties keep their input order)
//! 2. Arrivals join a FIFO queue of open arrivals
//! 3. A departure closes the earliest open arrival strictly before it, or is
//!    reported as [`IntervalStatus::MissingArrival`] when there is none
//! 4. Arrivals still open at the end become [`IntervalStatus::MissingDeparture`]
//!
//! Every input event lands in exactly one output interval.

use std::collections::VecDeque;

use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;

use crate::action::Action;
use crate::event::PairableEvent;
use crate::types::PositionId;

/// Classification of a reconciled interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IntervalStatus {
    Complete,
    MissingDeparture,
    MissingArrival,
}

/// One reconciled work span.
///
/// At least one of `arrival`/`departure` is always present.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttendanceInterval {
    pub position: PositionId,
    pub arrival: Option<DateTime<Tz>>,
    pub departure: Option<DateTime<Tz>>,
    pub status: IntervalStatus,
}

impl AttendanceInterval {
    fn complete(position: &PositionId, arrival: DateTime<Tz>, departure: DateTime<Tz>) -> Self {
        Self {
            position: position.clone(),
            arrival: Some(arrival),
            departure: Some(departure),
            status: IntervalStatus::Complete,
        }
    }

    fn missing_arrival(position: &PositionId, departure: DateTime<Tz>) -> Self {
        Self {
            position: position.clone(),
            arrival: None,
            departure: Some(departure),
            status: IntervalStatus::MissingArrival,
        }
    }

    fn missing_departure(position: &PositionId, arrival: DateTime<Tz>) -> Self {
        Self {
            position: position.clone(),
            arrival: Some(arrival),
            departure: None,
            status: IntervalStatus::MissingDeparture,
        }
    }

    /// Number of badge events this interval accounts for.
    pub fn event_count(&self) -> usize {
        usize::from(self.arrival.is_some()) + usize::from(self.departure.is_some())
    }
}

/// Pairs the events of one `(position, day)` group into intervals.
///
/// Input order only matters between events with identical timestamps.
/// Complete and missing-arrival intervals come first, in the order their
/// departures were processed, followed by missing-departure intervals in
/// arrival order.
pub fn pair_events<E: PairableEvent>(
    position: &PositionId,
    events: &[E],
) -> Vec<AttendanceInterval> {
    let mut ordered: Vec<(DateTime<Tz>, Action)> = events
        .iter()
        .map(|e| (e.timestamp(), e.action()))
        .collect();
    // Stable, so simultaneous events keep their record order.
    ordered.sort_by_key(|(timestamp, _)| *timestamp);

    let mut open_arrivals: VecDeque<DateTime<Tz>> = VecDeque::new();
    let mut intervals = Vec::with_capacity(ordered.len());

    for (timestamp, action) in ordered {
        match action {
            Action::Arrival => open_arrivals.push_back(timestamp),
            Action::Departure => {
                // The queue is filled in time order, so the front is the
                // earliest open arrival. Equal instants never pair.
                match open_arrivals.front() {
                    Some(&arrival) if arrival < timestamp => {
                        open_arrivals.pop_front();
                        intervals.push(AttendanceInterval::complete(position, arrival, timestamp));
                    }
                    _ => intervals.push(AttendanceInterval::missing_arrival(position, timestamp)),
                }
            }
        }
    }

    intervals.extend(
        open_arrivals
            .into_iter()
            .map(|arrival| AttendanceInterval::missing_departure(position, arrival)),
    );
    intervals
}
