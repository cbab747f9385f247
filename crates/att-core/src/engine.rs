//! Reconciliation across positions and days.
//!
//! Normalized events are partitioned by `(position, calendar date)` (and
//! optionally subject), and each partition is paired on its own. Partitions
//! share nothing, so they are processed in parallel.

use std::collections::BTreeMap;

use chrono::NaiveDate;
use rayon::prelude::*;
use serde::Serialize;

use crate::event::{Event, RawRecord};
use crate::normalize::{NormalizeError, Normalizer, Rejection};
use crate::pairing::{AttendanceInterval, pair_events};
use crate::shift::{ShiftPlan, ShiftWindow, pair_by_shift};
use crate::types::{PositionId, SubjectId};

/// Knobs for a reconciliation run.
#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    /// Reconcile each shift window separately instead of the whole day.
    pub shifts: Option<ShiftPlan>,
    /// Keep each subject's events apart within a position. When off, or when
    /// the source records no subject, reconciliation is position-scoped.
    pub group_by_subject: bool,
}

/// Counts of records that did not make it into any interval.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub malformed_records: usize,
    pub unknown_actions: usize,
    pub unknown_positions: usize,
    pub no_window_match: usize,
}

impl Diagnostics {
    /// Tallies normalization rejections.
    pub fn from_rejections(rejected: &[Rejection]) -> Self {
        let mut diagnostics = Self::default();
        for rejection in rejected {
            match rejection.error {
                NormalizeError::MalformedRecord { .. } => diagnostics.malformed_records += 1,
                NormalizeError::UnknownAction(_) => diagnostics.unknown_actions += 1,
                NormalizeError::UnknownPosition(_) => diagnostics.unknown_positions += 1,
            }
        }
        diagnostics
    }

    pub const fn total(&self) -> usize {
        self.malformed_records + self.unknown_actions + self.unknown_positions + self.no_window_match
    }

    pub const fn is_empty(&self) -> bool {
        self.total() == 0
    }
}

/// Reconciled intervals for one position on one day (and one shift window,
/// when shifts are configured).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayReport {
    pub position: PositionId,
    pub date: NaiveDate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub subject: Option<SubjectId>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shift: Option<ShiftWindow>,
    pub intervals: Vec<AttendanceInterval>,
}

/// Result of a reconciliation run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reconciliation {
    /// Sorted by position, then date, then subject; shift windows in plan order.
    pub days: Vec<DayReport>,
    pub diagnostics: Diagnostics,
}

type GroupKey = (PositionId, NaiveDate, Option<SubjectId>);

/// Normalizes raw records and reconciles them.
pub fn reconcile_records(
    records: &[RawRecord],
    normalizer: &Normalizer,
    options: &ReconcileOptions,
) -> Reconciliation {
    let normalized = normalizer.normalize(records);
    let rejected = Diagnostics::from_rejections(&normalized.rejected);
    let mut reconciliation = reconcile_events(normalized.events, options);
    reconciliation.diagnostics.malformed_records = rejected.malformed_records;
    reconciliation.diagnostics.unknown_actions = rejected.unknown_actions;
    reconciliation.diagnostics.unknown_positions = rejected.unknown_positions;
    reconciliation
}

/// Reconciles already-normalized events.
///
/// Events may span any number of positions and days. Within a group, input
/// order only breaks ties between identical timestamps.
pub fn reconcile_events(events: Vec<Event>, options: &ReconcileOptions) -> Reconciliation {
    let event_count = events.len();
    let mut groups: BTreeMap<GroupKey, Vec<Event>> = BTreeMap::new();
    for event in events {
        let subject = if options.group_by_subject {
            event.subject.clone()
        } else {
            None
        };
        let key = (event.position.clone(), event.calendar_date(), subject);
        groups.entry(key).or_default().push(event);
    }
    let groups: Vec<(GroupKey, Vec<Event>)> = groups.into_iter().collect();

    let results: Vec<(Vec<DayReport>, usize)> = groups
        .par_iter()
        .map(|((position, date, subject), events)| {
            let Some(plan) = &options.shifts else {
                let report = DayReport {
                    position: position.clone(),
                    date: *date,
                    subject: subject.clone(),
                    shift: None,
                    intervals: pair_events(position, events),
                };
                return (vec![report], 0);
            };

            let by_shift = pair_by_shift(position, events, plan);
            let reports = by_shift
                .shifts
                .into_iter()
                .filter(|(_, intervals)| !intervals.is_empty())
                .map(|(window, intervals)| DayReport {
                    position: position.clone(),
                    date: *date,
                    subject: subject.clone(),
                    shift: Some(window),
                    intervals,
                })
                .collect();
            (reports, by_shift.no_window_match)
        })
        .collect();

    let mut reconciliation = Reconciliation::default();
    for (reports, no_window_match) in results {
        reconciliation.days.extend(reports);
        reconciliation.diagnostics.no_window_match += no_window_match;
    }

    tracing::debug!(
        events = event_count,
        groups = groups.len(),
        reports = reconciliation.days.len(),
        no_window_match = reconciliation.diagnostics.no_window_match,
        "reconciled attendance"
    );
    reconciliation
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono_tz::Europe::Bratislava;

    use crate::pairing::IntervalStatus;

    fn record(position: &str, action: &str, timestamp: &str) -> RawRecord {
        RawRecord {
            position: position.to_string(),
            action: action.to_string(),
            timestamp: timestamp.to_string(),
            subject: None,
            raw_metadata: None,
        }
    }

    fn with_subject(mut record: RawRecord, subject: &str) -> RawRecord {
        record.subject = Some(subject.to_string());
        record
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn statuses(report: &DayReport) -> Vec<IntervalStatus> {
        report.intervals.iter().map(|i| i.status).collect()
    }

    #[test]
    fn groups_by_position_and_local_date() {
        let records = vec![
            record("CCTV", "Príchod", "2025-01-15T06:00:00"),
            record("Brány", "Príchod", "2025-01-15T07:00:00"),
            // 23:30 UTC is already the 15th in Bratislava.
            record("CCTV", "Odchod", "2025-01-14T23:30:00Z"),
            record("CCTV", "Odchod", "2025-01-15T14:00:00"),
            record("CCTV", "Príchod", "2025-01-14T22:00:00"),
        ];

        let result = reconcile_records(
            &records,
            &Normalizer::new(Bratislava),
            &ReconcileOptions::default(),
        );

        let keys: Vec<_> = result
            .days
            .iter()
            .map(|d| (d.position.to_string(), d.date))
            .collect();
        assert_eq!(
            keys,
            vec![
                ("Brány".to_string(), date(2025, 1, 15)),
                ("CCTV".to_string(), date(2025, 1, 14)),
                ("CCTV".to_string(), date(2025, 1, 15)),
            ]
        );
        assert_eq!(statuses(&result.days[0]), vec![IntervalStatus::MissingDeparture]);
        assert_eq!(statuses(&result.days[1]), vec![IntervalStatus::MissingDeparture]);
        assert_eq!(
            statuses(&result.days[2]),
            vec![IntervalStatus::MissingArrival, IntervalStatus::Complete]
        );
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn counts_are_conserved_across_groups() {
        let records = vec![
            record("CCTV", "in", "2025-01-15T08:00:00"),
            record("CCTV", "in", "2025-01-15T08:05:00"),
            record("CCTV", "out", "2025-01-15T16:00:00"),
            record("Sklad2", "out", "2025-01-15T09:00:00"),
            record("Sklad2", "in", "2025-01-16T09:00:00"),
            record("Sklad2", "out", "2025-01-16T09:00:00"),
            record("Sklad2", "lunch", "2025-01-16T12:00:00"),
            record("Sklad2", "out", "garbage"),
        ];

        let result = reconcile_records(
            &records,
            &Normalizer::new(Bratislava),
            &ReconcileOptions::default(),
        );

        let intervals: Vec<_> = result.days.iter().flat_map(|d| &d.intervals).collect();
        let complete = intervals
            .iter()
            .filter(|i| i.status == IntervalStatus::Complete)
            .count();
        assert_eq!(complete * 2 + (intervals.len() - complete), 6);
        assert_eq!(result.diagnostics.malformed_records, 1);
        assert_eq!(result.diagnostics.unknown_actions, 1);
        assert_eq!(result.diagnostics.total(), 2);
    }

    #[test]
    fn subject_grouping_is_opt_in() {
        let records = vec![
            with_subject(record("CCTV", "in", "2025-01-15T08:00:00"), "anna"),
            with_subject(record("CCTV", "in", "2025-01-15T08:10:00"), "boris"),
            with_subject(record("CCTV", "out", "2025-01-15T16:00:00"), "boris"),
        ];
        let normalizer = Normalizer::new(Bratislava);

        let scoped = reconcile_records(&records, &normalizer, &ReconcileOptions::default());
        assert_eq!(scoped.days.len(), 1);
        let first = &scoped.days[0].intervals[0];
        assert_eq!(first.status, IntervalStatus::Complete);
        assert_eq!(
            first.arrival.map(|a| a.format("%H:%M").to_string()),
            Some("08:00".to_string()),
            "position-scoped pairing matches the earliest arrival regardless of badge"
        );

        let per_subject = reconcile_records(
            &records,
            &normalizer,
            &ReconcileOptions {
                group_by_subject: true,
                ..ReconcileOptions::default()
            },
        );
        let subjects: Vec<_> = per_subject
            .days
            .iter()
            .map(|d| (d.subject.as_ref().map(ToString::to_string), statuses(d)))
            .collect();
        assert_eq!(
            subjects,
            vec![
                (Some("anna".to_string()), vec![IntervalStatus::MissingDeparture]),
                (Some("boris".to_string()), vec![IntervalStatus::Complete]),
            ]
        );
    }

    #[test]
    fn shift_plan_splits_reports_per_window() {
        let plan = ShiftPlan::new(vec![
            "06:00-14:00".parse().unwrap(),
            "14:00-22:00".parse().unwrap(),
        ])
        .unwrap();
        let records = vec![
            record("Turniket2", "Príchod", "2025-01-15T13:55:00"),
            record("Turniket2", "Odchod", "2025-01-15T14:05:00"),
            record("Turniket2", "Odchod", "2025-01-15T23:15:00"),
        ];

        let result = reconcile_records(
            &records,
            &Normalizer::new(Bratislava),
            &ReconcileOptions {
                shifts: Some(plan),
                group_by_subject: false,
            },
        );

        let shifts: Vec<_> = result
            .days
            .iter()
            .map(|d| (d.shift.map(|s| s.to_string()), statuses(d)))
            .collect();
        assert_eq!(
            shifts,
            vec![
                (
                    Some("06:00-14:00".to_string()),
                    vec![IntervalStatus::MissingDeparture]
                ),
                (
                    Some("14:00-22:00".to_string()),
                    vec![IntervalStatus::MissingArrival]
                ),
            ]
        );
        assert_eq!(result.diagnostics.no_window_match, 1);
    }

    #[test]
    fn rerun_is_identical() {
        let records = vec![
            record("CCTV", "in", "2025-01-15T08:00:00"),
            record("CCTV", "out", "2025-01-15T08:00:00"),
            record("CCTV", "out", "2025-01-15T12:00:00"),
        ];
        let normalizer = Normalizer::new(Bratislava);
        let options = ReconcileOptions::default();

        let first = reconcile_records(&records, &normalizer, &options);
        let second = reconcile_records(&records, &normalizer, &options);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn empty_input_is_not_an_error() {
        let result = reconcile_events(Vec::new(), &ReconcileOptions::default());
        assert!(result.days.is_empty());
        assert!(result.diagnostics.is_empty());
    }

    #[test]
    fn json_shape_is_stable() {
        let records = vec![
            record("CCTV", "Príchod", "2025-01-15T08:00:00"),
            record("CCTV", "Odchod", "2025-01-15T16:00:00"),
        ];
        let result = reconcile_records(
            &records,
            &Normalizer::new(Bratislava),
            &ReconcileOptions::default(),
        );
        let json = serde_json::to_string_pretty(&result.days).unwrap();
        insta::assert_snapshot!(json, @r#"
        [
          {
            "position": "CCTV",
            "date": "2025-01-15",
            "intervals": [
              {
                "position": "CCTV",
                "arrival": "2025-01-15T08:00:00+01:00",
                "departure": "2025-01-15T16:00:00+01:00",
                "status": "complete"
              }
            ]
          }
        ]
        "#);
    }
}
