//! Shift-window classification.
//!
//! Some deployments split a day into fixed shift windows (e.g. `06:00-14:00`,
//! `14:00-22:00`) and reconcile each window on its own. A pair that straddles
//! a boundary is never merged across windows.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveTime;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::event::PairableEvent;
use crate::pairing::{AttendanceInterval, pair_events};
use crate::types::PositionId;

/// Errors building shift windows or plans.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ShiftError {
    /// The window string is not `HH:MM-HH:MM`.
    #[error("invalid shift window {0:?}, expected HH:MM-HH:MM")]
    InvalidFormat(String),

    /// The window ends at or before its start.
    #[error("shift window {0} must end after it starts")]
    EmptyWindow(String),

    /// Windows overlap or are not in ascending order.
    #[error("shift windows {previous} and {next} overlap or are out of order")]
    Overlap { previous: String, next: String },

    /// A plan needs at least one window.
    #[error("a shift plan needs at least one window")]
    NoWindows,
}

/// A clock-time range within a day.
///
/// `end == None` means the window runs to the end of the day (`24:00`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShiftWindow {
    start: NaiveTime,
    end: Option<NaiveTime>,
}

impl ShiftWindow {
    /// Creates a window, rejecting empty ranges.
    pub fn new(start: NaiveTime, end: Option<NaiveTime>) -> Result<Self, ShiftError> {
        let window = Self { start, end };
        if end.is_some_and(|end| end <= start) {
            return Err(ShiftError::EmptyWindow(window.to_string()));
        }
        Ok(window)
    }

    pub const fn start(&self) -> NaiveTime {
        self.start
    }

    pub const fn end(&self) -> Option<NaiveTime> {
        self.end
    }

    /// Whether `time` falls in `[start, end)`, or `[start, end]` when
    /// `inclusive_end` is set.
    pub fn contains(&self, time: NaiveTime, inclusive_end: bool) -> bool {
        if time < self.start {
            return false;
        }
        match self.end {
            None => true,
            Some(end) => time < end || (inclusive_end && time == end),
        }
    }
}

impl fmt::Display for ShiftWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-", self.start.format("%H:%M"))?;
        match self.end {
            Some(end) => write!(f, "{}", end.format("%H:%M")),
            None => write!(f, "24:00"),
        }
    }
}

fn parse_clock(raw: &str, whole: &str) -> Result<NaiveTime, ShiftError> {
    NaiveTime::parse_from_str(raw.trim(), "%H:%M")
        .map_err(|_| ShiftError::InvalidFormat(whole.to_string()))
}

impl FromStr for ShiftWindow {
    type Err = ShiftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (start, end) = s
            .split_once('-')
            .ok_or_else(|| ShiftError::InvalidFormat(s.to_string()))?;
        let start = parse_clock(start, s)?;
        let end = match end.trim() {
            "24:00" => None,
            end => Some(parse_clock(end, s)?),
        };
        Self::new(start, end)
    }
}

impl TryFrom<String> for ShiftWindow {
    type Error = ShiftError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<ShiftWindow> for String {
    fn from(window: ShiftWindow) -> Self {
        window.to_string()
    }
}

/// An ordered list of non-overlapping shift windows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftPlan {
    windows: Vec<ShiftWindow>,
}

impl ShiftPlan {
    /// Validates that windows are non-empty, ascending, and non-overlapping.
    ///
    /// Gaps between windows are allowed; events falling in a gap are
    /// reported as unmatched.
    pub fn new(windows: Vec<ShiftWindow>) -> Result<Self, ShiftError> {
        if windows.is_empty() {
            return Err(ShiftError::NoWindows);
        }
        for pair in windows.windows(2) {
            let (previous, next) = (pair[0], pair[1]);
            let ordered = previous.end.is_some_and(|end| end <= next.start);
            if !ordered {
                return Err(ShiftError::Overlap {
                    previous: previous.to_string(),
                    next: next.to_string(),
                });
            }
        }
        Ok(Self { windows })
    }

    pub fn windows(&self) -> &[ShiftWindow] {
        &self.windows
    }

    /// Index of the window containing `time`. The last window includes its end.
    pub fn window_index(&self, time: NaiveTime) -> Option<usize> {
        let last = self.windows.len() - 1;
        self.windows
            .iter()
            .enumerate()
            .find(|(i, window)| window.contains(time, *i == last))
            .map(|(i, _)| i)
    }
}

/// Intervals reconciled per shift window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ShiftReconciliation {
    /// One entry per plan window, in plan order.
    pub shifts: Vec<(ShiftWindow, Vec<AttendanceInterval>)>,
    /// Events outside every window.
    pub no_window_match: usize,
}

impl ShiftReconciliation {
    /// All intervals, window by window.
    pub fn intervals(&self) -> impl Iterator<Item = &AttendanceInterval> {
        self.shifts.iter().flat_map(|(_, intervals)| intervals.iter())
    }
}

/// Partitions one day's events by shift window and pairs each window independently.
pub fn pair_by_shift<E: PairableEvent>(
    position: &PositionId,
    events: &[E],
    plan: &ShiftPlan,
) -> ShiftReconciliation {
    let mut partitions: Vec<Vec<&E>> = vec![Vec::new(); plan.windows.len()];
    let mut no_window_match = 0;

    for event in events {
        let timestamp = event.timestamp();
        match plan.window_index(timestamp.time()) {
            Some(index) => partitions[index].push(event),
            None => {
                no_window_match += 1;
                tracing::warn!(
                    %position,
                    timestamp = %timestamp.to_rfc3339(),
                    "event falls outside every shift window"
                );
            }
        }
    }

    let shifts = plan
        .windows
        .iter()
        .zip(partitions)
        .map(|(window, events)| (*window, pair_events(position, &events)))
        .collect();

    ShiftReconciliation {
        shifts,
        no_window_match,
    }
}
