//! The event source contract and the time windows it is queried with.

use chrono::offset::LocalResult;
use chrono::{DateTime, Days, Duration, NaiveDate, NaiveTime, TimeZone, Utc};
use chrono_tz::Tz;
use thiserror::Error;

use crate::event::RawRecord;

/// Errors building a [`TimeWindow`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum WindowError {
    #[error("window end {end} must be after start {start}")]
    Inverted {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("a day window must span at least one day")]
    NoDays,

    #[error("{days} days ending {last_day} is outside the supported date range")]
    OutOfRange { last_day: NaiveDate, days: u32 },
}

/// A half-open time range `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeWindow {
    start: DateTime<Utc>,
    end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, WindowError> {
        if end <= start {
            return Err(WindowError::Inverted { start, end });
        }
        Ok(Self { start, end })
    }

    /// The `days` calendar days ending with `last_day`, with day boundaries
    /// taken in `timezone` rather than UTC.
    pub fn days(timezone: Tz, last_day: NaiveDate, days: u32) -> Result<Self, WindowError> {
        if days == 0 {
            return Err(WindowError::NoDays);
        }
        let out_of_range = || WindowError::OutOfRange { last_day, days };
        let first_day = last_day
            .checked_sub_days(Days::new(u64::from(days - 1)))
            .ok_or_else(out_of_range)?;
        let after_last = last_day
            .checked_add_days(Days::new(1))
            .ok_or_else(out_of_range)?;
        Self::new(
            local_midnight_to_utc(timezone, first_day),
            local_midnight_to_utc(timezone, after_last),
        )
    }

    pub const fn start(&self) -> DateTime<Utc> {
        self.start
    }

    pub const fn end(&self) -> DateTime<Utc> {
        self.end
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant < self.end
    }
}

/// Converts local midnight of `date` to UTC.
/// DST ambiguity picks the earlier instant.
fn local_midnight_to_utc(timezone: Tz, date: NaiveDate) -> DateTime<Utc> {
    let midnight = date.and_time(NaiveTime::MIN);
    match timezone.from_local_datetime(&midnight) {
        LocalResult::Single(dt) | LocalResult::Ambiguous(dt, _) => dt.with_timezone(&Utc),
        // Midnight skipped by a spring-forward transition; the day starts
        // at the first wall-clock hour that exists.
        LocalResult::None => timezone
            .from_local_datetime(&(midnight + Duration::hours(1)))
            .earliest()
            .map_or_else(
                || Utc.from_utc_datetime(&midnight),
                |dt| dt.with_timezone(&Utc),
            ),
    }
}

/// A source of raw badge records.
///
/// Implementations own I/O, blocking and retries. The reconciliation engine
/// only ever sees the returned records.
pub trait EventLoader {
    type Error: std::error::Error + Send + Sync + 'static;

    /// Returns every record whose instant falls inside `window`, in the order
    /// the source stores them.
    fn load(&self, window: &TimeWindow) -> Result<Vec<RawRecord>, Self::Error>;
}

#[cfg(test)]
mod tests {
    use super::*;

    use chrono_tz::America::Sao_Paulo;
    use chrono_tz::Europe::Bratislava;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn utc(y: i32, m: u32, d: u32, h: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, 0, 0).unwrap()
    }

    #[test]
    fn day_window_uses_local_midnight() {
        let window = TimeWindow::days(Bratislava, date(2025, 1, 15), 2).unwrap();
        assert_eq!(window.start(), utc(2025, 1, 13, 23));
        assert_eq!(window.end(), utc(2025, 1, 15, 23));
    }

    #[test]
    fn window_is_half_open() {
        let window = TimeWindow::new(utc(2025, 1, 15, 0), utc(2025, 1, 16, 0)).unwrap();
        assert!(window.contains(utc(2025, 1, 15, 0)));
        assert!(window.contains(utc(2025, 1, 15, 23)));
        assert!(!window.contains(utc(2025, 1, 16, 0)));
    }

    #[test]
    fn invalid_windows_are_rejected() {
        assert_eq!(
            TimeWindow::days(Bratislava, date(2025, 1, 15), 0),
            Err(WindowError::NoDays)
        );
        assert!(matches!(
            TimeWindow::new(utc(2025, 1, 16, 0), utc(2025, 1, 15, 0)),
            Err(WindowError::Inverted { .. })
        ));
    }

    #[test]
    fn oversized_day_spans_are_errors() {
        let last_day = date(2025, 1, 15);
        assert_eq!(
            TimeWindow::days(Bratislava, last_day, u32::MAX),
            Err(WindowError::OutOfRange {
                last_day,
                days: u32::MAX
            })
        );
        assert_eq!(
            TimeWindow::days(Bratislava, NaiveDate::MAX, 1),
            Err(WindowError::OutOfRange {
                last_day: NaiveDate::MAX,
                days: 1
            })
        );
    }

    #[test]
    fn day_window_spans_dst_change() {
        // The fall-back day in Bratislava lasts 25 hours.
        let window = TimeWindow::days(Bratislava, date(2025, 10, 26), 1).unwrap();
        assert_eq!((window.end() - window.start()).num_hours(), 25);
    }

    #[test]
    fn skipped_midnight_starts_day_at_first_valid_hour() {
        // Sao Paulo skipped midnight on 2018-11-04.
        let window = TimeWindow::days(Sao_Paulo, date(2018, 11, 4), 1).unwrap();
        assert_eq!(window.start(), utc(2018, 11, 4, 3));
    }
}
