//! JSON Lines badge exports.
//!
//! One [`RawRecord`] per line. Lines that are not valid JSON are skipped with
//! a warning; record-level problems are left to the normalizer.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::PathBuf;

use att_core::{EventLoader, RawRecord, TimeWindow, Tz, parse_timestamp};
use chrono::Utc;

/// Records parsed from a JSONL stream.
#[derive(Debug, Default)]
pub struct ParsedLines {
    pub records: Vec<RawRecord>,
    pub invalid_lines: usize,
}

/// Reads JSONL records, skipping blank lines.
pub fn read_records<R: BufRead>(reader: R) -> io::Result<ParsedLines> {
    let mut parsed = ParsedLines::default();
    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        match serde_json::from_str::<RawRecord>(&line) {
            Ok(record) => parsed.records.push(record),
            Err(e) => {
                parsed.invalid_lines += 1;
                tracing::warn!(line = index + 1, error = %e, "skipping invalid JSONL line");
            }
        }
    }
    Ok(parsed)
}

/// Loads records straight from a JSONL export instead of the database.
#[derive(Debug, Clone)]
pub struct JsonlLoader {
    path: PathBuf,
    timezone: Tz,
}

impl JsonlLoader {
    /// `timezone` is used to place naive timestamps when filtering by window.
    pub const fn new(path: PathBuf, timezone: Tz) -> Self {
        Self { path, timezone }
    }
}

impl EventLoader for JsonlLoader {
    type Error = io::Error;

    /// Records with unparsable timestamps are passed through so the
    /// normalizer can report them.
    fn load(&self, window: &TimeWindow) -> Result<Vec<RawRecord>, Self::Error> {
        let file = File::open(&self.path)?;
        let parsed = read_records(BufReader::new(file))?;
        let records: Vec<RawRecord> = parsed
            .records
            .into_iter()
            .filter(|record| {
                parse_timestamp(&record.timestamp, self.timezone)
                    .map_or(true, |ts| window.contains(ts.with_timezone(&Utc)))
            })
            .collect();
        tracing::debug!(
            path = %self.path.display(),
            records = records.len(),
            invalid_lines = parsed.invalid_lines,
            "loaded JSONL export"
        );
        Ok(records)
    }
}
