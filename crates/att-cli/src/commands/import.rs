//! Import command: stores badge records from a JSONL export.
//!
//! Records are normalized on the way in so the store can index them by
//! instant. Rejected records are reported and skipped; the rest of the batch
//! is still stored.

use std::io::{BufRead, Write};

use anyhow::{Context, Result};
use att_core::Normalizer;
use att_db::{Database, ImportBatch};
use chrono::Utc;

use crate::Config;
use crate::jsonl::read_records;

/// Counts from one import.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ImportSummary {
    pub read: usize,
    pub inserted: usize,
    pub duplicates: usize,
    pub rejected: usize,
}

/// Runs the import command, reading JSONL from `reader`.
pub fn run<R: BufRead, W: Write>(
    reader: R,
    writer: &mut W,
    db: &mut Database,
    config: &Config,
) -> Result<ImportSummary> {
    let parsed = read_records(reader).context("failed to read records")?;
    let normalizer = Normalizer::new(config.canonical_timezone()?);

    let mut batch = ImportBatch::new();
    let mut rejected = parsed.invalid_lines;
    for (index, record) in parsed.records.iter().enumerate() {
        match normalizer.normalize_record(record) {
            Ok(event) => batch.push(record, event.timestamp.with_timezone(&Utc)),
            Err(error) => {
                rejected += 1;
                tracing::warn!(index, error = %error, "rejecting record on import");
            }
        }
    }

    let inserted = db.insert_records(batch.rows())?;
    let summary = ImportSummary {
        read: parsed.records.len() + parsed.invalid_lines,
        inserted,
        duplicates: batch.len() - inserted,
        rejected,
    };

    writeln!(
        writer,
        "Imported {} of {} records ({} duplicates, {} rejected)",
        summary.inserted, summary.read, summary.duplicates, summary.rejected
    )?;
    Ok(summary)
}

#[cfg(test)]
mod tests {
    use super::*;

    use att_core::{
        EventLoader, IntervalStatus, ReconcileOptions, TimeWindow, Tz, reconcile_records,
    };
    use chrono::TimeZone;

    const EXPORT: &str = r#"{"position":"CCTV","action":"Príchod","timestamp":"2025-01-15T08:00:00","subject":"badge-1"}
{"position":"CCTV","action":"Odchod","timestamp":"2025-01-15 16:00:00+01:00"}
{"position":"CCTV","action":"Obed","timestamp":"2025-01-15T12:00:00"}
{"position":"CCTV","action":"Odchod","timestamp":"half past nine"}
{broken
"#;

    fn config() -> Config {
        Config {
            timezone: "Europe/Bratislava".to_string(),
            ..Config::default()
        }
    }

    #[test]
    fn import_stores_valid_records_and_counts_the_rest() {
        let mut db = Database::open_in_memory().unwrap();
        let mut output = Vec::new();

        let summary = run(EXPORT.as_bytes(), &mut output, &mut db, &config()).unwrap();

        assert_eq!(
            summary,
            ImportSummary {
                read: 5,
                inserted: 2,
                duplicates: 0,
                rejected: 3,
            }
        );
        assert_eq!(
            String::from_utf8(output).unwrap(),
            "Imported 2 of 5 records (0 duplicates, 3 rejected)\n"
        );

        let window = TimeWindow::new(
            Utc.with_ymd_and_hms(2025, 1, 15, 0, 0, 0).unwrap(),
            Utc.with_ymd_and_hms(2025, 1, 16, 0, 0, 0).unwrap(),
        )
        .unwrap();
        let stored = db.load(&window).unwrap();
        let timestamps: Vec<_> = stored.iter().map(|r| r.timestamp.as_str()).collect();
        assert_eq!(
            timestamps,
            vec!["2025-01-15T08:00:00", "2025-01-15 16:00:00+01:00"],
            "raw timestamps are stored as written"
        );
        assert_eq!(stored[0].subject.as_deref(), Some("badge-1"));
    }

    #[test]
    fn reimport_counts_duplicates() {
        let mut db = Database::open_in_memory().unwrap();
        run(EXPORT.as_bytes(), &mut Vec::new(), &mut db, &config()).unwrap();

        let summary = run(EXPORT.as_bytes(), &mut Vec::new(), &mut db, &config()).unwrap();

        assert_eq!(summary.inserted, 0);
        assert_eq!(summary.duplicates, 2);
    }

    #[test]
    fn repeated_swipes_survive_the_store() {
        let export = r#"{"position":"CCTV","action":"Príchod","timestamp":"2025-01-15T08:00:00","metadata":{"seq":1}}
{"position":"CCTV","action":"Príchod","timestamp":"2025-01-15T08:00:00","metadata":{"seq":1}}
{"position":"CCTV","action":"Odchod","timestamp":"2025-01-15T16:00:00"}
"#;
        let mut db = Database::open_in_memory().unwrap();
        let summary = run(export.as_bytes(), &mut Vec::new(), &mut db, &config()).unwrap();
        assert_eq!(summary.inserted, 3);
        assert_eq!(summary.duplicates, 0);

        let window = TimeWindow::days(
            Tz::Europe__Bratislava,
            chrono::NaiveDate::from_ymd_opt(2025, 1, 15).unwrap(),
            1,
        )
        .unwrap();
        let records = db.load(&window).unwrap();
        let normalizer = Normalizer::new(Tz::Europe__Bratislava);
        let reconciliation = reconcile_records(&records, &normalizer, &ReconcileOptions::default());

        let statuses: Vec<_> = reconciliation.days[0]
            .intervals
            .iter()
            .map(|i| i.status)
            .collect();
        assert_eq!(
            statuses,
            vec![IntervalStatus::Complete, IntervalStatus::MissingDeparture]
        );
    }
}
