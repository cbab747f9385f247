//! Shared utilities for CLI commands.

use std::sync::LazyLock;

use anyhow::Context;
use chrono::{Duration, NaiveDate};
use regex::Regex;

/// Pre-compiled regex for relative day parsing.
static RELATIVE_DAY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d+)\s+(day|week)s?\s+ago$").unwrap());

/// Conservative bound for relative day parsing (~100 years).
const MAX_RELATIVE_DAYS: i64 = 100 * 366;

/// Parse a day as a calendar date or relative to `today`.
///
/// Supports:
/// - ISO 8601 date: "2026-01-15"
/// - Keywords: "today", "yesterday"
/// - Relative: "3 days ago", "1 week ago"
pub fn parse_day(s: &str, today: NaiveDate) -> anyhow::Result<NaiveDate> {
    let s = s.trim().to_lowercase();
    match s.as_str() {
        "today" => return Ok(today),
        "yesterday" => return Ok(today - Duration::days(1)),
        _ => {}
    }

    if let Ok(date) = NaiveDate::parse_from_str(&s, "%Y-%m-%d") {
        return Ok(date);
    }

    let Some(caps) = RELATIVE_DAY_RE.captures(&s) else {
        anyhow::bail!(
            "Invalid day: {s}. Use YYYY-MM-DD, 'today', 'yesterday' or relative (e.g., '3 days ago')"
        );
    };

    let n: i64 = caps[1]
        .parse()
        .context("failed to parse number in relative day")?;
    let days = match &caps[2] {
        "day" => n,
        "week" => n.saturating_mul(7),
        unit => anyhow::bail!("Unknown day unit: {unit}"),
    };

    if days > MAX_RELATIVE_DAYS {
        anyhow::bail!("Relative day value too large: {s}");
    }

    Ok(today - Duration::days(days))
}
