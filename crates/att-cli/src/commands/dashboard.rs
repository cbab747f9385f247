//! Dashboard command: the supervisor's attendance overview.
//!
//! Loads raw records for a span of days, reconciles them per position and
//! day, and renders one block per position/day, newest day first.

use std::io::Write;

use anyhow::{Context, Result};
use att_core::{
    AttendanceInterval, DayReport, Diagnostics, EventLoader, Normalizer, ReconcileOptions,
    TimeWindow, Tz, reconcile_records,
};
use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::Config;
use crate::session::Session;

/// Placeholder for an absent arrival or departure.
const MISSING: &str = "—";

/// What to show.
#[derive(Debug, Clone)]
pub struct DashboardArgs {
    /// Most recent day shown.
    pub last_day: NaiveDate,
    /// Number of days ending with `last_day`.
    pub days: u32,
    /// Only show these positions. Empty shows all.
    pub positions: Vec<String>,
    pub json: bool,
}

/// Computed dashboard data.
#[derive(Debug, Serialize)]
pub struct DashboardData {
    pub generated_at: DateTime<Utc>,
    pub viewer: String,
    pub timezone: String,
    pub first_day: NaiveDate,
    pub last_day: NaiveDate,
    pub days: Vec<DayReport>,
    pub diagnostics: Diagnostics,
}

/// Today's date in the canonical timezone.
pub fn today_in(timezone: Tz) -> NaiveDate {
    Utc::now().with_timezone(&timezone).date_naive()
}

/// Loads, reconciles and orders the data for a dashboard.
pub fn build<L: EventLoader>(
    loader: &L,
    config: &Config,
    session: &Session,
    args: &DashboardArgs,
) -> Result<DashboardData> {
    let timezone = config.canonical_timezone()?;
    let window = TimeWindow::days(timezone, args.last_day, args.days)?;
    let records = loader
        .load(&window)
        .context("failed to load attendance records")?;

    let monitored = config.monitored_positions()?;
    let normalizer = Normalizer::new(timezone).with_positions(monitored);
    let options = ReconcileOptions {
        shifts: config.shift_plan()?,
        group_by_subject: config.group_by_subject,
    };
    let reconciliation = reconcile_records(&records, &normalizer, &options);

    let mut days: Vec<DayReport> = reconciliation
        .days
        .into_iter()
        .filter(|day| {
            args.positions.is_empty()
                || args
                    .positions
                    .iter()
                    .any(|p| p.trim() == day.position.as_str())
        })
        .collect();
    // Configured order first, then anything else alphabetically; newest day first.
    // The sort is stable, so subjects and shift windows keep engine order.
    days.sort_by(|a, b| {
        position_rank(config, a)
            .cmp(&position_rank(config, b))
            .then_with(|| b.date.cmp(&a.date))
    });

    Ok(DashboardData {
        generated_at: Utc::now(),
        viewer: session.viewer().to_string(),
        timezone: timezone.name().to_string(),
        first_day: window.start().with_timezone(&timezone).date_naive(),
        last_day: args.last_day,
        days,
        diagnostics: reconciliation.diagnostics,
    })
}

fn position_rank<'a>(config: &Config, day: &'a DayReport) -> (usize, &'a str) {
    let name = day.position.as_str();
    let index = config
        .positions
        .iter()
        .position(|p| p.trim() == name)
        .unwrap_or(usize::MAX);
    (index, name)
}

/// Runs the dashboard command.
pub fn run<W: Write, L: EventLoader>(
    writer: &mut W,
    loader: &L,
    config: &Config,
    session: &Session,
    args: &DashboardArgs,
) -> Result<()> {
    let data = build(loader, config, session, args)?;
    if args.json {
        serde_json::to_writer_pretty(&mut *writer, &data)?;
        writeln!(writer)?;
    } else {
        write!(writer, "{}", render(&data))?;
    }
    Ok(())
}

/// Formats one interval as `Arrival: HH:MM | Departure: HH:MM`.
pub fn format_interval(interval: &AttendanceInterval) -> String {
    let hhmm = |ts: Option<DateTime<Tz>>| {
        ts.map_or_else(|| MISSING.to_string(), |t| t.format("%H:%M").to_string())
    };
    format!(
        "Arrival: {} | Departure: {}",
        hhmm(interval.arrival),
        hhmm(interval.departure)
    )
}

fn day_heading(day: &DayReport) -> String {
    let mut heading = format!("{} · {}", day.position, day.date.format("%Y-%m-%d"));
    if let Some(subject) = &day.subject {
        heading.push_str(&format!(" · {subject}"));
    }
    if let Some(shift) = &day.shift {
        heading.push_str(&format!(" · shift {shift}"));
    }
    heading
}

fn diagnostics_line(diagnostics: &Diagnostics) -> Option<String> {
    let parts: Vec<String> = [
        (diagnostics.malformed_records, "malformed"),
        (diagnostics.unknown_actions, "unknown action"),
        (diagnostics.unknown_positions, "unmonitored position"),
        (diagnostics.no_window_match, "outside shift windows"),
    ]
    .into_iter()
    .filter(|(count, _)| *count > 0)
    .map(|(count, label)| format!("{count} {label}"))
    .collect();

    if parts.is_empty() {
        None
    } else {
        Some(format!("Skipped records: {}", parts.join(", ")))
    }
}

/// Renders the dashboard as text.
pub fn render(data: &DashboardData) -> String {
    let mut out = String::new();
    out.push_str(&format!("Attendance ({})\n", data.timezone));
    out.push_str(&format!("Viewer: {}\n", data.viewer));
    if data.first_day == data.last_day {
        out.push_str(&format!("Day: {}\n", data.last_day));
    } else {
        out.push_str(&format!("Days: {} to {}\n", data.first_day, data.last_day));
    }

    if data.days.is_empty() {
        out.push_str("\nNo attendance data for this period.\n");
    }

    for day in &data.days {
        out.push('\n');
        out.push_str(&day_heading(day));
        out.push('\n');
        for interval in &day.intervals {
            out.push_str("  ");
            out.push_str(&format_interval(interval));
            out.push('\n');
        }
    }

    if let Some(line) = diagnostics_line(&data.diagnostics) {
        out.push('\n');
        out.push_str(&line);
        out.push('\n');
    }
    out
}
