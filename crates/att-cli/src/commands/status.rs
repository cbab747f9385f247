//! Status command for showing recorded activity by position.

use std::io::Write;

use anyhow::Result;

use att_db::Database;

use crate::Config;

pub fn run<W: Write>(writer: &mut W, db: &Database, config: &Config) -> Result<()> {
    let positions = db.position_summaries()?;

    writeln!(writer, "Attendance status")?;
    writeln!(writer, "Database: {}", config.database_path.display())?;
    writeln!(writer, "Timezone: {}", config.timezone)?;

    if positions.is_empty() {
        writeln!(writer, "No records stored.")?;
        return Ok(());
    }

    writeln!(writer, "Positions:")?;
    for summary in positions {
        writeln!(
            writer,
            "- {}: {} events, last {}",
            summary.position, summary.events, summary.last_event
        )?;
    }

    Ok(())
}
