//! Configuration loading and management.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, anyhow};
use att_core::{PositionId, ShiftPlan, ShiftWindow, Tz};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

/// Application configuration.
#[derive(Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the database file.
    pub database_path: PathBuf,

    /// IANA name of the canonical timezone (e.g. `Europe/Bratislava`).
    pub timezone: String,

    /// Monitored positions, in display order. Empty accepts every position.
    #[serde(default)]
    pub positions: Vec<String>,

    /// Shift windows (`"06:00-14:00"`). Empty reconciles whole days.
    #[serde(default)]
    pub shifts: Vec<ShiftWindow>,

    /// Reconcile each badge separately within a position.
    #[serde(default)]
    pub group_by_subject: bool,

    /// Shared secret for the supervisor view. Unset means no check.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub supervisor_password: Option<String>,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("database_path", &self.database_path)
            .field("timezone", &self.timezone)
            .field("positions", &self.positions)
            .field("shifts", &self.shifts)
            .field("group_by_subject", &self.group_by_subject)
            .field(
                "supervisor_password",
                &self.supervisor_password.as_ref().map(|_| "[REDACTED]"),
            )
            .finish()
    }
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = dirs_data_path().unwrap_or_else(|| PathBuf::from("."));
        Self {
            database_path: data_dir.join("att.db"),
            timezone: iana_time_zone::get_timezone().unwrap_or_else(|_| "UTC".to_string()),
            positions: Vec::new(),
            shifts: Vec::new(),
            group_by_subject: false,
            supervisor_password: None,
        }
    }
}

impl Config {
    /// Loads configuration, optionally from a specific file.
    #[expect(
        clippy::result_large_err,
        reason = "figment::Error is large but only returned at startup"
    )]
    pub fn load_from(config_path: Option<&Path>) -> Result<Self, figment::Error> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));

        // Load from default config location
        if let Some(config_dir) = dirs_config_path() {
            figment = figment.merge(Toml::file(config_dir.join("config.toml")));
        }

        // Load from specified config file
        if let Some(path) = config_path {
            figment = figment.merge(Toml::file(path));
        }

        // Load from environment variables (ATT_*)
        figment = figment.merge(Env::prefixed("ATT_"));

        figment.extract()
    }

    /// The canonical timezone all timestamps are normalized into.
    pub fn canonical_timezone(&self) -> Result<Tz> {
        self.timezone
            .parse::<Tz>()
            .map_err(|e| anyhow!("invalid timezone {:?}: {e}", self.timezone))
    }

    /// The monitored position set, validated.
    pub fn monitored_positions(&self) -> Result<Vec<PositionId>> {
        self.positions
            .iter()
            .map(|p| PositionId::new(p.as_str()).context("invalid entry in `positions`"))
            .collect()
    }

    /// The configured shift plan, or `None` for whole-day reconciliation.
    pub fn shift_plan(&self) -> Result<Option<ShiftPlan>> {
        if self.shifts.is_empty() {
            return Ok(None);
        }
        let plan = ShiftPlan::new(self.shifts.clone()).context("invalid `shifts`")?;
        Ok(Some(plan))
    }
}

/// Returns the platform-specific config directory for att.
fn dirs_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("att"))
}

/// Returns the platform-specific data directory for att.
///
/// On Linux: `~/.local/share/att`
pub fn dirs_data_path() -> Option<PathBuf> {
    dirs::data_dir().map(|p| p.join("att"))
}
