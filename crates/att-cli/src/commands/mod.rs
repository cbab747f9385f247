//! CLI subcommand implementations.

pub mod dashboard;
pub mod import;
pub mod status;
