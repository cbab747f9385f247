//! Attendance CLI library.
//!
//! Command implementations, configuration and the supervisor session for the
//! `att` binary.

mod cli;
pub mod commands;
mod config;
pub mod jsonl;
pub mod session;
pub mod util;

pub use cli::{Cli, Commands};
pub use config::Config;
