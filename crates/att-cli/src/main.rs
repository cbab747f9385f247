use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use att_cli::commands::{dashboard, import, status};
use att_cli::jsonl::JsonlLoader;
use att_cli::session::{Authenticator, SharedSecret};
use att_cli::util::parse_day;
use att_cli::{Cli, Commands, Config};

fn load_config(config_path: Option<&Path>) -> Result<Config> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");
    Ok(config)
}

/// Open the database, ensuring the parent directory exists.
fn open_database(config: &Config) -> Result<att_db::Database> {
    if let Some(parent) = config.database_path.parent() {
        std::fs::create_dir_all(parent).context("failed to create database directory")?;
    }
    att_db::Database::open(&config.database_path).context("failed to open database")
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // try_init so tests that already installed a subscriber don't panic
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();

    let mut stdout = io::stdout().lock();
    match &cli.command {
        Some(Commands::Dashboard {
            date,
            days,
            positions,
            json,
            input,
            password,
        }) => {
            let config = load_config(cli.config.as_deref())?;
            let session = SharedSecret::new(config.supervisor_password.clone())
                .authenticate(password.as_deref())?;
            let timezone = config.canonical_timezone()?;
            let last_day = parse_day(
                date.as_deref().unwrap_or("today"),
                dashboard::today_in(timezone),
            )?;
            let args = dashboard::DashboardArgs {
                last_day,
                days: *days,
                positions: positions.clone(),
                json: *json,
            };
            if let Some(path) = input {
                let loader = JsonlLoader::new(path.clone(), timezone);
                dashboard::run(&mut stdout, &loader, &config, &session, &args)?;
            } else {
                let db = open_database(&config)?;
                dashboard::run(&mut stdout, &db, &config, &session, &args)?;
            }
        }
        Some(Commands::Import { file }) => {
            let config = load_config(cli.config.as_deref())?;
            let mut db = open_database(&config)?;
            if let Some(path) = file {
                let reader = BufReader::new(
                    File::open(path)
                        .with_context(|| format!("failed to open {}", path.display()))?,
                );
                import::run(reader, &mut stdout, &mut db, &config)?;
            } else {
                import::run(io::stdin().lock(), &mut stdout, &mut db, &config)?;
            }
        }
        Some(Commands::Status) => {
            let config = load_config(cli.config.as_deref())?;
            let db = open_database(&config)?;
            status::run(&mut stdout, &db, &config)?;
        }
        None => {
            use clap::CommandFactory;
            Cli::command().print_help()?;
            println!();
        }
    }

    Ok(())
}
