use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tc_core::Tracker;
use tc_db::Database;
use tracing_subscriber::EnvFilter;

use tc_cli::commands::{log, report, settings, status, track};
use tc_cli::{Cli, Commands, Config, SettingsAction};

/// Load config and open database, ensuring the parent directory exists.
fn open_database(config_path: Option<&Path>) -> Result<(Database, Config)> {
    let config = Config::load_from(config_path).context("failed to load configuration")?;
    tracing::debug!(?config, "loaded configuration");

    config.ensure_database_dir()?;
    let db = Database::open(&config.database_path).context("failed to open database")?;
    Ok((db, config))
}

/// Restores the tracker from the database and applies the display preference.
fn open_tracker(db: Database) -> Result<Tracker<Database>> {
    let round = db.round_to_nearest_minute()?;
    let tracker = Tracker::open(db).context("failed to restore session state")?;
    tracker.set_round_to_nearest_minute(round);
    Ok(tracker)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    // Use try_init to avoid panic if tracing is already initialized (e.g., in tests)
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();

    let stdout = std::io::stdout();
    let mut out = stdout.lock();

    match &cli.command {
        Some(Commands::Start {
            category,
            description,
        }) => {
            let (db, config) = open_database(cli.config.as_deref())?;
            let tracker = open_tracker(db)?;
            let category = config.category_for(category.as_deref());
            track::start(&mut out, &tracker, category, description)?;
        }
        Some(Commands::Resume) => {
            let tracker = open_tracker(open_database(cli.config.as_deref())?.0)?;
            track::resume(&mut out, &tracker)?;
        }
        Some(Commands::Pause) => {
            let tracker = open_tracker(open_database(cli.config.as_deref())?.0)?;
            track::pause(&mut out, &tracker)?;
        }
        Some(Commands::Stop) => {
            let tracker = open_tracker(open_database(cli.config.as_deref())?.0)?;
            track::stop(&mut out, &tracker)?;
        }
        Some(Commands::Status) => {
            let tracker = open_tracker(open_database(cli.config.as_deref())?.0)?;
            status::run(&mut out, &tracker)?;
        }
        Some(Commands::Report { from, to, json }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            let round = db.round_to_nearest_minute()?;
            report::run(&mut out, &db, from, to, *json, round)?;
        }
        Some(Commands::Log { limit }) => {
            let (db, _config) = open_database(cli.config.as_deref())?;
            log::run(&mut out, &db, *limit)?;
        }
        Some(Commands::Settings { action }) => {
            let (mut db, _config) = open_database(cli.config.as_deref())?;
            match action {
                SettingsAction::Show => settings::show(&mut out, &db)?,
                SettingsAction::ExactDurations { enabled } => {
                    settings::set_exact_durations(&mut out, &mut db, *enabled)?;
                }
            }
        }
        None => {
            // No subcommand, show help
            use clap::CommandFactory;
            Cli::command().print_help()?;
            writeln!(out)?;
        }
    }

    Ok(())
}
