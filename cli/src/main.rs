mod cli;
mod commands;
mod config;
mod data;
mod logging;

use std::path::Path;

use clap::Parser;
use color_eyre::eyre::{Result, WrapErr};

use cli::{Cli, Commands, WeightAction};
use commands::record::RecordArgs;
use config::{ensure_dirs, token_path, LogLevel, UserConfig};
use data::{SqliteRecordStore, TokenFile};
use logging::LogMode;

fn main() -> Result<()> {
    color_eyre::install()?;
    let _ = ensure_dirs();

    let cli = Cli::parse();
    let config = UserConfig::load();
    let log_level_override = cli.log_level.as_deref().map(LogLevel::from_str);

    match cli.command {
        Commands::Config { path, reset, edit } => {
            let _guard = logging::init(config.log_level, LogMode::Stderr, log_level_override);
            commands::config::run(path, reset, edit)
        }
        Commands::Logs { lines, follow } => commands::logs::run(lines, follow),
        command => {
            let mode = if wants_json(&command) {
                LogMode::File
            } else {
                LogMode::Both
            };
            let _guard = logging::init(config.log_level, mode, log_level_override);
            let database = config.database_path(cli.database);
            let store = open_store(&config, &database)?;
            run_store_command(&store, &config, &database, command)
        }
    }
}

fn wants_json(command: &Commands) -> bool {
    matches!(
        command,
        Commands::Summary { json: true, .. }
            | Commands::Series { json: true, .. }
            | Commands::Changes { json: true, .. }
    )
}

fn open_store(config: &UserConfig, path: &Path) -> Result<SqliteRecordStore> {
    let store = SqliteRecordStore::open(path)
        .wrap_err_with(|| format!("Failed to open record database at {}", path.display()))?;

    let records = store.record_count()?;
    tracing::debug!(records, path = %path.display(), "Record database ready");

    Ok(store
        .with_page_size(config.store.changes_page_size)
        .with_token_ttl_days(config.store.token_ttl_days))
}

fn run_store_command(
    store: &SqliteRecordStore,
    config: &UserConfig,
    database: &Path,
    command: Commands,
) -> Result<()> {
    match command {
        Commands::Summary { session_id, json } => commands::summary::run(store, &session_id, json),
        Commands::Series {
            session_id,
            metric,
            json,
        } => commands::series::run(store, &session_id, metric, json),
        Commands::Changes { reset, json } => {
            let token_file = TokenFile::new(token_path(database));
            commands::changes::run(store, config, &token_file, reset, json)
        }
        Commands::Sessions { period } => commands::sessions::run(store, &period),
        Commands::Steps { date, offset } => {
            commands::steps::run(store, date.as_deref(), offset.as_deref())
        }
        Commands::Record {
            start,
            duration,
            exercise,
            title,
            steps,
            kcal,
        } => commands::record::run(
            store,
            &RecordArgs {
                start,
                duration,
                exercise,
                title,
                steps,
                kcal,
            },
        ),
        Commands::Weight {
            action: Some(WeightAction::Add { kilograms }),
            ..
        } => commands::weight::add(store, kilograms),
        Commands::Weight { action: None, period } => commands::weight::run(store, &period),
        Commands::Import { file } => commands::records::import(store, &file),
        Commands::Delete { ids } => commands::records::delete(store, &ids),
        Commands::Config { .. } | Commands::Logs { .. } => Ok(()),
    }
}
