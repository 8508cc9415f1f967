mod config;
mod database;
mod entities;
mod error;
mod etl;
mod logging;
mod model;
mod ports;
mod services;
#[cfg(test)]
mod test_utils;

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use color_eyre::{Result, eyre::Context};

use crate::{
    config::Config,
    database::Database,
    etl::batch::{BatchDriver, DatasetReport, FailurePolicy, FileProcessor},
    etl::log_file::LogFileProcessor,
    etl::song_file::SongFileProcessor,
    logging::setup_logging,
};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// The config file to use
    #[arg(short, long, env = "SONGPLAY_ETL_CONFIG", global = true)]
    config: Option<PathBuf>,

    /// SQLite database to load into (overrides the config file)
    #[arg(long, env = "SONGPLAY_ETL_DATABASE", global = true)]
    database: Option<PathBuf>,

    /// Console log level (default: off)
    #[arg(long, default_value = "off", global = true, env = "LOG_LEVEL")]
    log_level: log::LevelFilter,

    /// File log level (default: debug)
    #[arg(long, default_value = "debug", global = true)]
    log_file_level: log::LevelFilter,

    /// Path to log file
    #[arg(long, env = "SONGPLAY_ETL_LOG_FILE", global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load the song catalog, then the activity logs
    Run {
        /// Root of the song dataset
        #[arg(long)]
        song_data: Option<PathBuf>,

        /// Root of the activity log dataset
        #[arg(long)]
        log_data: Option<PathBuf>,

        /// What to do when a file fails
        #[arg(long, value_enum)]
        on_error: Option<FailurePolicy>,
    },
    /// Load only the song catalog
    Songs {
        /// Root of the song dataset
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// What to do when a file fails
        #[arg(long, value_enum)]
        on_error: Option<FailurePolicy>,
    },
    /// Load only the activity logs
    Logs {
        /// Root of the activity log dataset
        #[arg(short, long)]
        dir: Option<PathBuf>,

        /// What to do when a file fails
        #[arg(long, value_enum)]
        on_error: Option<FailurePolicy>,
    },
    /// Drop and recreate all tables
    Reset,
    #[command(subcommand)]
    Config(ConfigCommands),
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Create a default config file, if it doesn't exist
    CreateDefault,
    /// Print the path to the config file
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;

    let args = Args::parse();
    setup_logging(args.log_level, args.log_file.clone(), args.log_file_level)?;

    log::debug!("songplay-etl starting");

    if let Commands::Config(config_commands) = &args.command {
        match config_commands {
            ConfigCommands::CreateDefault => {
                let path = Config::create_default()?;
                println!("{}", path.display());
            }
            ConfigCommands::Path => match Config::config_path() {
                Some(path) => println!("{}", path.display()),
                None => println!("No default config path found"),
            },
        }
        return Ok(());
    }

    log::debug!("Loading configuration");
    let config = {
        if let Some(config) = &args.config {
            Config::from_file(config)
        } else {
            Config::load()
        }
    }
    .with_context(|| "Failed to load songplay-etl config")?;

    let database_path = args.database.clone().unwrap_or_else(|| config.database_path());
    let database = Database::open(&database_path).await?;

    // Close the connection whether or not the command succeeded
    let result = execute(args.command, &config, &database).await;
    database.close().await?;
    result
}

async fn execute(command: Commands, config: &Config, database: &Database) -> Result<()> {
    let policy = |on_error: Option<FailurePolicy>| on_error.unwrap_or(config.failure_policy);

    let reports = match command {
        Commands::Run {
            song_data,
            log_data,
            on_error,
        } => {
            let song_data = song_data.unwrap_or_else(|| config.song_data_path());
            let log_data = log_data.unwrap_or_else(|| config.log_data_path());
            // Songs first: fact resolution looks plays up in the song catalog
            let driver = BatchDriver::new(database, policy(on_error));
            vec![
                run_dataset(&driver, &song_data, &SongFileProcessor).await?,
                run_dataset(&driver, &log_data, &LogFileProcessor).await?,
            ]
        }
        Commands::Songs { dir, on_error } => {
            let dir = dir.unwrap_or_else(|| config.song_data_path());
            let driver = BatchDriver::new(database, policy(on_error));
            vec![run_dataset(&driver, &dir, &SongFileProcessor).await?]
        }
        Commands::Logs { dir, on_error } => {
            let dir = dir.unwrap_or_else(|| config.log_data_path());
            let driver = BatchDriver::new(database, policy(on_error));
            vec![run_dataset(&driver, &dir, &LogFileProcessor).await?]
        }
        Commands::Reset => {
            database.reset().await?;
            log::info!("Reset command completed successfully");
            return Ok(());
        }
        Commands::Config(_) => return Ok(()),
    };

    for report in &reports {
        print_report(report);
    }

    if reports.iter().any(|r| !r.is_complete()) {
        let skipped: usize = reports.iter().map(|r| r.skipped.len()).sum();
        return Err(color_eyre::eyre::eyre!(
            "{} file(s) failed and were skipped",
            skipped
        ));
    }

    log::info!("Run completed successfully");
    Ok(())
}

async fn run_dataset(
    driver: &BatchDriver<'_>,
    root: &Path,
    processor: &dyn FileProcessor,
) -> Result<DatasetReport> {
    log::debug!("Starting {} dataset from: {}", processor.dataset(), root.display());
    driver
        .run(root, processor)
        .await
        .with_context(|| format!("Failed to load {} dataset", processor.dataset()))
}

fn print_report(report: &DatasetReport) {
    let totals = &report.totals;
    println!(
        "{}: {}/{} files loaded from {} in {}",
        report.dataset,
        report.files_processed,
        report.files_found,
        report.root.display(),
        humantime::format_duration(report.elapsed)
    );
    println!(
        "  songs: {}, artists: {}, users: {}, time rows: {}, songplays: {} ({} without a catalog match)",
        totals.songs,
        totals.artists,
        totals.users,
        totals.time_rows,
        totals.songplays,
        totals.unresolved
    );
    for skipped in &report.skipped {
        println!("  skipped {}: {}", skipped.path.display(), skipped.error);
    }
}
