//! entity-index
//!
//! Indexes an entity-named dataset tree into SQLite: files, filename-derived
//! tags, and metadata inherited from JSON sidecars.

use anyhow::{Context, Result};
use clap::Parser;
use entity_index::cli::export::ExportArgs;
use entity_index::cli::index::IndexArgs;
use entity_index::cli::{Cli, Command, StatsArgs};
use entity_index::config::{Config, ConfigLoader};
use entity_index::db::Database;
use entity_index::db::export::ExportOptions;
use entity_index::export::Snapshot;
use entity_index::format::{format_stats, format_summaries};
use entity_index::layout::{PatternValidator, index_derivatives, index_layout};
use std::fs::OpenOptions;
use std::io::Write;
use tracing::{Level, debug, info};
use tracing_subscriber::FmtSubscriber;

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging based on --log option
    let level = if cli.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    match cli.log.as_str() {
        "0" | "off" => {}
        "1" | "stdout" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stdout)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        "2" | "stderr" => {
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(std::io::stderr)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
        filename => {
            // Log to file (append mode)
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(filename)?;
            let subscriber = FmtSubscriber::builder()
                .with_max_level(level)
                .with_writer(file)
                .with_ansi(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber)?;
        }
    }

    // SAFETY: single-threaded at this point; nothing else reads the environment yet
    if let Some(config_path) = &cli.config {
        unsafe {
            std::env::set_var("ENTITY_INDEX_CONFIG_PATH", config_path);
        }
    }
    let mut loader = ConfigLoader::load()?;
    if let Some(path) = loader.config_path() {
        debug!(path = %path.display(), "Using config file");
    }

    let config = loader.config_mut();
    if let Some(db_path) = &cli.database {
        config.store.db_path = db_path.into();
    }
    let config = loader.into_config();

    match cli.command {
        Command::Index(args) => run_index(config, args),
        Command::Export(args) => run_export(&config, args),
        Command::Stats(args) => run_stats(&config, args),
    }
}

/// Run the index command
fn run_index(mut config: Config, args: IndexArgs) -> Result<()> {
    args.apply_to(&mut config);

    let db = Database::open(&config.store.db_path)
        .with_context(|| format!("opening database {}", config.store.db_path.display()))?;
    if args.reset {
        info!(db = %config.store.db_path.display(), "Resetting index");
        db.reset()?;
    }

    let options = config.index_options()?;

    let validator = config.validator(&args.root)?;
    let mut session = db.session();
    let mut summaries = vec![index_layout(&args.root, &options, &validator, &mut session)?];

    if config.index.derivatives {
        let root = std::fs::canonicalize(&args.root)?;
        let derived = index_derivatives(
            &root,
            &options,
            |derivative| {
                PatternValidator::new(
                    derivative,
                    &config.index.ignore,
                    &config.index.force_index,
                )
            },
            &mut session,
        )?;
        summaries.extend(derived);
    }

    println!("{}", format_summaries(&summaries, args.format));
    Ok(())
}

/// Run the export command
fn run_export(config: &Config, args: ExportArgs) -> Result<()> {
    let db = Database::open(&config.store.db_path)?;

    let options = ExportOptions {
        tables: args.tables.clone(),
        include_volatile: args.include_timestamps,
    };
    let snapshot = Snapshot::from_database(&db, &options)?;

    let json_output = snapshot.to_json_pretty()?;
    let should_compress = args.should_compress(Some(json_output.len() as u64));

    if let Some(ref path) = args.output {
        let file = std::fs::File::create(path)
            .with_context(|| format!("creating {}", path.display()))?;
        snapshot.write_to(file, should_compress)?;
        if should_compress {
            eprintln!("Exported to {} (gzipped)", path.display());
        } else {
            eprintln!("Exported to {}", path.display());
        }
    } else {
        let stdout = std::io::stdout();
        let mut lock = stdout.lock();
        snapshot.write_to(&mut lock, should_compress)?;
        lock.flush()?;
    }

    Ok(())
}

/// Run the stats command
fn run_stats(config: &Config, args: StatsArgs) -> Result<()> {
    let db = Database::open(&config.store.db_path)?;
    let stats = db.stats()?;
    println!("{}", format_stats(&stats, args.format));
    Ok(())
}
