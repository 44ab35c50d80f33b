// Copyright 2025 Schelling Point Labs Inc
// SPDX-License-Identifier: AGPL-3.0-only

use anyhow::{anyhow, Context, Result};
use clap::{Parser, Subcommand};
use cowfs_core::{create_store, CoreConfig, FileId, IdManager, StoreConfig};
use cowfs_logging::CliLoggingArgs;
use std::io::{self, Write};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(
    author,
    version,
    about = "Inspect and drive the CoWFS file identifier store"
)]
struct Cli {
    /// TOML configuration file
    #[arg(long, env = "COWFS_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite identifier database; overrides the configured store
    #[arg(long, env = "COWFS_DB")]
    db: Option<PathBuf>,

    #[command(flatten)]
    logging: CliLoggingArgs,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Create the allocation counter if missing and print it
    Init,
    /// Allocate identifiers one at a time (one line per identifier)
    Generate {
        #[arg(long, default_value_t = 1)]
        count: u64,
    },
    /// Reserve a consecutive range in a single store update
    Reserve {
        /// Number of identifiers; defaults to ids.default-batch
        count: Option<u64>,
    },
    /// Print the reserved root identifier
    Root,
    /// Decode a 32-digit hex identifier
    Decode { hex: String },
    /// Print the highest identifier handed out so far
    Counter,
    /// Print the effective configuration as TOML
    ShowConfig,
}

fn default_db_path() -> PathBuf {
    let mut path = dirs::data_dir().unwrap_or_else(|| PathBuf::from("/tmp"));
    path.push("cowfs");
    path.push("ids.db");
    path
}

/// Resolve the configuration: file (or defaults), then `--db`.
///
/// Without a config file the CLI always talks to SQLite, since an
/// in-memory store would not outlive the command.
fn resolve_config(cli: &Cli) -> Result<CoreConfig> {
    let mut config = match &cli.config {
        Some(path) => CoreConfig::load(path)
            .with_context(|| format!("failed to load config {}", path.display()))?,
        None => CoreConfig::default(),
    };
    match (&cli.db, &cli.config) {
        (Some(db), _) => config.store = StoreConfig::Sqlite { path: db.clone() },
        (None, None) => config.store = StoreConfig::Sqlite { path: default_db_path() },
        (None, Some(_)) => {}
    }
    Ok(config)
}

fn open_manager(config: &CoreConfig) -> Result<IdManager> {
    let store = create_store(&config.store).context("failed to open identifier store")?;
    IdManager::initialize(store, &config.ids).context("failed to initialize identifier counter")
}

fn run(command: &Command, config: &CoreConfig, out: &mut dyn Write) -> Result<()> {
    match command {
        Command::Init => {
            let ids = open_manager(config)?;
            writeln!(out, "COUNTER_KEY={}", config.ids.counter_key)?;
            writeln!(out, "COUNTER={}", ids.current_counter()?)?;
        }
        Command::Generate { count } => {
            let ids = open_manager(config)?;
            for _ in 0..*count {
                let id = ids.generate_identifier()?;
                writeln!(out, "ID={id}\tHEX={}", id.to_hex())?;
            }
        }
        Command::Reserve { count } => {
            let n = count.unwrap_or(config.ids.default_batch);
            let ids = open_manager(config)?;
            let batch = ids.reserve(n)?;
            let first = batch.first();
            let last = first
                .checked_add(batch.remaining() - 1)
                .ok_or_else(|| anyhow!("reserved range overflows"))?;
            writeln!(out, "FIRST={first}\tLAST={last}\tCOUNT={n}")?;
        }
        Command::Root => {
            let root = FileId::ROOT;
            writeln!(out, "ROOT={root}\tHEX={}", root.to_hex())?;
        }
        Command::Decode { hex } => {
            let id = FileId::from_hex(hex).context("failed to decode identifier")?;
            writeln!(
                out,
                "ID={id}\tHI={:#018x}\tLO={:#018x}\tNULL={}\tROOT={}",
                id.hi,
                id.lo,
                id.is_null(),
                id.is_root()
            )?;
        }
        Command::Counter => {
            let ids = open_manager(config)?;
            writeln!(out, "COUNTER={}", ids.current_counter()?)?;
        }
        Command::ShowConfig => {
            write!(out, "{}", config.to_toml_string()?)?;
        }
    }
    Ok(())
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = resolve_config(&cli)?;
    cli.logging
        .init("cowfs-idctl", config.logging.log_level.as_deref())
        .context("failed to initialize logging")?;
    tracing::debug!(store = ?config.store, "resolved configuration");

    let stdout = io::stdout();
    run(&cli.command, &config, &mut stdout.lock())
}
