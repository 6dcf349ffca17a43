use std::process;
use std::sync::Arc;

use anyhow::Result;
use clap::{Parser, Subcommand};
use shoalfs_meta::{MetaConfig, MetaStore, StaticAssigner, UserRegistry};
use shoalfs_utils::logging::{self, LogConfig};

pub mod create;
pub mod dump;
pub mod ls;
pub mod mkdirs;
pub mod stat;

#[derive(Parser)]
#[command(author, version, about = "shoalfs metadata store administration", long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
    #[arg(
        long,
        short = 'l',
        required = false,
        help = "Log level. Respects RUST_LOG.",
        value_name = "LOG_LEVEL",
        num_args = 1,
        value_parser = ["debug", "info"],
        default_value_t = String::from("info"),
    )]
    log_level: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new metadata store
    Create(create::Options),
    /// Dump every record in the store
    Dump(dump::Options),
    /// Create a directory and any missing ancestors
    Mkdirs(mkdirs::Options),
    /// List a directory
    Ls(ls::Options),
    /// Stat one path
    Stat(stat::Options),
}

/// Opens the store at `db`. Tools run with the in-memory user directory,
/// which knows only the superuser unless `--user` names it too.
fn open_store(db: &str, create_if_missing: bool) -> Result<MetaStore> {
    let mut config = MetaConfig::with_path(db);
    config.create_if_missing = create_if_missing;
    let store = MetaStore::open_rocksdb(
        &config,
        Arc::new(UserRegistry::new()),
        Arc::new(StaticAssigner::new(vec![1, 2, 3])),
    )?;
    Ok(store)
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::try_init(&LogConfig::new().with_filter(cli.log_level.clone()));

    let result = match &cli.command {
        Commands::Create(opts) => create::run(opts),
        Commands::Dump(opts) => dump::run(opts),
        Commands::Mkdirs(opts) => mkdirs::run(opts),
        Commands::Ls(opts) => ls::run(opts),
        Commands::Stat(opts) => stat::run(opts),
    };
    if let Err(e) = result {
        eprintln!("{e}");
        process::exit(1);
    }
    Ok(())
}
