use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{anyhow, Result};
use clap::Args;
use shoalfs_meta::{MetaOp, MetaRequest};

#[derive(Debug, Args)]
pub struct Options {
    /// Path of the database directory.
    #[arg(required = true, value_name = "DB_PATH", help = "Path of the store")]
    pub db: String,

    /// Directory to create.
    #[arg(required = true, value_name = "PATH", help = "Absolute directory path")]
    pub path: String,

    /// Mode bits, octal.
    #[arg(short, long, default_value = "755", value_parser = parse_octal)]
    pub mode: u16,

    /// User to run as.
    #[arg(short, long, default_value = "root")]
    pub user: String,
}

fn parse_octal(s: &str) -> Result<u16, String> {
    u16::from_str_radix(s, 8).map_err(|e| format!("invalid octal mode {s:?}: {e}"))
}

pub(super) fn run(opts: &Options) -> Result<()> {
    let store = crate::open_store(&opts.db, false)?;
    let ctime = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or(0);
    store
        .do_operation(&MetaRequest::new(
            opts.user.clone(),
            MetaOp::Mkdirs {
                path: opts.path.clone(),
                mode: opts.mode,
                ctime,
            },
        ))
        .map_err(|e| anyhow!("mkdirs {}: {e}", opts.path))?;
    println!("created {}", opts.path);
    store.close()?;
    Ok(())
}
