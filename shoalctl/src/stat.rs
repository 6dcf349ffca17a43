use anyhow::{anyhow, Result};
use clap::Args;
use shoalfs_meta::{MetaOp, MetaRequest, MetaResponse, StatRecord};

#[derive(Debug, Args)]
pub struct Options {
    /// Path of the database directory.
    #[arg(required = true, value_name = "DB_PATH", help = "Path of the store")]
    pub db: String,

    /// Path to stat.
    #[arg(required = true, value_name = "PATH", help = "Absolute path")]
    pub path: String,

    /// User to run as.
    #[arg(short, long, default_value = "root")]
    pub user: String,
}

pub(super) fn run(opts: &Options) -> Result<()> {
    let store = crate::open_store(&opts.db, false)?;
    let response = store
        .do_operation(&MetaRequest::new(
            opts.user.clone(),
            MetaOp::Stat {
                path: opts.path.clone(),
                out_cap: 4096,
            },
        ))
        .map_err(|e| anyhow!("stat {}: {e}", opts.path))?;
    let MetaResponse::Stats(data) = response else {
        return Err(anyhow!("unexpected response to stat"));
    };
    for record in StatRecord::decode_all(&data)? {
        crate::ls::print_record(&record);
        println!(
            "  mtime={} atime={} man_repl={}",
            record.mtime, record.atime, record.man_repl
        );
    }
    store.close()?;
    Ok(())
}
