use anyhow::{anyhow, Result};
use clap::Args;
use shoalfs_meta::{MetaOp, MetaRequest, MetaResponse, StatRecord};

/// Listing buffer capacity; plenty for one directory of output.
const LIST_BUF_CAP: u32 = 1 << 20;

#[derive(Debug, Args)]
pub struct Options {
    /// Path of the database directory.
    #[arg(required = true, value_name = "DB_PATH", help = "Path of the store")]
    pub db: String,

    /// Directory to list.
    #[arg(required = true, value_name = "PATH", help = "Absolute directory path")]
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
            MetaOp::Listdir {
                path: opts.path.clone(),
                out_cap: LIST_BUF_CAP,
            },
        ))
        .map_err(|e| anyhow!("ls {}: {e}", opts.path))?;
    let MetaResponse::Stats(data) = response else {
        return Err(anyhow!("unexpected response to listdir"));
    };
    for record in StatRecord::decode_all(&data)? {
        print_record(&record);
    }
    store.close()?;
    Ok(())
}

pub(super) fn print_record(record: &StatRecord) {
    println!(
        "{} {:04o} {:>6} {:>6} {:>12} {}",
        if record.is_dir() { "d" } else { "-" },
        record.mode(),
        record.uid,
        record.gid,
        record.length,
        record.name,
    );
}
