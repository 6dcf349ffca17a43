use anyhow::Result;
use clap::Args;

#[derive(Debug, Args)]
pub struct Options {
    /// Path of the database directory to create.
    #[arg(required = true, value_name = "DB_PATH", help = "Path of the new store")]
    pub db: String,
}

pub(super) fn run(opts: &Options) -> Result<()> {
    let store = crate::open_store(&opts.db, true)?;
    println!(
        "created metadata store at {} (next_nid={}, next_cid={})",
        opts.db,
        store.next_nid(),
        store.next_cid()
    );
    store.close()?;
    Ok(())
}
