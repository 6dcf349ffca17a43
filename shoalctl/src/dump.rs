use anyhow::Result;
use clap::Args;

#[derive(Debug, Args)]
pub struct Options {
    /// Path of the database directory.
    #[arg(required = true, value_name = "DB_PATH", help = "Path of the store")]
    pub db: String,
}

pub(super) fn run(opts: &Options) -> Result<()> {
    let store = crate::open_store(&opts.db, false)?;
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    store.dump(&mut out)?;
    store.close()?;
    Ok(())
}
