use anyhow::Result;
use std::path::Path;
use tracing::info;

use overflights::config::AppConfig;
use overflights::import::import_file;

use super::{ImportArgs, build_formatter, open_store};

/// Import one track file. A dry run formats and checks the track against an
/// empty store and leaves the file where it is.
pub async fn handle_import(config: &AppConfig, track: &Path, args: &ImportArgs, dry_run: bool) -> Result<()> {
    let params = args.apply(&config.import);
    let formatter = build_formatter(config)?;
    let store = open_store(dry_run)?;
    let archive_dir = (!dry_run).then_some(config.archive_dir.as_path());

    let summary = import_file(&formatter, store.as_ref(), track, &params, archive_dir).await?;

    if !summary.diagnostics.is_empty() {
        eprintln!("{}", summary.diagnostics.render());
    }
    if let Some(archived) = &summary.archived_to {
        info!("Archived {} to {}", track.display(), archived.display());
    }
    println!("{}", summary.message());
    Ok(())
}
