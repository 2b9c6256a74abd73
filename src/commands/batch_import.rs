use anyhow::Result;
use std::path::PathBuf;
use tracing::{info, warn};

use overflights::batch::{TrackSource, collect_tracks, run_batch};
use overflights::config::AppConfig;
use overflights::notifications::{EmailNotifier, LogNotifier, Notifier};

use super::{ImportArgs, build_formatter, open_store};

/// Import every track matched by `search`. Failed files are listed at the end
/// and, with `email`, sent to the configured maintainer address.
pub async fn handle_batch_import(
    config: &AppConfig,
    search: &str,
    walk_dir_tree: bool,
    args: &ImportArgs,
    email: bool,
    dry_run: bool,
) -> Result<()> {
    let params = args.apply(&config.import);
    let formatter = build_formatter(config)?;

    let source = if walk_dir_tree {
        TrackSource::WalkDir(PathBuf::from(search))
    } else {
        TrackSource::Glob(search.to_string())
    };
    let paths = collect_tracks(&source, formatter.registry())?;
    info!("Found {} track file(s) to import", paths.len());

    let store = open_store(dry_run)?;
    let archive_dir = (!dry_run).then_some(config.archive_dir.as_path());
    let report = run_batch(&formatter, store.as_ref(), &paths, &params, archive_dir).await;

    info!(
        "Batch finished: {} file(s) imported, {} flight(s) inserted, {} failure(s)",
        report.imported.len(),
        report.flights_inserted(),
        report.failed.len()
    );
    let message = report.message();
    println!("{}", message);

    let notifier: Box<dyn Notifier> = match (email, &config.email) {
        (false, _) => Box::new(LogNotifier),
        (true, Some(email_config)) => Box::new(EmailNotifier::new(Some(email_config.clone()))),
        (true, None) => Box::new(EmailNotifier::from_env()),
    };
    let subject = if report.all_succeeded() {
        "Overflight batch import succeeded".to_string()
    } else {
        format!("Overflight batch import: {} file(s) failed", report.failed.len())
    };
    if let Err(e) = notifier.notify(&subject, &message) {
        warn!("Could not deliver the batch report: {:#}", e);
    }

    if !report.all_succeeded() {
        anyhow::bail!("{} of {} file(s) failed to import", report.failed.len(), paths.len());
    }
    Ok(())
}
