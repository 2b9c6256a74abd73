use anyhow::{Context, Result};
use std::path::Path;

use overflights::landings::{LandingSubmission, import_landings};

use super::open_store;

/// Record the landings of one flight from a JSON submission
pub async fn handle_import_landings(submission: &Path, force: bool, dry_run: bool) -> Result<()> {
    let text = tokio::fs::read_to_string(submission)
        .await
        .with_context(|| format!("Failed to read {}", submission.display()))?;
    let submission: LandingSubmission =
        serde_json::from_str(&text).with_context(|| format!("{} is not a landing submission", submission.display()))?;

    let store = open_store(dry_run)?;
    let summary = import_landings(store.as_ref(), &submission, force).await?;
    if !summary.diagnostics.is_empty() {
        eprintln!("{}", summary.diagnostics.render());
    }
    println!("{}", summary.message());
    Ok(())
}
