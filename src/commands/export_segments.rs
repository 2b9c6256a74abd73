use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::info;

use overflights::config::AppConfig;
use overflights::editor_export::export_segments;

use super::{ImportArgs, build_formatter};

/// Format a track and write the editor document as JSON
pub async fn handle_export_segments(
    config: &AppConfig,
    track: &Path,
    args: &ImportArgs,
    output: Option<&PathBuf>,
) -> Result<()> {
    let params = args.apply(&config.import);
    let formatter = build_formatter(config)?;

    let path = track.to_path_buf();
    let formatted = tokio::task::spawn_blocking(move || formatter.format_track(&path, &params)).await??;
    if !formatted.diagnostics.is_empty() {
        eprintln!("{}", formatted.diagnostics.render());
    }

    let document = export_segments(&formatted);
    let json = serde_json::to_string_pretty(&document)?;
    match output {
        Some(out) => {
            tokio::fs::write(out, json)
                .await
                .with_context(|| format!("Failed to write {}", out.display()))?;
            info!("Wrote {} segment(s) to {}", document.segments.len(), out.display());
        }
        None => println!("{}", json),
    }
    Ok(())
}
