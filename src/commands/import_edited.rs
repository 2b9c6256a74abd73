use anyhow::{Context, Result};
use serde_json::Value;
use std::path::Path;
use tracing::info;

use overflights::config::AppConfig;
use overflights::editor_export::{EditorDocument, FeatureCollection, TrackInfo, reimport};
use overflights::import::import_track;

use super::{ImportArgs, build_formatter, open_store};

/// Parse either a whole editor document or a bare feature collection plus a
/// separate track info file
fn load_edits(edited: &Path, track_info: Option<&Path>) -> Result<(TrackInfo, Vec<FeatureCollection>)> {
    let text = std::fs::read_to_string(edited).with_context(|| format!("Failed to read {}", edited.display()))?;
    let value: Value = serde_json::from_str(&text).with_context(|| format!("{} is not valid JSON", edited.display()))?;

    if value.get("segments").is_some() {
        let document: EditorDocument = serde_json::from_value(value)?;
        return Ok((document.track_info, document.segments.into_values().collect()));
    }

    let collection: FeatureCollection =
        serde_json::from_value(value).with_context(|| format!("{} is not a feature collection", edited.display()))?;
    let info_path = track_info.context("--track-info is required when importing a bare feature collection")?;
    let info_text =
        std::fs::read_to_string(info_path).with_context(|| format!("Failed to read {}", info_path.display()))?;
    let info: TrackInfo = serde_json::from_str(&info_text)?;
    Ok((info, vec![collection]))
}

/// Import a track after it has been edited in the segment editor
pub async fn handle_import_edited(
    config: &AppConfig,
    edited: &Path,
    track_info: Option<&Path>,
    args: &ImportArgs,
    dry_run: bool,
) -> Result<()> {
    let params = args.apply(&config.import);
    let (info, collections) = load_edits(edited, track_info)?;
    let formatter = build_formatter(config)?;

    let source = info
        .source_file
        .as_deref()
        .map(Path::new)
        .unwrap_or(edited)
        .to_path_buf();
    let track = reimport(&formatter, &source, &info, &collections, &params)?;
    info!(
        "Re-segmented {} into {} flight(s)",
        source.display(),
        track.flights.len()
    );

    let store = open_store(dry_run)?;
    // The original file was archived on its first import; nothing to move here
    let summary = import_track(store.as_ref(), track, &params, None).await?;
    if !summary.diagnostics.is_empty() {
        eprintln!("{}", summary.diagnostics.render());
    }
    println!("{}", summary.message());
    Ok(())
}
