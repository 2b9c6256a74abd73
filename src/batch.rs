//! Sequential import of many track files. A failing file is recorded and the
//! batch moves on to the next one.

use anyhow::{Context, Result};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tracing::{info, warn};

use crate::config::ImportParams;
use crate::flight_store::FlightStore;
use crate::import::{ImportSummary, import_file};
use crate::readers::{ReaderRegistry, file_extension};
use crate::track_formatter::TrackFormatter;

/// Where the batch finds its files
#[derive(Debug, Clone, PartialEq)]
pub enum TrackSource {
    /// A glob pattern such as `tracks/2021/**/*.gpx`
    Glob(String),
    /// Every accepted file anywhere under a directory
    WalkDir(PathBuf),
}

fn is_zip(path: &Path) -> bool {
    file_extension(path) == "zip"
}

/// Resolve a source to the list of files to import, in path order
pub fn collect_tracks(source: &TrackSource, registry: &ReaderRegistry) -> Result<Vec<PathBuf>> {
    let mut paths: Vec<PathBuf> = match source {
        TrackSource::Glob(pattern) => {
            let paths: Vec<PathBuf> = glob::glob(pattern)
                .with_context(|| format!("Invalid search pattern {}", pattern))?
                .filter_map(|entry| entry.ok())
                .filter(|p| p.is_file())
                .collect();
            if paths.is_empty() {
                anyhow::bail!(
                    "No tracks found with the search string {}. Is this a directory that you meant to use with --walk-dir-tree?",
                    pattern
                );
            }
            paths
        }
        TrackSource::WalkDir(dir) => {
            if !dir.is_dir() {
                anyhow::bail!(
                    "With --walk-dir-tree the search string must be an existing directory with track files in it. {:?} was given",
                    dir
                );
            }
            let pattern = format!("{}/**/*", glob::Pattern::escape(&dir.to_string_lossy()));
            let paths: Vec<PathBuf> = glob::glob(&pattern)
                .with_context(|| format!("Failed to walk {:?}", dir))?
                .filter_map(|entry| entry.ok())
                .filter(|p| p.is_file() && (registry.accepts(p) || is_zip(p)))
                .collect();
            if paths.is_empty() {
                anyhow::bail!(
                    "No tracks found searching the directory {:?}. Track files must end in one of the following extensions: {}",
                    dir,
                    registry.accepted_extensions().join(", ")
                );
            }
            paths
        }
    };
    paths.sort();
    Ok(paths)
}

/// Extract the accepted track files of a zip archive into `into`
pub fn extract_tracks(zip_path: &Path, into: &Path, registry: &ReaderRegistry) -> Result<Vec<PathBuf>> {
    let file = fs::File::open(zip_path).with_context(|| format!("Failed to open {:?}", zip_path))?;
    let mut archive = zip::ZipArchive::new(file)
        .with_context(|| format!("Failed to read zip archive {:?}", zip_path))?;

    let mut extracted = Vec::new();
    for i in 0..archive.len() {
        let mut entry = archive.by_index(i)?;
        if entry.is_dir() {
            continue;
        }
        let Some(name) = entry.enclosed_name() else {
            warn!("Skipping unsafe path {:?} in {:?}", entry.name(), zip_path);
            continue;
        };
        if !registry.accepts(&name) {
            continue;
        }
        let target = into.join(&name);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        let mut output = fs::File::create(&target)?;
        io::copy(&mut entry, &mut output)?;
        extracted.push(target);
    }
    info!("Extracted {} track(s) from {:?}", extracted.len(), zip_path);
    Ok(extracted)
}

/// Outcome of a whole batch
#[derive(Debug, Default)]
pub struct BatchReport {
    pub imported: Vec<ImportSummary>,
    pub failed: Vec<(PathBuf, String)>,
}

impl BatchReport {
    pub fn all_succeeded(&self) -> bool {
        self.failed.is_empty()
    }

    pub fn flights_inserted(&self) -> usize {
        self.imported.iter().map(|s| s.inserted.len()).sum()
    }

    pub fn message(&self) -> String {
        if self.failed.is_empty() {
            return "All tracks successfully imported".to_string();
        }
        let failures: Vec<String> = self
            .failed
            .iter()
            .map(|(path, error)| format!("{}: {}", path.display(), error))
            .collect();
        format!("All tracks imported successfully except:\n\t-{}", failures.join("\n\t-"))
    }
}

/// Import every file in order. Zip archives are unpacked into a temporary
/// directory and their tracks imported like loose files.
pub async fn run_batch(
    formatter: &Arc<TrackFormatter>,
    store: &dyn FlightStore,
    paths: &[PathBuf],
    params: &ImportParams,
    archive_dir: Option<&Path>,
) -> BatchReport {
    let mut report = BatchReport::default();
    let mut extraction_dirs: Vec<TempDir> = Vec::new();

    let mut queue: Vec<PathBuf> = Vec::with_capacity(paths.len());
    for path in paths {
        if !is_zip(path) {
            queue.push(path.clone());
            continue;
        }
        let extracted = tempfile::tempdir()
            .context("Failed to create extraction directory")
            .and_then(|dir| {
                let files = extract_tracks(path, dir.path(), formatter.registry())?;
                extraction_dirs.push(dir);
                Ok(files)
            });
        match extracted {
            Ok(files) => queue.extend(files),
            Err(e) => {
                metrics::counter!("batch.files.failed_total").increment(1);
                report.failed.push((path.clone(), format!("{e:#}")));
            }
        }
    }

    let total = queue.len();
    for (i, path) in queue.iter().enumerate() {
        info!("Processing {} | {} of {}", path.display(), i + 1, total);
        metrics::counter!("batch.files.processed_total").increment(1);
        match import_file(formatter, store, path, params, archive_dir).await {
            Ok(summary) => report.imported.push(summary),
            Err(e) => {
                warn!("Failed to import {:?}: {:#}", path, e);
                metrics::counter!("batch.files.failed_total").increment(1);
                report.failed.push((path.clone(), format!("{e:#}")));
            }
        }
    }

    report
}
