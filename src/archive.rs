use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Where `source` would land in `archive_dir`: the original file name, or
/// `<stem>_<n>.<ext>` with the first free `n` when that name is taken
pub fn destination_for(source: &Path, archive_dir: &Path) -> Result<PathBuf> {
    let file_name = source
        .file_name()
        .with_context(|| format!("{:?} has no file name", source))?;
    let candidate = archive_dir.join(file_name);
    if !candidate.exists() {
        return Ok(candidate);
    }

    let stem = source
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let extension = source.extension().map(|e| e.to_string_lossy().into_owned());
    for n in 1u32.. {
        let name = match &extension {
            Some(ext) => format!("{stem}_{n}.{ext}"),
            None => format!("{stem}_{n}"),
        };
        let candidate = archive_dir.join(name);
        if !candidate.exists() {
            return Ok(candidate);
        }
    }
    anyhow::bail!("No free archive name for {:?} in {:?}", source, archive_dir)
}

/// Copy `source` to `destination`, then remove the original. The copy is
/// left in place if the removal fails.
pub fn archive_to(source: &Path, destination: &Path) -> Result<PathBuf> {
    if let Some(parent) = destination.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create archive directory {:?}", parent))?;
    }
    fs::copy(source, destination)
        .with_context(|| format!("Failed to copy {:?} to {:?}", source, destination))?;
    fs::remove_file(source)
        .with_context(|| format!("Copied {:?} to {:?} but could not remove the original", source, destination))?;
    info!("Archived {:?} to {:?}", source, destination);
    Ok(destination.to_path_buf())
}

/// Move a source file into the archive directory under a free name
pub fn archive_file(source: &Path, archive_dir: &Path) -> Result<PathBuf> {
    let destination = destination_for(source, archive_dir)?;
    archive_to(source, &destination)
}
