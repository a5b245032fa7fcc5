use crate::error::{Error, Result};
use chrono::{DateTime, Local};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Format used for the per-run output folder, e.g. `20200228-1405`
pub const RUN_STAMP_FORMAT: &str = "%Y%m%d-%H%M";

pub fn run_stamp(now: DateTime<Local>) -> String {
    now.format(RUN_STAMP_FORMAT).to_string()
}

/// Ensure a directory (and its parents) exists
pub fn ensure_directory(path: &Path) -> Result<()> {
    if !path.exists() {
        fs::create_dir_all(path)
            .map_err(|e| Error::io(format!("failed to create {}", path.display()), e))?;
        info!(action = "create", component = "files", path = ?path, "Created directory");
    }
    Ok(())
}

/// List the regular files directly inside `dir`, sorted by name
pub fn list_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let entries =
        fs::read_dir(dir).map_err(|e| Error::io(format!("failed to read {}", dir.display()), e))?;

    let mut files: Vec<PathBuf> = entries
        .filter_map(|entry| {
            entry.ok().and_then(|e| {
                if e.file_type().ok()?.is_file() {
                    Some(e.path())
                } else {
                    None
                }
            })
        })
        .collect();
    files.sort();
    Ok(files)
}

/// Split a path's file name into stem and lowercase extension (without the dot)
pub fn split_name(path: &Path) -> Option<(String, String)> {
    let stem = path.file_stem()?.to_str()?;
    let ext = path.extension()?.to_str()?;
    Some((stem.to_string(), ext.to_ascii_lowercase()))
}
