use crate::workorder::filename::{IdMode, extract_id};
use crate::workorder::scanner::TRANSIENT_EDIT_PREFIX;
use anyhow::{Context, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

/// Documents in `dir` whose name opens with `id`, sorted by path.
/// A missing directory simply has no documents.
pub fn locate_documents(dir: &Path, id: u32, extensions: &[String]) -> Result<Vec<PathBuf>> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut found = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("failed to read {}", dir.display()))? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        let known = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|ext| {
                extensions
                    .iter()
                    .any(|k| k.trim_start_matches('.').eq_ignore_ascii_case(ext))
            });
        if !known || name.starts_with(TRANSIENT_EDIT_PREFIX) {
            continue;
        }
        if extract_id(name, IdMode::Anchored).is_some_and(|f| f.id == id) {
            found.push(path);
        }
    }
    found.sort();
    Ok(found)
}

/// Remove every document for `id` so a later scan cannot bring the ticket
/// back. Returns the removed paths; nothing to remove is not an error.
pub fn delete_documents(dir: &Path, id: u32, extensions: &[String]) -> Result<Vec<PathBuf>> {
    let found = locate_documents(dir, id, extensions)?;
    for path in &found {
        fs::remove_file(path).with_context(|| format!("failed to delete {}", path.display()))?;
        info!(id, file = %path.display(), "deleted work-order document");
    }
    Ok(found)
}
