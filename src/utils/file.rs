//! File utilities for discovering source documents.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::PipelineError;
use crate::models::DocumentKind;

/// Lower-cased extension of a path, without the dot.
pub fn normalized_extension(path: &Path) -> Option<String> {
    path.extension()
        .map(|ext| ext.to_string_lossy().to_lowercase())
}

/// Check if a path has one of the supported document extensions.
pub fn is_supported_file(path: &Path) -> bool {
    normalized_extension(path)
        .as_deref()
        .and_then(DocumentKind::from_extension)
        .is_some()
}

/// Identifier used by the ledger: the file's base name.
pub fn file_identifier(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_else(|| path.to_string_lossy().to_string())
}

/// List supported files directly inside `dir`, sorted by path.
///
/// Sub-directories are not descended into. Files whose base name matches
/// one of the `exclude` glob patterns are left out.
pub fn list_supported_files(dir: &Path, exclude: &[String]) -> Result<Vec<PathBuf>, PipelineError> {
    let patterns: Vec<glob::Pattern> = exclude
        .iter()
        .filter_map(|p| match glob::Pattern::new(p) {
            Ok(pattern) => Some(pattern),
            Err(e) => {
                tracing::warn!("ignoring invalid exclude pattern '{p}': {e}");
                None
            }
        })
        .collect();

    let mut files = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1).follow_links(true) {
        let entry = entry.map_err(|e| PipelineError::Walk(e.to_string()))?;
        let path = entry.path();

        if !entry.file_type().is_file() || !is_supported_file(path) {
            continue;
        }

        let name = file_identifier(path);
        if patterns.iter().any(|p| p.matches(&name)) {
            continue;
        }

        files.push(path.to_path_buf());
    }

    files.sort();
    Ok(files)
}
