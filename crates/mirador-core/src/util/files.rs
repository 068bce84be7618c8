//! Async file utilities for directory ingestion.
//!
//! Provides recursive file discovery filtered by extension. I/O errors
//! carry the offending path.

use async_walkdir::WalkDir;
use futures::StreamExt;
use std::path::{Path, PathBuf};
use tokio::fs;

use crate::{Error, Result};

/// Options for discovering files under a directory.
#[derive(Debug, Clone, Default)]
pub struct FindOptions {
    /// Extensions to keep (without dot, compared case-insensitively).
    /// Empty keeps every file.
    pub extensions: Vec<String>,
    /// Maximum directory depth to search (None = unlimited)
    pub max_depth: Option<usize>,
}

impl FindOptions {
    /// Options keeping only the given extensions.
    pub fn with_extensions<I, S>(extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Self {
            extensions: extensions
                .into_iter()
                .map(|e| e.as_ref().trim_start_matches('.').to_ascii_lowercase())
                .collect(),
            max_depth: None,
        }
    }

    /// Set maximum search depth.
    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.max_depth = Some(depth);
        self
    }

    fn accepts(&self, path: &Path) -> bool {
        if self.extensions.is_empty() {
            return true;
        }
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .is_some_and(|e| self.extensions.iter().any(|want| *want == e))
    }
}

/// Information about a discovered file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileInfo {
    /// Full path to the file.
    pub path: PathBuf,
    /// File stem (filename without extension).
    pub stem: String,
    /// File name including extension.
    pub file_name: String,
    /// Path relative to the search base.
    pub relative_path: PathBuf,
}

impl FileInfo {
    /// Parent folder relative to the search base, `""` for top-level files.
    pub fn relative_folder(&self) -> String {
        self.relative_path
            .parent()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Find all files matching criteria in a directory.
///
/// Results are sorted by relative path so callers see a stable order
/// regardless of directory iteration order. Fails if `base_path` is not
/// a readable directory.
///
/// # Example
///
/// ```no_run
/// # use mirador_core::util::files::{find_all_files, FindOptions};
/// # use std::path::Path;
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let files = find_all_files(
///     Path::new("uploads"),
///     FindOptions::with_extensions(["png", "txt"]).with_max_depth(3),
/// ).await?;
/// # Ok(())
/// # }
/// ```
pub async fn find_all_files(base_path: &Path, options: FindOptions) -> Result<Vec<FileInfo>> {
    let metadata = fs::metadata(base_path)
        .await
        .map_err(|e| Error::io_with_path(e, base_path))?;
    if !metadata.is_dir() {
        return Err(Error::validation(format!(
            "{} is not a directory",
            base_path.display()
        )));
    }

    let mut files = Vec::new();
    let mut walker = WalkDir::new(base_path);

    while let Some(entry_result) = walker.next().await {
        let entry = entry_result
            .map_err(|e| Error::io_with_path(std::io::Error::other(e), base_path))?;
        let path = entry.path();

        let file_type = entry
            .file_type()
            .await
            .map_err(|e| Error::io_with_path(e, &path))?;
        if !file_type.is_file() {
            continue;
        }

        if let Some(max_depth) = options.max_depth {
            let depth = path
                .strip_prefix(base_path)
                .map(|p| p.components().count())
                .unwrap_or(0);
            if depth > max_depth {
                continue;
            }
        }

        if !options.accepts(&path) {
            continue;
        }

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();
        let file_name = path
            .file_name()
            .and_then(|s| s.to_str())
            .unwrap_or("unknown")
            .to_string();

        let relative_path = path.strip_prefix(base_path).unwrap_or(&path).to_path_buf();

        files.push(FileInfo {
            path: path.clone(),
            stem,
            file_name,
            relative_path,
        });
    }

    files.sort_by(|a, b| a.relative_path.cmp(&b.relative_path));
    log::debug!(
        "Discovered {} files under {}",
        files.len(),
        base_path.display()
    );
    Ok(files)
}
