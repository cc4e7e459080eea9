//! Discovery and loading of IaC documents from disk.
//!
//! Walks the given paths, detects each file's dialect and applies the input
//! limits: documents are taken in path order, at most `limits.max_files` of
//! them, each truncated to `limits.max_bytes_per_file` bytes.
//!
//! A document's environment is detected from its path below the input it
//! was found under, so directories above the scanned tree never count.

use crate::config::Config;
use crate::error::{IacMapError, Result};
use crate::parser::{detect_dialect, is_candidate_file, SKIP_DIRS};
use crate::taxonomy::environment_for_path;
use crate::types::SourceDocument;

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Documents ready for the pipeline, plus what the limits left out.
#[derive(Debug, Default)]
pub struct LoadedSources {
    /// Documents in path order
    pub documents: Vec<SourceDocument>,
    /// Documents dropped because of `limits.max_files`
    pub dropped: Vec<PathBuf>,
    /// Documents whose contents were cut to `limits.max_bytes_per_file`
    pub truncated: Vec<PathBuf>,
    /// Files that could not be read
    pub unreadable: Vec<(PathBuf, String)>,
}

/// Loads IaC documents from files and directories.
pub struct SourceLoader {
    max_files: usize,
    max_bytes_per_file: usize,
    max_depth: usize,
    exclude: Vec<glob::Pattern>,
}

impl SourceLoader {
    #[must_use]
    pub fn new(config: &Config) -> Self {
        let exclude = config
            .scan
            .exclude_patterns
            .iter()
            .filter_map(|pattern| match glob::Pattern::new(pattern) {
                Ok(p) => Some(p),
                Err(e) => {
                    tracing::warn!(pattern = %pattern, error = %e, "Ignoring invalid exclude pattern");
                    None
                }
            })
            .collect();

        Self {
            max_files: config.limits.max_files,
            max_bytes_per_file: config.limits.max_bytes_per_file,
            max_depth: config.scan.max_depth,
            exclude,
        }
    }

    /// Discover and read every document under `paths`.
    ///
    /// # Errors
    ///
    /// Returns an error if one of the given paths does not exist.
    pub async fn load<P: AsRef<Path>>(&self, paths: &[P]) -> Result<LoadedSources> {
        // file -> input it was found under
        let mut candidates: BTreeMap<PathBuf, PathBuf> = BTreeMap::new();
        for path in paths {
            let root = path.as_ref();
            for file in self.discover(root)? {
                candidates.entry(file).or_insert_with(|| root.to_path_buf());
            }
        }
        tracing::debug!(candidates = candidates.len(), "Discovered candidate files");

        let mut loaded = LoadedSources::default();
        for (path, root) in candidates {
            let mut bytes = match tokio::fs::read(&path).await {
                Ok(bytes) => bytes,
                Err(e) => {
                    let e = IacMapError::io(&path, e, file!(), line!());
                    tracing::warn!(file = %path.display(), error = %e, "Failed to read file, skipping");
                    loaded.unreadable.push((path, e.to_string()));
                    continue;
                }
            };

            let Some(dialect) = detect_dialect(&path, Some(&String::from_utf8_lossy(&bytes))) else {
                tracing::debug!(file = %path.display(), "Not an IaC document, skipping");
                continue;
            };

            if loaded.documents.len() >= self.max_files {
                loaded.dropped.push(path);
                continue;
            }

            if bytes.len() > self.max_bytes_per_file {
                tracing::debug!(
                    file = %path.display(),
                    size = bytes.len(),
                    limit = self.max_bytes_per_file,
                    "Truncating document"
                );
                bytes.truncate(self.max_bytes_per_file);
                loaded.truncated.push(path.clone());
            }

            let environment = environment_below(&path, &root);
            loaded.documents.push(SourceDocument::new(path, dialect, bytes).with_environment(environment));
        }

        if !loaded.dropped.is_empty() {
            tracing::warn!(
                limit = self.max_files,
                dropped = loaded.dropped.len(),
                "File limit reached, remaining documents were not loaded"
            );
        }
        tracing::info!(
            documents = loaded.documents.len(),
            truncated = loaded.truncated.len(),
            "Loaded documents"
        );

        Ok(loaded)
    }

    /// Candidate files under a path. A file given explicitly is always a candidate.
    fn discover(&self, path: &Path) -> Result<Vec<PathBuf>> {
        if path.is_file() {
            return Ok(vec![path.to_path_buf()]);
        }
        if !path.is_dir() {
            return Err(if path.extension().is_some() {
                crate::err!(FileNotFound { path: path.to_path_buf() })
            } else {
                crate::err!(DirectoryNotFound { path: path.to_path_buf() })
            });
        }

        let mut files = Vec::new();
        for entry in WalkDir::new(path)
            .max_depth(self.max_depth)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !self.should_skip(e.path(), e.file_type().is_dir()))
        {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to read directory entry");
                    continue;
                }
            };
            if entry.file_type().is_file() && is_candidate_file(entry.path()) {
                files.push(entry.into_path());
            }
        }
        Ok(files)
    }

    fn should_skip(&self, path: &Path, is_dir: bool) -> bool {
        if let Some(name) = path.file_name().and_then(|n| n.to_str()) {
            if is_dir && (SKIP_DIRS.contains(&name) || name.starts_with('.')) {
                tracing::debug!(path = %path.display(), reason = "skipped directory", "Skipping path");
                return true;
            }
        }
        if self.exclude.iter().any(|p| p.matches_path(path)) {
            tracing::debug!(path = %path.display(), reason = "matches exclude pattern", "Skipping path");
            return true;
        }
        false
    }
}

/// Environment of `path`; absolute paths only count the part below `root`.
fn environment_below(path: &Path, root: &Path) -> Option<String> {
    let relevant = if path.is_absolute() {
        path.strip_prefix(root).unwrap_or(path)
    } else {
        path
    };
    environment_for_path(relevant)
}
