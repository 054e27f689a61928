//! Where source files come from.
//!
//! The analyzer only sees plain text; how the text was fetched is behind
//! `RepositorySource`. `LocalDirectory` walks a checkout on disk.

use async_trait::async_trait;
use globset::{Glob, GlobSet, GlobSetBuilder};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;
use walkdir::WalkDir;

use crate::rules::Language;

/// Default cap on the size of a single file.
pub const DEFAULT_MAX_FILE_BYTES: u64 = 1024 * 1024;

/// Directory names never descended into.
const SKIPPED_DIRS: &[&str] = &["node_modules", "vendor", "__pycache__", "venv", "dist", "build"];

#[derive(Error, Debug)]
pub enum SourceError {
    #[error("walking {path}: {source}")]
    Walk {
        path: String,
        #[source]
        source: walkdir::Error,
    },
    #[error("invalid exclusion pattern {pattern:?}: {source}")]
    Glob {
        pattern: String,
        #[source]
        source: globset::Error,
    },
    #[error("source listing task failed: {0}")]
    Worker(String),
}

/// One file's text and language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceFile {
    /// Path relative to the repository root, `/`-separated
    pub path: String,
    pub content: String,
    pub language: Language,
}

impl SourceFile {
    /// Build a file, inferring the language from the path's extension.
    pub fn from_path_and_content(path: impl Into<String>, content: impl Into<String>) -> Self {
        let path = path.into();
        let language = Path::new(&path)
            .extension()
            .and_then(|e| e.to_str())
            .map(Language::from_extension)
            .unwrap_or(Language::Unknown);
        Self {
            path,
            content: content.into(),
            language,
        }
    }
}

/// Why a file was left out of a codebase analysis.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    TooLarge,
    Binary,
    UnknownLanguage,
    Unreadable,
}

impl SkipReason {
    /// Whether the file was source code the analysis could have covered.
    /// Files in unsupported languages are listed but do not count as lost.
    pub fn loses_coverage(&self) -> bool {
        !matches!(self, SkipReason::UnknownLanguage)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SkippedFile {
    pub path: String,
    pub reason: SkipReason,
}

/// Files fetched from a repository, plus the ones left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceListing {
    pub files: Vec<SourceFile>,
    pub skipped: Vec<SkippedFile>,
}

impl From<Vec<SourceFile>> for SourceListing {
    fn from(files: Vec<SourceFile>) -> Self {
        Self {
            files,
            skipped: Vec::new(),
        }
    }
}

/// Supplies the files of one repository.
#[async_trait]
pub trait RepositorySource: Send + Sync {
    /// Stable identifier used as the cache key of the codebase report.
    fn identifier(&self) -> String;

    async fn list_files(&self) -> Result<SourceListing, SourceError>;
}

/// A repository checked out on the local filesystem.
#[derive(Debug, Clone)]
pub struct LocalDirectory {
    root: PathBuf,
    excluded: GlobSet,
    include_test_files: bool,
    max_file_bytes: u64,
}

impl LocalDirectory {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            excluded: GlobSet::empty(),
            include_test_files: true,
            max_file_bytes: DEFAULT_MAX_FILE_BYTES,
        }
    }

    /// Exclude paths (relative to the root) matching any of `patterns`.
    pub fn with_exclusions(mut self, patterns: &[String]) -> Result<Self, SourceError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in patterns {
            let glob = Glob::new(pattern).map_err(|source| SourceError::Glob {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        self.excluded = builder.build().map_err(|source| SourceError::Glob {
            pattern: patterns.join(", "),
            source,
        })?;
        Ok(self)
    }

    pub fn include_test_files(mut self, include: bool) -> Self {
        self.include_test_files = include;
        self
    }

    pub fn max_file_bytes(mut self, max: u64) -> Self {
        self.max_file_bytes = max;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Walk the directory synchronously.
    pub fn collect(&self) -> Result<SourceListing, SourceError> {
        let mut listing = SourceListing::default();

        let walker = WalkDir::new(&self.root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_skipped_dir(e));

        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(source) if source.depth() == 0 => {
                    return Err(SourceError::Walk {
                        path: self.root.display().to_string(),
                        source,
                    });
                }
                Err(e) => {
                    let relative = e
                        .path()
                        .map(|p| relative_path(&self.root, p))
                        .unwrap_or_default();
                    debug!(path = %relative, error = %e, "skipping unwalkable entry");
                    listing.skipped.push(SkippedFile {
                        path: relative,
                        reason: SkipReason::Unreadable,
                    });
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }

            let path = entry.path();
            let relative = relative_path(&self.root, path);
            if self.excluded.is_match(&relative) {
                continue;
            }
            if !self.include_test_files && is_test_path(&relative) {
                continue;
            }

            let language = path
                .extension()
                .and_then(|e| e.to_str())
                .map(Language::from_extension)
                .unwrap_or(Language::Unknown);
            if !language.is_known() {
                listing.skipped.push(SkippedFile {
                    path: relative,
                    reason: SkipReason::UnknownLanguage,
                });
                continue;
            }

            let size = entry.metadata().map(|m| m.len()).unwrap_or(0);
            if size > self.max_file_bytes {
                debug!(path = %relative, size, "skipping oversized file");
                listing.skipped.push(SkippedFile {
                    path: relative,
                    reason: SkipReason::TooLarge,
                });
                continue;
            }

            match std::fs::read(path) {
                Ok(bytes) => match String::from_utf8(bytes) {
                    Ok(content) => listing.files.push(SourceFile {
                        path: relative,
                        content,
                        language,
                    }),
                    Err(_) => listing.skipped.push(SkippedFile {
                        path: relative,
                        reason: SkipReason::Binary,
                    }),
                },
                Err(e) => {
                    debug!(path = %relative, error = %e, "skipping unreadable file");
                    listing.skipped.push(SkippedFile {
                        path: relative,
                        reason: SkipReason::Unreadable,
                    });
                }
            }
        }

        Ok(listing)
    }
}

#[async_trait]
impl RepositorySource for LocalDirectory {
    fn identifier(&self) -> String {
        std::fs::canonicalize(&self.root)
            .unwrap_or_else(|_| self.root.clone())
            .display()
            .to_string()
    }

    async fn list_files(&self) -> Result<SourceListing, SourceError> {
        let dir = self.clone();
        tokio::task::spawn_blocking(move || dir.collect())
            .await
            .map_err(|e| SourceError::Worker(e.to_string()))?
    }
}

fn is_skipped_dir(entry: &walkdir::DirEntry) -> bool {
    if !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    name.starts_with('.') || SKIPPED_DIRS.contains(&name.as_ref())
}

fn relative_path(root: &Path, path: &Path) -> String {
    let rel = path.strip_prefix(root).unwrap_or(path);
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Whether a relative path looks like test code.
pub fn is_test_path(relative: &str) -> bool {
    let mut parts: Vec<&str> = relative.split('/').collect();
    let Some(name) = parts.pop() else {
        return false;
    };

    if parts
        .iter()
        .any(|dir| matches!(*dir, "test" | "tests" | "__tests__" | "spec"))
    {
        return true;
    }

    let stem = name.split('.').next().unwrap_or(name);
    stem.starts_with("test_")
        || stem.ends_with("_test")
        || name.contains(".test.")
        || name.contains(".spec.")
        || name == "conftest.py"
}
