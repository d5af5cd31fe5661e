//! Run directories and their artifacts.
//!
//! A run is one directory under the configured runs root. Each pipeline
//! stage writes a well-known artifact into it, and a stage whose artifact
//! is already present is skipped. The store never deletes or rewrites run
//! contents on its own.
//!
//! # Run identifiers
//!
//! | Strategy | Example | Reuse |
//! |----------|---------|-------|
//! | [`RunKeyStrategy::Content`] | `atlanta_food-3f2a9c1b7d4e` | same scope + topic |
//! | [`RunKeyStrategy::Minute`] | `2025-06-15_13_07` | same wall-clock minute |
//! | explicit | anything passing [`validate_run_id`] | same id |

use anyhow::{bail, Context, Result};
use chrono::{DateTime, TimeZone};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fmt::Display;
use std::path::PathBuf;

use crate::config::RunKeyStrategy;

/// Raw acquisition output: JSON array of content records.
pub const RAW_ARTIFACT: &str = "raw_scrap_results.json";
/// Written after every batch reached the index.
pub const INDEX_MARKER: &str = "index_built.json";
/// File-name prefix shared by all search-result artifacts.
pub const SEARCH_ARTIFACT_PREFIX: &str = "vector_search_results";

const MAX_SLUG_LEN: usize = 40;

/// Handle to a resolved run directory.
#[derive(Debug, Clone)]
pub struct RunHandle {
    pub id: String,
    pub dir: PathBuf,
    /// True when this call created the directory.
    pub created: bool,
}

impl RunHandle {
    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.dir.join(name)
    }

    pub fn artifact_exists(&self, name: &str) -> bool {
        self.artifact_path(name).is_file()
    }
}

/// Artifact status for one run, as shown by `harvest runs`.
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub id: String,
    pub path: PathBuf,
    pub raw_artifact: bool,
    pub index_built: bool,
    pub search_artifacts: usize,
}

#[derive(Debug, Clone)]
pub struct RunStore {
    root: PathBuf,
}

impl RunStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Return the run directory for `id`, creating it (and any missing
    /// parents) if it does not exist. Existing contents are left untouched.
    pub fn resolve_or_create(&self, id: &str) -> Result<RunHandle> {
        validate_run_id(id)?;
        let dir = self.root.join(id);

        if dir.is_dir() {
            return Ok(RunHandle {
                id: id.to_string(),
                dir,
                created: false,
            });
        }

        // A concurrent creator may win the race; create_dir_all tolerates that.
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create run directory: {}", dir.display()))?;

        Ok(RunHandle {
            id: id.to_string(),
            dir,
            created: true,
        })
    }

    /// Open an existing run without creating anything.
    pub fn open(&self, id: &str) -> Result<RunHandle> {
        validate_run_id(id)?;
        let dir = self.root.join(id);
        if !dir.is_dir() {
            bail!("run not found: {}", id);
        }
        Ok(RunHandle {
            id: id.to_string(),
            dir,
            created: false,
        })
    }

    pub fn artifact_path(&self, handle: &RunHandle, name: &str) -> PathBuf {
        handle.artifact_path(name)
    }

    pub fn artifact_exists(&self, handle: &RunHandle, name: &str) -> bool {
        handle.artifact_exists(name)
    }

    /// List every run under the root, sorted by id. A missing root yields
    /// an empty list.
    pub fn list_runs(&self) -> Result<Vec<RunSummary>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut runs = Vec::new();
        let entries = std::fs::read_dir(&self.root)
            .with_context(|| format!("Failed to read runs root: {}", self.root.display()))?;

        for entry in entries {
            let entry = entry?;
            if !entry.file_type()?.is_dir() {
                continue;
            }
            let id = entry.file_name().to_string_lossy().to_string();
            let handle = RunHandle {
                id: id.clone(),
                dir: entry.path(),
                created: false,
            };
            runs.push(RunSummary {
                raw_artifact: handle.artifact_exists(RAW_ARTIFACT),
                index_built: handle.artifact_exists(INDEX_MARKER),
                search_artifacts: search_artifacts(&handle)?.len(),
                path: handle.dir,
                id,
            });
        }

        runs.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(runs)
    }
}

/// Paths of every search-result artifact in a run, sorted by file name.
pub fn search_artifacts(handle: &RunHandle) -> Result<Vec<PathBuf>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(&handle.dir)? {
        let entry = entry?;
        let name = entry.file_name().to_string_lossy().to_string();
        if name.starts_with(SEARCH_ARTIFACT_PREFIX) && entry.file_type()?.is_file() {
            paths.push(entry.path());
        }
    }
    paths.sort();
    Ok(paths)
}

/// Derive a run identifier from the configured strategy.
pub fn derive_run_id<Tz>(
    strategy: RunKeyStrategy,
    scope: &str,
    topic: &str,
    now: &DateTime<Tz>,
) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    match strategy {
        RunKeyStrategy::Content => content_key(scope, topic),
        RunKeyStrategy::Minute => minute_key(now),
    }
}

/// Wall-clock key: `YYYY-MM-DD_HH_MM` in the timestamp's own zone.
pub fn minute_key<Tz>(at: &DateTime<Tz>) -> String
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    at.format("%Y-%m-%d_%H_%M").to_string()
}

/// Content-derived key: readable slug plus 12 hex chars of a SHA-256 over
/// the case- and whitespace-normalized scope and topic.
pub fn content_key(scope: &str, topic: &str) -> String {
    let scope = scope.trim().to_lowercase();
    let topic = topic.trim().to_lowercase();

    let mut hasher = Sha256::new();
    hasher.update(scope.as_bytes());
    hasher.update([0x1f]);
    hasher.update(topic.as_bytes());
    let digest = format!("{:x}", hasher.finalize());

    let slug = match (slugify(&scope), slugify(&topic)) {
        (s, t) if s.is_empty() && t.is_empty() => "run".to_string(),
        (s, t) if t.is_empty() => s,
        (s, t) if s.is_empty() => t,
        (s, t) => format!("{}_{}", s, t),
    };
    let slug: String = slug.chars().take(MAX_SLUG_LEN).collect();

    format!("{}-{}", slug.trim_end_matches('-'), &digest[..12])
}

fn slugify(text: &str) -> String {
    let mut slug = String::new();
    let mut pending_dash = false;
    for c in text.chars() {
        if c.is_ascii_alphanumeric() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    slug
}

/// A run id must be one plain path component.
pub fn validate_run_id(id: &str) -> Result<()> {
    if id.is_empty() || id == "." || id == ".." {
        bail!("invalid run id: '{}'", id);
    }
    if !id
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
    {
        bail!(
            "invalid run id: '{}' (allowed: ASCII letters, digits, '-', '_', '.')",
            id
        );
    }
    Ok(())
}
