//! Vector index abstraction and the batched index builder.
//!
//! [`VectorIndex`] is the narrow interface to the index service: upsert a
//! batch of records, query by text. Embedding is the service's concern.
//! Concrete backends:
//! - **[`PineconeIndex`]**: Pinecone integrated-embedding records API.
//! - **[`MemoryIndex`]**: process-local index for tests and offline runs.
//!
//! [`IndexBuilder`] pushes a run's records in fixed-size batches and then
//! writes the [`INDEX_MARKER`] artifact that gates later rebuilds.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{info, warn};

use crate::config::IndexConfig;
use crate::memory_index::MemoryIndex;
use crate::models::{ContentRecord, IndexEntry, SearchHit};
use crate::pinecone::PineconeIndex;
use crate::run_store::{RunHandle, INDEX_MARKER};

#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// Backend identifier recorded in the index marker (e.g. `"pinecone"`).
    fn provider(&self) -> &str;

    /// Insert or replace `entries` in the named index, keyed by entry id.
    async fn upsert(&self, index_name: &str, entries: &[IndexEntry]) -> Result<()>;

    /// Return up to `top_k` entries nearest to `text`, best first.
    async fn query(&self, index_name: &str, text: &str, top_k: usize) -> Result<Vec<SearchHit>>;

    /// Whether records pushed earlier under `index_name` are still
    /// queryable. Durable services keep them; process-local backends lose
    /// them on restart.
    async fn retains(&self, _index_name: &str) -> Result<bool> {
        Ok(true)
    }
}

/// Create the configured index backend.
pub fn create_index(config: &IndexConfig) -> Result<Arc<dyn VectorIndex>> {
    match config.provider.as_str() {
        "pinecone" => Ok(Arc::new(PineconeIndex::from_env(config)?)),
        "memory" => Ok(Arc::new(MemoryIndex::new())),
        other => bail!("Unknown index provider: {}", other),
    }
}

/// Contents of the [`INDEX_MARKER`] artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMarker {
    pub index_name: String,
    pub provider: String,
    pub record_count: usize,
    pub batches: usize,
    pub built_at: String,
}

pub struct IndexBuilder {
    index: Arc<dyn VectorIndex>,
}

impl IndexBuilder {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self { index }
    }

    /// Push `records` to `index_name` in batches of `batch_size`, in order,
    /// one batch at a time. A failed batch aborts the build and no marker is
    /// written. Returns the number of batches pushed.
    pub async fn build(
        &self,
        handle: &RunHandle,
        records: &[ContentRecord],
        batch_size: usize,
        index_name: &str,
    ) -> Result<usize> {
        if batch_size == 0 {
            bail!("batch_size must be > 0");
        }

        let total = records.len().div_ceil(batch_size);
        let mut batches = 0;

        for batch in records.chunks(batch_size) {
            let entries: Vec<IndexEntry> = batch.iter().map(IndexEntry::from).collect();
            self.index
                .upsert(index_name, &entries)
                .await
                .with_context(|| {
                    format!(
                        "upsert of batch {}/{} to index '{}' failed",
                        batches + 1,
                        total,
                        index_name
                    )
                })?;
            batches += 1;
            info!(index = index_name, batch = batches, total, size = entries.len(), "pushed batch");
        }

        let marker = IndexMarker {
            index_name: index_name.to_string(),
            provider: self.index.provider().to_string(),
            record_count: records.len(),
            batches,
            built_at: Utc::now().to_rfc3339(),
        };
        write_marker(handle, &marker)?;

        Ok(batches)
    }

    /// True when the run's marker names `index_name` and the backend still
    /// holds that index.
    pub async fn is_built(&self, handle: &RunHandle, index_name: &str) -> Result<bool> {
        match read_marker(handle) {
            Some(marker) if marker.index_name == index_name => {
                self.index.retains(index_name).await
            }
            _ => Ok(false),
        }
    }
}

fn write_marker(handle: &RunHandle, marker: &IndexMarker) -> Result<()> {
    let path = handle.artifact_path(INDEX_MARKER);
    std::fs::write(&path, serde_json::to_string_pretty(marker)?)
        .with_context(|| format!("Failed to write index marker: {}", path.display()))
}

/// Read the run's index marker. A missing or unreadable marker counts as
/// "not built"; rebuilding only re-upserts the same ids.
pub fn read_marker(handle: &RunHandle) -> Option<IndexMarker> {
    if !handle.artifact_exists(INDEX_MARKER) {
        return None;
    }
    let path = handle.artifact_path(INDEX_MARKER);
    let parsed = std::fs::read_to_string(&path)
        .map_err(anyhow::Error::from)
        .and_then(|s| serde_json::from_str(&s).map_err(anyhow::Error::from));
    match parsed {
        Ok(marker) => Some(marker),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unreadable index marker");
            None
        }
    }
}
