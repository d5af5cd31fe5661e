//! Semantic retrieval and the search-result artifact.
//!
//! A search sends one query to the [`VectorIndex`] and persists the ranked
//! hits as JSON in the run directory. The artifact's file name depends on
//! the configured [`SearchCacheMode`]:
//!
//! | Mode | File |
//! |------|------|
//! | `per_query` | `vector_search_results_<sha256(query)[..12]>.json` |
//! | `per_run` | `vector_search_results.json` |

use anyhow::{Context, Result};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::config::SearchCacheMode;
use crate::index::VectorIndex;
use crate::models::SearchHit;
use crate::run_store::{RunHandle, SEARCH_ARTIFACT_PREFIX};

/// Contents of a search-result artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchArtifact {
    pub query: String,
    pub index_name: String,
    pub top_k: usize,
    pub created_at: String,
    pub hits: Vec<SearchHit>,
}

pub fn search_artifact_name(mode: SearchCacheMode, query: &str) -> String {
    match mode {
        SearchCacheMode::PerRun => format!("{}.json", SEARCH_ARTIFACT_PREFIX),
        SearchCacheMode::PerQuery => {
            let mut hasher = Sha256::new();
            hasher.update(query.trim().as_bytes());
            let digest = format!("{:x}", hasher.finalize());
            format!("{}_{}.json", SEARCH_ARTIFACT_PREFIX, &digest[..12])
        }
    }
}

pub struct Retriever {
    index: Arc<dyn VectorIndex>,
    cache: SearchCacheMode,
}

impl Retriever {
    pub fn new(index: Arc<dyn VectorIndex>, cache: SearchCacheMode) -> Self {
        Self { index, cache }
    }

    /// File name this retriever writes for `query`.
    pub fn artifact_name(&self, query: &str) -> String {
        search_artifact_name(self.cache, query)
    }

    /// Query `index_name` for the `top_k` nearest records and write the
    /// ranked hits to the run. Returns the artifact path.
    pub async fn search(
        &self,
        index_name: &str,
        query: &str,
        handle: &RunHandle,
        top_k: usize,
    ) -> Result<PathBuf> {
        let hits = self
            .index
            .query(index_name, query, top_k)
            .await
            .with_context(|| format!("query against index '{}' failed", index_name))?;

        let artifact = SearchArtifact {
            query: query.to_string(),
            index_name: index_name.to_string(),
            top_k,
            created_at: Utc::now().to_rfc3339(),
            hits,
        };

        let path = handle.artifact_path(&self.artifact_name(query));
        std::fs::write(&path, serde_json::to_string_pretty(&artifact)?)
            .with_context(|| format!("Failed to write search results: {}", path.display()))?;

        info!(run = %handle.id, hits = artifact.hits.len(), path = %path.display(), "saved search results");
        Ok(path)
    }
}

pub fn load_search_artifact(path: &Path) -> Result<SearchArtifact> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read search results: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Malformed search results: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory_index::MemoryIndex;
    use crate::models::{IndexEntry, RecordMetadata};
    use crate::run_store::RunStore;
    use tempfile::TempDir;

    fn entry(id: &str, text: &str) -> IndexEntry {
        IndexEntry {
            id: id.to_string(),
            text: text.to_string(),
            metadata: RecordMetadata {
                subreddit: "Atlanta".to_string(),
                created_utc: 0.0,
                upvotes: 0,
                num_comments: 0,
            },
        }
    }

    #[test]
    fn test_artifact_names() {
        assert_eq!(
            search_artifact_name(SearchCacheMode::PerRun, "anything"),
            "vector_search_results.json"
        );
        let a = search_artifact_name(SearchCacheMode::PerQuery, "best tacos");
        let b = search_artifact_name(SearchCacheMode::PerQuery, "  best tacos ");
        let c = search_artifact_name(SearchCacheMode::PerQuery, "best ramen");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert!(a.starts_with("vector_search_results_"));
        assert!(a.ends_with(".json"));
    }

    #[tokio::test]
    async fn test_search_writes_ranked_artifact() {
        let tmp = TempDir::new().unwrap();
        let run = RunStore::new(tmp.path()).resolve_or_create("r").unwrap();
        let index = Arc::new(MemoryIndex::new());
        index
            .upsert(
                "mcp-test",
                &[entry("a", "bbq ribs"), entry("b", "tacos al pastor"), entry("c", "tacos")],
            )
            .await
            .unwrap();

        let retriever = Retriever::new(index, SearchCacheMode::PerQuery);
        let path = retriever.search("mcp-test", "tacos", &run, 2).await.unwrap();
        assert_eq!(path, run.artifact_path(&retriever.artifact_name("tacos")));

        let artifact = load_search_artifact(&path).unwrap();
        assert_eq!(artifact.query, "tacos");
        assert_eq!(artifact.index_name, "mcp-test");
        assert_eq!(artifact.top_k, 2);
        assert_eq!(artifact.hits.len(), 2);
        assert_eq!(artifact.hits[0].id, "c");
        assert_eq!(artifact.hits[1].id, "b");
    }

    #[tokio::test]
    async fn test_search_failure_writes_nothing() {
        let tmp = TempDir::new().unwrap();
        let run = RunStore::new(tmp.path()).resolve_or_create("r").unwrap();
        let retriever = Retriever::new(Arc::new(MemoryIndex::new()), SearchCacheMode::PerRun);

        let err = retriever.search("missing", "q", &run, 5).await.unwrap_err();
        assert!(format!("{:#}", err).contains("index not found"));
        assert!(!run.artifact_exists("vector_search_results.json"));
    }
}
