//! Pipeline orchestration.
//!
//! Drives one request through the stages, skipping each stage whose
//! artifact already exists in the run directory:
//!
//! ```text
//! resolve run ─▶ acquire + write raw ─▶ build index ─▶ search ─▶ answer
//!                 (raw artifact)        (index marker) (search   (optional)
//!                                                       artifact)
//! ```
//!
//! With `search_cache = "per_run"` an existing search artifact skips both
//! indexing and search, whatever the query. With `per_query` (default) the
//! index is built once per run and each distinct query gets its own search
//! artifact, reused only while the index name and `top_k` match.
//!
//! Nothing is rolled back on failure: a raw artifact written before a later
//! stage fails is reused by the next attempt.

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

use crate::acquire::ContentAcquirer;
use crate::answer::{create_model, AnswerComposer, GenerativeModel};
use crate::artifact::{read_raw_artifact, write_raw_artifact};
use crate::config::{Config, SearchCacheMode};
use crate::error::{PipelineError, Result};
use crate::index::{create_index, IndexBuilder, VectorIndex};
use crate::models::ContentRecord;
use crate::platform::{create_platform, SocialPlatform};
use crate::retrieve::{load_search_artifact, Retriever};
use crate::run_store::{derive_run_id, validate_run_id, RunHandle, RunStore, RAW_ARTIFACT};

pub const MSG_CACHED: &str = "Search results already exist.";
pub const MSG_COMPLETED: &str = "Fetch and search completed successfully";

/// One pipeline invocation. Unset optional fields fall back to config.
#[derive(Debug, Clone, Deserialize)]
pub struct RunRequest {
    pub scope: String,
    pub topic: String,
    pub query: String,
    #[serde(default)]
    pub limit: Option<usize>,
    #[serde(default)]
    pub top_k: Option<usize>,
    #[serde(default)]
    pub index_name: Option<String>,
    #[serde(default)]
    pub run_id: Option<String>,
    #[serde(default)]
    pub answer: bool,
}

impl RunRequest {
    pub fn new(scope: impl Into<String>, topic: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            topic: topic.into(),
            query: query.into(),
            limit: None,
            top_k: None,
            index_name: None,
            run_id: None,
            answer: false,
        }
    }
}

/// Which stages actually executed during an invocation.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct StageReport {
    /// Records written by this invocation; `None` when the raw artifact was reused.
    pub records_acquired: Option<usize>,
    pub indexed: bool,
    pub searched: bool,
    pub answered: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    pub status_message: String,
    pub result_artifact_path: PathBuf,
    pub run_id: String,
    pub answer: Option<String>,
    pub stages: StageReport,
}

/// Request fields after validation and config fallbacks.
struct Resolved {
    run_id: String,
    limit: usize,
    top_k: usize,
    index_name: String,
}

pub struct Pipeline {
    config: Config,
    store: RunStore,
    acquirer: ContentAcquirer,
    builder: IndexBuilder,
    retriever: Retriever,
    composer: Option<AnswerComposer>,
    /// Clock for minute-keyed run ids.
    now: fn() -> DateTime<Local>,
}

impl Pipeline {
    pub fn new(
        config: Config,
        platform: Arc<dyn SocialPlatform>,
        index: Arc<dyn VectorIndex>,
        model: Option<Arc<dyn GenerativeModel>>,
    ) -> Self {
        let cache = config.runs.search_cache;
        Self {
            store: RunStore::new(config.runs.root.clone()),
            acquirer: ContentAcquirer::new(platform, config.acquisition.max_comments),
            builder: IndexBuilder::new(index.clone()),
            retriever: Retriever::new(index, cache),
            composer: model
                .map(|m| AnswerComposer::new(m, cache, config.answer.max_context_chars)),
            config,
            now: Local::now,
        }
    }

    /// Replace the clock used to derive minute-keyed run ids.
    pub fn with_clock(mut self, now: fn() -> DateTime<Local>) -> Self {
        self.now = now;
        self
    }

    /// Build a pipeline with the concrete clients named in `config`.
    pub fn from_config(config: &Config) -> anyhow::Result<Self> {
        let platform = create_platform(&config.platform)?;
        let index = create_index(&config.index)?;
        let model = create_model(&config.answer)?;
        Ok(Self::new(config.clone(), platform, index, model))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn store(&self) -> &RunStore {
        &self.store
    }

    pub async fn run(&self, request: RunRequest) -> Result<RunOutcome> {
        let resolved = self.validate(&request)?;
        let query = request.query.as_str();

        let handle = self
            .store
            .resolve_or_create(&resolved.run_id)
            .map_err(PipelineError::Storage)?;
        info!(run = %handle.id, created = handle.created, dir = %handle.dir.display(), "resolved run");

        let mut stages = StageReport::default();

        let acquired = if handle.artifact_exists(RAW_ARTIFACT) {
            info!(run = %handle.id, "raw artifact exists, skipping acquisition");
            None
        } else {
            let records = self
                .acquirer
                .acquire(&request.scope, &request.topic, resolved.limit)
                .await
                .map_err(PipelineError::Acquisition)?;
            write_raw_artifact(&handle, &records).map_err(PipelineError::Storage)?;
            stages.records_acquired = Some(records.len());
            Some(records)
        };

        let search_path = handle.artifact_path(&self.retriever.artifact_name(query));
        if self.search_cached(&search_path, query, &resolved) {
            info!(run = %handle.id, path = %search_path.display(), "search results exist, skipping indexing and search");
            return self
                .finish(&request, &handle, MSG_CACHED, search_path, stages)
                .await;
        }

        let built = self
            .builder
            .is_built(&handle, &resolved.index_name)
            .await
            .map_err(PipelineError::Indexing)?;
        if built {
            info!(run = %handle.id, index = %resolved.index_name, "index already built for run");
        } else {
            let records = match acquired {
                Some(records) => records,
                None => self.load_records(&handle)?,
            };
            self.builder
                .build(
                    &handle,
                    &records,
                    self.config.index.batch_size,
                    &resolved.index_name,
                )
                .await
                .map_err(PipelineError::Indexing)?;
            stages.indexed = true;
        }

        let path = self
            .retriever
            .search(&resolved.index_name, query, &handle, resolved.top_k)
            .await
            .map_err(PipelineError::Search)?;
        stages.searched = true;

        self.finish(&request, &handle, MSG_COMPLETED, path, stages)
            .await
    }

    fn validate(&self, request: &RunRequest) -> Result<Resolved> {
        for (field, value) in [
            ("scope", &request.scope),
            ("topic", &request.topic),
            ("query", &request.query),
        ] {
            if value.trim().is_empty() {
                return Err(PipelineError::InvalidInput(format!(
                    "{} must not be empty",
                    field
                )));
            }
        }

        let limit = request.limit.unwrap_or(self.config.acquisition.limit);
        if limit == 0 {
            return Err(PipelineError::InvalidInput("limit must be >= 1".into()));
        }
        let top_k = request.top_k.unwrap_or(self.config.index.top_k);
        if top_k == 0 {
            return Err(PipelineError::InvalidInput("top_k must be >= 1".into()));
        }

        let index_name = request
            .index_name
            .clone()
            .unwrap_or_else(|| self.config.index.name.clone());
        if index_name.trim().is_empty() {
            return Err(PipelineError::InvalidInput(
                "index_name must not be empty".into(),
            ));
        }

        let run_id = match &request.run_id {
            Some(id) => {
                validate_run_id(id).map_err(|e| PipelineError::InvalidInput(e.to_string()))?;
                id.clone()
            }
            None => derive_run_id(
                self.config.runs.key,
                &request.scope,
                &request.topic,
                &(self.now)(),
            ),
        };

        if request.answer && self.composer.is_none() {
            return Err(PipelineError::InvalidInput(
                "an answer was requested but no answer provider is configured".into(),
            ));
        }

        Ok(Resolved {
            run_id,
            limit,
            top_k,
            index_name,
        })
    }

    fn load_records(&self, handle: &RunHandle) -> Result<Vec<ContentRecord>> {
        let records = read_raw_artifact(handle).map_err(PipelineError::Storage)?;
        info!(run = %handle.id, records = records.len(), "loaded raw artifact");
        Ok(records)
    }

    /// Whether the search artifact at `path` can answer this request.
    ///
    /// A per-run artifact always counts, whatever query produced it. A
    /// per-query artifact only counts when it was made against the same
    /// index with the same `top_k`; otherwise the search runs again and
    /// overwrites it.
    fn search_cached(&self, path: &Path, query: &str, resolved: &Resolved) -> bool {
        if !path.is_file() {
            return false;
        }

        match self.config.runs.search_cache {
            SearchCacheMode::PerRun => {
                if let Ok(cached) = load_search_artifact(path) {
                    if cached.query.trim() != query.trim() {
                        warn!(
                            cached_query = %cached.query,
                            query,
                            "returning search results cached for a different query"
                        );
                    }
                }
                true
            }
            SearchCacheMode::PerQuery => match load_search_artifact(path) {
                Ok(cached)
                    if cached.index_name == resolved.index_name
                        && cached.top_k == resolved.top_k =>
                {
                    true
                }
                Ok(cached) => {
                    info!(
                        cached_index = %cached.index_name,
                        cached_top_k = cached.top_k,
                        index = %resolved.index_name,
                        top_k = resolved.top_k,
                        "cached search results used other settings, searching again"
                    );
                    false
                }
                Err(e) => {
                    warn!(path = %path.display(), error = %format!("{:#}", e), "ignoring unreadable search results");
                    false
                }
            },
        }
    }

    async fn finish(
        &self,
        request: &RunRequest,
        handle: &RunHandle,
        status: &str,
        path: PathBuf,
        mut stages: StageReport,
    ) -> Result<RunOutcome> {
        let answer = match (&self.composer, request.answer) {
            (Some(composer), true) => {
                let text = composer
                    .compose(&request.query, handle, &self.config.answer.model)
                    .await
                    .map_err(PipelineError::Answer)?;
                stages.answered = true;
                Some(text)
            }
            _ => None,
        };

        Ok(RunOutcome {
            status_message: status.to_string(),
            result_artifact_path: path,
            run_id: handle.id.clone(),
            answer,
            stages,
        })
    }
}
