//! Answer composition.
//!
//! Reads a run's search-result artifact, packs the top-ranked hits into a
//! bounded context block and asks a [`GenerativeModel`] to answer the
//! original query from that context. Each answer is a single request.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::config::{AnswerConfig, SearchCacheMode};
use crate::gemini::GeminiClient;
use crate::models::SearchHit;
use crate::retrieve::{load_search_artifact, search_artifact_name};
use crate::run_store::RunHandle;

#[async_trait]
pub trait GenerativeModel: Send + Sync {
    fn provider(&self) -> &str;

    /// Send one prompt to `model` and return its text response.
    async fn generate(&self, prompt: &str, model: &str) -> Result<String>;
}

/// Create the configured model client, or `None` when answers are disabled.
pub fn create_model(config: &AnswerConfig) -> Result<Option<Arc<dyn GenerativeModel>>> {
    match config.provider.as_str() {
        "disabled" => Ok(None),
        "gemini" => Ok(Some(Arc::new(GeminiClient::from_env(config)?))),
        other => bail!("Unknown answer provider: {}", other),
    }
}

pub struct AnswerComposer {
    model: Arc<dyn GenerativeModel>,
    cache: SearchCacheMode,
    max_context_chars: usize,
}

impl AnswerComposer {
    pub fn new(
        model: Arc<dyn GenerativeModel>,
        cache: SearchCacheMode,
        max_context_chars: usize,
    ) -> Self {
        Self {
            model,
            cache,
            max_context_chars,
        }
    }

    pub async fn compose(&self, query: &str, handle: &RunHandle, model: &str) -> Result<String> {
        let path = handle.artifact_path(&search_artifact_name(self.cache, query));
        let artifact = load_search_artifact(&path)?;

        let context = build_context(&artifact.hits, self.max_context_chars);
        let prompt = build_prompt(query, &context);
        info!(
            run = %handle.id,
            provider = self.model.provider(),
            model,
            hits = artifact.hits.len(),
            context_chars = context.chars().count(),
            "requesting answer"
        );

        let answer = self
            .model
            .generate(&prompt, model)
            .await
            .with_context(|| format!("{} request failed", self.model.provider()))?;

        let answer = answer.trim();
        if answer.is_empty() {
            bail!("model returned an empty answer");
        }
        Ok(answer.to_string())
    }
}

/// Concatenate hits in rank order until the next one would exceed
/// `max_chars`. The first hit is always included, truncated if necessary.
pub fn build_context(hits: &[SearchHit], max_chars: usize) -> String {
    let mut context = String::new();
    let mut used = 0;

    for (i, hit) in hits.iter().enumerate() {
        let block = format_hit(i + 1, hit);
        let len = block.chars().count();

        if used + len > max_chars {
            if i == 0 {
                context.extend(block.chars().take(max_chars));
            }
            break;
        }

        context.push_str(&block);
        used += len;
    }

    context
}

fn format_hit(rank: usize, hit: &SearchHit) -> String {
    let mut header = format!("[{}]", rank);
    if let Some(sub) = hit.metadata.get("subreddit").and_then(|v| v.as_str()) {
        header.push_str(&format!(" r/{}", sub));
    }
    let upvotes = hit.metadata.get("upvotes").and_then(|v| v.as_i64());
    let comments = hit.metadata.get("num_comments").and_then(|v| v.as_i64());
    if let (Some(up), Some(c)) = (upvotes, comments) {
        header.push_str(&format!(" ({} upvotes, {} comments)", up, c));
    }
    format!("{}\n{}\n\n", header, hit.text.trim())
}

pub fn build_prompt(query: &str, context: &str) -> String {
    let context = if context.trim().is_empty() {
        "(no matching discussions were found)"
    } else {
        context.trim_end()
    };
    format!(
        "You answer questions using discussions collected from online communities.\n\
         Use only the numbered context below and cite entries by their number, e.g. [2].\n\
         If the context does not answer the question, say so.\n\n\
         Question: {}\n\n\
         Context:\n{}\n",
        query.trim(),
        context
    )
}
