//! Pinecone [`VectorIndex`] backend.
//!
//! Targets indexes with integrated embedding: records are upserted as text
//! and Pinecone embeds the `chunk_text` field itself, so no embedding model
//! runs locally.
//!
//! | Operation | Request |
//! |-----------|---------|
//! | host lookup | `GET {control_url}/indexes/{name}` |
//! | upsert | `POST https://{host}/records/namespaces/{ns}/upsert` (NDJSON) |
//! | search | `POST https://{host}/records/namespaces/{ns}/search` |
//!
//! Requires the `PINECONE_API_KEY` environment variable.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::debug;

use crate::config::IndexConfig;
use crate::index::VectorIndex;
use crate::models::{IndexEntry, SearchHit};

const API_VERSION: &str = "2025-01";
/// Record field Pinecone embeds.
const TEXT_FIELD: &str = "chunk_text";
const METADATA_FIELDS: [&str; 4] = ["subreddit", "created_utc", "upvotes", "num_comments"];

pub struct PineconeIndex {
    http: reqwest::Client,
    api_key: String,
    control_url: String,
    namespace: String,
    hosts: Mutex<HashMap<String, String>>,
}

impl PineconeIndex {
    pub fn new(config: &IndexConfig, api_key: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_key,
            control_url: config.control_url.trim_end_matches('/').to_string(),
            namespace: config.namespace.clone(),
            hosts: Mutex::new(HashMap::new()),
        })
    }

    pub fn from_env(config: &IndexConfig) -> Result<Self> {
        let api_key = std::env::var("PINECONE_API_KEY")
            .map_err(|_| anyhow::anyhow!("PINECONE_API_KEY environment variable not set"))?;
        Self::new(config, api_key)
    }

    /// Resolve (and cache) the data-plane host for `index_name`.
    async fn host(&self, index_name: &str) -> Result<String> {
        let mut hosts = self.hosts.lock().await;
        if let Some(host) = hosts.get(index_name) {
            return Ok(host.clone());
        }

        let url = format!("{}/indexes/{}", self.control_url, index_name);
        let response = self
            .http
            .get(&url)
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .send()
            .await
            .with_context(|| format!("Pinecone index lookup failed: {}", index_name))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Pinecone API error {} describing index '{}': {}", status, index_name, body);
        }

        let json: Value = response.json().await?;
        let host = parse_host(&json)?;
        hosts.insert(index_name.to_string(), host.clone());
        Ok(host)
    }

    fn records_url(&self, host: &str, action: &str) -> String {
        format!("{}/records/namespaces/{}/{}", host, self.namespace, action)
    }
}

#[async_trait]
impl VectorIndex for PineconeIndex {
    fn provider(&self) -> &str {
        "pinecone"
    }

    async fn upsert(&self, index_name: &str, entries: &[IndexEntry]) -> Result<()> {
        if entries.is_empty() {
            return Ok(());
        }
        let host = self.host(index_name).await?;
        let body = to_ndjson(entries);
        debug!(index = index_name, records = entries.len(), "pinecone upsert");

        let response = self
            .http
            .post(self.records_url(&host, "upsert"))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .header("Content-Type", "application/x-ndjson")
            .body(body)
            .send()
            .await
            .context("Pinecone upsert request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Pinecone upsert error {}: {}", status, body);
        }
        Ok(())
    }

    async fn query(&self, index_name: &str, text: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        let host = self.host(index_name).await?;
        let mut fields = vec![TEXT_FIELD];
        fields.extend(METADATA_FIELDS);
        let body = json!({
            "query": {
                "inputs": { "text": text },
                "top_k": top_k,
            },
            "fields": fields,
        });

        let response = self
            .http
            .post(self.records_url(&host, "search"))
            .header("Api-Key", &self.api_key)
            .header("X-Pinecone-API-Version", API_VERSION)
            .json(&body)
            .send()
            .await
            .context("Pinecone search request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Pinecone search error {}: {}", status, body);
        }

        let json: Value = response.json().await?;
        parse_search_response(&json)
    }
}

fn parse_host(json: &Value) -> Result<String> {
    let host = json
        .get("host")
        .and_then(Value::as_str)
        .filter(|h| !h.is_empty())
        .ok_or_else(|| anyhow::anyhow!("Invalid Pinecone response: missing index host"))?;

    if host.starts_with("http://") || host.starts_with("https://") {
        Ok(host.trim_end_matches('/').to_string())
    } else {
        Ok(format!("https://{}", host.trim_end_matches('/')))
    }
}

/// One JSON record per line: `_id`, the embedded text field, and metadata
/// fields at the top level.
fn to_ndjson(entries: &[IndexEntry]) -> String {
    entries
        .iter()
        .map(|entry| {
            json!({
                "_id": entry.id,
                TEXT_FIELD: entry.text,
                "subreddit": entry.metadata.subreddit,
                "created_utc": entry.metadata.created_utc,
                "upvotes": entry.metadata.upvotes,
                "num_comments": entry.metadata.num_comments,
            })
            .to_string()
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn parse_search_response(json: &Value) -> Result<Vec<SearchHit>> {
    let hits = json
        .get("result")
        .and_then(|r| r.get("hits"))
        .and_then(Value::as_array)
        .ok_or_else(|| anyhow::anyhow!("Invalid Pinecone response: missing result.hits"))?;

    let mut parsed = Vec::with_capacity(hits.len());
    for hit in hits {
        let id = hit
            .get("_id")
            .and_then(Value::as_str)
            .ok_or_else(|| anyhow::anyhow!("Invalid Pinecone response: hit without _id"))?;
        let score = hit.get("_score").and_then(Value::as_f64).unwrap_or(0.0);

        let mut fields = hit
            .get("fields")
            .and_then(Value::as_object)
            .cloned()
            .unwrap_or_default();
        let text = fields
            .remove(TEXT_FIELD)
            .and_then(|v| v.as_str().map(str::to_string))
            .unwrap_or_default();

        parsed.push(SearchHit {
            id: id.to_string(),
            score,
            text,
            metadata: Value::Object(fields),
        });
    }
    Ok(parsed)
}
