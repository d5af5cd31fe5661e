//! In-memory [`VectorIndex`] for tests and offline runs.
//!
//! Each entry is embedded as a hashed bag-of-words vector and queries are
//! brute-force cosine similarity over every entry of the named index. The
//! contents live only as long as the process, so [`VectorIndex::retains`]
//! reports whether the index has been populated since startup.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;

use crate::index::VectorIndex;
use crate::models::{IndexEntry, SearchHit};

const DIMS: usize = 256;

struct StoredEntry {
    entry: IndexEntry,
    vector: Vec<f32>,
}

pub struct MemoryIndex {
    indexes: RwLock<HashMap<String, Vec<StoredEntry>>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self {
            indexes: RwLock::new(HashMap::new()),
        }
    }
}

impl Default for MemoryIndex {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl VectorIndex for MemoryIndex {
    fn provider(&self) -> &str {
        "memory"
    }

    async fn upsert(&self, index_name: &str, entries: &[IndexEntry]) -> Result<()> {
        let mut map = self
            .indexes
            .write()
            .map_err(|_| anyhow!("memory index lock poisoned"))?;
        let stored = map.entry(index_name.to_string()).or_default();

        for entry in entries {
            let vector = embed_text(&entry.text);
            match stored.iter_mut().find(|s| s.entry.id == entry.id) {
                Some(existing) => {
                    existing.entry = entry.clone();
                    existing.vector = vector;
                }
                None => stored.push(StoredEntry {
                    entry: entry.clone(),
                    vector,
                }),
            }
        }
        Ok(())
    }

    async fn query(&self, index_name: &str, text: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        let map = self
            .indexes
            .read()
            .map_err(|_| anyhow!("memory index lock poisoned"))?;
        // An index that never received a record has nothing to rank.
        let Some(stored) = map.get(index_name) else {
            return Ok(Vec::new());
        };

        let query_vec = embed_text(text);
        let mut scored: Vec<(f32, &StoredEntry)> = stored
            .iter()
            .map(|s| (cosine_similarity(&query_vec, &s.vector), s))
            .collect();
        // Stable sort keeps insertion order among equal scores.
        scored.sort_by(|a, b| b.0.partial_cmp(&a.0).unwrap_or(std::cmp::Ordering::Equal));

        Ok(scored
            .into_iter()
            .take(top_k)
            .map(|(score, s)| SearchHit {
                id: s.entry.id.clone(),
                score: score as f64,
                text: s.entry.text.clone(),
                metadata: serde_json::to_value(&s.entry.metadata).unwrap_or_default(),
            })
            .collect())
    }

    async fn retains(&self, index_name: &str) -> Result<bool> {
        let map = self
            .indexes
            .read()
            .map_err(|_| anyhow!("memory index lock poisoned"))?;
        Ok(map.contains_key(index_name))
    }
}

/// Hashed bag-of-words vector over lowercase alphanumeric tokens.
pub fn embed_text(text: &str) -> Vec<f32> {
    let mut vector = vec![0.0f32; DIMS];
    for token in text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
    {
        let bucket = (fnv1a(token.to_lowercase().as_bytes()) % DIMS as u64) as usize;
        vector[bucket] += 1.0;
    }
    vector
}

fn fnv1a(bytes: &[u8]) -> u64 {
    let mut hash: u64 = 0xcbf29ce484222325;
    for b in bytes {
        hash ^= *b as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

/// Cosine similarity in `[-1.0, 1.0]`; `0.0` for empty, mismatched, or
/// zero-magnitude vectors.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;

    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    let denom = norm_a.sqrt() * norm_b.sqrt();
    if denom < f32::EPSILON {
        return 0.0;
    }

    dot / denom
}
