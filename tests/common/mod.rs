//! Test doubles shared by the integration tests.

#![allow(dead_code)]

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use thread_harvest::answer::GenerativeModel;
use thread_harvest::config::Config;
use thread_harvest::index::VectorIndex;
use thread_harvest::memory_index::MemoryIndex;
use thread_harvest::models::{Comment, Community, IndexEntry, Post, SearchHit};
use thread_harvest::pipeline::Pipeline;
use thread_harvest::platform::SocialPlatform;

/// Scripted platform with call counters.
#[derive(Default)]
pub struct FakePlatform {
    pub communities: Vec<String>,
    pub posts: HashMap<String, Vec<Post>>,
    pub comments: HashMap<String, Vec<Comment>>,
    pub failing_comments: HashSet<String>,
    pub fail_search: AtomicBool,
    pub community_calls: AtomicUsize,
    pub post_calls: AtomicUsize,
    pub comment_calls: AtomicUsize,
}

impl FakePlatform {
    /// One community with three posts about food, each with two comments.
    pub fn atlanta() -> Self {
        let mut platform = FakePlatform {
            communities: vec!["Atlanta".to_string()],
            ..Default::default()
        };
        platform.posts.insert(
            "Atlanta".to_string(),
            vec![
                post("p1", "Best tacos in town?", "Looking for al pastor"),
                post("p2", "Ramen recommendations", ""),
                post("p3", "Brunch spots", "Weekend brunch with friends"),
            ],
        );
        platform.comments.insert(
            "p1".to_string(),
            vec![Comment::new("Try Buford Highway tacos"), Comment::new("[deleted]")],
        );
        platform.comments.insert(
            "p2".to_string(),
            vec![Comment::new("Tonkotsu ramen at the market"), Comment::new("[removed]")],
        );
        platform.comments.insert(
            "p3".to_string(),
            vec![Comment::new("Pancakes and mimosas downtown")],
        );
        platform
    }

    pub fn calls(&self) -> usize {
        self.community_calls.load(Ordering::SeqCst)
            + self.post_calls.load(Ordering::SeqCst)
            + self.comment_calls.load(Ordering::SeqCst)
    }
}

pub fn post(id: &str, title: &str, selftext: &str) -> Post {
    Post {
        id: id.to_string(),
        title: title.to_string(),
        selftext: selftext.to_string(),
        created_utc: 1718000000.0,
        score: 10,
        num_comments: 2,
    }
}

#[async_trait]
impl SocialPlatform for FakePlatform {
    fn name(&self) -> &str {
        "fake"
    }

    async fn search_communities(&self, _query: &str, limit: usize) -> Result<Vec<Community>> {
        self.community_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_search.load(Ordering::SeqCst) {
            bail!("platform search unavailable");
        }
        Ok(self
            .communities
            .iter()
            .take(limit)
            .map(|name| Community { name: name.clone() })
            .collect())
    }

    async fn search_posts(
        &self,
        community: &Community,
        _query: &str,
        limit: usize,
    ) -> Result<Vec<Post>> {
        self.post_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self
            .posts
            .get(&community.name)
            .map(|p| p.iter().take(limit).cloned().collect())
            .unwrap_or_default())
    }

    async fn expand_comments(&self, post: &Post) -> Result<Vec<Comment>> {
        self.comment_calls.fetch_add(1, Ordering::SeqCst);
        if self.failing_comments.contains(&post.id) {
            bail!("comment expansion failed");
        }
        Ok(self.comments.get(&post.id).cloned().unwrap_or_default())
    }
}

/// Memory index that counts calls and records batch sizes.
#[derive(Default)]
pub struct CountingIndex {
    inner: MemoryIndex,
    pub upsert_batches: Mutex<Vec<usize>>,
    pub queries: Mutex<Vec<String>>,
    pub fail_upsert: AtomicBool,
    pub fail_query: AtomicBool,
}

impl CountingIndex {
    pub fn upserts(&self) -> usize {
        self.upsert_batches.lock().unwrap().len()
    }

    pub fn query_count(&self) -> usize {
        self.queries.lock().unwrap().len()
    }
}

#[async_trait]
impl VectorIndex for CountingIndex {
    fn provider(&self) -> &str {
        "counting"
    }

    async fn upsert(&self, index_name: &str, entries: &[IndexEntry]) -> Result<()> {
        self.upsert_batches.lock().unwrap().push(entries.len());
        if self.fail_upsert.load(Ordering::SeqCst) {
            bail!("index write quota exceeded");
        }
        self.inner.upsert(index_name, entries).await
    }

    async fn query(&self, index_name: &str, text: &str, top_k: usize) -> Result<Vec<SearchHit>> {
        self.queries.lock().unwrap().push(text.to_string());
        if self.fail_query.load(Ordering::SeqCst) {
            bail!("index query rejected");
        }
        self.inner.query(index_name, text, top_k).await
    }

    async fn retains(&self, index_name: &str) -> Result<bool> {
        self.inner.retains(index_name).await
    }
}

/// Model that records prompts and replies with a fixed answer.
#[derive(Default)]
pub struct FakeModel {
    pub prompts: Mutex<Vec<String>>,
}

#[async_trait]
impl GenerativeModel for FakeModel {
    fn provider(&self) -> &str {
        "fake"
    }

    async fn generate(&self, prompt: &str, _model: &str) -> Result<String> {
        self.prompts.lock().unwrap().push(prompt.to_string());
        Ok("Buford Highway tacos come up most often [1].".to_string())
    }
}

pub struct Harness {
    pub platform: Arc<FakePlatform>,
    pub index: Arc<CountingIndex>,
    pub model: Arc<FakeModel>,
    pub pipeline: Pipeline,
}

pub fn harness(config: Config, platform: FakePlatform) -> Harness {
    let platform = Arc::new(platform);
    let index = Arc::new(CountingIndex::default());
    let model = Arc::new(FakeModel::default());
    let pipeline = Pipeline::new(
        config,
        platform.clone(),
        index.clone(),
        Some(model.clone() as Arc<dyn GenerativeModel>),
    );
    Harness {
        platform,
        index,
        model,
        pipeline,
    }
}
