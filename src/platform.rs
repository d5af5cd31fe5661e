//! Social-platform abstraction.
//!
//! The acquirer only talks to a platform through [`SocialPlatform`], so
//! tests can substitute an in-memory fake and the concrete Reddit client
//! stays isolated in [`crate::reddit`].

use anyhow::{bail, Result};
use async_trait::async_trait;
use std::sync::Arc;

use crate::config::PlatformConfig;
use crate::models::{Comment, Community, Post};
use crate::reddit::RedditClient;

#[async_trait]
pub trait SocialPlatform: Send + Sync {
    /// Platform identifier used in logs (e.g. `"reddit"`).
    fn name(&self) -> &str;

    /// Communities matching a free-text scope query, at most `limit`.
    async fn search_communities(&self, query: &str, limit: usize) -> Result<Vec<Community>>;

    /// Posts in `community` matching `query`, at most `limit`.
    async fn search_posts(
        &self,
        community: &Community,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Post>>;

    /// The post's full comment tree, flattened in listing order.
    async fn expand_comments(&self, post: &Post) -> Result<Vec<Comment>>;
}

/// Create the configured platform client.
pub fn create_platform(config: &PlatformConfig) -> Result<Arc<dyn SocialPlatform>> {
    match config.provider.as_str() {
        "reddit" => Ok(Arc::new(RedditClient::from_env(config)?)),
        other => bail!("Unknown platform provider: {}", other),
    }
}
