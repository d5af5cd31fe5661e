//! Content acquisition.
//!
//! Walks scope → communities → posts → comments on a [`SocialPlatform`] and
//! normalizes each post into a [`ContentRecord`]. `limit` applies to the
//! community search and separately to each community's post search.
//!
//! Failure policy: a comment expansion failure is logged and the post is
//! still emitted with empty comment text. Community or post search failures
//! propagate.

use anyhow::{Context, Result};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::models::{Comment, Community, ContentRecord, Post};
use crate::platform::SocialPlatform;

pub struct ContentAcquirer {
    platform: Arc<dyn SocialPlatform>,
    max_comments: usize,
}

impl ContentAcquirer {
    pub fn new(platform: Arc<dyn SocialPlatform>, max_comments: usize) -> Self {
        Self {
            platform,
            max_comments,
        }
    }

    pub async fn acquire(
        &self,
        scope: &str,
        topic: &str,
        limit: usize,
    ) -> Result<Vec<ContentRecord>> {
        let communities = self
            .platform
            .search_communities(scope, limit)
            .await
            .with_context(|| format!("community search failed for scope '{}'", scope))?;

        info!(
            platform = self.platform.name(),
            scope,
            communities = communities.len(),
            "matched communities"
        );

        let mut records = Vec::new();
        let mut seen = HashSet::new();

        for community in communities.iter().take(limit) {
            let posts = self
                .platform
                .search_posts(community, topic, limit)
                .await
                .with_context(|| {
                    format!("post search failed in '{}' for '{}'", community.name, topic)
                })?;

            info!(community = %community.name, posts = posts.len(), "matched posts");

            for post in posts.iter().take(limit) {
                if !seen.insert(post.id.clone()) {
                    debug!(post_id = %post.id, "post already acquired from another community");
                    continue;
                }
                let comments = self.comment_text(post).await;
                records.push(build_record(community, post, &comments));
            }
        }

        Ok(records)
    }

    async fn comment_text(&self, post: &Post) -> String {
        match self.platform.expand_comments(post).await {
            Ok(comments) => join_comment_bodies(&comments, self.max_comments),
            Err(e) => {
                warn!(post_id = %post.id, error = %format!("{:#}", e), "comment expansion failed, emitting post without comments");
                String::new()
            }
        }
    }
}

/// Join the first `max_comments` non-placeholder bodies with single spaces.
pub fn join_comment_bodies(comments: &[Comment], max_comments: usize) -> String {
    comments
        .iter()
        .filter(|c| !c.is_placeholder())
        .take(max_comments)
        .map(|c| c.body.as_str())
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn build_record(community: &Community, post: &Post, comment_text: &str) -> ContentRecord {
    ContentRecord {
        id: post.id.clone(),
        subreddit: community.name.clone(),
        created_utc: post.created_utc,
        chunk_text: format!("{} {} {}", post.title, post.selftext, comment_text)
            .trim()
            .to_string(),
        upvotes: post.score,
        num_comments: post.num_comments,
    }
}
