//! Reddit client for the [`SocialPlatform`] trait.
//!
//! Uses the OAuth2 password grant (script apps) and the JSON listing
//! endpoints:
//!
//! | Operation | Endpoint |
//! |-----------|----------|
//! | token | `POST {auth_url}` |
//! | community search | `GET /subreddits/search?q=..&limit=..` |
//! | post search | `GET /r/{name}/search?q=..&restrict_sr=1&limit=..` |
//! | comments | `GET /comments/{id}` |
//!
//! Credentials are read from `REDDIT_CLIENT_ID`, `REDDIT_CLIENT_SECRET`,
//! `REDDIT_USERNAME` and `REDDIT_PASSWORD`. `REDDIT_USER_AGENT` overrides
//! the configured user agent. The access token is fetched lazily and
//! renewed shortly before its `expires_in` runs out. A 401 response drops
//! the token and the request is retried once with a new one.
//!
//! Comment trees are flattened breadth-first and "load more" stubs are
//! dropped rather than expanded.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::VecDeque;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::config::PlatformConfig;
use crate::models::{Comment, Community, Post, PLACEHOLDER_BODIES};
use crate::platform::SocialPlatform;

/// Renew this long before the token's stated expiry.
const TOKEN_REFRESH_MARGIN: Duration = Duration::from_secs(60);
/// Lifetime assumed when the token response has no `expires_in`.
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
struct AccessToken {
    value: String,
    expires_at: Instant,
}

impl AccessToken {
    fn is_fresh(&self, now: Instant) -> bool {
        now + TOKEN_REFRESH_MARGIN < self.expires_at
    }
}

#[derive(Clone)]
pub struct RedditCredentials {
    pub client_id: String,
    pub client_secret: String,
    pub username: String,
    pub password: String,
}

impl RedditCredentials {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            client_id: require_env("REDDIT_CLIENT_ID")?,
            client_secret: require_env("REDDIT_CLIENT_SECRET")?,
            username: require_env("REDDIT_USERNAME")?,
            password: require_env("REDDIT_PASSWORD")?,
        })
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).map_err(|_| anyhow::anyhow!("{} environment variable not set", name))
}

pub struct RedditClient {
    http: reqwest::Client,
    credentials: RedditCredentials,
    api_base: String,
    auth_url: String,
    token: Mutex<Option<AccessToken>>,
}

impl RedditClient {
    pub fn new(config: &PlatformConfig, credentials: RedditCredentials) -> Result<Self> {
        let user_agent =
            std::env::var("REDDIT_USER_AGENT").unwrap_or_else(|_| config.user_agent.clone());

        let http = reqwest::Client::builder()
            .user_agent(user_agent)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            credentials,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            auth_url: config.auth_url.clone(),
            token: Mutex::new(None),
        })
    }

    pub fn from_env(config: &PlatformConfig) -> Result<Self> {
        Self::new(config, RedditCredentials::from_env()?)
    }

    async fn access_token(&self) -> Result<String> {
        let mut slot = self.token.lock().await;
        if let Some(token) = slot.as_ref().filter(|t| t.is_fresh(Instant::now())) {
            return Ok(token.value.clone());
        }

        let token = self.fetch_token().await?;
        debug!(expires_in = ?token.expires_at.saturating_duration_since(Instant::now()), "fetched reddit access token");
        let value = token.value.clone();
        *slot = Some(token);
        Ok(value)
    }

    async fn invalidate_token(&self) {
        *self.token.lock().await = None;
    }

    async fn fetch_token(&self) -> Result<AccessToken> {
        let form = [
            ("grant_type", "password"),
            ("username", self.credentials.username.as_str()),
            ("password", self.credentials.password.as_str()),
        ];

        let response = self
            .http
            .post(&self.auth_url)
            .basic_auth(
                &self.credentials.client_id,
                Some(&self.credentials.client_secret),
            )
            .form(&form)
            .send()
            .await
            .context("Reddit token request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Reddit token error {}: {}", status, body);
        }

        let json: Value = response.json().await?;
        parse_token(&json, Instant::now())
    }

    async fn get_json(&self, path: &str, query: &[(&str, String)]) -> Result<Value> {
        let url = format!("{}{}", self.api_base, path);
        debug!(%url, "reddit request");

        let mut response = self.send_get(&url, path, query).await?;
        if response.status() == reqwest::StatusCode::UNAUTHORIZED {
            warn!(path, "reddit rejected the access token, fetching a new one");
            self.invalidate_token().await;
            response = self.send_get(&url, path, query).await?;
        }

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            bail!("Reddit API error {} for {}: {}", status, path, body);
        }

        response
            .json()
            .await
            .with_context(|| format!("Invalid JSON from Reddit: {}", path))
    }

    async fn send_get(
        &self,
        url: &str,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<reqwest::Response> {
        let token = self.access_token().await?;
        self.http
            .get(url)
            .bearer_auth(token)
            .query(query)
            .send()
            .await
            .with_context(|| format!("Reddit request failed: {}", path))
    }
}

#[async_trait]
impl SocialPlatform for RedditClient {
    fn name(&self) -> &str {
        "reddit"
    }

    async fn search_communities(&self, query: &str, limit: usize) -> Result<Vec<Community>> {
        let json = self
            .get_json(
                "/subreddits/search",
                &[
                    ("q", query.to_string()),
                    ("limit", limit.to_string()),
                    ("raw_json", "1".to_string()),
                ],
            )
            .await?;
        let mut communities = parse_communities(&json);
        communities.truncate(limit);
        Ok(communities)
    }

    async fn search_posts(
        &self,
        community: &Community,
        query: &str,
        limit: usize,
    ) -> Result<Vec<Post>> {
        let path = format!("/r/{}/search", community.name);
        let json = self
            .get_json(
                &path,
                &[
                    ("q", query.to_string()),
                    ("restrict_sr", "1".to_string()),
                    ("limit", limit.to_string()),
                    ("raw_json", "1".to_string()),
                ],
            )
            .await?;
        let mut posts = parse_posts(&json);
        posts.truncate(limit);
        Ok(posts)
    }

    async fn expand_comments(&self, post: &Post) -> Result<Vec<Comment>> {
        let path = format!("/comments/{}", post.id);
        let json = self
            .get_json(&path, &[("raw_json", "1".to_string())])
            .await?;

        // The response is [post listing, comment listing].
        let listing = json
            .as_array()
            .and_then(|parts| parts.get(1))
            .ok_or_else(|| anyhow::anyhow!("Invalid comments response for post {}", post.id))?;

        Ok(flatten_comment_listing(listing))
    }
}

fn parse_token(json: &Value, issued_at: Instant) -> Result<AccessToken> {
    if let Some(token) = json.get("access_token").and_then(Value::as_str) {
        let ttl = json
            .get("expires_in")
            .and_then(Value::as_u64)
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_TTL);
        return Ok(AccessToken {
            value: token.to_string(),
            expires_at: issued_at + ttl,
        });
    }
    let reason = json
        .get("error")
        .map(|e| e.to_string())
        .unwrap_or_else(|| "missing access_token".to_string());
    bail!("Reddit token response rejected: {}", reason)
}

fn listing_children(listing: &Value) -> impl Iterator<Item = &Value> {
    listing
        .get("data")
        .and_then(|d| d.get("children"))
        .and_then(Value::as_array)
        .into_iter()
        .flatten()
}

fn parse_communities(json: &Value) -> Vec<Community> {
    listing_children(json)
        .filter_map(|child| child.get("data"))
        .filter_map(|data| data.get("display_name").and_then(Value::as_str))
        .map(|name| Community {
            name: name.to_string(),
        })
        .collect()
}

fn parse_posts(json: &Value) -> Vec<Post> {
    listing_children(json)
        .filter(|child| child.get("kind").and_then(Value::as_str) == Some("t3"))
        .filter_map(|child| child.get("data"))
        .filter_map(|data| {
            let id = data.get("id").and_then(Value::as_str)?;
            Some(Post {
                id: id.to_string(),
                title: str_field(data, "title"),
                selftext: str_field(data, "selftext"),
                created_utc: data
                    .get("created_utc")
                    .and_then(Value::as_f64)
                    .unwrap_or(0.0),
                score: data.get("score").and_then(Value::as_i64).unwrap_or(0),
                num_comments: data
                    .get("num_comments")
                    .and_then(Value::as_i64)
                    .unwrap_or(0),
            })
        })
        .collect()
}

fn str_field(data: &Value, key: &str) -> String {
    data.get(key)
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string()
}

/// Flatten a comment listing breadth-first: all top-level comments, then
/// their replies level by level. `more` stubs are skipped.
pub fn flatten_comment_listing(listing: &Value) -> Vec<Comment> {
    let mut queue: VecDeque<&Value> = listing_children(listing).collect();
    let mut comments = Vec::new();

    while let Some(node) = queue.pop_front() {
        if node.get("kind").and_then(Value::as_str) != Some("t1") {
            continue;
        }
        let Some(data) = node.get("data") else {
            continue;
        };

        let body = str_field(data, "body");
        let tombstoned = PLACEHOLDER_BODIES.contains(&body.as_str());
        comments.push(Comment { body, tombstoned });

        // `replies` is "" when there are none, a listing otherwise.
        if let Some(replies) = data.get("replies") {
            queue.extend(listing_children(replies));
        }
    }

    comments
}
