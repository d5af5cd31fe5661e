//! Core data models used throughout the pipeline.
//!
//! These types represent the platform objects, normalized records, and
//! search hits that flow from acquisition through indexing and retrieval.

use serde::{Deserialize, Serialize};

/// A community (subreddit) matched by a scope search.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Community {
    pub name: String,
}

/// A post returned by a within-community search.
#[derive(Debug, Clone)]
pub struct Post {
    pub id: String,
    pub title: String,
    pub selftext: String,
    /// Platform-native creation time, epoch seconds.
    pub created_utc: f64,
    pub score: i64,
    pub num_comments: i64,
}

/// One comment from a flattened comment tree.
#[derive(Debug, Clone)]
pub struct Comment {
    pub body: String,
    /// Set when the platform marks the comment as deleted or removed.
    pub tombstoned: bool,
}

/// Bodies the platform substitutes for deleted or moderated comments.
pub const PLACEHOLDER_BODIES: [&str; 2] = ["[deleted]", "[removed]"];

impl Comment {
    pub fn new(body: impl Into<String>) -> Self {
        Self {
            body: body.into(),
            tombstoned: false,
        }
    }

    /// True for tombstones and for bodies that are only a placeholder marker.
    pub fn is_placeholder(&self) -> bool {
        self.tombstoned || PLACEHOLDER_BODIES.contains(&self.body.trim())
    }
}

/// One normalized unit of acquired content, as persisted in the raw artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentRecord {
    #[serde(rename = "_id")]
    pub id: String,
    pub subreddit: String,
    pub created_utc: f64,
    pub chunk_text: String,
    pub upvotes: i64,
    pub num_comments: i64,
}

impl ContentRecord {
    /// Metadata attached to the record when it is pushed to an index.
    pub fn metadata(&self) -> RecordMetadata {
        RecordMetadata {
            subreddit: self.subreddit.clone(),
            created_utc: self.created_utc,
            upvotes: self.upvotes,
            num_comments: self.num_comments,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordMetadata {
    pub subreddit: String,
    pub created_utc: f64,
    pub upvotes: i64,
    pub num_comments: i64,
}

/// A record as handed to a vector index.
#[derive(Debug, Clone)]
pub struct IndexEntry {
    pub id: String,
    pub text: String,
    pub metadata: RecordMetadata,
}

impl From<&ContentRecord> for IndexEntry {
    fn from(record: &ContentRecord) -> Self {
        Self {
            id: record.id.clone(),
            text: record.chunk_text.clone(),
            metadata: record.metadata(),
        }
    }
}

/// A ranked result returned by a vector index query.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    pub id: String,
    pub score: f64,
    #[serde(default)]
    pub text: String,
    #[serde(default)]
    pub metadata: serde_json::Value,
}
