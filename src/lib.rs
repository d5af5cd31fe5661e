//! # Thread Harvest
//!
//! Topic-scoped discussion harvesting, semantic indexing, and
//! retrieval-augmented answers.
//!
//! A request names a scope (which communities to look in), a topic (which
//! posts to collect) and a query. The pipeline collects matching posts and
//! their comment threads, pushes them to a vector index, runs the query,
//! and can hand the top results to a generative model for a composed
//! answer. Every stage persists an artifact in a per-run directory and is
//! skipped when that artifact already exists.
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────┐   ┌─────────────┐   ┌─────────────┐   ┌───────────┐
//! │  Platform  │──▶│  Acquirer   │──▶│ IndexBuilder│──▶│ Retriever │──▶ Answer
//! │  (Reddit)  │   │ raw artifact│   │ index marker│   │  results  │   (Gemini)
//! └────────────┘   └─────────────┘   └─────────────┘   └───────────┘
//!                         │                 │                │
//!                         └──────── runs/<run-id>/ ──────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Core data types |
//! | [`run_store`] | Run directories, run ids, artifact names |
//! | [`platform`] | Social-platform trait |
//! | [`reddit`] | Reddit client |
//! | [`acquire`] | Posts + comments → content records |
//! | [`artifact`] | Raw artifact persistence |
//! | [`index`] | Vector-index trait and batched builder |
//! | [`pinecone`] | Pinecone backend |
//! | [`memory_index`] | In-process backend |
//! | [`retrieve`] | Semantic search and search artifacts |
//! | [`answer`] | Generative-model trait and answer composition |
//! | [`gemini`] | Gemini client |
//! | [`pipeline`] | Stage orchestration and skip gates |
//! | [`server`] | HTTP entry point |
//! | [`error`] | Pipeline error taxonomy |

pub mod acquire;
pub mod answer;
pub mod artifact;
pub mod config;
pub mod error;
pub mod gemini;
pub mod index;
pub mod memory_index;
pub mod models;
pub mod pinecone;
pub mod pipeline;
pub mod platform;
pub mod reddit;
pub mod retrieve;
pub mod run_store;
pub mod server;
