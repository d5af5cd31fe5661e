//! Pipeline error taxonomy.
//!
//! Components below the pipeline return `anyhow::Result`; the pipeline
//! tags each failure with the stage it came from so callers can tell a bad
//! request apart from a stage that failed. Per-item failures (a single
//! post's comments) are recovered inside the acquirer and never reach here.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    /// The caller supplied a missing or malformed field.
    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("run storage failed: {0:#}")]
    Storage(anyhow::Error),

    #[error("content acquisition failed: {0:#}")]
    Acquisition(anyhow::Error),

    #[error("indexing failed: {0:#}")]
    Indexing(anyhow::Error),

    #[error("search failed: {0:#}")]
    Search(anyhow::Error),

    #[error("answer composition failed: {0:#}")]
    Answer(anyhow::Error),
}

impl PipelineError {
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, PipelineError::InvalidInput(_))
    }

    /// Short machine-readable code, used in HTTP error bodies.
    pub fn code(&self) -> &'static str {
        match self {
            PipelineError::InvalidInput(_) => "bad_request",
            PipelineError::Storage(_) => "storage_failed",
            PipelineError::Acquisition(_)
            | PipelineError::Indexing(_)
            | PipelineError::Search(_)
            | PipelineError::Answer(_) => "stage_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Context;

    #[test]
    fn test_display_includes_cause_chain() {
        let inner: anyhow::Result<()> =
            Err(anyhow::anyhow!("connection reset")).context("subreddit search");
        let err = PipelineError::Acquisition(inner.unwrap_err());
        let msg = err.to_string();
        assert!(msg.starts_with("content acquisition failed"));
        assert!(msg.contains("subreddit search"));
        assert!(msg.contains("connection reset"));
    }

    #[test]
    fn test_codes() {
        assert_eq!(
            PipelineError::InvalidInput("x".into()).code(),
            "bad_request"
        );
        assert_eq!(
            PipelineError::Indexing(anyhow::anyhow!("x")).code(),
            "stage_failed"
        );
        assert!(PipelineError::InvalidInput("x".into()).is_invalid_input());
    }
}
