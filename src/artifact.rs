//! Raw artifact persistence.
//!
//! The raw artifact is the JSON array of [`ContentRecord`]s acquired for a
//! run, stored at [`RAW_ARTIFACT`]. It is written once per run and read back
//! whenever a later stage resumes.

use anyhow::{Context, Result};
use std::path::PathBuf;
use tracing::info;

use crate::models::ContentRecord;
use crate::run_store::{RunHandle, RAW_ARTIFACT};

/// Serialize `records` to the run's raw artifact, overwriting any existing
/// file. Returns the path and the number of records written.
pub fn write_raw_artifact(handle: &RunHandle, records: &[ContentRecord]) -> Result<(PathBuf, usize)> {
    let path = handle.artifact_path(RAW_ARTIFACT);
    let json = serde_json::to_string_pretty(records)?;
    std::fs::write(&path, json)
        .with_context(|| format!("Failed to write raw artifact: {}", path.display()))?;

    info!(run = %handle.id, records = records.len(), path = %path.display(), "saved raw artifact");
    Ok((path, records.len()))
}

pub fn read_raw_artifact(handle: &RunHandle) -> Result<Vec<ContentRecord>> {
    let path = handle.artifact_path(RAW_ARTIFACT);
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("Failed to read raw artifact: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Malformed raw artifact: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::run_store::RunStore;
    use tempfile::TempDir;

    fn record(id: &str, text: &str) -> ContentRecord {
        ContentRecord {
            id: id.to_string(),
            subreddit: "Atlanta".to_string(),
            created_utc: 1718000000.0,
            chunk_text: text.to_string(),
            upvotes: 1,
            num_comments: 0,
        }
    }

    #[test]
    fn test_write_then_read_preserves_order() {
        let tmp = TempDir::new().unwrap();
        let run = RunStore::new(tmp.path()).resolve_or_create("r").unwrap();
        let records = vec![record("b", "second"), record("a", "first")];

        let (path, count) = write_raw_artifact(&run, &records).unwrap();
        assert_eq!(count, 2);
        assert_eq!(path, run.artifact_path(RAW_ARTIFACT));
        assert_eq!(read_raw_artifact(&run).unwrap(), records);
    }

    #[test]
    fn test_artifact_is_json_array_with_expected_fields() {
        let tmp = TempDir::new().unwrap();
        let run = RunStore::new(tmp.path()).resolve_or_create("r").unwrap();
        write_raw_artifact(&run, &[record("x", "Café crème")]).unwrap();

        let raw = std::fs::read_to_string(run.artifact_path(RAW_ARTIFACT)).unwrap();
        assert!(raw.contains("Café crème"), "non-ASCII text must be kept as-is");
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        let obj = value.as_array().unwrap()[0].as_object().unwrap();
        let mut keys: Vec<&str> = obj.keys().map(|k| k.as_str()).collect();
        keys.sort();
        assert_eq!(
            keys,
            vec!["_id", "chunk_text", "created_utc", "num_comments", "subreddit", "upvotes"]
        );
    }

    #[test]
    fn test_empty_acquisition_writes_empty_array() {
        let tmp = TempDir::new().unwrap();
        let run = RunStore::new(tmp.path()).resolve_or_create("r").unwrap();
        write_raw_artifact(&run, &[]).unwrap();
        assert!(run.artifact_exists(RAW_ARTIFACT));
        assert!(read_raw_artifact(&run).unwrap().is_empty());
    }

    #[test]
    fn test_read_malformed_artifact_fails() {
        let tmp = TempDir::new().unwrap();
        let run = RunStore::new(tmp.path()).resolve_or_create("r").unwrap();
        std::fs::write(run.artifact_path(RAW_ARTIFACT), "{not json").unwrap();
        let err = read_raw_artifact(&run).unwrap_err();
        assert!(err.to_string().contains("Malformed raw artifact"));
    }
}
