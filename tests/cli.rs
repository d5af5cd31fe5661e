use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn harvest_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("harvest");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let config_content = format!(
        r#"[runs]
root = "{}/runs"

[index]
provider = "memory"
name = "test-index"

[answer]
provider = "disabled"
"#,
        root.display()
    );

    let config_path = config_dir.join("harvest.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn seed_run(root: &Path, id: &str) {
    let dir = root.join("runs").join(id);
    fs::create_dir_all(&dir).unwrap();
    fs::write(
        dir.join("raw_scrap_results.json"),
        r#"[{"_id":"p1","subreddit":"Atlanta","created_utc":1718000000.0,"chunk_text":"Best tacos in town? Try Buford Highway","upvotes":12,"num_comments":4}]"#,
    )
    .unwrap();
    fs::write(
        dir.join("vector_search_results_0123456789ab.json"),
        r#"{
  "query": "Where are the best tacos?",
  "index_name": "test-index",
  "top_k": 5,
  "created_at": "2026-01-01T00:00:00+00:00",
  "hits": [
    {
      "id": "p1",
      "score": 0.42,
      "text": "Best tacos in town? Try Buford Highway",
      "metadata": {"subreddit": "Atlanta", "upvotes": 12, "num_comments": 4}
    }
  ]
}"#,
    )
    .unwrap();
}

fn run_harvest(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = harvest_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .output()
        .unwrap_or_else(|e| panic!("Failed to run harvest binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_runs_empty() {
    let (_tmp, config) = setup_test_env();
    let (stdout, stderr, success) = run_harvest(&config, &["runs"]);
    assert!(success, "runs failed: {}", stderr);
    assert!(stdout.contains("No runs."));
}

#[test]
fn test_runs_lists_artifacts() {
    let (tmp, config) = setup_test_env();
    seed_run(tmp.path(), "atl");

    let (stdout, stderr, success) = run_harvest(&config, &["runs"]);
    assert!(success, "runs failed: {}", stderr);
    let line = stdout.lines().find(|l| l.starts_with("atl")).unwrap();
    let columns: Vec<&str> = line.split_whitespace().collect();
    assert_eq!(columns, vec!["atl", "true", "false", "1"]);
}

#[test]
fn test_results_shows_hits() {
    let (tmp, config) = setup_test_env();
    seed_run(tmp.path(), "atl");

    let (stdout, stderr, success) = run_harvest(&config, &["results", "atl"]);
    assert!(success, "results failed: {}", stderr);
    assert!(stdout.contains("query: Where are the best tacos?"));
    assert!(stdout.contains("r/Atlanta"));
    assert!(stdout.contains("[0.420] p1"));
}

#[test]
fn test_results_missing_run() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, success) = run_harvest(&config, &["results", "nowhere"]);
    assert!(!success);
    assert!(stderr.contains("run not found"));
}

#[test]
fn test_answer_requires_provider() {
    let (tmp, config) = setup_test_env();
    seed_run(tmp.path(), "atl");

    let (_, stderr, success) = run_harvest(
        &config,
        &["answer", "--run-id", "atl", "--query", "Where are the best tacos?"],
    );
    assert!(!success);
    assert!(stderr.contains("answers are disabled"));
}

#[test]
fn test_missing_config_fails() {
    let tmp = TempDir::new().unwrap();
    let (_, stderr, success) = run_harvest(&tmp.path().join("nope.toml"), &["runs"]);
    assert!(!success);
    assert!(stderr.contains("Failed to read config file"));
}

#[test]
fn test_invalid_config_rejected() {
    let tmp = TempDir::new().unwrap();
    let config_path = tmp.path().join("harvest.toml");
    fs::write(
        &config_path,
        format!(
            "[runs]\nroot = \"{}/runs\"\n\n[index]\nbatch_size = 0\n",
            tmp.path().display()
        ),
    )
    .unwrap();

    let (_, stderr, success) = run_harvest(&config_path, &["runs"]);
    assert!(!success);
    assert!(stderr.contains("batch_size"));
}
