use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

const OCTOPUS_DOC: &str = "# Octopus\n\nThe Octopus can't let go. It keeps checking in on the team's work constantly, reviewing every detail.";
const BREAD_DOC: &str = "# Sourdough\n\nMix flour, water and salt. Bake the loaf at high heat until the crust is dark.";

fn sage_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("sage");
    path
}

fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let knowledge = root.join("knowledge");
    fs::create_dir_all(&knowledge).unwrap();
    fs::write(knowledge.join("octopus.md"), OCTOPUS_DOC).unwrap();
    fs::write(knowledge.join("sourdough.md"), BREAD_DOC).unwrap();
    fs::write(knowledge.join("ignored.txt"), "not markdown").unwrap();

    let config_content = format!(
        r#"[index]
path = "{root}/data/index.sqlite"

[knowledge]
dir = "{root}/knowledge"

[embedding]
provider = "hash"

[generation]
ollama_url = "http://127.0.0.1:9"

[eval]
results_dir = "{root}/evals"
"#,
        root = root.display()
    );

    let config_path = config_dir.join("sage.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_sage(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = sage_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env_remove("ANTHROPIC_API_KEY")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run sage binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_creates_index() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_sage(&config_path, &["init"]);
    assert!(success, "init failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("initialized"));
    assert!(tmp.path().join("data").join("index.sqlite").exists());

    let (_, _, again) = run_sage(&config_path, &["init"]);
    assert!(again, "second init failed (not idempotent)");
}

#[test]
fn test_index_then_reindex_skips_unchanged() {
    let (tmp, config_path) = setup_test_env();

    let (stdout, stderr, success) = run_sage(&config_path, &["index"]);
    assert!(success, "index failed: stdout={}, stderr={}", stdout, stderr);
    assert!(stdout.contains("documents: 2"));
    assert!(stdout.contains("chunks written: 2"));
    assert!(tmp.path().join("data").join("doc_hashes.json").exists());

    let (stdout, _, success) = run_sage(&config_path, &["index"]);
    assert!(success);
    assert!(stdout.contains("unchanged: 2"));
    assert!(stdout.contains("chunks written: 0"));
    assert!(stdout.contains("total chunks: 2"));

    let (stdout, _, success) = run_sage(&config_path, &["index", "--force"]);
    assert!(success);
    assert!(stdout.contains("re-indexed: 2"));
    assert!(stdout.contains("total chunks: 2"));
}

#[test]
fn test_index_detects_changed_document() {
    let (tmp, config_path) = setup_test_env();
    run_sage(&config_path, &["index"]);

    fs::write(
        tmp.path().join("knowledge").join("sourdough.md"),
        "# Sourdough\n\nFeed the starter twice a day.",
    )
    .unwrap();

    let (stdout, _, success) = run_sage(&config_path, &["index"]);
    assert!(success);
    assert!(stdout.contains("re-indexed: 1"));
    assert!(stdout.contains("unchanged: 1"));
    assert!(stdout.contains("chunks written: 1"));
}

#[test]
fn test_index_prune_removes_deleted_document() {
    let (tmp, config_path) = setup_test_env();
    run_sage(&config_path, &["index"]);

    fs::remove_file(tmp.path().join("knowledge").join("sourdough.md")).unwrap();

    let (stdout, _, success) = run_sage(&config_path, &["index"]);
    assert!(success);
    assert!(stdout.contains("total chunks: 2"));

    let (stdout, _, success) = run_sage(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("1 source(s) not in the hash cache (removed documents?): sourdough"));

    let (stdout, _, success) = run_sage(&config_path, &["index", "--prune"]);
    assert!(success);
    assert!(stdout.contains("pruned chunks: 1"));
    assert!(stdout.contains("total chunks: 1"));

    let (stdout, _, _) = run_sage(&config_path, &["stats"]);
    assert!(!stdout.contains("not in the hash cache"));
}

#[test]
fn test_search_ranks_relevant_document_first() {
    let (_tmp, config_path) = setup_test_env();

    // No explicit index: search bootstraps an empty index.
    let (stdout, stderr, success) = run_sage(
        &config_path,
        &["search", "I keep checking in on my team's work constantly"],
    );
    assert!(success, "search failed: stdout={}, stderr={}", stdout, stderr);

    let first = stdout.lines().next().unwrap_or_default();
    assert!(first.starts_with("1. ["), "unexpected first line: {}", first);
    assert!(first.contains("octopus (chunk 1/1)"), "unexpected first line: {}", first);
}

#[test]
fn test_search_limit() {
    let (_tmp, config_path) = setup_test_env();
    let (stdout, _, success) = run_sage(&config_path, &["search", "octopus", "--limit", "1"]);
    assert!(success);
    assert!(stdout.contains("1. ["));
    assert!(!stdout.contains("2. ["));
}

#[test]
fn test_search_empty_query() {
    let (_tmp, config_path) = setup_test_env();
    let (stdout, _, success) = run_sage(&config_path, &["search", "  "]);
    assert!(success);
    assert!(stdout.contains("No results."));
}

#[test]
fn test_stats_before_and_after_index() {
    let (_tmp, config_path) = setup_test_env();

    let (stdout, _, success) = run_sage(&config_path, &["stats"]);
    assert!(success);
    assert!(stdout.contains("No index"));

    run_sage(&config_path, &["index"]);
    let (stdout, stderr, success) = run_sage(&config_path, &["stats"]);
    assert!(success, "stats failed: {}", stderr);
    assert!(stdout.contains("Chunks:      2"));
    assert!(stdout.contains("octopus"));
    assert!(stdout.contains("hash-bow"));
}

#[test]
fn test_dataset_summary() {
    let (_tmp, config_path) = setup_test_env();
    let (stdout, _, success) = run_sage(&config_path, &["dataset"]);
    assert!(success);
    assert!(stdout.contains("dataset (bundled)"));
    assert!(stdout.contains("golden_retriever"));
    assert!(stdout.contains("obvious"));
}

#[test]
fn test_eval_without_backend_fails_before_generation() {
    let (tmp, config_path) = setup_test_env();
    let (stdout, stderr, success) =
        run_sage(&config_path, &["eval", "--quick", "--progress", "off"]);
    assert!(!success, "eval unexpectedly succeeded: {}", stdout);
    assert!(stderr.contains("no generation backend available"));
    assert!(!tmp.path().join("evals").exists());
}

#[test]
fn test_eval_rejects_unknown_difficulty() {
    let (_tmp, config_path) = setup_test_env();
    let (_, stderr, success) = run_sage(&config_path, &["eval", "--difficulty", "trivial"]);
    assert!(!success);
    assert!(stderr.contains("trivial"));
}

#[test]
fn test_malformed_config_errors() {
    let (tmp, _) = setup_test_env();
    let bad = tmp.path().join("config").join("bad.toml");
    fs::write(&bad, "[chunking]\nchunk_size = \"lots\"").unwrap();
    let (_, _, success) = run_sage(&bad, &["stats"]);
    assert!(!success);
}
