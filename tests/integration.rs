use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

fn cat_harvest_binary() -> PathBuf {
    let mut path = std::env::current_exe().unwrap();
    path.pop(); // remove test binary name
    path.pop(); // remove deps/
    path.push("cat-harvest");
    path
}

/// Config pointing at a fresh database and an upstream nobody listens on.
fn setup_test_env() -> (TempDir, PathBuf) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path().to_path_buf();

    let config_dir = root.join("config");
    fs::create_dir_all(&config_dir).unwrap();

    let closed = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let dead_addr = closed.local_addr().unwrap();
    drop(closed);

    let config_content = format!(
        r#"[db]
path = "{root}/data/cats.sqlite"

[upstream]
base_url = "http://{addr}/v1"
api_key = "test-key"
limit = 5
timeout_secs = 2

[images]
dir = "{root}/CatImages"

[server]
bind = "127.0.0.1:0"
"#,
        root = root.display(),
        addr = dead_addr,
    );

    let config_path = config_dir.join("cat-harvest.toml");
    fs::write(&config_path, config_content).unwrap();

    (tmp, config_path)
}

fn run_cli(config_path: &Path, args: &[&str]) -> (String, String, bool) {
    let binary = cat_harvest_binary();
    let output = Command::new(&binary)
        .arg("--config")
        .arg(config_path.to_str().unwrap())
        .args(args)
        .env("RUST_LOG", "warn")
        .env_remove("CAT_API_KEY")
        .output()
        .unwrap_or_else(|e| panic!("Failed to run cat-harvest binary at {:?}: {}", binary, e));

    let stdout = String::from_utf8_lossy(&output.stdout).to_string();
    let stderr = String::from_utf8_lossy(&output.stderr).to_string();
    (stdout, stderr, output.status.success())
}

#[test]
fn test_init_creates_database() {
    let (tmp, config) = setup_test_env();
    let (stdout, stderr, ok) = run_cli(&config, &["init"]);
    assert!(ok, "init failed: {}", stderr);
    assert!(stdout.contains("Database initialized successfully."));
    assert!(tmp.path().join("data").join("cats.sqlite").exists());

    // Idempotent
    let (_, stderr, ok) = run_cli(&config, &["init"]);
    assert!(ok, "second init failed: {}", stderr);
}

#[test]
fn test_list_empty_database() {
    let (_tmp, config) = setup_test_env();
    run_cli(&config, &["init"]);

    let (stdout, stderr, ok) = run_cli(&config, &["list"]);
    assert!(ok, "list failed: {}", stderr);
    assert!(stdout.contains("No cats found. (total: 0)"));

    let (stdout, _, ok) = run_cli(&config, &["list", "--tag", "Playful", "--page", "2"]);
    assert!(ok);
    assert!(stdout.contains("total: 0"));
}

#[test]
fn test_list_rejects_zero_page() {
    let (_tmp, config) = setup_test_env();
    let (_, stderr, ok) = run_cli(&config, &["list", "--page", "0"]);
    assert!(!ok);
    assert!(stderr.contains("--page"));
}

#[test]
fn test_get_missing_cat_fails() {
    let (_tmp, config) = setup_test_env();
    run_cli(&config, &["init"]);

    let (_, stderr, ok) = run_cli(&config, &["get", "42"]);
    assert!(!ok);
    assert!(stderr.contains("cat not found: 42"));
}

#[test]
fn test_fetch_with_unreachable_upstream_reports_failure() {
    let (tmp, config) = setup_test_env();

    let (stdout, stderr, ok) = run_cli(&config, &["fetch"]);
    assert!(ok, "fetch should report, not crash: {}", stderr);
    assert!(stdout.contains("fetch: upstream_failure"));
    assert!(stdout.contains("Failed to fetch cats from the API. Please try again later."));
    assert!(!tmp.path().join("CatImages").exists());

    let (stdout, _, ok) = run_cli(&config, &["list"]);
    assert!(ok);
    assert!(stdout.contains("total: 0"));
}

#[test]
fn test_missing_config_file_fails() {
    let tmp = TempDir::new().unwrap();
    let missing = tmp.path().join("nope.toml");
    let (_, stderr, ok) = run_cli(&missing, &["init"]);
    assert!(!ok);
    assert!(stderr.contains("Failed to read config file"));
}
