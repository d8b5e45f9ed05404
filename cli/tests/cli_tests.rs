use assert_cmd::Command;
use predicates::prelude::*;
use tempfile::TempDir;

/// `benchctl` pointed at an isolated storage directory
fn benchctl(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("benchctl").unwrap();
    cmd.env("MODELBENCH_CONFIG", dir.path().join("absent.toml"))
        .env("MODELBENCH_PATH", dir.path().join("data"))
        .env_remove("MODELBENCH_BACKEND")
        .env_remove("MODELBENCH_DATABASE")
        .env_remove("MODELBENCH_REPETITIONS")
        .env_remove("RUST_LOG")
        .arg("--no-color");
    cmd
}

#[test]
fn test_cli_help() {
    let mut cmd = Command::cargo_bin("benchctl").unwrap();
    cmd.arg("--help");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("ModelBench CLI"));
}

#[test]
fn test_cli_version() {
    let mut cmd = Command::cargo_bin("benchctl").unwrap();
    cmd.arg("--version");
    cmd.assert()
        .success()
        .stdout(predicate::str::contains("benchctl"));
}

#[test]
fn test_subcommand_help() {
    for (command, text) in [
        ("setup", "Create the storage schema"),
        ("demo", "Benchmark and compare three toy models"),
        ("query", "List stored benchmark results"),
        ("top", "Show the best models"),
    ] {
        let mut cmd = Command::cargo_bin("benchctl").unwrap();
        cmd.args([command, "--help"]);
        cmd.assert().success().stdout(predicate::str::contains(text));
    }
}

#[test]
fn test_invalid_command() {
    let mut cmd = Command::cargo_bin("benchctl").unwrap();
    cmd.arg("invalid-command");
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("error:"));
}

#[test]
fn test_setup_each_backend() {
    for backend in ["row_store", "columnar", "time_series"] {
        let dir = TempDir::new().unwrap();
        benchctl(&dir)
            .args(["--backend", backend, "setup"])
            .assert()
            .success()
            .stdout(predicate::str::contains("schema is ready"));

        // A second setup keeps working
        benchctl(&dir).args(["--backend", backend, "setup"]).assert().success();
    }
}

#[test]
fn test_query_before_setup_fails() {
    let dir = TempDir::new().unwrap();
    benchctl(&dir)
        .arg("query")
        .assert()
        .code(11)
        .stderr(predicate::str::contains("benchctl setup"));
}

#[test]
fn test_setup_writes_config() {
    let dir = TempDir::new().unwrap();
    let config_path = dir.path().join("written.toml");

    benchctl(&dir)
        .args(["--database", "nightly", "setup", "--write-config"])
        .arg(&config_path)
        .assert()
        .success();

    let content = std::fs::read_to_string(&config_path).unwrap();
    assert!(content.contains("database = \"nightly\""));
}

#[test]
fn test_invalid_backend_from_env() {
    let dir = TempDir::new().unwrap();
    benchctl(&dir)
        .env("MODELBENCH_BACKEND", "clickhouse")
        .arg("setup")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration Error"));
}

#[test]
fn test_invalid_time_range() {
    let dir = TempDir::new().unwrap();
    benchctl(&dir).arg("setup").assert().success();
    benchctl(&dir)
        .args(["query", "--since", "last-week"])
        .assert()
        .code(7)
        .stderr(predicate::str::contains("Invalid Time Range"));
}

#[test]
fn test_demo_then_query_and_top() {
    let dir = TempDir::new().unwrap();

    benchctl(&dir)
        .arg("demo")
        .assert()
        .success()
        .stdout(predicate::str::contains("Ranked by score"))
        .stdout(predicate::str::contains("dummy-model-3"));

    let output = benchctl(&dir)
        .args(["--format", "json", "query", "--model", "dummy-model-1"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let results: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let results = results.as_array().unwrap();
    assert_eq!(results.len(), 1);
    assert_eq!(results[0]["value"], 1.0);
    assert_eq!(results[0]["task_type"], "basic-math");

    let output = benchctl(&dir)
        .args(["--format", "json", "query", "--limit", "2"])
        .output()
        .unwrap();
    let results: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(results.as_array().unwrap().len(), 2);

    let output = benchctl(&dir)
        .args(["--format", "json", "top", "--task", "basic-math"])
        .output()
        .unwrap();
    let board: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    let board = board.as_array().unwrap();
    assert_eq!(board.len(), 4);
    assert_eq!(board.last().unwrap()["model_name"], "dummy-model-2");
}

#[test]
fn test_demo_on_time_series_backend() {
    let dir = TempDir::new().unwrap();

    benchctl(&dir)
        .args(["--backend", "time_series", "demo", "--items", "10"])
        .assert()
        .success();

    benchctl(&dir)
        .args(["--backend", "time_series", "query", "--task", "basic-math"])
        .assert()
        .success()
        .stdout(predicate::str::contains("4 result(s)"));
}
