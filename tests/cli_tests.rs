mod common;

use assert_cmd::Command;
use tempfile::TempDir;

fn academicfed() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_academicfed"));
    for key in [
        "ACADEMICFED_RELATIONAL_PATH",
        "ACADEMICFED_DOCUMENT_PATH",
        "ACADEMICFED_GRAPH_PATH",
        "ACADEMICFED_POOL_SIZE",
        "ACADEMICFED_QUERY_TIMEOUT_MS",
        "ACADEMICFED_MIN_KEYWORD_RELEVANCE",
    ] {
        cmd.env_remove(key);
    }
    cmd
}

fn contains(output: &[u8], needle: &str) -> bool {
    String::from_utf8_lossy(output).contains(needle)
}

fn write_dataset(dir: &TempDir) -> String {
    let path = dir.path().join("dataset.json");
    let json = common::academic_dataset().to_json().expect("json");
    std::fs::write(&path, json).expect("write dataset");
    path.to_str().expect("utf-8 path").to_string()
}

#[test]
fn test_cli_exits_with_success_on_help() {
    let output = academicfed().arg("--help").output().expect("run");
    assert!(output.status.success());
    assert!(contains(&output.stdout, "Usage: academicfed"));
}

#[test]
fn test_cli_counts_synthetic_faculty() {
    let output = academicfed()
        .args(["--synthetic", "3", "--command", "countActiveFaculty"])
        .output()
        .expect("run");
    assert!(output.status.success());
    assert!(contains(&output.stdout, "\"type\": \"count\""));
    assert!(contains(&output.stdout, "\"value\": 96"));
}

#[test]
fn test_cli_serves_json_request_from_dataset_file() {
    let dir = TempDir::new().expect("tempdir");
    let dataset = write_dataset(&dir);
    let output = academicfed()
        .args([
            "--dataset",
            &dataset,
            "--request",
            r#"{"queryName": "topKRCFaculty", "parameters": {"keyword": "AI", "affiliation": "U1"}}"#,
        ])
        .output()
        .expect("run");
    assert!(output.status.success());
    let response: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(response["source"], "document");
    assert_eq!(response["payload"]["value"]["rows"][0][1], "F1");
}

#[test]
fn test_cli_command_arguments_become_parameters() {
    let dir = TempDir::new().expect("tempdir");
    let dataset = write_dataset(&dir);
    let output = academicfed()
        .args([
            "--dataset",
            &dataset,
            "--command",
            "trendingKeywords",
            "year=2020",
            "source=mongodb",
        ])
        .output()
        .expect("run");
    assert!(output.status.success());
    let response: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(response["source"], "document");
    assert_eq!(response["payload"]["value"]["rows"][0][0], "robotics");
}

#[test]
fn test_cli_rejects_bad_arguments() {
    academicfed().arg("--bogus").assert().code(2);
    academicfed().args(["--synthetic", "x", "--command", "countActiveFaculty"]).assert().code(2);
    academicfed().args(["--synthetic", "1"]).assert().code(2);
    academicfed().args(["--command", "noSuchQuery"]).assert().code(2);
}

#[test]
fn test_cli_reports_failures_as_json() {
    let output = academicfed()
        .args(["--command", "restoreFaculty"])
        .output()
        .expect("run");
    assert_eq!(output.status.code(), Some(1));
    let failure: serde_json::Value = serde_json::from_slice(&output.stdout).expect("json");
    assert_eq!(failure["kind"], "NotFoundError");
    assert_eq!(
        failure["states"].as_array().and_then(|s| s.last()),
        Some(&serde_json::json!("errorReported"))
    );
}

#[test]
fn test_cli_state_persists_in_configured_files() {
    let dir = TempDir::new().expect("tempdir");
    let dataset = write_dataset(&dir);
    let config = dir.path().join("academicfed.json");
    let stores = serde_json::json!({
        "relational": {"path": dir.path().join("relational.db")},
        "document": {"path": dir.path().join("document.db")},
        "graph": {"path": dir.path().join("graph.db")},
    });
    std::fs::write(&config, stores.to_string()).expect("write config");
    let config = config.to_str().expect("utf-8 path").to_string();

    academicfed()
        .args(["--config", &config, "--dataset", &dataset])
        .args(["--command", "deleteFaculty", "facultyId=2"])
        .assert()
        .success();
    let output = academicfed()
        .args(["--config", &config, "--command", "countActiveFaculty"])
        .output()
        .expect("run");
    assert!(output.status.success());
    assert!(contains(&output.stdout, "\"value\": 4"));

    academicfed()
        .args(["--config", &config, "--command", "restoreFaculty"])
        .assert()
        .success();
    academicfed()
        .args(["--config", &config, "--command", "restoreFaculty"])
        .assert()
        .code(1);
}
