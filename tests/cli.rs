//! CLI integration tests
//!
//! Runs the `corner-heal` binary; the processing test talks to a local axum
//! server standing in for the image-editing service.

use assert_cmd::Command;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::post;
use axum::{Json, Router};
use base64::{engine::general_purpose, Engine as _};
use corner_heal::exit_codes;
use predicates::prelude::*;
use serde_json::{json, Value};
use std::io::{Cursor, Read};
use std::path::Path;
use tempfile::tempdir;

fn corner_heal() -> Command {
    Command::cargo_bin("corner-heal").unwrap()
}

fn write_config(dir: &Path, endpoint: &str) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    std::fs::write(
        &path,
        format!(
            "[client]\nendpoint = \"{}\"\n\n[defaults]\ncorner = \"top right\"\n",
            endpoint
        ),
    )
    .unwrap();
    path
}

#[test]
fn test_help_lists_commands() {
    corner_heal()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("process"))
        .stdout(predicate::str::contains("info"));
}

// TC-CLI-INT-001: Info shows the resolved config
#[test]
fn test_info_reads_config_file() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), "http://edit.example.com/api");

    corner_heal()
        .args(["info", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("http://edit.example.com/api"))
        .stdout(predicate::str::contains("top right"));
}

// TC-CLI-INT-002: Missing input
#[test]
fn test_process_missing_input() {
    corner_heal()
        .args(["process", "does-not-exist.jpg", "-q"])
        .assert()
        .code(exit_codes::INPUT_NOT_FOUND)
        .stderr(predicate::str::contains("does not exist"));
}

#[test]
fn test_process_directory_without_images() {
    let dir = tempdir().unwrap();
    std::fs::write(dir.path().join("notes.txt"), "not an image").unwrap();

    corner_heal()
        .arg("process")
        .arg(dir.path())
        .arg("-q")
        .assert()
        .code(exit_codes::INPUT_NOT_FOUND)
        .stderr(predicate::str::contains("No supported images"));
}

// TC-CLI-INT-003: Dry run lists the plan without calling the service
#[test]
fn test_process_dry_run() {
    let dir = tempdir().unwrap();
    let config = write_config(dir.path(), "http://127.0.0.1:9/unused");
    std::fs::write(dir.path().join("b.jpg"), "b").unwrap();
    std::fs::write(dir.path().join("a.png"), "a").unwrap();

    corner_heal()
        .arg("process")
        .arg(dir.path())
        .args(["--dry-run", "--tool", "generative-remove", "--config"])
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Files to process: 2"))
        .stdout(predicate::str::contains("top right"))
        .stdout(predicate::str::contains("generative-remove"))
        .stdout(predicate::str::contains("a.png"));
}

async fn echo_service(Json(body): Json<Value>) -> axum::response::Response {
    let data = body["imageData"].as_str().unwrap_or_default().to_string();
    let image = general_purpose::STANDARD.decode(&data).unwrap_or_default();
    if image.starts_with(b"fail") {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({ "error": "rate limited" })),
        )
            .into_response();
    }
    Json(json!({ "resultImageData": data })).into_response()
}

// TC-CLI-INT-004: Full run writes results and reports partial failure
#[tokio::test(flavor = "multi_thread")]
async fn test_process_writes_outputs() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = Router::new().route("/api/process-image", post(echo_service));
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let dir = tempdir().unwrap();
    let inputs = dir.path().join("inputs");
    std::fs::create_dir(&inputs).unwrap();
    std::fs::write(inputs.join("one.jpg"), "one").unwrap();
    std::fs::write(inputs.join("two.png"), "fail-two").unwrap();
    let out_dir = dir.path().join("out");
    let archive = dir.path().join("results.zip");
    let config = write_config(
        dir.path(),
        &format!("http://{}/api/process-image", addr),
    );

    let mut command = corner_heal();
    command
        .arg("process")
        .arg(&inputs)
        .arg("--config")
        .arg(&config)
        .arg("--output-dir")
        .arg(&out_dir)
        .arg("--archive")
        .arg(&archive)
        .args(["--retry-failed", "1", "-q"]);
    let output = tokio::task::spawn_blocking(move || command.output().unwrap())
        .await
        .unwrap();

    assert_eq!(output.status.code(), Some(exit_codes::PARTIAL_FAILURE));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("two.png: rate limited"), "{}", stderr);

    assert_eq!(
        std::fs::read_to_string(out_dir.join("one_healed.jpg")).unwrap(),
        "one"
    );
    assert!(!out_dir.join("two_healed.png").exists());

    let mut zip = zip::ZipArchive::new(Cursor::new(std::fs::read(&archive).unwrap())).unwrap();
    assert_eq!(zip.len(), 1);
    let mut content = String::new();
    zip.by_name("one_healed.jpg")
        .unwrap()
        .read_to_string(&mut content)
        .unwrap();
    assert_eq!(content, "one");
}
