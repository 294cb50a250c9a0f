//! End-to-end tests for the rankify-import binary

#![allow(clippy::unwrap_used, clippy::expect_used)]

mod common;

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use tempfile::TempDir;
use wiremock::{
    matchers::{method, path},
    Mock, MockServer, ResponseTemplate,
};

fn rankify_import() -> Command {
    let mut cmd = Command::cargo_bin("rankify-import").unwrap();
    cmd.env_remove("RANKIFY_API_URL")
        .env_remove("RANKIFY_API_TOKEN")
        .env("LOG_LEVEL", "warn");
    cmd
}

#[test]
fn test_sample_writes_csv() {
    let dir = TempDir::new().unwrap();
    let output = dir.path().join("sample.csv");

    rankify_import()
        .arg("sample")
        .arg("--output")
        .arg(&output)
        .assert()
        .success();

    let content = fs::read_to_string(&output).unwrap();
    assert!(content.starts_with("\"name\",\"license\",\"street address\""));
    assert!(content.contains("\"Jane Doe Law\""));
    assert_eq!(content.lines().count(), 3);
}

#[test]
fn test_run_rejects_non_csv_input() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("lawyers.xlsx");
    fs::write(&input, "not a csv").unwrap();

    rankify_import()
        .args(["run", "--category", "3", "--dry-run", "--input"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("must be a .csv file"));
}

#[test]
fn test_run_rejects_unknown_mode() {
    rankify_import()
        .args(["run", "--input", "x.csv", "--category", "3", "--mode", "plumber"])
        .assert()
        .failure();
}

#[test]
fn test_dry_run_prints_preview() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("lawyers.csv");
    fs::write(&input, common::csv_with_rows(12, &[4])).unwrap();

    rankify_import()
        .args(["run", "--category", "3", "--dry-run", "--batch-size", "5", "--input"])
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("NAME"))
        .stdout(predicate::str::contains("Firm 11"))
        .stdout(predicate::str::contains("Firm 4").not());
}

#[test]
fn test_dry_run_requires_numeric_category() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("lawyers.csv");
    fs::write(&input, common::csv_with_rows(2, &[])).unwrap();

    rankify_import()
        .args(["run", "--category", "personal-injury", "--dry-run", "--input"])
        .arg(&input)
        .assert()
        .failure()
        .stderr(predicate::str::contains("numeric --category"));
}

#[tokio::test]
async fn test_categories_lists_server_categories() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/categories/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!([
            { "id": 4, "name": "Personal Injury", "slug": "personal-injury" }
        ])))
        .mount(&server)
        .await;
    let url = format!("{}/api", server.uri());

    let assert = tokio::task::spawn_blocking(move || {
        rankify_import()
            .args(["categories", "--server-url", &url])
            .assert()
    })
    .await
    .unwrap();

    assert
        .success()
        .stdout(predicate::str::contains("Personal Injury"))
        .stdout(predicate::str::contains("personal-injury"));
}
