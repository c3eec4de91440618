//! Integration tests for the `ecoflow` CLI binary.
//!
//! Argument parsing, help output, shell completions, config handling and
//! error exit codes. Commands that need the vendor API run against wiremock.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `ecoflow` binary with env isolation.
///
/// Clears all `ECOFLOW_*` env vars and points config directories at
/// `home` so tests never touch the user's real configuration.
fn ecoflow_cmd(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("ecoflow");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join(".config"))
        .env_remove("RUST_LOG")
        .env_remove("ECOFLOW_PROFILE")
        .env_remove("ECOFLOW_API_URL")
        .env_remove("ECOFLOW_ACCESS_KEY")
        .env_remove("ECOFLOW_SECRET_KEY")
        .env_remove("ECOFLOW_EMAIL")
        .env_remove("ECOFLOW_PASSWORD")
        .env_remove("ECOFLOW_OUTPUT")
        .env_remove("ECOFLOW_TIMEOUT");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

fn write_config(home: &Path, body: &str) {
    let dir = home.join(".config").join("ecoflow");
    std::fs::create_dir_all(&dir).unwrap();
    std::fs::write(dir.join("config.toml"), body).unwrap();
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let home = tempfile::tempdir().unwrap();
    let output = ecoflow_cmd(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    let home = tempfile::tempdir().unwrap();
    ecoflow_cmd(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("devices")
                .and(predicate::str::contains("params"))
                .and(predicate::str::contains("set-watts"))
                .and(predicate::str::contains("listen")),
        );
}

#[test]
fn test_version_flag() {
    let home = tempfile::tempdir().unwrap();
    ecoflow_cmd(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("ecoflow"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_zsh() {
    let home = tempfile::tempdir().unwrap();
    ecoflow_cmd(home.path())
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn test_completions_bash() {
    let home = tempfile::tempdir().unwrap();
    ecoflow_cmd(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn test_invalid_subcommand() {
    let home = tempfile::tempdir().unwrap();
    let output = ecoflow_cmd(home.path()).arg("foobar").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_invalid_output_format() {
    let home = tempfile::tempdir().unwrap();
    let output = ecoflow_cmd(home.path())
        .args(["--output", "yaml", "devices"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    let text = combined_output(&output);
    assert!(
        text.contains("invalid") || text.contains("possible values"),
        "Expected error about valid output formats:\n{text}"
    );
}

#[test]
fn test_devices_without_config() {
    let home = tempfile::tempdir().unwrap();
    ecoflow_cmd(home.path())
        .arg("devices")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration file not found"));
}

#[test]
fn test_missing_secret_key_is_an_auth_error() {
    let home = tempfile::tempdir().unwrap();
    ecoflow_cmd(home.path())
        .args(["--access-key", "AK", "--profile", "ecoflow-cli-test-nosecret", "devices"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("secret key"));
}

#[test]
fn test_unknown_profile() {
    let home = tempfile::tempdir().unwrap();
    write_config(
        home.path(),
        "[profiles.home]\naccess_key = \"AK\"\nsecret_key = \"SK\"\n",
    );
    ecoflow_cmd(home.path())
        .args(["--profile", "work", "devices"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("work").and(predicate::str::contains("home")));
}

#[test]
fn test_negative_watts_rejected() {
    let home = tempfile::tempdir().unwrap();
    ecoflow_cmd(home.path())
        .args([
            "--access-key",
            "AK",
            "--secret-key",
            "SK",
            "--api-url",
            "http://127.0.0.1:9",
            "set-watts",
            "HW51",
            "--",
            "-5",
        ])
        .assert()
        .code(2);
}

#[test]
fn test_listen_requires_account() {
    let home = tempfile::tempdir().unwrap();
    ecoflow_cmd(home.path())
        .args([
            "--access-key",
            "AK",
            "--secret-key",
            "SK",
            "--api-url",
            "http://127.0.0.1:9",
            "listen",
        ])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("email"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path() {
    let home = tempfile::tempdir().unwrap();
    ecoflow_cmd(home.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_show_masks_secrets() {
    let home = tempfile::tempdir().unwrap();
    write_config(
        home.path(),
        "default_profile = \"home\"\n\n[profiles.home]\naccess_key = \"AK-visible\"\n\
         secret_key = \"SK-hidden\"\nemail = \"me@example.com\"\npassword = \"hunter2\"\n",
    );
    ecoflow_cmd(home.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("AK-visible")
                .and(predicate::str::contains("[profiles.home]"))
                .and(predicate::str::contains("secret_key = \"****\""))
                .and(predicate::str::contains("SK-hidden").not())
                .and(predicate::str::contains("hunter2").not()),
        );
}

// ── Against a mock vendor API ───────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_devices_json_from_api() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/iot-open/sign/device/list"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "0",
            "message": "Success",
            "data": [
                { "sn": "HW51ZEH49G9X1234", "online": 1, "productName": "PowerStream" },
                { "sn": "R331ZEB4ZE8B0001", "online": 0 }
            ]
        })))
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    let output = ecoflow_cmd(home.path())
        .args(["--access-key", "AK", "--secret-key", "SK", "--api-url"])
        .arg(server.uri())
        .args(["-o", "json", "devices"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let devices: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(devices[0]["serial"], "HW51ZEH49G9X1234");
    assert_eq!(devices[0]["online"], true);
    assert_eq!(devices[1]["online"], false);
}

#[tokio::test(flavor = "multi_thread")]
async fn test_params_remote_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/iot-open/sign/device/quota/all"))
        .and(query_param("sn", "HW51"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "code": "8521",
            "message": "signature is wrong",
        })))
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    ecoflow_cmd(home.path())
        .args(["--access-key", "AK", "--secret-key", "SK", "--api-url"])
        .arg(server.uri())
        .args(["params", "HW51"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("signature is wrong"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_unauthorized_exits_with_auth_code() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/iot-open/sign/device/list"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let home = tempfile::tempdir().unwrap();
    ecoflow_cmd(home.path())
        .args(["--access-key", "AK", "--secret-key", "SK", "--api-url"])
        .arg(server.uri())
        .arg("devices")
        .assert()
        .code(3);
}
