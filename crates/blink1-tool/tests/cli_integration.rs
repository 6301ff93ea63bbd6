//! Integration tests for the `blink1-tool` and `blink1-server` binaries.
//!
//! Only device-free paths are exercised here: help, version, argument
//! errors, and the `config` subcommand against a temporary config file.

use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

fn cli() -> assert_cmd::Command {
    cargo_bin_cmd!("blink1-tool")
}

fn server() -> assert_cmd::Command {
    cargo_bin_cmd!("blink1-server")
}

#[test]
fn cli_help_succeeds() {
    cli()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("blink1-tool"))
        .stdout(predicate::str::contains("play-pattern"));
}

#[test]
fn cli_version_prints_version() {
    cli()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

// ── Argument errors ──

#[test]
fn cli_unknown_subcommand_fails() {
    cli()
        .arg("frobnicate")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("frobnicate"));
}

#[test]
fn cli_missing_subcommand_fails() {
    cli().assert().code(1);
}

#[test]
fn cli_bad_number_fails() {
    cli().args(["-m", "soon", "config"]).assert().code(1);
}

// ── config ──

#[test]
fn cli_config_json_produces_valid_json() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    let output = cli()
        .args(["--json", "--config"])
        .arg(&path)
        .arg("config")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    let json: serde_json::Value =
        serde_json::from_slice(&output).expect("config --json should produce valid JSON");
    assert!(json["settings"].is_object());
    assert_eq!(json["config_file_exists"], false);
    assert_eq!(json["settings"]["server"]["port"], 8000);
}

#[test]
fn cli_config_reads_custom_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(
        &path,
        "fade_millis = 750\n\n[patterns]\nalert = \"2,#ff0000,0.3,0,#000000,0.3,0\"\n",
    )
    .unwrap();

    let output = cli()
        .args(["--json", "--config"])
        .arg(&path)
        .arg("config")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(json["config_file_exists"], true);
    assert_eq!(json["settings"]["fade_millis"], 750);
    assert_eq!(
        json["settings"]["patterns"]["alert"],
        "2,#ff0000,0.3,0,#000000,0.3,0"
    );
}

#[test]
fn cli_config_text_lists_problems() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.toml");
    fs::write(&path, "[server]\nport = 0\n").unwrap();

    cli()
        .arg("--config")
        .arg(&path)
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("Problems"))
        .stdout(predicate::str::contains("port"));
}

// ── --verbose flag ──

#[test]
fn cli_verbose_flag_accepted() {
    let dir = tempfile::tempdir().unwrap();
    cli()
        .args(["-v", "--config"])
        .arg(dir.path().join("none.toml"))
        .arg("config")
        .assert()
        .success();
}

#[test]
fn cli_verbose_long_flag_accepted() {
    let dir = tempfile::tempdir().unwrap();
    cli()
        .args(["--verbose", "--verbose", "--config"])
        .arg(dir.path().join("none.toml"))
        .arg("config")
        .assert()
        .success();
}

// ── Subcommand help ──
// Device commands are only checked through --help.

#[test]
fn cli_subcommand_help_succeeds() {
    for sub in ["rgb", "blink", "play-pattern", "server-tickle", "write-note"] {
        cli().args([sub, "--help"]).assert().success();
    }
}

// ── blink1-server ──

#[test]
fn server_help_succeeds() {
    server()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("--port"));
}

#[test]
fn server_rejects_bad_port() {
    server().args(["--port", "99999"]).assert().code(1);
}
