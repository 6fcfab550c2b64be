//! CLI end-to-end tests
//!
//! Tests for the recordstore command-line interface.

use assert_cmd::prelude::*;
use predicates::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{tempdir, TempDir};

/// Get a command for the recordstore binary
#[allow(deprecated)]
fn recordstore_cmd() -> Command {
    Command::cargo_bin("recordstore").unwrap()
}

/// Write a config pointing at a database inside `dir`.
fn write_config(dir: &TempDir) -> PathBuf {
    let config_file = dir.path().join("recordstore.toml");
    let db_path = dir.path().join("demo.db");
    fs::write(
        &config_file,
        format!(
            r#"
[database]
path = "{}"
journal_mode = "wal"

[pool]
max_open = 4
max_idle = 2
"#,
            db_path.display()
        ),
    )
    .unwrap();
    config_file
}

fn run(config: &Path, args: &[&str]) -> assert_cmd::assert::Assert {
    recordstore_cmd()
        .arg("--config")
        .arg(config)
        .args(args)
        .env_remove("RUST_LOG")
        .assert()
}

#[test]
fn test_cli_no_args_shows_help() {
    let mut cmd = recordstore_cmd();
    cmd.assert()
        .failure()
        .stderr(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_help_flag() {
    let mut cmd = recordstore_cmd();
    cmd.arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("recordstore"))
        .stdout(predicate::str::contains("Usage"));
}

#[test]
fn test_cli_version_command() {
    let mut cmd = recordstore_cmd();
    cmd.arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains("recordstore"));
}

#[test]
fn test_cli_seed_help() {
    let mut cmd = recordstore_cmd();
    cmd.args(["seed", "--help"])
        .assert()
        .success()
        .stdout(predicate::str::contains("demo users"));
}

#[test]
fn test_cli_migrate_creates_database() {
    let temp = tempdir().unwrap();
    let config = write_config(&temp);

    run(&config, &["migrate"])
        .success()
        .stdout(predicate::str::contains("Schema is up to date"));
    assert!(temp.path().join("demo.db").exists());

    // running it again is harmless
    run(&config, &["migrate"]).success();
}

#[test]
fn test_cli_seed_then_stats_json() {
    let temp = tempdir().unwrap();
    let config = write_config(&temp);

    run(&config, &["seed", "--users", "4"])
        .success()
        .stdout(predicate::str::contains("Seeded 4 users"));

    let output = run(&config, &["stats", "--json"]).success().get_output().stdout.clone();
    let stats: serde_json::Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(stats["users"], 4);
    assert_eq!(stats["wallets"], 4);
    assert_eq!(stats["likes"], 6);
    assert_eq!(stats["balance"]["total"], 10_000_000);
}

#[test]
fn test_cli_seed_twice_is_skipped() {
    let temp = tempdir().unwrap();
    let config = write_config(&temp);

    run(&config, &["seed"]).success();
    run(&config, &["seed"])
        .success()
        .stdout(predicate::str::contains("nothing seeded"));
    run(&config, &["stats"])
        .success()
        .stdout(predicate::str::contains("Users:     3"));
}

#[test]
fn test_cli_users_listing() {
    let temp = tempdir().unwrap();
    let config = write_config(&temp);
    run(&config, &["seed"]).success();

    run(&config, &["users"])
        .success()
        .stdout(predicate::str::contains("User 1 Khannedy"))
        .stdout(predicate::str::contains("balance 3000000"));

    run(&config, &["users", "--min-balance", "2000000"])
        .success()
        .stdout(predicate::str::contains("User 1 Khannedy").not())
        .stdout(predicate::str::contains("User 2 Khannedy"));
}

#[test]
fn test_cli_users_on_empty_database() {
    let temp = tempdir().unwrap();
    let config = write_config(&temp);
    run(&config, &["users"])
        .success()
        .stdout(predicate::str::contains("No users"));
}

#[test]
fn test_cli_validate_config() {
    let temp = tempdir().unwrap();
    let config = write_config(&temp);

    let mut cmd = recordstore_cmd();
    cmd.arg("validate")
        .arg(&config)
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration is valid"));
}

#[test]
fn test_cli_validate_reports_warnings() {
    let temp = tempdir().unwrap();
    let config_file = temp.path().join("odd.toml");
    fs::write(
        &config_file,
        r#"
[database]
journal_mode = "sideways"

[pool]
max_open = 2
max_idle = 8
"#,
    )
    .unwrap();

    let mut cmd = recordstore_cmd();
    cmd.arg("validate")
        .arg(&config_file)
        .assert()
        .success()
        .stdout(predicate::str::contains("warning"))
        .stdout(predicate::str::contains("journal_mode"));
}

#[test]
fn test_cli_invalid_config_fails() {
    let temp = tempdir().unwrap();
    let config_file = temp.path().join("broken.toml");
    fs::write(&config_file, "[pool]\nmax_open = \"many\"\n").unwrap();

    run(&config_file, &["stats"])
        .failure()
        .stderr(predicate::str::contains("config parse error"));
}

#[test]
fn test_cli_missing_config_fails() {
    run(Path::new("/nonexistent/recordstore.toml"), &["stats"])
        .failure()
        .stderr(predicate::str::contains("cannot read"));
}
