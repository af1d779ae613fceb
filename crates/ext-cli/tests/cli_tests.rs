//! Integration tests for the extman binary.

use std::path::Path;

use assert_cmd::Command;
use ext_test_utils::{PackageBuilder, TestFeed};
use predicates::prelude::*;
use tempfile::TempDir;

fn extman(dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("extman").expect("Failed to find extman binary");
    cmd.current_dir(dir).env_remove("EXTMAN_CONFIG").env("RUST_LOG", "warn");
    cmd
}

fn write_config(dir: &Path, feed: &TestFeed, packages: &[&str]) -> String {
    let config = serde_json::json!({
        "Extensions": {
            "Sources": [feed.uri()],
            "Packages": packages,
            "IgnoreSchedule": true
        }
    });
    std::fs::write(dir.join("host.json"), config.to_string()).unwrap();
    "host.json".to_string()
}

#[test]
fn help_lists_commands() {
    let temp = TempDir::new().unwrap();
    extman(temp.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("load"))
        .stdout(predicate::str::contains("schedule"));
}

#[test]
fn schedule_round_trip_through_plugins_directory() {
    let temp = TempDir::new().unwrap();

    extman(temp.path())
        .args(["schedule", "install", "Demo", "--version", "1.0.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Scheduled install"));
    assert!(temp.path().join("plugins/schedule.json").exists());

    extman(temp.path())
        .args(["schedule", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Demo:1.0.0"));

    extman(temp.path())
        .args(["schedule", "status", "Demo"])
        .assert()
        .success()
        .stdout(predicate::str::contains("scheduled to install (1.0.0)"));

    extman(temp.path())
        .args(["schedule", "clear"])
        .assert()
        .success();

    extman(temp.path())
        .args(["schedule", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Schedule is empty."));
}

#[test]
fn list_json_reports_feed_packages() {
    let temp = TempDir::new().unwrap();
    let feed = TestFeed::new();
    feed.publish(&PackageBuilder::new("DemoPlugin", "1.0.0"));
    feed.publish(&PackageBuilder::new("DemoPlugin", "1.1.0"));
    let config = write_config(temp.path(), &feed, &[]);

    extman(temp.path())
        .args(["--config", &config, "list", "--json"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"Id\": \"DemoPlugin\""))
        .stdout(predicate::str::contains("1.1.0"));
}

#[test]
fn load_installs_configured_package() {
    let temp = TempDir::new().unwrap();
    let feed = TestFeed::new();
    feed.publish(&PackageBuilder::new("Content", "2.0.0"));
    let config = write_config(temp.path(), &feed, &["Content"]);

    extman(temp.path())
        .args(["--config", &config, "load"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Loaded 0 module(s)"));
    assert!(temp.path().join("plugins/Content.2.0.0").is_dir());

    extman(temp.path())
        .args(["--config", &config, "installed"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Content"));
}

#[test]
fn load_reports_missing_packages() {
    let temp = TempDir::new().unwrap();
    let feed = TestFeed::new();
    let config = write_config(temp.path(), &feed, &["Missing:1.0.0"]);

    extman(temp.path())
        .args(["--config", &config, "load"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("error"))
        .stderr(predicate::str::contains("Unable to download 1 packages out of 1."));
}

#[test]
fn show_unknown_package_fails() {
    let temp = TempDir::new().unwrap();
    let feed = TestFeed::new();
    let config = write_config(temp.path(), &feed, &[]);

    extman(temp.path())
        .args(["--config", &config, "show", "Nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Package 'Nope' was not found"));
}

#[test]
fn reset_removes_directories() {
    let temp = TempDir::new().unwrap();
    let feed = TestFeed::new();
    feed.publish(&PackageBuilder::new("Content", "2.0.0"));
    let config = write_config(temp.path(), &feed, &["Content"]);

    extman(temp.path())
        .args(["--config", &config, "load"])
        .assert()
        .success();
    assert!(temp.path().join("cache").is_dir());

    extman(temp.path())
        .args(["--config", &config, "reset"])
        .assert()
        .success()
        .stdout(predicate::str::contains("removed"));
    assert!(!temp.path().join("plugins").exists());
    assert!(!temp.path().join("cache").exists());
}
