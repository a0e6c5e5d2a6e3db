//! Tests for the `pkgswap` and `updater` binaries.

use std::path::{Path, PathBuf};

use assert_cmd::Command;
use mockito::Server;
use predicates::prelude::*;
use pkgswap::test_utils::InstallFixture;

fn write_config(fixture: &InstallFixture, endpoint: &str) -> PathBuf {
    let path = fixture.install_dir().join("pkgswap.toml");
    let content = format!(
        "endpoint = {:?}\ninstall_dir = {:?}\n",
        endpoint,
        fixture.install_dir().display().to_string()
    );
    std::fs::write(&path, content).unwrap();
    path
}

fn pkgswap(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("pkgswap").unwrap();
    cmd.env("NO_COLOR", "1").env_remove("RUST_LOG").arg("--config").arg(config);
    cmd
}

#[test]
fn test_upgrade_installs_offered_package() {
    let mut server = Server::new();
    let _check = server
        .mock("POST", "/check")
        .with_status(200)
        .with_body(format!(r#"{{"latestVersion":"1.2.0","sourceURL":"{}/pkg"}}"#, server.url()))
        .create();
    let _pkg = server.mock("GET", "/pkg").with_status(200).with_body("v2").create();

    let fixture = InstallFixture::new().unwrap();
    fixture.write_installed(b"v1").unwrap();
    let config = write_config(&fixture, &format!("{}/check", server.url()));

    pkgswap(&config)
        .args(["upgrade", "--current-version", "1.0.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Upgraded to"));

    assert_eq!(fixture.installed().unwrap(), b"v2");
    let log = std::fs::read_to_string(fixture.install_dir().join("updater-log.txt")).unwrap();
    assert!(log.contains("Installed update"));
}

#[test]
fn test_check_up_to_date_exits_zero() {
    let mut server = Server::new();
    let _check = server
        .mock("POST", "/check")
        .with_status(200)
        .with_body(r#"{"latestVersion":"1.0.0"}"#)
        .create();

    let fixture = InstallFixture::new().unwrap();
    let config = write_config(&fixture, &format!("{}/check", server.url()));

    pkgswap(&config)
        .args(["check", "--current-version", "1.0.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Already up to date"));
}

#[test]
fn test_check_json_output() {
    let mut server = Server::new();
    let _check = server
        .mock("POST", "/check")
        .with_status(200)
        .with_body(r#"{"latestVersion":"2.0.0","sourceURL":"https://host/pkg"}"#)
        .create();

    let fixture = InstallFixture::new().unwrap();
    let config = write_config(&fixture, &format!("{}/check", server.url()));

    let output = pkgswap(&config)
        .args(["check", "--json", "--current-version", "1.0.0"])
        .output()
        .unwrap();
    assert!(output.status.success());

    let manifest: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(manifest["latest_version"], "2.0.0");
    assert_eq!(manifest["source_url"], "https://host/pkg");
    assert!(manifest["local_file_path"].is_null());
}

#[test]
fn test_missing_version_fails_with_suggestion() {
    let fixture = InstallFixture::new().unwrap();
    let config = write_config(&fixture, "http://127.0.0.1:1/check");

    pkgswap(&config)
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("version was not specified"))
        .stderr(predicate::str::contains("--current-version"));
}

#[test]
fn test_missing_config_file() {
    let fixture = InstallFixture::new().unwrap();

    pkgswap(&fixture.install_dir().join("absent.toml"))
        .arg("check")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to read updater config"));
}

#[test]
fn test_replace_with_nothing_staged() {
    let fixture = InstallFixture::new().unwrap();
    fixture.write_installed(b"v1").unwrap();
    let config = write_config(&fixture, "http://127.0.0.1:1/check");

    pkgswap(&config).arg("replace").assert().success().stdout(predicate::str::contains("Nothing to replace"));
    assert_eq!(fixture.installed().unwrap(), b"v1");
}

#[cfg(not(windows))]
#[test]
fn test_replace_moves_staged_package() {
    let fixture = InstallFixture::new().unwrap();
    fixture.write_installed(b"v1").unwrap();
    fixture.write_staged(b"v2").unwrap();
    let config = write_config(&fixture, "http://127.0.0.1:1/check");

    pkgswap(&config).arg("replace").assert().success();
    assert_eq!(fixture.installed().unwrap(), b"v2");
    assert!(!fixture.has_staged());
}

#[test]
fn test_helper_replaces_package_and_logs() {
    let fixture = InstallFixture::named("My App").unwrap();
    fixture.write_installed(b"v1").unwrap();
    fixture.write_staged(b"v2").unwrap();
    let layout = fixture.layout();

    Command::cargo_bin("updater")
        .unwrap()
        .env_remove("RUST_LOG")
        .arg(layout.staged_package())
        .arg(layout.installed_package())
        .args(["--attempts", "2", "--delay-ms", "1"])
        .assert()
        .success();

    assert_eq!(fixture.installed().unwrap(), b"v2");
    assert!(!fixture.has_staged());
    let log = std::fs::read_to_string(fixture.install_dir().join("updater-log.txt")).unwrap();
    assert!(log.contains("Replaced"));
}

#[test]
fn test_helper_with_nothing_staged() {
    let fixture = InstallFixture::new().unwrap();
    fixture.write_installed(b"v1").unwrap();
    let layout = fixture.layout();

    Command::cargo_bin("updater")
        .unwrap()
        .arg(layout.staged_package())
        .arg(layout.installed_package())
        .assert()
        .success();

    assert_eq!(fixture.installed().unwrap(), b"v1");
}

#[test]
fn test_quiet_still_reports_unopenable_log_file() {
    let fixture = InstallFixture::new().unwrap();
    let path = fixture.install_dir().join("pkgswap.toml");
    let content = format!(
        "endpoint = \"http://127.0.0.1:1/check\"\ninstall_dir = {:?}\nlog_file = \"missing/updater-log.txt\"\n",
        fixture.install_dir().display().to_string()
    );
    std::fs::write(&path, content).unwrap();

    pkgswap(&path)
        .args(["--quiet", "replace"])
        .assert()
        .success()
        .stderr(predicate::str::contains("file logging disabled"));
}

#[test]
fn test_helper_honours_log_file_argument() {
    let fixture = InstallFixture::new().unwrap();
    fixture.write_installed(b"v1").unwrap();
    fixture.write_staged(b"v2").unwrap();
    let layout = fixture.layout();
    let custom = fixture.install_dir().join("custom-log.txt");

    Command::cargo_bin("updater")
        .unwrap()
        .env_remove("RUST_LOG")
        .arg(layout.staged_package())
        .arg(layout.installed_package())
        .arg("--log-file")
        .arg(&custom)
        .assert()
        .success();

    assert_eq!(fixture.installed().unwrap(), b"v2");
    assert!(std::fs::read_to_string(&custom).unwrap().contains("Replaced"));
    assert!(!fixture.install_dir().join("updater-log.txt").exists());
}
