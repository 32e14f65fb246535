//! End-to-end tests for the offline `sow` commands and startup failures

use assert_cmd::Command;
use predicates::prelude::*;
use sow_geo::Coordinate;
use sow_image::fixtures::jpeg_with_gps;
use tempfile::TempDir;

/// `sow` in an empty directory with no config and no backend.
fn sow(dir: &TempDir) -> Command {
    let mut cmd = Command::cargo_bin("sow").unwrap();
    cmd.current_dir(dir.path())
        .env("HOME", dir.path())
        .env_remove("SOW_CONFIG")
        .env_remove("SOW_POSITION")
        .env_remove("SUPABASE_URL")
        .env_remove("NEXT_PUBLIC_SUPABASE_URL")
        .env_remove("SUPABASE_ANON_KEY")
        .env_remove("NEXT_PUBLIC_SUPABASE_ANON_KEY")
        .env_remove("SOW_ACCESS_TOKEN")
        .env("NO_COLOR", "1");
    cmd
}

#[test]
fn test_help_lists_commands() {
    let dir = TempDir::new().unwrap();
    sow(&dir)
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("checkin"))
        .stdout(predicate::str::contains("report"))
        .stdout(predicate::str::contains("leaderboard"))
        .stdout(predicate::str::contains("history"));
}

#[test]
fn test_distance_same_point() {
    let dir = TempDir::new().unwrap();
    sow(&dir)
        .args(["distance", "25.0330, 121.5654", "25.0330, 121.5654"])
        .assert()
        .success()
        .stdout(predicate::str::contains("0 m"));
}

#[test]
fn test_distance_json_outside_radius() {
    let dir = TempDir::new().unwrap();
    // About 2.2 km due north
    sow(&dir)
        .args(["--json", "distance", "25.0330, 121.5654", "25.0530, 121.5654"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"within\": false"))
        .stdout(predicate::str::contains("\"radius_km\": 1.0"));
}

#[test]
fn test_distance_rejects_bad_coordinate() {
    let dir = TempDir::new().unwrap();
    sow(&dir)
        .args(["distance", "north of the pond", "25.0330, 121.5654"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("E6"));
}

#[test]
fn test_compress_meets_ceiling_and_keeps_gps() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("heron.jpg");
    let coord = Coordinate::new(24.1477, 120.6736);
    std::fs::write(&input, jpeg_with_gps(coord, 2400, 1800)).unwrap();

    sow(&dir)
        .arg("compress")
        .arg(&input)
        .assert()
        .success()
        .stdout(predicate::str::contains("GPS:"))
        .stdout(predicate::str::contains("24.1477"));

    let output = dir.path().join("heron-compressed.jpg");
    let written = std::fs::read(&output).unwrap();
    assert!(written.len() <= 200 * 1024);
}

#[test]
fn test_compress_rejects_non_image() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("notes.jpg");
    std::fs::write(&input, b"field notes, not a photo").unwrap();

    sow(&dir).arg("compress").arg(&input).assert().code(7);
}

#[test]
fn test_checkin_without_backend_is_config_error() {
    let dir = TempDir::new().unwrap();
    sow(&dir)
        .args(["checkin", "--list"])
        .assert()
        .code(3)
        .stderr(predicate::str::contains("SUPABASE_URL"));
}

#[test]
fn test_missing_config_file_is_config_error() {
    let dir = TempDir::new().unwrap();
    sow(&dir)
        .args(["--config", "missing.toml", "distance", "0, 0", "0, 0"])
        .assert()
        .code(3);
}
