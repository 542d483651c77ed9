//! Integration tests for the butterfly-walk binary
//!
//! Each test builds a small GTFS database in a temp dir and runs the real
//! binary against it with the straight-line engine, so no routing server
//! is needed.

use std::path::Path;
use std::process::{Command, Output};

use rusqlite::Connection;
use tempfile::tempdir;

fn binary() -> Command {
    Command::new(env!("CARGO_BIN_EXE_butterfly-walk"))
}

fn create_gtfs(path: &Path) {
    let conn = Connection::open(path).unwrap();
    conn.execute_batch(
        "CREATE TABLE stops (stop_I INT PRIMARY KEY, lat REAL, lon REAL);
         CREATE TABLE stop_distances (from_stop_I INT, to_stop_I INT, d INT, d_walk INT,
             min_transfer_time INT, timed_transfer INT, UNIQUE (from_stop_I, to_stop_I));
         INSERT INTO stops VALUES (1, 0.0, 0.0);
         INSERT INTO stops VALUES (2, 0.001, 0.0);
         INSERT INTO stops VALUES (3, 0.0, 0.002);
         INSERT INTO stop_distances VALUES (1, 2, 111, NULL, NULL, NULL);
         INSERT INTO stop_distances VALUES (2, 1, 111, NULL, NULL, NULL);
         INSERT INTO stop_distances VALUES (1, 3, 222, NULL, NULL, NULL);",
    )
    .unwrap();
}

fn d_walk(path: &Path, from: i64, to: i64) -> Option<i64> {
    let conn = Connection::open(path).unwrap();
    conn.query_row(
        "SELECT d_walk FROM stop_distances WHERE from_stop_I = ?1 AND to_stop_I = ?2",
        [from, to],
        |row| row.get(0),
    )
    .unwrap()
}

fn cache_entries(path: &Path) -> i64 {
    let conn = Connection::open(path).unwrap();
    conn.query_row("SELECT COUNT(*) FROM stop_distances", [], |row| row.get(0))
        .unwrap()
}

fn stderr_of(output: &Output) -> String {
    String::from_utf8_lossy(&output.stderr).to_string()
}

#[test]
fn test_help() {
    let output = binary().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("--update-db"));
    assert!(stdout.contains("--router-url"));
}

#[test]
fn test_straight_line_run_updates_db_and_cache() {
    let dir = tempdir().unwrap();
    let gtfs = dir.path().join("gtfs.sqlite");
    let cache = dir.path().join("walk-cache.sqlite");
    create_gtfs(&gtfs);

    let output = binary()
        .arg("--update-db")
        .arg(&gtfs)
        .arg("--cache")
        .arg(&cache)
        .arg("--straight-line")
        .arg("--threads")
        .arg("2")
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));

    assert_eq!(d_walk(&gtfs, 1, 2), Some(111));
    assert_eq!(d_walk(&gtfs, 2, 1), Some(111));
    assert_eq!(d_walk(&gtfs, 1, 3), Some(222));
    assert_eq!(cache_entries(&cache), 3);
    assert!(stderr_of(&output).contains("Cache hits:    0"));
}

#[test]
fn test_second_run_served_from_cache_only() {
    let dir = tempdir().unwrap();
    let gtfs = dir.path().join("gtfs.sqlite");
    let cache = dir.path().join("walk-cache.sqlite");
    create_gtfs(&gtfs);

    let first = binary()
        .arg("--update-db")
        .arg(&gtfs)
        .arg("--cache")
        .arg(&cache)
        .arg("--straight-line")
        .output()
        .unwrap();
    assert!(first.status.success(), "stderr: {}", stderr_of(&first));

    // No engine this time, every pair must come from the cache
    let second = binary()
        .arg("--update-db")
        .arg(&gtfs)
        .arg("--cache")
        .arg(&cache)
        .output()
        .unwrap();
    assert!(second.status.success(), "stderr: {}", stderr_of(&second));
    assert!(stderr_of(&second).contains("Cache hits:    3"));
}

#[test]
fn test_limit_and_no_write_back() {
    let dir = tempdir().unwrap();
    let gtfs = dir.path().join("gtfs.sqlite");
    let cache = dir.path().join("walk-cache.sqlite");
    create_gtfs(&gtfs);

    let output = binary()
        .arg("--update-db")
        .arg(&gtfs)
        .arg("--cache")
        .arg(&cache)
        .arg("--straight-line")
        .arg("--no-write-back")
        .args(["-n", "1"])
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));

    // Rows are read ordered by (from_stop_I, to_stop_I)
    assert_eq!(d_walk(&gtfs, 1, 2), Some(111));
    assert_eq!(d_walk(&gtfs, 1, 3), None);
    assert_eq!(cache_entries(&cache), 0);
}

#[test]
fn test_dry_run_writes_nothing() {
    let dir = tempdir().unwrap();
    let gtfs = dir.path().join("gtfs.sqlite");
    create_gtfs(&gtfs);

    let output = binary()
        .arg("--update-db")
        .arg(&gtfs)
        .arg("--straight-line")
        .arg("--dry-run")
        .output()
        .unwrap();
    assert!(output.status.success());
    assert!(stderr_of(&output).contains("[DRY RUN]"));
    assert_eq!(d_walk(&gtfs, 1, 2), None);
}

#[test]
fn test_no_cache_and_no_engine_fails() {
    let dir = tempdir().unwrap();
    let gtfs = dir.path().join("gtfs.sqlite");
    create_gtfs(&gtfs);

    let output = binary().arg("--update-db").arg(&gtfs).output().unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_missing_gtfs_database_fails() {
    let dir = tempdir().unwrap();
    let output = binary()
        .arg("--update-db")
        .arg(dir.path().join("missing.sqlite"))
        .arg("--straight-line")
        .output()
        .unwrap();
    assert!(!output.status.success());
}

#[test]
fn test_unusable_cache_is_skipped() {
    let dir = tempdir().unwrap();
    let gtfs = dir.path().join("gtfs.sqlite");
    create_gtfs(&gtfs);

    // Passing a directory as the cache path makes opening it fail
    let output = binary()
        .arg("--update-db")
        .arg(&gtfs)
        .arg("--cache")
        .arg(dir.path())
        .arg("--straight-line")
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", stderr_of(&output));
    assert!(stderr_of(&output).contains("continuing without it"));
    assert_eq!(d_walk(&gtfs, 1, 3), Some(222));
}
