use std::fs;
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn pantry_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("pantry"));
    cmd.env("HOME", home).env("USERPROFILE", home);
    cmd
}

#[test]
fn start_refuses_when_port_is_held_by_live_process() {
    let home = TempDir::new().expect("home");
    let kitchen = home.path().join(".kitchen");
    fs::create_dir_all(&kitchen).expect("kitchen");
    let pidfile = kitchen.join("pantry-9999.pid");
    // This test process is alive and owned by the same user.
    fs::write(&pidfile, std::process::id().to_string()).expect("pidfile");

    pantry_cmd(home.path())
        .args(["start", "-H", "127.0.0.1", "-P", "9999"])
        .assert()
        .code(2)
        .stderr(contains("Another server is already running"));

    assert_eq!(
        fs::read_to_string(&pidfile).expect("pidfile kept"),
        std::process::id().to_string()
    );
    assert!(!kitchen.join("pantry_9999").exists());
}

#[test]
fn unsupported_action_exits_4_without_side_effects() {
    let home = TempDir::new().expect("home");

    pantry_cmd(home.path())
        .args(["restart", "-H", "127.0.0.1", "-P", "9999"])
        .assert()
        .code(4)
        .stderr(contains("restart"));

    assert!(!home.path().join(".kitchen").exists());
}

#[test]
fn stop_without_pidfile_reports_not_running() {
    let home = TempDir::new().expect("home");

    pantry_cmd(home.path())
        .args(["stop", "-H", "127.0.0.1", "-P", "9999"])
        .assert()
        .code(3);
}

#[test]
fn stop_with_stale_pidfile_removes_it() {
    let home = TempDir::new().expect("home");
    let kitchen = home.path().join(".kitchen");
    fs::create_dir_all(&kitchen).expect("kitchen");
    let pidfile = kitchen.join("pantry-9998.pid");
    // pid_max on Linux is at most 2^22; this pid cannot exist.
    fs::write(&pidfile, "99999999").expect("pidfile");

    pantry_cmd(home.path())
        .args(["stop", "-H", "127.0.0.1", "-P", "9998"])
        .assert()
        .code(3);

    assert!(!pidfile.exists());
}

#[test]
fn invalid_log_level_is_rejected_by_parser() {
    let home = TempDir::new().expect("home");

    pantry_cmd(home.path())
        .args(["start", "-l", "verbose"])
        .assert()
        .failure()
        .stderr(contains("verbose"));
}
