use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::path::Path;
use std::process::Command;

use assert_cmd::prelude::*;
use pantry_core::ServerEndpoint;
use pantry_server::{ConfigServer, ZeroServer};
use predicates::str::contains;
use tempfile::TempDir;

fn provision_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("pantry-provision"));
    cmd.env("HOME", home).env("USERPROFILE", home);
    cmd
}

#[test]
fn provisions_against_live_server_and_prints_command() {
    let mut server = ZeroServer::new();
    server
        .start(
            &ServerEndpoint::new(IpAddr::V4(Ipv4Addr::LOCALHOST), 0, false),
            false,
        )
        .expect("start");
    let port = server.local_addr().expect("addr").port();

    let home = TempDir::new().expect("home");
    let repo = TempDir::new().expect("repo");
    let instance = TempDir::new().expect("instance");
    fs::create_dir_all(repo.path().join("roles")).expect("roles");
    fs::write(repo.path().join("roles/web.json"), "{\"name\":\"web\"}").expect("role");
    let config = repo.path().join("pantry.yml");
    fs::write(
        &config,
        format!("pantry_host: 127.0.0.1\npantry_port: {port}\nsudo: false\nrun_list: [\"role[web]\"]\n"),
    )
    .expect("config");

    provision_cmd(home.path())
        .arg("--config")
        .arg(&config)
        .arg("--instance-root")
        .arg(instance.path())
        .assert()
        .success()
        .stdout(contains("chef-client --config /tmp/kitchen/client.rb"))
        .stdout(contains(format!("--server http://127.0.0.1:{port}")));

    assert_eq!(
        server.store().get("roles/web.json").expect("uploaded"),
        b"{\"name\":\"web\"}".to_vec()
    );
    assert!(instance.path().join("client.rb").is_file());
    server.stop().expect("stop");
}

#[test]
fn missing_config_fails_with_path() {
    let home = TempDir::new().expect("home");
    let instance = TempDir::new().expect("instance");

    provision_cmd(home.path())
        .args(["--config", "/nonexistent/pantry.yml", "--instance-root"])
        .arg(instance.path())
        .assert()
        .failure()
        .stderr(contains("/nonexistent/pantry.yml"));
}
