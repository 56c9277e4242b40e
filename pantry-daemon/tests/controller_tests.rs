//! DaemonController start/stop scenarios with test doubles for the probe
//! and the embedded server.

use std::cell::RefCell;
use std::fs;
use std::net::{IpAddr, Ipv4Addr};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::path::PathBuf;
use std::rc::Rc;

use pantry_core::{ExitOutcome, LogSettings, PantryConfig, ServerEndpoint};
use pantry_daemon::{ControllerState, DaemonController, DaemonError, Liveness, ProcessProbe};
use pantry_server::{ConfigServer, ServerError};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq)]
struct StartCall {
    host: IpAddr,
    port: u16,
    use_ssl: bool,
    blocking: bool,
    pidfile_content: Option<String>,
    sandbox_existed: bool,
}

/// Records calls; `start` returns at once as if the server were stopped.
#[derive(Default)]
struct RecordingServer {
    pidfile: PathBuf,
    sandbox: PathBuf,
    starts: Vec<StartCall>,
    stops: usize,
    panic_on_start: bool,
}

impl RecordingServer {
    fn for_config(config: &PantryConfig) -> Self {
        Self {
            pidfile: config.pidfile(),
            sandbox: config.sandbox_root(),
            ..Default::default()
        }
    }
}

impl ConfigServer for RecordingServer {
    fn start(&mut self, endpoint: &ServerEndpoint, blocking: bool) -> Result<(), ServerError> {
        self.starts.push(StartCall {
            host: endpoint.host,
            port: endpoint.port,
            use_ssl: endpoint.use_ssl,
            blocking,
            pidfile_content: fs::read_to_string(&self.pidfile).ok(),
            sandbox_existed: self.sandbox.is_dir(),
        });
        if self.panic_on_start {
            panic!("embedded server crashed");
        }
        Ok(())
    }

    fn stop(&mut self) -> Result<(), ServerError> {
        self.stops += 1;
        Ok(())
    }
}

/// Fixed-liveness probe that remembers which pids were terminated.
#[derive(Clone)]
struct FixedProbe {
    liveness: Liveness,
    terminated: Rc<RefCell<Vec<i32>>>,
}

impl FixedProbe {
    fn new(liveness: Liveness) -> Self {
        Self {
            liveness,
            terminated: Rc::new(RefCell::new(Vec::new())),
        }
    }
}

impl ProcessProbe for FixedProbe {
    fn probe(&self, _pid: i32) -> Result<Liveness, DaemonError> {
        Ok(self.liveness)
    }

    fn terminate(&self, pid: i32) -> Result<(), DaemonError> {
        self.terminated.borrow_mut().push(pid);
        Ok(())
    }
}

fn config(home: &TempDir) -> PantryConfig {
    PantryConfig {
        home: home.path().to_path_buf(),
        endpoint: ServerEndpoint::new(IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)), 9999, false),
        daemonize: false,
        logging: LogSettings::default(),
    }
}

fn seed_pidfile(config: &PantryConfig, content: &str) {
    let path = config.pidfile();
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, content).unwrap();
}

#[test]
fn start_without_pidfile_claims_port_and_starts_server() {
    let home = TempDir::new().unwrap();
    let config = config(&home);
    let server = RecordingServer::for_config(&config);
    let mut controller =
        DaemonController::with_probe(config.clone(), server, FixedProbe::new(Liveness::Missing));

    controller.run("start").expect("start");

    let starts = &controller.server().starts;
    assert_eq!(starts.len(), 1);
    let call = &starts[0];
    assert_eq!(call.host, IpAddr::V4(Ipv4Addr::new(10, 0, 0, 5)));
    assert_eq!(call.port, 9999);
    assert!(!call.use_ssl);
    assert!(call.blocking);
    assert_eq!(
        call.pidfile_content.as_deref(),
        Some(std::process::id().to_string().as_str())
    );
    assert!(call.sandbox_existed);

    // Server returned: the guard released the pidfile and sandbox.
    assert!(!config.pidfile().exists());
    assert!(!config.sandbox_root().exists());
    assert_eq!(controller.state(), ControllerState::Idle);
}

#[test]
fn start_with_live_pid_reports_already_running_without_side_effects() {
    let home = TempDir::new().unwrap();
    let config = config(&home);
    seed_pidfile(&config, "4321");
    let server = RecordingServer::for_config(&config);
    let mut controller =
        DaemonController::with_probe(config.clone(), server, FixedProbe::new(Liveness::Alive));

    let err = controller.run("start").unwrap_err();
    assert!(matches!(err, DaemonError::AnotherInstanceRunning { .. }), "got: {err}");
    assert_eq!(err.outcome(), ExitOutcome::AlreadyRunning);
    assert_eq!(err.outcome().code(), 2);
    assert!(err.to_string().contains("Another server is already running"));

    assert!(controller.server().starts.is_empty());
    assert_eq!(fs::read_to_string(config.pidfile()).unwrap(), "4321");
    assert!(!config.sandbox_root().exists());
}

#[test]
fn foreign_owner_blocks_start_and_reads_as_not_running_for_stop() {
    let home = TempDir::new().unwrap();
    let config = config(&home);
    seed_pidfile(&config, "4321");
    let probe = FixedProbe::new(Liveness::NotOwned);

    for (action, expected) in [
        ("start", ExitOutcome::AlreadyRunning),
        ("stop", ExitOutcome::NotRunning),
    ] {
        let server = RecordingServer::for_config(&config);
        let mut controller = DaemonController::with_probe(config.clone(), server, probe.clone());
        let err = controller.run(action).unwrap_err();
        assert_eq!(err.outcome(), expected, "{action}");
        assert_eq!(err.outcome().code(), expected.code(), "{action}");
        assert!(controller.server().starts.is_empty());
        assert_eq!(controller.server().stops, 0);
        assert_eq!(fs::read_to_string(config.pidfile()).unwrap(), "4321");
    }
    assert!(probe.terminated.borrow().is_empty());
}

#[test]
fn start_over_dead_pid_reclaims_and_proceeds() {
    let home = TempDir::new().unwrap();
    let config = config(&home);
    seed_pidfile(&config, "4321");
    let server = RecordingServer::for_config(&config);
    let mut controller =
        DaemonController::with_probe(config.clone(), server, FixedProbe::new(Liveness::Missing));

    controller.run("start").expect("start");
    let call = &controller.server().starts[0];
    assert_eq!(
        call.pidfile_content.as_deref(),
        Some(std::process::id().to_string().as_str())
    );
}

#[test]
fn stop_over_dead_pid_removes_it_and_reports_not_running() {
    let home = TempDir::new().unwrap();
    let config = config(&home);
    seed_pidfile(&config, "4321");
    let probe = FixedProbe::new(Liveness::Missing);
    let server = RecordingServer::for_config(&config);
    let mut controller = DaemonController::with_probe(config.clone(), server, probe.clone());

    let err = controller.run("stop").unwrap_err();
    assert_eq!(err.outcome(), ExitOutcome::NotRunning);
    assert_eq!(err.outcome().code(), 3);
    assert!(!config.pidfile().exists());
    assert!(probe.terminated.borrow().is_empty());
}

#[test]
fn stop_without_pidfile_is_not_running() {
    let home = TempDir::new().unwrap();
    let config = config(&home);
    let server = RecordingServer::for_config(&config);
    let mut controller =
        DaemonController::with_probe(config.clone(), server, FixedProbe::new(Liveness::Missing));

    let err = controller.run("stop").unwrap_err();
    assert!(matches!(err, DaemonError::NotRunning { .. }), "got: {err}");
}

#[test]
fn stop_signals_running_server_and_cleans_up() {
    let home = TempDir::new().unwrap();
    let config = config(&home);
    seed_pidfile(&config, "4321");
    fs::create_dir_all(config.sandbox_root().join("roles")).unwrap();
    let probe = FixedProbe::new(Liveness::Alive);
    let server = RecordingServer::for_config(&config);
    let mut controller = DaemonController::with_probe(config.clone(), server, probe.clone());

    controller.run("stop").expect("stop");

    assert_eq!(*probe.terminated.borrow(), vec![4321]);
    assert_eq!(controller.server().stops, 1);
    assert!(!config.pidfile().exists());
    assert!(!config.sandbox_root().exists());
}

#[test]
fn unsupported_action_exits_four_without_side_effects() {
    let home = TempDir::new().unwrap();
    let config = config(&home);
    let server = RecordingServer::for_config(&config);
    let mut controller =
        DaemonController::with_probe(config.clone(), server, FixedProbe::new(Liveness::Missing));

    let err = controller.run("restart").unwrap_err();
    assert_eq!(err.outcome(), ExitOutcome::UnsupportedAction);
    assert_eq!(err.outcome().code(), 4);
    assert!(controller.server().starts.is_empty());
    assert!(!home.path().join(".kitchen").exists());
}

#[test]
fn cleanup_runs_when_server_panics() {
    let home = TempDir::new().unwrap();
    let config = config(&home);
    let mut server = RecordingServer::for_config(&config);
    server.panic_on_start = true;
    let mut controller =
        DaemonController::with_probe(config.clone(), server, FixedProbe::new(Liveness::Missing));

    let result = catch_unwind(AssertUnwindSafe(|| controller.run("start")));
    assert!(result.is_err());
    assert!(!config.pidfile().exists());
    assert!(!config.sandbox_root().exists());
}
