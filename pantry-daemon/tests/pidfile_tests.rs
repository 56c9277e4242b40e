//! PidRegistry status, stale-reclaim and race tests.

use std::cell::RefCell;
use std::fs;
use std::sync::{Arc, Barrier};
use std::thread;

use pantry_daemon::{DaemonError, Liveness, PidRegistry, PidStatus, ProcessProbe, SignalProbe};
use rstest::rstest;
use tempfile::TempDir;

/// Probe that reports a fixed liveness for every pid.
struct FixedProbe {
    liveness: Liveness,
    probed: RefCell<Vec<i32>>,
}

impl FixedProbe {
    fn new(liveness: Liveness) -> Self {
        Self {
            liveness,
            probed: RefCell::new(Vec::new()),
        }
    }
}

impl ProcessProbe for FixedProbe {
    fn probe(&self, pid: i32) -> Result<Liveness, DaemonError> {
        self.probed.borrow_mut().push(pid);
        Ok(self.liveness)
    }

    fn terminate(&self, _pid: i32) -> Result<(), DaemonError> {
        Ok(())
    }
}

#[rstest]
#[case::alive(Liveness::Alive, PidStatus::Running)]
#[case::missing(Liveness::Missing, PidStatus::Dead)]
#[case::not_owned(Liveness::NotOwned, PidStatus::NotOwned)]
fn status_maps_probe_result(#[case] liveness: Liveness, #[case] expected: PidStatus) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pantry-9999.pid");
    fs::write(&path, "4321").unwrap();

    let registry = PidRegistry::new(FixedProbe::new(liveness));
    assert_eq!(registry.status(&path).unwrap(), expected);
    assert_eq!(*registry.probe().probed.borrow(), vec![4321]);
}

#[rstest]
#[case::zero("0")]
#[case::negative("-1")]
#[case::empty("")]
fn non_positive_pid_is_dead_without_probing(#[case] content: &str) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pantry-9999.pid");
    fs::write(&path, content).unwrap();

    let registry = PidRegistry::new(FixedProbe::new(Liveness::Alive));
    assert_eq!(registry.status(&path).unwrap(), PidStatus::Dead);
    assert!(registry.probe().probed.borrow().is_empty());
}

#[test]
fn missing_pidfile_is_exited() {
    let dir = TempDir::new().unwrap();
    let registry = PidRegistry::new(SignalProbe);
    assert_eq!(
        registry.status(&dir.path().join("pantry-1.pid")).unwrap(),
        PidStatus::Exited
    );
}

#[rstest]
#[case::running(Liveness::Alive)]
#[case::not_owned(Liveness::NotOwned)]
fn check_or_fail_refuses_live_owner_and_keeps_file(#[case] liveness: Liveness) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pantry-9999.pid");
    fs::write(&path, "4321").unwrap();

    let registry = PidRegistry::new(FixedProbe::new(liveness));
    let err = registry.check_or_fail(&path).unwrap_err();
    assert!(matches!(err, DaemonError::AnotherInstanceRunning { .. }), "got: {err}");
    assert_eq!(fs::read_to_string(&path).unwrap(), "4321");
}

#[test]
fn check_or_fail_reclaims_stale_file_idempotently() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pantry-9999.pid");
    fs::write(&path, "4321").unwrap();

    let registry = PidRegistry::new(FixedProbe::new(Liveness::Missing));
    registry.check_or_fail(&path).unwrap();
    assert!(!path.exists());
    registry.check_or_fail(&path).unwrap();
}

#[test]
fn acquire_replaces_stale_pidfile_with_single_retry() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pantry-9999.pid");
    fs::write(&path, "4321").unwrap();

    let registry = PidRegistry::new(FixedProbe::new(Liveness::Missing));
    let record = registry.acquire(&path, 9999, 77).unwrap();
    assert_eq!(record.pid, 77);
    assert_eq!(record.port, 9999);
    assert_eq!(fs::read_to_string(&path).unwrap(), "77");
}

#[test]
fn acquire_does_not_loop_under_permanent_not_owned() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pantry-9999.pid");
    fs::write(&path, "4321").unwrap();

    let registry = PidRegistry::new(FixedProbe::new(Liveness::NotOwned));
    let err = registry.acquire(&path, 9999, 77).unwrap_err();
    assert!(matches!(err, DaemonError::AnotherInstanceRunning { .. }), "got: {err}");
    assert_eq!(registry.probe().probed.borrow().len(), 1);
    assert_eq!(fs::read_to_string(&path).unwrap(), "4321");
}

#[test]
fn concurrent_acquire_has_exactly_one_winner() {
    let dir = TempDir::new().unwrap();
    let path = Arc::new(dir.path().join("pantry-9999.pid"));
    let barrier = Arc::new(Barrier::new(2));
    let pid = std::process::id() as i32;

    let handles: Vec<_> = (0..2)
        .map(|_| {
            let path = path.clone();
            let barrier = barrier.clone();
            thread::spawn(move || {
                let registry = PidRegistry::new(SignalProbe);
                barrier.wait();
                registry.acquire(&path, 9999, pid)
            })
        })
        .collect();

    let results: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    let winners = results.iter().filter(|r| r.is_ok()).count();
    assert_eq!(winners, 1, "results: {results:?}");
    let loser = results.iter().find(|r| r.is_err()).unwrap();
    assert!(matches!(
        loser,
        Err(DaemonError::AnotherInstanceRunning { .. })
    ));

    let leftovers = fs::read_dir(dir.path()).unwrap().count();
    assert_eq!(leftovers, 1, "exactly one pidfile and no temp files");
}

#[test]
fn running_pid_reclaims_dead_owner_as_not_running() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pantry-9999.pid");
    fs::write(&path, "4321").unwrap();

    let registry = PidRegistry::new(FixedProbe::new(Liveness::Missing));
    let err = registry.running_pid(&path).unwrap_err();
    assert!(matches!(err, DaemonError::NotRunning { .. }), "got: {err}");
    assert!(!path.exists());
}

#[test]
fn running_pid_treats_foreign_owner_as_not_running_and_keeps_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("pantry-9999.pid");
    fs::write(&path, "4321").unwrap();

    let registry = PidRegistry::new(FixedProbe::new(Liveness::NotOwned));
    let err = registry.running_pid(&path).unwrap_err();
    assert!(matches!(err, DaemonError::NotRunning { .. }), "got: {err}");
    assert_eq!(fs::read_to_string(&path).unwrap(), "4321");
}
