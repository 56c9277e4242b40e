//! Pidfile registry: the single-instance-per-port invariant.
//!
//! ## Write protocol
//!
//! 1. Write the pid to a uniquely named temp file beside the pidfile.
//! 2. Hard-link the temp file to the pidfile path. `link(2)` fails with
//!    `EEXIST` when the pidfile exists, so creation is exclusive and the
//!    pidfile is never observed empty.
//! 3. Remove the temp file.
//!
//! Correctness comes from the liveness probe, not from the file existing: a
//! pidfile whose process is gone is stale and gets reclaimed.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};

use nix::errno::Errno;
use nix::sys::signal::{kill, Signal};
use nix::unistd::Pid;

use pantry_core::PidRecord;

use crate::error::{io_err, DaemonError};

/// Pidfile creation attempts before giving up: the first try plus one retry
/// after reclaiming a stale file.
pub const MAX_WRITE_ATTEMPTS: usize = 2;

static TMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

/// What a pidfile says about its port.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PidStatus {
    /// No pidfile.
    Exited,
    /// Pidfile names a process that no longer exists (or holds no valid pid).
    Dead,
    Running,
    /// Process exists but belongs to someone we may not signal.
    NotOwned,
}

/// Result of a signal-0 probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Liveness {
    Alive,
    Missing,
    NotOwned,
}

/// Process existence checks and termination requests.
pub trait ProcessProbe {
    fn probe(&self, pid: i32) -> Result<Liveness, DaemonError>;
    fn terminate(&self, pid: i32) -> Result<(), DaemonError>;
}

/// Probe backed by `kill(2)`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SignalProbe;

impl ProcessProbe for SignalProbe {
    fn probe(&self, pid: i32) -> Result<Liveness, DaemonError> {
        match kill(Pid::from_raw(pid), None) {
            Ok(()) => Ok(Liveness::Alive),
            Err(Errno::ESRCH) => Ok(Liveness::Missing),
            Err(Errno::EPERM) => Ok(Liveness::NotOwned),
            Err(errno) => Err(DaemonError::Signal { pid, errno }),
        }
    }

    fn terminate(&self, pid: i32) -> Result<(), DaemonError> {
        match kill(Pid::from_raw(pid), Signal::SIGTERM) {
            Ok(()) | Err(Errno::ESRCH) => Ok(()),
            Err(errno) => Err(DaemonError::Signal { pid, errno }),
        }
    }
}

/// Reads, writes and validates pidfiles.
#[derive(Debug, Default, Clone)]
pub struct PidRegistry<P = SignalProbe> {
    probe: P,
}

impl<P: ProcessProbe> PidRegistry<P> {
    pub fn new(probe: P) -> Self {
        Self { probe }
    }

    pub fn probe(&self) -> &P {
        &self.probe
    }

    /// Stored pid; unparsable content reads as `0`.
    pub fn read_pid(&self, path: &Path) -> Result<i32, DaemonError> {
        tracing::debug!("Reading pid from {}", path.display());
        let text = fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        Ok(text.trim().parse::<i32>().unwrap_or(0))
    }

    pub fn status(&self, path: &Path) -> Result<PidStatus, DaemonError> {
        let pid = match self.read_pid(path) {
            Ok(pid) => pid,
            Err(DaemonError::Io { source, .. }) if source.kind() == ErrorKind::NotFound => {
                return Ok(PidStatus::Exited);
            }
            Err(err) => return Err(err),
        };
        // Never probe 0 or negatives: kill(2) would address process groups.
        if pid <= 0 {
            return Ok(PidStatus::Dead);
        }
        Ok(match self.probe.probe(pid)? {
            Liveness::Alive => PidStatus::Running,
            Liveness::Missing => PidStatus::Dead,
            Liveness::NotOwned => PidStatus::NotOwned,
        })
    }

    /// Exclusively create `path` holding `pid`.
    ///
    /// Fails with [`DaemonError::PidfileExists`] if any pidfile is already there.
    pub fn write(&self, path: &Path, pid: i32) -> Result<(), DaemonError> {
        if let Some(dir) = path.parent() {
            fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
        }
        let tmp = tmp_path(path, pid);
        fs::write(&tmp, pid.to_string()).map_err(|e| io_err(&tmp, e))?;

        tracing::debug!("Writing pid to {}", path.display());
        let linked = fs::hard_link(&tmp, path);
        let _ = fs::remove_file(&tmp);
        match linked {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => Err(DaemonError::PidfileExists {
                path: path.to_path_buf(),
            }),
            Err(e) => Err(io_err(path, e)),
        }
    }

    /// Fail if a live instance holds `path`; reclaim the file if it is stale.
    pub fn check_or_fail(&self, path: &Path) -> Result<(), DaemonError> {
        match self.status(path)? {
            PidStatus::Running | PidStatus::NotOwned => {
                tracing::error!("Another server is already running. Check {}", path.display());
                Err(DaemonError::AnotherInstanceRunning {
                    path: path.to_path_buf(),
                })
            }
            PidStatus::Dead => {
                tracing::warn!("Stale pid detected. Removing pidfile {}", path.display());
                self.remove(path)?;
                Ok(())
            }
            PidStatus::Exited => Ok(()),
        }
    }

    /// Claim `path` for `pid`, retrying once after reclaiming a stale file.
    pub fn acquire(&self, path: &Path, port: u16, pid: i32) -> Result<PidRecord, DaemonError> {
        for attempt in 1..=MAX_WRITE_ATTEMPTS {
            match self.write(path, pid) {
                Ok(()) => {
                    tracing::info!(pid, port, "claimed pidfile {}", path.display());
                    return Ok(PidRecord {
                        port,
                        pid,
                        path: path.to_path_buf(),
                    });
                }
                Err(DaemonError::PidfileExists { .. }) => {
                    tracing::warn!(attempt, "pidfile exists, re-probing its owner");
                    self.check_or_fail(path)?;
                }
                Err(err) => return Err(err),
            }
        }
        Err(DaemonError::AnotherInstanceRunning {
            path: path.to_path_buf(),
        })
    }

    /// Pid of the live instance recorded in `path`, for stopping it.
    ///
    /// A stale file is reclaimed and reported as [`DaemonError::NotRunning`].
    /// A process we may not signal is also `NotRunning`, and its file is kept.
    pub fn running_pid(&self, path: &Path) -> Result<i32, DaemonError> {
        match self.status(path)? {
            PidStatus::Running => self.read_pid(path),
            PidStatus::NotOwned => Err(DaemonError::NotRunning {
                path: path.to_path_buf(),
            }),
            PidStatus::Dead => {
                self.check_or_fail(path)?;
                Err(DaemonError::NotRunning {
                    path: path.to_path_buf(),
                })
            }
            PidStatus::Exited => Err(DaemonError::NotRunning {
                path: path.to_path_buf(),
            }),
        }
    }

    /// Delete `path`; returns whether a file was removed.
    pub fn remove(&self, path: &Path) -> Result<bool, DaemonError> {
        match fs::remove_file(path) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(io_err(path, e)),
        }
    }
}

fn tmp_path(path: &Path, pid: i32) -> PathBuf {
    let seq = TMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    PathBuf::from(format!("{}.{pid}.{seq}.tmp", path.display()))
}
