//! Guaranteed-run cleanup for one start/stop invocation.

use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

/// Removes the per-port pidfile and sandbox root when dropped.
///
/// Nothing is removed until the invocation claims it: the pidfile only while
/// it still holds the claimed pid, the sandbox root only after
/// [`claim_sandbox`](Self::claim_sandbox). Failures are logged, never raised.
#[derive(Debug)]
pub struct CleanupGuard {
    pidfile: PathBuf,
    sandbox_root: PathBuf,
    owned_pid: Option<i32>,
    owns_sandbox: bool,
}

impl CleanupGuard {
    pub fn new(pidfile: PathBuf, sandbox_root: PathBuf) -> Self {
        Self {
            pidfile,
            sandbox_root,
            owned_pid: None,
            owns_sandbox: false,
        }
    }

    pub fn claim_pidfile(&mut self, pid: i32) {
        self.owned_pid = Some(pid);
    }

    pub fn claim_sandbox(&mut self) {
        self.owns_sandbox = true;
    }

    fn remove_pidfile(&self, pid: i32) {
        let holder = fs::read_to_string(&self.pidfile)
            .ok()
            .and_then(|text| text.trim().parse::<i32>().ok());
        if holder != Some(pid) {
            return;
        }
        if let Err(err) = fs::remove_file(&self.pidfile) {
            if err.kind() != ErrorKind::NotFound {
                tracing::warn!(error = %err, "cleanup: failed to remove {}", self.pidfile.display());
            }
        }
    }

    fn remove_sandbox(&self) {
        match fs::remove_dir_all(&self.sandbox_root) {
            Ok(()) => tracing::debug!("removed sandbox {}", self.sandbox_root.display()),
            Err(err) if err.kind() == ErrorKind::NotFound => {}
            Err(err) => tracing::warn!(
                error = %err,
                "cleanup: failed to remove {}",
                self.sandbox_root.display()
            ),
        }
    }
}

impl Drop for CleanupGuard {
    fn drop(&mut self) {
        if let Some(pid) = self.owned_pid.take() {
            self.remove_pidfile(pid);
        }
        if std::mem::take(&mut self.owns_sandbox) {
            self.remove_sandbox();
        }
    }
}
