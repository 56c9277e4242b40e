//! Detach the current process from its controlling terminal.

use std::fs::{File, OpenOptions};
use std::io;
use std::os::fd::AsRawFd;
use std::path::Path;

use nix::unistd::{chdir, dup2, fork, setsid, ForkResult};

use crate::error::{io_err, DaemonError};

/// Turn the calling process into a background daemon.
///
/// On return the caller is a grandchild of the original process: it runs in
/// a new session with no controlling terminal, its working directory is `/`,
/// stdin reads `/dev/null`, and stdout/stderr append to `log_file` (or go to
/// `/dev/null`). Both intermediate parents exit with status 0.
///
/// Must be called while the process is single-threaded, before any async
/// runtime or listener exists.
pub fn daemonize(log_file: Option<&Path>) -> Result<(), DaemonError> {
    tracing::debug!("Daemonizing the current process: {}", std::process::id());

    // SAFETY: the process is single-threaded here; the child only continues
    // with ordinary Rust code, and the parent exits immediately.
    match unsafe { fork() }.map_err(DaemonError::Fork)? {
        ForkResult::Parent { .. } => std::process::exit(0),
        ForkResult::Child => {}
    }

    setsid().map_err(DaemonError::Fork)?;

    // SAFETY: as above; the session leader exits so the daemon can never
    // reacquire a controlling terminal.
    match unsafe { fork() }.map_err(DaemonError::Fork)? {
        ForkResult::Parent { .. } => std::process::exit(0),
        ForkResult::Child => {}
    }

    chdir("/").map_err(DaemonError::Fork)?;
    redirect_stdio(log_file)
}

fn redirect_stdio(log_file: Option<&Path>) -> Result<(), DaemonError> {
    let dev_null = Path::new("/dev/null");
    let input = File::open(dev_null).map_err(|e| io_err(dev_null, e))?;
    let output_path = log_file.unwrap_or(dev_null);
    let output = OpenOptions::new()
        .create(true)
        .append(true)
        .open(output_path)
        .map_err(|e| io_err(output_path, e))?;

    for (src, dst) in [
        (input.as_raw_fd(), io::stdin().as_raw_fd()),
        (output.as_raw_fd(), io::stdout().as_raw_fd()),
        (output.as_raw_fd(), io::stderr().as_raw_fd()),
    ] {
        dup2(src, dst).map_err(DaemonError::Fork)?;
    }
    Ok(())
}
