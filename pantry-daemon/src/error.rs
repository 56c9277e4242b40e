use std::path::PathBuf;

use nix::errno::Errno;
use thiserror::Error;

use pantry_core::ExitOutcome;
use pantry_server::ServerError;

/// Error surface for pidfile management, daemonization and start/stop.
#[derive(Debug, Error)]
pub enum DaemonError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Lost the exclusive-create race for the pidfile.
    #[error("pidfile already exists: {path}")]
    PidfileExists { path: PathBuf },

    #[error("Another server is already running. Check {path}")]
    AnotherInstanceRunning { path: PathBuf },

    #[error("Server not running (no live process recorded in {path})")]
    NotRunning { path: PathBuf },

    #[error("Unsupported action '{0}'; expected: start, stop")]
    UnsupportedAction(String),

    #[error("failed to signal process {pid}: {errno}")]
    Signal { pid: i32, errno: Errno },

    #[error("failed to daemonize: {0}")]
    Fork(Errno),

    #[error("server error: {0}")]
    Server(#[from] ServerError),
}

impl DaemonError {
    /// Exit outcome the `pantry` binary reports for this error.
    pub fn outcome(&self) -> ExitOutcome {
        match self {
            DaemonError::AnotherInstanceRunning { .. } => ExitOutcome::AlreadyRunning,
            DaemonError::NotRunning { .. } => ExitOutcome::NotRunning,
            DaemonError::UnsupportedAction(_) => ExitOutcome::UnsupportedAction,
            _ => ExitOutcome::GenericError,
        }
    }
}

pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> DaemonError {
    DaemonError::Io {
        path: path.into(),
        source,
    }
}
