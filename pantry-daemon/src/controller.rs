//! Start/stop orchestration.
//!
//! ```text
//! start: logging → status check → [daemonize] → pidfile claim → sandbox root → server (blocks)
//! stop:  status check → logging → re-probe owner → SIGTERM → server.stop → pidfile delete
//! ```
//!
//! Both paths run inside a [`CleanupGuard`], so whatever the invocation
//! claimed is released on every exit path, including panics.

use std::fs;
use std::path::Path;
use std::str::FromStr;

use pantry_core::PantryConfig;
use pantry_server::ConfigServer;

use crate::cleanup::CleanupGuard;
use crate::daemonize::daemonize;
use crate::error::{io_err, DaemonError};
use crate::logging;
use crate::pidfile::{PidRegistry, PidStatus, ProcessProbe, SignalProbe};

/// The operator-requested action.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Start,
    Stop,
}

impl FromStr for Action {
    type Err = DaemonError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "start" => Ok(Action::Start),
            "stop" => Ok(Action::Stop),
            other => Err(DaemonError::UnsupportedAction(other.to_string())),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControllerState {
    Idle,
    Starting,
    Running,
    Stopping,
}

/// Drives one `start` or `stop` invocation for the configured port.
pub struct DaemonController<S, P = SignalProbe> {
    config: PantryConfig,
    server: S,
    registry: PidRegistry<P>,
    state: ControllerState,
}

impl<S: ConfigServer> DaemonController<S, SignalProbe> {
    pub fn new(config: PantryConfig, server: S) -> Self {
        Self::with_probe(config, server, SignalProbe)
    }
}

impl<S: ConfigServer, P: ProcessProbe> DaemonController<S, P> {
    pub fn with_probe(config: PantryConfig, server: S, probe: P) -> Self {
        Self {
            config,
            server,
            registry: PidRegistry::new(probe),
            state: ControllerState::Idle,
        }
    }

    pub fn state(&self) -> ControllerState {
        self.state
    }

    pub fn server(&self) -> &S {
        &self.server
    }

    pub fn registry(&self) -> &PidRegistry<P> {
        &self.registry
    }

    /// Parse `action` and run it. Returns once the server has stopped
    /// (`start`) or been signalled (`stop`).
    pub fn run(&mut self, action: &str) -> Result<(), DaemonError> {
        let action: Action = action.parse()?;
        let mut guard = CleanupGuard::new(self.config.pidfile(), self.config.sandbox_root());
        let result = match action {
            Action::Start => self.start(&mut guard),
            Action::Stop => self.stop(&mut guard),
        };
        self.state = ControllerState::Idle;
        result
    }

    fn start(&mut self, guard: &mut CleanupGuard) -> Result<(), DaemonError> {
        self.state = ControllerState::Starting;
        logging::init(&self.config.logging, self.config.daemonize)?;

        let pidfile = self.config.pidfile();
        if matches!(
            self.registry.status(&pidfile)?,
            PidStatus::Running | PidStatus::NotOwned
        ) {
            tracing::error!("Another server is already running. Check {}", pidfile.display());
            return Err(DaemonError::AnotherInstanceRunning { path: pidfile });
        }

        if self.config.daemonize {
            daemonize(self.config.logging.file.as_deref())?;
        }

        let pid = std::process::id() as i32;
        let record = self
            .registry
            .acquire(&pidfile, self.config.endpoint.port, pid)?;
        guard.claim_pidfile(record.pid);

        let sandbox_root = self.config.sandbox_root();
        create_sandbox_root(&sandbox_root)?;
        guard.claim_sandbox();

        self.state = ControllerState::Running;
        tracing::info!(
            host = %self.config.endpoint.host,
            port = self.config.endpoint.port,
            ssl = self.config.endpoint.use_ssl,
            pid,
            "Starting server"
        );
        self.server.start(&self.config.endpoint, true)?;
        tracing::info!(pid, "server exited");
        Ok(())
    }

    fn stop(&mut self, guard: &mut CleanupGuard) -> Result<(), DaemonError> {
        self.state = ControllerState::Stopping;
        let pidfile = self.config.pidfile();

        match self.registry.status(&pidfile)? {
            PidStatus::Running => {}
            // Not ours to signal; leave the file for its owner.
            PidStatus::NotOwned => {
                tracing::error!("Server not running. Check {}", pidfile.display());
                return Err(DaemonError::NotRunning { path: pidfile });
            }
            PidStatus::Dead => {
                self.registry.check_or_fail(&pidfile)?;
                return Err(DaemonError::NotRunning { path: pidfile });
            }
            PidStatus::Exited => return Err(DaemonError::NotRunning { path: pidfile }),
        }

        logging::init(&self.config.logging, false)?;

        // The owner may have exited since the first probe.
        let pid = self.registry.running_pid(&pidfile)?;
        guard.claim_sandbox();

        tracing::info!(pid, "Stopping server");
        self.registry.probe().terminate(pid)?;
        self.server.stop()?;
        self.registry.remove(&pidfile)?;
        Ok(())
    }
}

#[cfg(unix)]
fn create_sandbox_root(path: &Path) -> Result<(), DaemonError> {
    use std::os::unix::fs::PermissionsExt;

    fs::create_dir_all(path).map_err(|e| io_err(path, e))?;
    fs::set_permissions(path, fs::Permissions::from_mode(0o755)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn create_sandbox_root(path: &Path) -> Result<(), DaemonError> {
    fs::create_dir_all(path).map_err(|e| io_err(path, e))
}
