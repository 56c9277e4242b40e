//! Daemon lifecycle for the pantry server: one instance per port.
//!
//! [`DaemonController`] drives `start`/`stop`; [`PidRegistry`] enforces the
//! single-instance invariant through an exclusively-created pidfile and a
//! signal-0 liveness probe.

pub mod cleanup;
pub mod controller;
pub mod daemonize;
mod error;
pub mod logging;
pub mod pidfile;

pub use cleanup::CleanupGuard;
pub use controller::{Action, ControllerState, DaemonController};
pub use daemonize::daemonize;
pub use error::DaemonError;
pub use pidfile::{Liveness, PidRegistry, PidStatus, ProcessProbe, SignalProbe, MAX_WRITE_ATTEMPTS};
