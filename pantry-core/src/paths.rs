//! Per-port on-disk layout.
//!
//! ```text
//! ~/.kitchen/
//!   pantry-<port>.pid     (pidfile, one per port)
//!   pantry_<port>/        (server sandbox root, one per port)
//! ```
//!
//! Both are keyed by port, never by process id: the invariant is one server
//! instance per port.

use std::path::{Path, PathBuf};

/// Directory name used for the server-upload sandbox root.
pub const SANDBOX_PREFIX: &str = "pantry_";

/// `<home>/.kitchen`
pub fn kitchen_root(home: &Path) -> PathBuf {
    home.join(".kitchen")
}

/// `<home>/.kitchen/pantry-<port>.pid`
pub fn pidfile_path(home: &Path, port: u16) -> PathBuf {
    kitchen_root(home).join(format!("pantry-{port}.pid"))
}

/// `<home>/.kitchen/pantry_<port>`
pub fn sandbox_root(home: &Path, port: u16) -> PathBuf {
    kitchen_root(home).join(format!("{SANDBOX_PREFIX}{port}"))
}
