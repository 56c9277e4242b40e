//! Error types for pantry-core.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading configuration at the process boundary.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure, annotated with the file involved.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// YAML parse error on load; includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// `dirs::home_dir()` returned `None`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,
}

/// A content unit destination that would land outside the sandbox root.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("destination '{dest}' escapes sandbox root {root}")]
pub struct ContentPathError {
    pub root: PathBuf,
    pub dest: String,
}
