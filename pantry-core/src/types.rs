//! Domain types shared by the daemon, server and sandbox crates.
//!
//! All path fields use `PathBuf`; never `&str` or `String` for filesystem paths.

use std::fmt;
use std::net::IpAddr;
use std::path::{Component, Path, PathBuf};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::ContentPathError;

// ---------------------------------------------------------------------------
// Pid record
// ---------------------------------------------------------------------------

/// One live-instance claim for a port, as written to its pidfile.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PidRecord {
    pub port: u16,
    pub pid: i32,
    pub path: PathBuf,
}

// ---------------------------------------------------------------------------
// Server endpoint
// ---------------------------------------------------------------------------

/// Where the embedded server listens. Fixed once the server starts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerEndpoint {
    pub host: IpAddr,
    pub port: u16,
    pub use_ssl: bool,
}

impl ServerEndpoint {
    pub fn new(host: IpAddr, port: u16, use_ssl: bool) -> Self {
        Self {
            host,
            port,
            use_ssl,
        }
    }

    /// Base URL the upload client and the remote agent talk to.
    pub fn url(&self) -> String {
        let scheme = if self.use_ssl { "https" } else { "http" };
        match self.host {
            IpAddr::V6(v6) => format!("{scheme}://[{v6}]:{}", self.port),
            IpAddr::V4(v4) => format!("{scheme}://{v4}:{}", self.port),
        }
    }
}

// ---------------------------------------------------------------------------
// Content units
// ---------------------------------------------------------------------------

/// The kinds of content a sandbox can stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentKind {
    Data,
    Secret,
    DataBag,
    Environment,
    Node,
    Role,
    Client,
    Cookbook,
}

impl ContentKind {
    /// Directory name a directory-shaped unit of this kind is staged under.
    pub fn dir_name(self) -> &'static str {
        match self {
            ContentKind::Data => "data",
            ContentKind::Secret => "secret",
            ContentKind::DataBag => "data_bags",
            ContentKind::Environment => "environments",
            ContentKind::Node => "nodes",
            ContentKind::Role => "roles",
            ContentKind::Client => "clients",
            ContentKind::Cookbook => "cookbooks",
        }
    }

    /// Kinds staged into the server sandbox, in staging order.
    pub fn server_kinds() -> &'static [ContentKind] {
        &[
            ContentKind::Cookbook,
            ContentKind::DataBag,
            ContentKind::Environment,
            ContentKind::Node,
            ContentKind::Role,
            ContentKind::Client,
        ]
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.dir_name())
    }
}

/// Whether a unit copies a whole tree or exactly one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnitShape {
    Directory,
    File,
}

/// One named piece of content copied into a sandbox root.
///
/// Construct through [`ContentUnit::directory`] or [`ContentUnit::file`]; both
/// reject destinations that would resolve outside `root`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContentUnit {
    pub kind: ContentKind,
    pub shape: UnitShape,
    pub source_path: PathBuf,
    pub dest_name: String,
    pub dest_path: PathBuf,
}

impl ContentUnit {
    /// A tree copy staged at `<root>/<kind dir name>`.
    pub fn directory(
        kind: ContentKind,
        source_path: impl Into<PathBuf>,
        root: &Path,
    ) -> Result<Self, ContentPathError> {
        Self::build(kind, UnitShape::Directory, source_path.into(), root, kind.dir_name())
    }

    /// A single file staged at `<root>/<dest_name>`.
    pub fn file(
        kind: ContentKind,
        source_path: impl Into<PathBuf>,
        root: &Path,
        dest_name: &str,
    ) -> Result<Self, ContentPathError> {
        Self::build(kind, UnitShape::File, source_path.into(), root, dest_name)
    }

    fn build(
        kind: ContentKind,
        shape: UnitShape,
        source_path: PathBuf,
        root: &Path,
        dest_name: &str,
    ) -> Result<Self, ContentPathError> {
        let dest_path = confine(root, dest_name)?;
        Ok(Self {
            kind,
            shape,
            source_path,
            dest_name: dest_name.to_string(),
            dest_path,
        })
    }
}

/// Join `rel` onto `root`, refusing anything but plain relative components.
pub fn confine(root: &Path, rel: &str) -> Result<PathBuf, ContentPathError> {
    let rel_path = Path::new(rel);
    let escapes = rel_path.components().next().is_none()
        || rel_path
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
    if escapes {
        return Err(ContentPathError {
            root: root.to_path_buf(),
            dest: rel.to_string(),
        });
    }
    Ok(root.join(rel_path))
}

// ---------------------------------------------------------------------------
// Exit outcomes
// ---------------------------------------------------------------------------

/// Terminal result of one `start`/`stop` invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitOutcome {
    Success,
    GenericError,
    AlreadyRunning,
    NotRunning,
    UnsupportedAction,
}

impl ExitOutcome {
    /// Process exit status for this outcome.
    pub fn code(self) -> u8 {
        match self {
            ExitOutcome::Success => 0,
            ExitOutcome::GenericError => 1,
            ExitOutcome::AlreadyRunning => 2,
            ExitOutcome::NotRunning => 3,
            ExitOutcome::UnsupportedAction => 4,
        }
    }

    pub fn message(self) -> &'static str {
        match self {
            ExitOutcome::Success => "OK",
            ExitOutcome::GenericError => "A generic error was encountered",
            ExitOutcome::AlreadyRunning => "Server already running",
            ExitOutcome::NotRunning => "Server not running",
            ExitOutcome::UnsupportedAction => "Unsupported action",
        }
    }
}

impl fmt::Display for ExitOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.message())
    }
}

// ---------------------------------------------------------------------------
// Log level
// ---------------------------------------------------------------------------

/// Operator-facing log level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Debug,
    #[default]
    Info,
    Warn,
    Error,
    Fatal,
}

impl LogLevel {
    /// Directive understood by `tracing_subscriber::EnvFilter`.
    ///
    /// `tracing` has no level above ERROR, so `fatal` shares it.
    pub fn filter_directive(self) -> &'static str {
        match self {
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error | LogLevel::Fatal => "error",
        }
    }
}

impl fmt::Display for LogLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LogLevel::Debug => write!(f, "debug"),
            LogLevel::Info => write!(f, "info"),
            LogLevel::Warn => write!(f, "warn"),
            LogLevel::Error => write!(f, "error"),
            LogLevel::Fatal => write!(f, "fatal"),
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "debug" => Ok(LogLevel::Debug),
            "info" => Ok(LogLevel::Info),
            "warn" => Ok(LogLevel::Warn),
            "error" => Ok(LogLevel::Error),
            "fatal" => Ok(LogLevel::Fatal),
            other => Err(format!(
                "unknown log level '{other}'; expected: debug, info, warn, error, fatal"
            )),
        }
    }
}
