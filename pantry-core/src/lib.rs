//! Pantry core library: shared domain types and configuration.
//!
//! Public API surface:
//! - [`types`]: pid records, endpoints, content units, exit outcomes
//! - [`paths`]: per-port pidfile and sandbox root locations
//! - [`config`]: daemon and provisioning configuration
//! - [`error`]: [`ConfigError`], [`ContentPathError`]

pub mod auth;
pub mod config;
pub mod error;
pub mod net;
pub mod paths;
pub mod types;

pub use config::{LogSettings, PantryConfig, ProvisionConfig};
pub use error::{ConfigError, ContentPathError};
pub use types::{
    ContentKind, ContentUnit, ExitOutcome, LogLevel, PidRecord, ServerEndpoint, UnitShape,
};

/// Port the embedded server listens on when none is configured.
pub const DEFAULT_PORT: u16 = 12358;

/// Identity the upload client and the agent under test present to the server.
pub const CLIENT_IDENTITY: &str = "pantry";
