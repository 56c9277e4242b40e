//! Configuration structs, built once at the process boundary.
//!
//! [`PantryConfig`] drives the daemon (`pantry start|stop`); [`ProvisionConfig`]
//! describes where sandbox content comes from and how the agent under test is
//! invoked. Components receive these structs in their constructors and never
//! read the process environment themselves.

use std::collections::BTreeMap;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::paths;
use crate::types::{LogLevel, ServerEndpoint};
use crate::DEFAULT_PORT;

// ---------------------------------------------------------------------------
// Daemon configuration
// ---------------------------------------------------------------------------

/// Where log output goes and at what level.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogSettings {
    pub level: LogLevel,
    pub file: Option<PathBuf>,
}

impl LogSettings {
    /// Anchor a relative log file at `base`.
    ///
    /// The daemonized process changes directory to `/`, so the path must not
    /// depend on the working directory.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        if let Some(file) = self.file.as_mut() {
            if file.is_relative() {
                *file = base.join(&*file);
            }
        }
    }
}

/// Everything one `start`/`stop` invocation needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PantryConfig {
    pub home: PathBuf,
    pub endpoint: ServerEndpoint,
    pub daemonize: bool,
    pub logging: LogSettings,
}

impl PantryConfig {
    pub fn pidfile(&self) -> PathBuf {
        paths::pidfile_path(&self.home, self.endpoint.port)
    }

    pub fn sandbox_root(&self) -> PathBuf {
        paths::sandbox_root(&self.home, self.endpoint.port)
    }
}

/// The single read of the caller's home directory.
pub fn home_dir() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

// ---------------------------------------------------------------------------
// Provisioning configuration
// ---------------------------------------------------------------------------

/// Content sources plus agent invocation settings, loaded from YAML.
///
/// Relative source paths are resolved against the directory holding the
/// config file. Sources that do not exist are skipped when staging.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProvisionConfig {
    pub cookbooks_path: Option<PathBuf>,
    pub data_path: Option<PathBuf>,
    pub data_bags_path: Option<PathBuf>,
    pub environments_path: Option<PathBuf>,
    pub nodes_path: Option<PathBuf>,
    pub roles_path: Option<PathBuf>,
    pub clients_path: Option<PathBuf>,
    pub encrypted_data_bag_secret_key_path: Option<PathBuf>,

    pub run_list: Vec<String>,
    pub attributes: serde_json::Map<String, serde_json::Value>,
    pub json_attributes: bool,

    /// Defaults to the first private IPv4 address on this host.
    pub pantry_host: Option<IpAddr>,
    pub pantry_port: u16,

    /// Node name the agent under test registers as.
    pub instance_name: String,
    /// Sandbox location on the remote instance.
    pub root_path: String,
    pub chef_client_path: Option<String>,
    pub sudo: bool,
    pub log_level: LogLevel,
    pub log_file: Option<String>,
    pub profile_ruby: bool,
    /// Extra settings merged over the generated agent `client.rb`.
    pub client_rb: BTreeMap<String, serde_json::Value>,
}

impl Default for ProvisionConfig {
    fn default() -> Self {
        Self {
            cookbooks_path: Some(PathBuf::from("cookbooks")),
            data_path: Some(PathBuf::from("data")),
            data_bags_path: Some(PathBuf::from("data_bags")),
            environments_path: Some(PathBuf::from("environments")),
            nodes_path: Some(PathBuf::from("nodes")),
            roles_path: Some(PathBuf::from("roles")),
            clients_path: Some(PathBuf::from("clients")),
            encrypted_data_bag_secret_key_path: None,
            run_list: Vec::new(),
            attributes: serde_json::Map::new(),
            json_attributes: true,
            pantry_host: None,
            pantry_port: DEFAULT_PORT,
            instance_name: "default".to_string(),
            root_path: "/tmp/kitchen".to_string(),
            chef_client_path: None,
            sudo: true,
            log_level: LogLevel::Info,
            log_file: None,
            profile_ruby: false,
            client_rb: BTreeMap::new(),
        }
    }
}

impl ProvisionConfig {
    /// Load from `path`, resolving relative content paths against its directory.
    ///
    /// Returns `ConfigError::Parse` (with path + line context) if malformed YAML.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut config: ProvisionConfig =
            serde_yaml::from_str(&contents).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        config.resolve_relative_to(base);
        Ok(config)
    }

    /// Make every configured source path absolute with respect to `base`.
    pub fn resolve_relative_to(&mut self, base: &Path) {
        for slot in [
            &mut self.cookbooks_path,
            &mut self.data_path,
            &mut self.data_bags_path,
            &mut self.environments_path,
            &mut self.nodes_path,
            &mut self.roles_path,
            &mut self.clients_path,
            &mut self.encrypted_data_bag_secret_key_path,
        ] {
            if let Some(p) = slot.as_mut() {
                if p.is_relative() {
                    *p = base.join(&*p);
                }
            }
        }
    }
}
