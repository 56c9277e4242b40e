//! One provisioning step for a test instance: stage both sandboxes, write the
//! agent's key and config, push content to the server, and build the command
//! the agent runs with.

use std::path::{Path, PathBuf};

use serde_json::Value;

use pantry_core::{net, paths, ContentKind, ProvisionConfig, ServerEndpoint};

use crate::credential::{write_validation_key, CLIENT_KEY_FILE, VALIDATION_KEY_FILE};
use crate::error::SandboxError;
use crate::instance::{InstanceReport, InstanceSandbox, ATTRIBUTES_FILE, CACHE_DIR, SECRET_FILE};
use crate::render::{ConfigRenderer, Settings};
use crate::server_sandbox::ServerSandbox;
use crate::stage::{stage_bytes, StageResult, UnitReport, FILE_MODE};
use crate::upload::{UploadClient, UploadSummary};

pub const CLIENT_CONFIG_FILE: &str = "client.rb";
const DEFAULT_CHEF_CLIENT: &str = "chef-client";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvisionReport {
    pub instance: InstanceReport,
    pub server: Vec<UnitReport>,
    pub validation_key: PathBuf,
    pub client_config: StageResult,
    pub upload: UploadSummary,
}

pub struct Provisioner {
    config: ProvisionConfig,
    home: PathBuf,
    instance_root: PathBuf,
    endpoint: ServerEndpoint,
}

impl Provisioner {
    /// `instance_root` is the local directory later transferred to the instance.
    pub fn new(config: ProvisionConfig, home: PathBuf, instance_root: PathBuf) -> Self {
        let host = config.pantry_host.unwrap_or_else(net::default_host);
        let endpoint = ServerEndpoint::new(host, config.pantry_port, false);
        Self {
            config,
            home,
            instance_root,
            endpoint,
        }
    }

    pub fn config(&self) -> &ProvisionConfig {
        &self.config
    }

    pub fn server_url(&self) -> String {
        self.endpoint.url()
    }

    /// The per-port server sandbox shared with the running daemon.
    pub fn shared_sandbox_path(&self) -> PathBuf {
        paths::sandbox_root(&self.home, self.config.pantry_port)
    }

    pub fn instance_root(&self) -> &Path {
        &self.instance_root
    }

    pub fn create_sandbox(
        &self,
        client: &mut dyn UploadClient,
    ) -> Result<ProvisionReport, SandboxError> {
        tracing::info!("preparing files for transfer");
        let instance = InstanceSandbox::new(&self.config, &self.instance_root).populate()?;

        let shared = self.shared_sandbox_path();
        tracing::debug!("creating server sandbox in {}", shared.display());
        let server_sandbox = ServerSandbox::new(&self.config, &shared);
        let server = server_sandbox.populate()?;

        tracing::info!("preparing {VALIDATION_KEY_FILE}");
        let validation_key = write_validation_key(&self.instance_root)?;

        tracing::info!("preparing {CLIENT_CONFIG_FILE}");
        let client_config = self.write_client_config()?;

        let url = self.server_url();
        tracing::debug!("uploading server sandbox in {} to {url}", shared.display());
        let upload = server_sandbox.upload(&url, client)?;

        Ok(ProvisionReport {
            instance,
            server,
            validation_key,
            client_config,
            upload,
        })
    }

    /// Shell command that runs the agent on the instance.
    pub fn run_command(&self) -> String {
        let base = self
            .config
            .chef_client_path
            .as_deref()
            .unwrap_or(DEFAULT_CHEF_CLIENT);

        let mut parts = Vec::new();
        if self.config.sudo {
            parts.push("sudo -E".to_string());
        }
        parts.push(base.to_string());
        parts.push(format!("--config {}", self.remote_path(CLIENT_CONFIG_FILE)));
        parts.push(format!("--log_level {}", self.config.log_level));
        parts.push("--no-color".to_string());
        if self.config.json_attributes {
            parts.push(format!(
                "--json-attributes {}",
                self.remote_path(ATTRIBUTES_FILE)
            ));
        }
        if let Some(log_file) = &self.config.log_file {
            parts.push(format!("--logfile {log_file}"));
        }
        parts.push(format!("--server {}", self.server_url()));
        if self.config.profile_ruby {
            parts.push("--profile-ruby".to_string());
        }
        parts.join(" ")
    }

    /// Default agent settings for the remote root, with `client_rb` overrides on top.
    pub fn client_settings(&self) -> Settings {
        let mut s = Settings::new();
        s.set("node_name", self.config.instance_name.as_str())
            .set("checksum_path", self.remote_path("checksums"))
            .set("file_cache_path", self.remote_path(CACHE_DIR))
            .set("file_backup_path", self.remote_path("backup"))
            .set(
                "cookbook_path",
                Value::Array(vec![
                    Value::String(self.remote_path(ContentKind::Cookbook.dir_name())),
                    Value::String(self.remote_path("site-cookbooks")),
                ]),
            )
            .set(
                "data_bag_path",
                self.remote_path(ContentKind::DataBag.dir_name()),
            )
            .set(
                "environment_path",
                self.remote_path(ContentKind::Environment.dir_name()),
            )
            .set("node_path", self.remote_path(ContentKind::Node.dir_name()))
            .set("role_path", self.remote_path(ContentKind::Role.dir_name()))
            .set("client_path", self.remote_path(ContentKind::Client.dir_name()))
            .set("user_path", self.remote_path("users"))
            .set("validation_key", self.remote_path(VALIDATION_KEY_FILE))
            .set("client_key", self.remote_path(CLIENT_KEY_FILE))
            .set("chef_server_url", self.server_url())
            .set("encrypted_data_bag_secret", self.remote_path(SECRET_FILE));
        s.merge(&self.config.client_rb);
        s
    }

    fn write_client_config(&self) -> Result<StageResult, SandboxError> {
        let document =
            ConfigRenderer::new()?.client_config(&self.config.instance_name, &self.client_settings())?;
        stage_bytes(
            &self.instance_root.join(CLIENT_CONFIG_FILE),
            document.as_bytes(),
            FILE_MODE,
        )
    }

    /// Instance paths are always POSIX, whatever the local platform.
    fn remote_path(&self, name: &str) -> String {
        format!("{}/{}", self.config.root_path.trim_end_matches('/'), name)
    }
}
