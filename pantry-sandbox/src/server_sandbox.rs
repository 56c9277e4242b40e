//! The shared per-port tree uploaded to the server.

use std::fs;
use std::path::{Path, PathBuf};

use pantry_core::{ContentKind, ContentUnit, ProvisionConfig};

use crate::credential::CredentialMinter;
use crate::error::{io_err, SandboxError};
use crate::stage::{ensure_dir, prepare, UnitReport};
use crate::upload::{UploadClient, UploadSettings, UploadSummary, WorkingDirGuard};

pub struct ServerSandbox<'a> {
    config: &'a ProvisionConfig,
    root: PathBuf,
}

impl<'a> ServerSandbox<'a> {
    pub fn new(config: &'a ProvisionConfig, root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Create the root, then stage each server content kind in order.
    ///
    /// Stops at the first failing unit; the error names its kind and earlier
    /// units stay staged.
    pub fn populate(&self) -> Result<Vec<UnitReport>, SandboxError> {
        ensure_dir(&self.root)?;
        let mut reports = Vec::with_capacity(ContentKind::server_kinds().len());
        for &kind in ContentKind::server_kinds() {
            let Some(source) = self.source_for(kind) else {
                continue;
            };
            let unit = ContentUnit::directory(kind, source, &self.root)?;
            let report = prepare(&unit)?;
            tracing::debug!(kind = %kind, written = report.written(), "server sandbox unit");
            reports.push(report);
        }
        Ok(reports)
    }

    /// Mint a credential and push everything staged to `server_url`.
    ///
    /// Runs with the sandbox root as the working directory; the previous one
    /// is restored whether or not the upload succeeds.
    pub fn upload(
        &self,
        server_url: &str,
        client: &mut dyn UploadClient,
    ) -> Result<UploadSummary, SandboxError> {
        // Absolute, so paths stay valid after the directory change.
        let root = fs::canonicalize(&self.root).map_err(|e| io_err(&self.root, e))?;
        let _cwd = WorkingDirGuard::enter(&root)?;

        let credential = CredentialMinter::new(&root)?.mint(server_url)?;
        client.configure(UploadSettings::from_credential(&credential, server_url, &root))?;
        client.upload_all()
    }

    fn source_for(&self, kind: ContentKind) -> Option<&PathBuf> {
        match kind {
            ContentKind::Cookbook => self.config.cookbooks_path.as_ref(),
            ContentKind::DataBag => self.config.data_bags_path.as_ref(),
            ContentKind::Environment => self.config.environments_path.as_ref(),
            ContentKind::Node => self.config.nodes_path.as_ref(),
            ContentKind::Role => self.config.roles_path.as_ref(),
            ContentKind::Client => self.config.clients_path.as_ref(),
            ContentKind::Data | ContentKind::Secret => None,
        }
    }
}
