//! Files consumed by the agent on the instance under test.

use std::path::{Path, PathBuf};

use serde_json::Value;

use pantry_core::{ContentKind, ContentUnit, ProvisionConfig};

use crate::error::SandboxError;
use crate::stage::{ensure_dir, prepare, stage_bytes, StageResult, UnitReport, FILE_MODE};

pub const ATTRIBUTES_FILE: &str = "dna.json";
pub const CACHE_DIR: &str = "cache";
pub const SECRET_FILE: &str = "encrypted_data_bag_secret";

/// What [`InstanceSandbox::populate`] did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceReport {
    /// `None` when attribute rendering is disabled.
    pub attributes: Option<StageResult>,
    pub units: Vec<UnitReport>,
}

pub struct InstanceSandbox<'a> {
    config: &'a ProvisionConfig,
    root: PathBuf,
}

impl<'a> InstanceSandbox<'a> {
    pub fn new(config: &'a ProvisionConfig, root: impl Into<PathBuf>) -> Self {
        Self {
            config,
            root: root.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stage the attributes document, cache dir, `data` tree and optional secret.
    pub fn populate(&self) -> Result<InstanceReport, SandboxError> {
        ensure_dir(&self.root)?;

        let attributes = if self.config.json_attributes {
            Some(self.write_attributes()?)
        } else {
            None
        };
        ensure_dir(&self.root.join(CACHE_DIR))?;

        let mut units = Vec::new();
        for unit in self.units()? {
            units.push(prepare(&unit)?);
        }
        Ok(InstanceReport { attributes, units })
    }

    fn units(&self) -> Result<Vec<ContentUnit>, SandboxError> {
        let mut units = Vec::new();
        if let Some(data) = &self.config.data_path {
            units.push(ContentUnit::directory(ContentKind::Data, data, &self.root)?);
        }
        // No secret configured means no secret file, not an error.
        if let Some(secret) = &self.config.encrypted_data_bag_secret_key_path {
            units.push(ContentUnit::file(
                ContentKind::Secret,
                secret,
                &self.root,
                SECRET_FILE,
            )?);
        }
        Ok(units)
    }

    fn write_attributes(&self) -> Result<StageResult, SandboxError> {
        let mut document = self.config.attributes.clone();
        document.insert(
            "run_list".to_string(),
            Value::Array(
                self.config
                    .run_list
                    .iter()
                    .cloned()
                    .map(Value::String)
                    .collect(),
            ),
        );
        let body = serde_json::to_vec_pretty(&Value::Object(document))?;
        stage_bytes(&self.root.join(ATTRIBUTES_FILE), &body, FILE_MODE)
    }
}
