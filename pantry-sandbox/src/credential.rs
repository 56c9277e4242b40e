//! Throwaway signing credentials for talking to the embedded server.

use std::path::{Path, PathBuf};

use ed25519_dalek::pkcs8::spki::der::pem::LineEnding;
use ed25519_dalek::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use ed25519_dalek::SigningKey;
use rand::rngs::OsRng;

use pantry_core::CLIENT_IDENTITY;

use crate::error::{io_err, SandboxError};
use crate::render::ConfigRenderer;
use crate::stage::{stage_bytes, FILE_MODE, PRIVATE_MODE};

pub const CLIENT_KEY_FILE: &str = "client.pem";
pub const UPLOAD_CONFIG_FILE: &str = "config.rb";
pub const VALIDATION_KEY_FILE: &str = "validation.pem";

/// A freshly minted identity, persisted under the sandbox root.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credential {
    pub identity: String,
    pub key_path: PathBuf,
    pub config_path: PathBuf,
}

impl Credential {
    /// Read the private key back from disk.
    pub fn signing_key(&self) -> Result<SigningKey, SandboxError> {
        let pem = std::fs::read_to_string(&self.key_path).map_err(|e| io_err(&self.key_path, e))?;
        Ok(SigningKey::from_pkcs8_pem(&pem)?)
    }
}

/// Generate a new key and return it as PKCS#8 PEM.
pub fn generate_key_pem() -> Result<String, SandboxError> {
    let key = SigningKey::generate(&mut OsRng);
    Ok(key.to_pkcs8_pem(LineEnding::LF)?.to_string())
}

/// Write a fresh, otherwise unused validation key into `dir`.
pub fn write_validation_key(dir: &Path) -> Result<PathBuf, SandboxError> {
    let path = dir.join(VALIDATION_KEY_FILE);
    stage_bytes(&path, generate_key_pem()?.as_bytes(), PRIVATE_MODE)?;
    Ok(path)
}

/// Mints credentials into one sandbox root.
pub struct CredentialMinter<'a> {
    root: &'a Path,
    renderer: ConfigRenderer,
}

impl<'a> CredentialMinter<'a> {
    pub fn new(root: &'a Path) -> Result<Self, SandboxError> {
        Ok(Self {
            root,
            renderer: ConfigRenderer::new()?,
        })
    }

    /// New key plus an upload config document targeting `server_url`.
    ///
    /// Every call replaces the previous key; nothing is reused across runs.
    pub fn mint(&self, server_url: &str) -> Result<Credential, SandboxError> {
        let key_path = self.root.join(CLIENT_KEY_FILE);
        stage_bytes(&key_path, generate_key_pem()?.as_bytes(), PRIVATE_MODE)?;

        let config_path = self.root.join(UPLOAD_CONFIG_FILE);
        let document = self.renderer.upload_config(self.root, server_url)?;
        stage_bytes(&config_path, document.as_bytes(), FILE_MODE)?;

        tracing::debug!(key = %key_path.display(), "minted upload credential");
        Ok(Credential {
            identity: CLIENT_IDENTITY.to_string(),
            key_path,
            config_path,
        })
    }
}
