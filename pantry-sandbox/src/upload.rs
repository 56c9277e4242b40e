//! Pushing a staged server sandbox to a running server.
//!
//! The [`UploadClient`] trait is the seam between the sandbox and the wire;
//! [`HttpUploadClient`] is the real implementation. Each file under a content
//! directory becomes one signed `PUT /<kind dir>/<relative path>`.

use std::env;
use std::path::{Path, PathBuf};

use ed25519_dalek::pkcs8::DecodePrivateKey;
use ed25519_dalek::{Signer, SigningKey};
use walkdir::WalkDir;

use pantry_core::auth::{
    canonical_request, content_hash, HEADER_CONTENT_HASH, HEADER_PUBLIC_KEY, HEADER_SIGNATURE,
    HEADER_USER_ID,
};
use pantry_core::ContentKind;

use crate::credential::Credential;
use crate::error::{io_err, SandboxError};

/// What a client needs to know before [`UploadClient::upload_all`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSettings {
    pub identity: String,
    pub key_path: PathBuf,
    pub server_url: String,
    pub root: PathBuf,
    pub config_path: PathBuf,
}

impl UploadSettings {
    pub fn from_credential(credential: &Credential, server_url: &str, root: &Path) -> Self {
        Self {
            identity: credential.identity.clone(),
            key_path: credential.key_path.clone(),
            server_url: server_url.trim_end_matches('/').to_string(),
            root: root.to_path_buf(),
            config_path: credential.config_path.clone(),
        }
    }
}

/// Paths uploaded, in upload order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UploadSummary {
    pub uploaded: Vec<String>,
}

pub trait UploadClient {
    fn configure(&mut self, settings: UploadSettings) -> Result<(), SandboxError>;

    /// Upload everything staged. Synchronous; a failure part way leaves the
    /// server with whatever was already sent.
    fn upload_all(&mut self) -> Result<UploadSummary, SandboxError>;
}

// ---------------------------------------------------------------------------
// HTTP client
// ---------------------------------------------------------------------------

pub struct HttpUploadClient {
    agent: ureq::Agent,
    settings: Option<(UploadSettings, SigningKey)>,
}

impl Default for HttpUploadClient {
    fn default() -> Self {
        Self::new()
    }
}

impl HttpUploadClient {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
            settings: None,
        }
    }

    fn put(
        &self,
        settings: &UploadSettings,
        key: &SigningKey,
        path: &str,
        body: &[u8],
    ) -> Result<(), SandboxError> {
        let hash = content_hash(body);
        let signature = key.sign(canonical_request("PUT", path, &hash).as_bytes());
        let url = request_url(&settings.server_url, path);

        self.agent
            .put(&url)
            .set(HEADER_USER_ID, &settings.identity)
            .set(HEADER_CONTENT_HASH, &hash)
            .set(HEADER_PUBLIC_KEY, &hex::encode(key.verifying_key().to_bytes()))
            .set(HEADER_SIGNATURE, &hex::encode(signature.to_bytes()))
            .send_bytes(body)
            .map_err(|e| match e {
                ureq::Error::Status(code, resp) => {
                    let detail = resp.into_string().unwrap_or_default();
                    SandboxError::Upload(format!("PUT {path} returned {code}: {detail}"))
                }
                ureq::Error::Transport(t) => SandboxError::Upload(format!("PUT {path}: {t}")),
            })?;
        Ok(())
    }
}

impl UploadClient for HttpUploadClient {
    fn configure(&mut self, settings: UploadSettings) -> Result<(), SandboxError> {
        let pem = std::fs::read_to_string(&settings.key_path)
            .map_err(|e| io_err(&settings.key_path, e))?;
        let key = SigningKey::from_pkcs8_pem(&pem)?;
        self.settings = Some((settings, key));
        Ok(())
    }

    fn upload_all(&mut self) -> Result<UploadSummary, SandboxError> {
        let (settings, key) = self
            .settings
            .as_ref()
            .ok_or_else(|| SandboxError::Upload("upload client not configured".to_string()))?;

        let mut summary = UploadSummary::default();
        for kind in ContentKind::server_kinds() {
            let dir = settings.root.join(kind.dir_name());
            if !dir.is_dir() {
                continue;
            }
            for entry in WalkDir::new(&dir).sort_by_file_name() {
                let entry = entry.map_err(|e| SandboxError::Walk {
                    path: dir.clone(),
                    source: e,
                })?;
                if !entry.file_type().is_file() {
                    continue;
                }
                let Ok(rel) = entry.path().strip_prefix(&settings.root) else {
                    continue;
                };
                let remote = format!(
                    "/{}",
                    rel.components()
                        .map(|c| c.as_os_str().to_string_lossy())
                        .collect::<Vec<_>>()
                        .join("/")
                );
                let body = std::fs::read(entry.path()).map_err(|e| io_err(entry.path(), e))?;
                self.put(settings, key, &remote, &body)?;
                tracing::debug!(path = %remote, bytes = body.len(), "uploaded");
                summary.uploaded.push(remote);
            }
        }
        tracing::info!(
            files = summary.uploaded.len(),
            server = %settings.server_url,
            "upload complete"
        );
        Ok(summary)
    }
}

/// `path` is signed as-is; the server verifies against the decoded path, so
/// every segment is percent-encoded on the wire.
fn request_url(server_url: &str, path: &str) -> String {
    let encoded: Vec<_> = path.split('/').map(urlencoding::encode).collect();
    format!("{server_url}{}", encoded.join("/"))
}

// ---------------------------------------------------------------------------
// Working directory scope
// ---------------------------------------------------------------------------

/// Changes the process working directory and restores it when dropped,
/// including on early return and unwind.
#[derive(Debug)]
pub struct WorkingDirGuard {
    previous: PathBuf,
}

impl WorkingDirGuard {
    pub fn enter(dir: &Path) -> Result<Self, SandboxError> {
        let previous = env::current_dir().map_err(|e| io_err(dir, e))?;
        env::set_current_dir(dir).map_err(|e| io_err(dir, e))?;
        Ok(Self { previous })
    }

    pub fn previous(&self) -> &Path {
        &self.previous
    }
}

impl Drop for WorkingDirGuard {
    fn drop(&mut self) {
        if let Err(e) = env::set_current_dir(&self.previous) {
            tracing::warn!(
                "failed to restore working directory {}: {e}",
                self.previous.display()
            );
        }
    }
}
