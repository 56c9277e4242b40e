//! Error types for pantry-sandbox.

use std::path::PathBuf;

use thiserror::Error;

use pantry_core::{ContentKind, ContentPathError};

/// All errors that can arise from staging and uploading sandboxes.
#[derive(Debug, Error)]
pub enum SandboxError {
    /// An I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// One content unit failed; units staged before it are left in place.
    #[error("failed to stage {kind} content: {source}")]
    ContentUnit {
        kind: ContentKind,
        #[source]
        source: Box<SandboxError>,
    },

    #[error(transparent)]
    ContentPath(#[from] ContentPathError),

    #[error("failed to walk {path}: {source}")]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("template error: {0}")]
    Template(#[from] tera::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("key encoding error: {0}")]
    Key(#[from] ed25519_dalek::pkcs8::Error),

    /// The upload client reported a failure; the message is passed through.
    #[error("upload failed: {0}")]
    Upload(String),
}

/// Convenience constructor for [`SandboxError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SandboxError {
    SandboxError::Io {
        path: path.into(),
        source,
    }
}
