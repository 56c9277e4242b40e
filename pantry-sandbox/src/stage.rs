//! Copy engine shared by both sandbox variants.
//!
//! ## `stage_bytes`: hash-gated write
//!
//! 1. SHA-256 the new content.
//! 2. Hash whatever is already at the destination.
//! 3. Identical → skip (mtime untouched).
//! 4. Write to `<path>.pantry.tmp`, set mode.
//! 5. Rename to final path (atomic on POSIX).

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use walkdir::WalkDir;

use pantry_core::{ContentKind, ContentUnit, UnitShape};

use crate::error::{io_err, SandboxError};

pub const DIR_MODE: u32 = 0o755;
pub const FILE_MODE: u32 = 0o644;
pub const PRIVATE_MODE: u32 = 0o600;

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Outcome of staging an individual file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StageResult {
    /// File was written (content changed or did not previously exist).
    Written { path: PathBuf },
    /// Destination already held identical bytes.
    Unchanged { path: PathBuf },
}

impl StageResult {
    pub fn path(&self) -> &Path {
        match self {
            StageResult::Written { path } | StageResult::Unchanged { path } => path,
        }
    }
}

/// Outcome of staging one content unit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UnitReport {
    Staged {
        kind: ContentKind,
        files: Vec<StageResult>,
    },
    /// Optional source absent; nothing staged.
    Skipped { kind: ContentKind, source: PathBuf },
}

impl UnitReport {
    pub fn kind(&self) -> ContentKind {
        match self {
            UnitReport::Staged { kind, .. } | UnitReport::Skipped { kind, .. } => *kind,
        }
    }

    pub fn written(&self) -> usize {
        match self {
            UnitReport::Staged { files, .. } => files
                .iter()
                .filter(|f| matches!(f, StageResult::Written { .. }))
                .count(),
            UnitReport::Skipped { .. } => 0,
        }
    }
}

// ---------------------------------------------------------------------------
// prepare
// ---------------------------------------------------------------------------

/// Stage one content unit into its destination.
///
/// A missing source is not an error; it yields [`UnitReport::Skipped`]. Any
/// other failure is wrapped as [`SandboxError::ContentUnit`] naming the kind.
pub fn prepare(unit: &ContentUnit) -> Result<UnitReport, SandboxError> {
    if !unit.source_path.exists() {
        tracing::debug!(
            kind = %unit.kind,
            "source {} absent, skipping",
            unit.source_path.display()
        );
        return Ok(UnitReport::Skipped {
            kind: unit.kind,
            source: unit.source_path.clone(),
        });
    }

    let staged = match unit.shape {
        UnitShape::Directory => copy_tree(&unit.source_path, &unit.dest_path),
        UnitShape::File => {
            let mode = if unit.kind == ContentKind::Secret {
                PRIVATE_MODE
            } else {
                FILE_MODE
            };
            stage_file(&unit.source_path, &unit.dest_path, mode).map(|r| vec![r])
        }
    };

    match staged {
        Ok(files) => {
            tracing::debug!(kind = %unit.kind, files = files.len(), "staged content unit");
            Ok(UnitReport::Staged {
                kind: unit.kind,
                files,
            })
        }
        Err(source) => Err(SandboxError::ContentUnit {
            kind: unit.kind,
            source: Box::new(source),
        }),
    }
}

fn copy_tree(source: &Path, dest: &Path) -> Result<Vec<StageResult>, SandboxError> {
    let mut results = Vec::new();
    for entry in WalkDir::new(source).follow_links(true).sort_by_file_name() {
        let entry = entry.map_err(|e| SandboxError::Walk {
            path: source.to_path_buf(),
            source: e,
        })?;
        // WalkDir yields paths under `source`; the prefix always strips.
        let Ok(rel) = entry.path().strip_prefix(source) else {
            continue;
        };
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            ensure_dir(&target)?;
        } else {
            results.push(stage_file(entry.path(), &target, FILE_MODE)?);
        }
    }
    Ok(results)
}

// ---------------------------------------------------------------------------
// Primitive writes
// ---------------------------------------------------------------------------

/// Create `path` (and parents) with [`DIR_MODE`].
pub fn ensure_dir(path: &Path) -> Result<(), SandboxError> {
    fs::create_dir_all(path).map_err(|e| io_err(path, e))?;
    set_mode(path, DIR_MODE)
}

/// Copy one file through [`stage_bytes`].
pub fn stage_file(source: &Path, dest: &Path, mode: u32) -> Result<StageResult, SandboxError> {
    let bytes = fs::read(source).map_err(|e| io_err(source, e))?;
    stage_bytes(dest, &bytes, mode)
}

/// Hash-gated atomic write of `content` to `path`.
pub fn stage_bytes(path: &Path, content: &[u8], mode: u32) -> Result<StageResult, SandboxError> {
    let tmp = PathBuf::from(format!("{}.pantry.tmp", path.display()));
    stage_bytes_with_tmp(path, content, mode, &tmp)
}

fn stage_bytes_with_tmp(
    path: &Path,
    content: &[u8],
    mode: u32,
    tmp: &Path,
) -> Result<StageResult, SandboxError> {
    match fs::read(path) {
        Ok(existing) if digest(&existing) == digest(content) => {
            tracing::trace!("unchanged: {}", path.display());
            return Ok(StageResult::Unchanged {
                path: path.to_path_buf(),
            });
        }
        Ok(_) => {}
        Err(e) if e.kind() == ErrorKind::NotFound => {}
        Err(e) => return Err(io_err(path, e)),
    }

    if let Some(parent) = path.parent() {
        ensure_dir(parent)?;
    }
    fs::write(tmp, content).map_err(|e| io_err(tmp, e))?;
    set_mode(tmp, mode)?;

    if let Err(e) = fs::rename(tmp, path) {
        let _ = fs::remove_file(tmp);
        return Err(io_err(path, e));
    }

    tracing::trace!("wrote: {}", path.display());
    Ok(StageResult::Written {
        path: path.to_path_buf(),
    })
}

fn digest(bytes: &[u8]) -> [u8; 32] {
    let mut h = Sha256::new();
    h.update(bytes);
    h.finalize().into()
}

#[cfg(unix)]
fn set_mode(path: &Path, mode: u32) -> Result<(), SandboxError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(mode)).map_err(|e| io_err(path, e))
}

#[cfg(not(unix))]
fn set_mode(_path: &Path, _mode: u32) -> Result<(), SandboxError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
