// SYNOID FitCheck Artifact Store
// Copyright (c) 2026 Xing_The_Creator | SYNOID
//
// Per-request artifact naming and write-once persistence. Every file a
// request produces embeds the same short identifier, so concurrent
// requests never share a path and no pipeline state needs locking.

use std::fmt;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::fs as tfs;
use tokio::io::AsyncWriteExt;
use tracing::{info, warn};
use uuid::Uuid;

/// Attempts to draw a fresh identifier when an upload name already exists.
const MAX_NAME_ATTEMPTS: usize = 5;

/// Short per-request identifier (first 8 hex chars of a v4 UUID).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArtifactId(String);

impl ArtifactId {
    pub fn generate() -> Self {
        let full = Uuid::new_v4().simple().to_string();
        Self(full[..8].to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A raw upload that has been written to disk.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub id: ArtifactId,
    pub path: PathBuf,
}

#[derive(Debug, Clone)]
pub struct ArtifactStore {
    upload_dir: PathBuf,
    output_dir: PathBuf,
}

impl ArtifactStore {
    pub fn new(upload_dir: impl Into<PathBuf>, output_dir: impl Into<PathBuf>) -> Self {
        Self {
            upload_dir: upload_dir.into(),
            output_dir: output_dir.into(),
        }
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    /// Create the upload and output directories. Safe to call repeatedly.
    pub async fn provision(&self) -> std::io::Result<()> {
        tfs::create_dir_all(&self.upload_dir).await?;
        tfs::create_dir_all(&self.output_dir).await?;
        info!(
            "[STORE] Artifact folders ready: uploads={:?} outputs={:?}",
            self.upload_dir, self.output_dir
        );
        Ok(())
    }

    pub fn upload_path(&self, id: &ArtifactId, stored_name: &str) -> PathBuf {
        self.upload_dir.join(format!("upload_{}_{}", id, stored_name))
    }

    pub fn converted_path(&self, id: &ArtifactId) -> PathBuf {
        self.upload_dir.join(format!("conv_{}.mp4", id))
    }

    pub fn output_path(&self, id: &ArtifactId) -> PathBuf {
        self.output_dir.join(format!("processed_{}.mp4", id))
    }

    /// Whether any artifact of any request already carries `id`.
    async fn id_in_use(&self, id: &ArtifactId) -> std::io::Result<bool> {
        if tfs::try_exists(&self.converted_path(id)).await?
            || tfs::try_exists(&self.output_path(id)).await?
        {
            return Ok(true);
        }

        let prefix = format!("upload_{}_", id);
        let mut entries = tfs::read_dir(&self.upload_dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            if entry.file_name().to_string_lossy().starts_with(&prefix) {
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Write the raw upload under a fresh identifier.
    ///
    /// Files are created with create-new semantics; an identifier that
    /// collides with an existing artifact is discarded and redrawn.
    pub async fn persist_upload(
        &self,
        stored_name: &str,
        bytes: &[u8],
    ) -> std::io::Result<StoredUpload> {
        for _ in 0..MAX_NAME_ATTEMPTS {
            let id = ArtifactId::generate();
            let path = self.upload_path(&id, stored_name);
            if self.id_in_use(&id).await? {
                warn!("[STORE] Identifier {} already in use, redrawing", id);
                continue;
            }

            let mut file = match tfs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
                .await
            {
                Ok(f) => f,
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    warn!("[STORE] Identifier {} already in use, redrawing", id);
                    continue;
                }
                Err(e) => return Err(e),
            };
            file.write_all(bytes).await?;
            file.flush().await?;

            info!(
                "[STORE] Saved upload {} → {:?} ({:.2} MB)",
                id,
                path,
                bytes.len() as f64 / 1_048_576.0
            );
            return Ok(StoredUpload { id, path });
        }

        Err(std::io::Error::new(
            ErrorKind::AlreadyExists,
            "could not allocate a unique artifact name",
        ))
    }
}

/// Public-facing name of an artifact (its final path component).
pub fn public_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}
