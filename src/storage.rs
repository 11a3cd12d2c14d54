//! Durable storage for captured audio artifacts.
//!
//! The capture engine writes into a temporary location; on finalize the
//! controller relocates the artifact here. Relocation must verify the
//! destination before reporting success, since a meeting record must never
//! reference a file that does not exist.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Root of the permanent recordings directory.
pub struct RecordingStorage {
    root: PathBuf,
}

impl RecordingStorage {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn permanent_path(&self, session_id: &str) -> PathBuf {
        self.root.join(format!("{}.wav", session_id))
    }

    /// Move a temporary capture artifact into durable storage and return its
    /// permanent location.
    pub async fn relocate(&self, temp_uri: &Path, session_id: &str) -> Result<PathBuf> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("failed to create recordings directory: {:?}", self.root))?;

        let temp_meta = tokio::fs::metadata(temp_uri)
            .await
            .with_context(|| format!("temporary recording not found: {:?}", temp_uri))?;

        let permanent = self.permanent_path(session_id);

        // Rename first; fall back to copy + remove for cross-device moves.
        if let Err(rename_err) = tokio::fs::rename(temp_uri, &permanent).await {
            warn!(
                "Rename failed ({}), copying instead: {:?} -> {:?}",
                rename_err, temp_uri, permanent
            );
            tokio::fs::copy(temp_uri, &permanent)
                .await
                .with_context(|| format!("failed to copy recording to {:?}", permanent))?;
            if let Err(e) = tokio::fs::remove_file(temp_uri).await {
                warn!("Failed to remove temporary recording: {}", e);
            }
        }

        // Verify before anyone records this path.
        let moved = tokio::fs::metadata(&permanent)
            .await
            .with_context(|| format!("recording missing after relocation: {:?}", permanent))?;

        info!(
            "Recording relocated: {:?} ({} bytes, was {} bytes)",
            permanent,
            moved.len(),
            temp_meta.len()
        );

        Ok(permanent)
    }

    /// Delete a stored or temporary artifact. Missing files are not an error.
    pub async fn delete(&self, uri: &Path) -> Result<()> {
        match tokio::fs::remove_file(uri).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("failed to delete recording: {:?}", uri)),
        }
    }
}
