// ABOUTME: Upload storage rooted at the configured media directory
// ABOUTME: Stages new files behind a cleanup guard and resolves stored paths safely
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Emporium Contributors

//! # Media Storage
//!
//! Uploaded files live flat under `UPLOAD_DIR` as `{uuid}.{ext}`; optimized
//! variants sit next to them as `{uuid}.opt.{ext}`. Rows store paths relative
//! to the root, and every path read back from the database goes through
//! [`MediaStore::resolve`], which refuses anything escaping the root.

/// Decode, downscale and re-encode uploaded images
pub mod optimizer;
/// Content sniffing for accepted image formats
pub mod sniff;

pub use sniff::ImageKind;

use std::path::{Component, Path, PathBuf};

use uuid::Uuid;

use crate::config::MediaConfig;
use crate::errors::{AppError, AppResult};

/// Filesystem store for uploaded media
#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
}

impl MediaStore {
    /// Open the store, creating the root directory if needed
    ///
    /// # Errors
    ///
    /// Returns `STORAGE_ERROR` if the directory cannot be created
    pub async fn open(config: &MediaConfig) -> AppResult<Self> {
        tokio::fs::create_dir_all(&config.upload_dir)
            .await
            .map_err(|e| {
                AppError::storage(format!(
                    "Cannot create upload directory {}: {e}",
                    config.upload_dir.display()
                ))
            })?;
        tracing::info!(upload_dir = %config.upload_dir.display(), "Media store ready");
        Ok(Self {
            root: config.upload_dir.clone(),
        })
    }

    /// Root directory
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write an upload under a fresh name and guard it until committed
    ///
    /// # Errors
    ///
    /// Returns `STORAGE_ERROR` if the file cannot be written
    pub async fn stage(&self, bytes: &[u8], kind: ImageKind) -> AppResult<StagedFile> {
        let relative = format!("{}.{}", Uuid::new_v4(), kind.extension());
        let absolute = self.root.join(&relative);
        tokio::fs::write(&absolute, bytes).await.map_err(|e| {
            AppError::storage(format!("Failed to store upload {relative}: {e}"))
        })?;
        tracing::debug!(path = %relative, bytes = bytes.len(), "Staged upload");
        Ok(StagedFile {
            absolute,
            relative,
            committed: false,
        })
    }

    /// Map a stored relative path to an absolute one inside the root
    ///
    /// # Errors
    ///
    /// Returns `INVALID_INPUT` for absolute paths or paths containing `..`
    pub fn resolve(&self, relative: &str) -> AppResult<PathBuf> {
        let path = Path::new(relative);
        let escapes = relative.is_empty()
            || path
                .components()
                .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir));
        if escapes {
            return Err(AppError::invalid_input(format!(
                "Media path '{relative}' is outside the upload directory"
            )));
        }
        Ok(self.root.join(path))
    }

    /// Read a stored file
    ///
    /// # Errors
    ///
    /// Returns an error if the path is invalid or the file cannot be read
    pub async fn read(&self, relative: &str) -> AppResult<Vec<u8>> {
        let path = self.resolve(relative)?;
        Ok(tokio::fs::read(&path).await?)
    }

    /// Write a derived file (e.g. an optimized variant)
    ///
    /// # Errors
    ///
    /// Returns an error if the path is invalid or the write fails
    pub async fn write(&self, relative: &str, bytes: &[u8]) -> AppResult<()> {
        let path = self.resolve(relative)?;
        Ok(tokio::fs::write(&path, bytes).await?)
    }

    /// Remove a stored file; missing files count as removed
    ///
    /// # Errors
    ///
    /// Returns an error if the path is invalid or removal fails for another reason
    pub async fn remove(&self, relative: &str) -> AppResult<()> {
        let path = self.resolve(relative)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    /// Whether a stored file exists
    pub async fn exists(&self, relative: &str) -> bool {
        match self.resolve(relative) {
            Ok(path) => tokio::fs::try_exists(&path).await.unwrap_or(false),
            Err(_) => false,
        }
    }
}

/// Name of the optimized variant stored next to `original`
#[must_use]
pub fn optimized_path_for(original: &str) -> String {
    match original.rsplit_once('.') {
        Some((stem, ext)) => format!("{stem}.opt.{ext}"),
        None => format!("{original}.opt"),
    }
}

/// An upload written to disk but not yet referenced by a committed row
///
/// Dropping the guard without calling [`StagedFile::commit`] deletes the file,
/// so every early return in an upload handler cleans up after itself.
#[derive(Debug)]
pub struct StagedFile {
    absolute: PathBuf,
    relative: String,
    committed: bool,
}

impl StagedFile {
    /// Path relative to the media root
    #[must_use]
    pub fn relative_path(&self) -> &str {
        &self.relative
    }

    /// Absolute path on disk
    #[must_use]
    pub fn absolute_path(&self) -> &Path {
        &self.absolute
    }

    /// Keep the file; call only once the row referencing it is stored
    pub fn commit(mut self) {
        self.committed = true;
    }
}

impl Drop for StagedFile {
    fn drop(&mut self) {
        if self.committed {
            return;
        }
        match std::fs::remove_file(&self.absolute) {
            Ok(()) => tracing::debug!(path = %self.relative, "Removed uncommitted upload"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => tracing::warn!(path = %self.relative, error = %e, "Failed to remove uncommitted upload"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn store(dir: &tempfile::TempDir) -> MediaStore {
        MediaStore::open(&MediaConfig {
            upload_dir: dir.path().join("uploads"),
            ..MediaConfig::default()
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn test_uncommitted_upload_is_removed() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        let staged = store.stage(b"bytes", ImageKind::Png).await.unwrap();
        let path = staged.absolute_path().to_path_buf();
        assert!(path.exists());
        drop(staged);
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_committed_upload_survives() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        let staged = store.stage(b"bytes", ImageKind::Jpeg).await.unwrap();
        let relative = staged.relative_path().to_owned();
        staged.commit();
        assert!(relative.ends_with(".jpg"));
        assert!(store.exists(&relative).await);
        store.remove(&relative).await.unwrap();
        assert!(!store.exists(&relative).await);
        // removing twice is fine
        store.remove(&relative).await.unwrap();
    }

    #[tokio::test]
    async fn test_resolve_rejects_escapes() {
        let dir = tempfile::tempdir().unwrap();
        let store = store(&dir).await;
        assert!(store.resolve("../secret").is_err());
        assert!(store.resolve("/etc/passwd").is_err());
        assert!(store.resolve("").is_err());
        assert!(store.resolve("abc.png").is_ok());
    }

    #[test]
    fn test_optimized_path() {
        assert_eq!(optimized_path_for("abc.png"), "abc.opt.png");
        assert_eq!(optimized_path_for("abc"), "abc.opt");
    }
}
