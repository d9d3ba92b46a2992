//! Text file access behind a trait so the pipeline can be tested without
//! touching the real filesystem.

use crate::error::{Result, SubtransError};
use async_trait::async_trait;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Basic file metadata, shaped for display rather than syscalls.
#[derive(Debug, Clone)]
pub struct FileInfo {
    pub path: PathBuf,
    pub name: String,
    pub extension: String,
    pub size_bytes: u64,
    pub modified: Option<SystemTime>,
    pub created: Option<SystemTime>,
}

/// Reads and writes UTF-8 text files.
#[async_trait]
pub trait TextStore: Send + Sync {
    async fn read(&self, path: &Path) -> Result<String>;

    /// Write `content`, creating intermediate directories as needed.
    /// Returns the path written.
    async fn write(&self, content: &str, path: &Path) -> Result<PathBuf>;

    async fn exists(&self, path: &Path) -> bool;

    async fn stat(&self, path: &Path) -> Result<FileInfo>;
}

/// [`TextStore`] over the local filesystem.
pub struct LocalTextStore;

fn classify(e: std::io::Error, path: &Path) -> SubtransError {
    match e.kind() {
        ErrorKind::NotFound => SubtransError::FileNotFound(path.display().to_string()),
        ErrorKind::PermissionDenied => {
            SubtransError::PermissionDenied(path.display().to_string())
        }
        _ => SubtransError::Io(e),
    }
}

#[async_trait]
impl TextStore for LocalTextStore {
    async fn read(&self, path: &Path) -> Result<String> {
        let bytes = tokio::fs::read(path).await.map_err(|e| classify(e, path))?;
        String::from_utf8(bytes)
            .map_err(|_| SubtransError::BadEncoding(path.display().to_string()))
    }

    async fn write(&self, content: &str, path: &Path) -> Result<PathBuf> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| classify(e, parent))?;
            }
        }
        tokio::fs::write(path, content)
            .await
            .map_err(|e| classify(e, path))?;
        Ok(path.to_path_buf())
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn stat(&self, path: &Path) -> Result<FileInfo> {
        let meta = tokio::fs::metadata(path).await.map_err(|e| classify(e, path))?;
        Ok(FileInfo {
            path: path.to_path_buf(),
            name: path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            extension: path
                .extension()
                .map(|e| e.to_string_lossy().to_lowercase())
                .unwrap_or_default(),
            size_bytes: meta.len(),
            modified: meta.modified().ok(),
            created: meta.created().ok(),
        })
    }
}
