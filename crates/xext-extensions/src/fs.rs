//! Filesystem access used by the install pipeline and the sync engine

use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;
use xext_core::{Error, Result};

use crate::archive;

/// File operations behind the install and sync flows
#[async_trait]
pub trait FileSystem: Send + Sync {
    /// Unpack a package archive into `dest`
    async fn extract_archive(&self, archive: &Path, dest: &Path) -> Result<()>;

    /// Remove everything inside `dir`, creating it when missing
    async fn empty_dir(&self, dir: &Path) -> Result<()>;

    /// Recursively copy the contents of `from` into `to`
    async fn copy_dir(&self, from: &Path, to: &Path) -> Result<()>;

    /// Remove a file or directory tree; missing paths are not an error
    async fn remove(&self, path: &Path) -> Result<()>;

    async fn exists(&self, path: &Path) -> bool;

    async fn read_to_string(&self, path: &Path) -> Result<String>;

    async fn read_json(&self, path: &Path) -> Result<Value>;

    async fn write_json(&self, path: &Path, value: &Value) -> Result<()>;
}

/// [`FileSystem`] backed by the local disk
#[derive(Debug, Default, Clone, Copy)]
pub struct LocalFileSystem;

impl LocalFileSystem {
    pub fn new() -> Self {
        Self
    }
}

fn join_error(e: tokio::task::JoinError) -> Error {
    Error::Io(std::io::Error::other(e))
}

fn copy_tree(from: &Path, to: &Path) -> std::io::Result<usize> {
    let mut copied = 0;
    for entry in WalkDir::new(from).min_depth(1) {
        let entry = entry.map_err(std::io::Error::other)?;
        let rel = entry
            .path()
            .strip_prefix(from)
            .map_err(std::io::Error::other)?;
        let target = to.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent)?;
            }
            std::fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}

#[async_trait]
impl FileSystem for LocalFileSystem {
    async fn extract_archive(&self, archive: &Path, dest: &Path) -> Result<()> {
        let (archive, dest) = (archive.to_path_buf(), dest.to_path_buf());
        let display = archive.display().to_string();
        tokio::task::spawn_blocking(move || archive::extract(&archive, &dest))
            .await
            .map_err(join_error)?
            .map_err(|e| Error::unzip(display, format!("{:#}", e)))
    }

    async fn empty_dir(&self, dir: &Path) -> Result<()> {
        if tokio::fs::try_exists(dir).await? {
            let mut entries = tokio::fs::read_dir(dir).await?;
            while let Some(entry) = entries.next_entry().await? {
                let path = entry.path();
                if entry.file_type().await?.is_dir() {
                    tokio::fs::remove_dir_all(&path).await?;
                } else {
                    tokio::fs::remove_file(&path).await?;
                }
            }
        } else {
            tokio::fs::create_dir_all(dir).await?;
        }
        Ok(())
    }

    async fn copy_dir(&self, from: &Path, to: &Path) -> Result<()> {
        let (from, to): (PathBuf, PathBuf) = (from.to_path_buf(), to.to_path_buf());
        tokio::fs::create_dir_all(&to).await?;
        let copied = tokio::task::spawn_blocking(move || copy_tree(&from, &to))
            .await
            .map_err(join_error)??;
        debug!("Copied {} files", copied);
        Ok(())
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        match tokio::fs::metadata(path).await {
            Ok(meta) if meta.is_dir() => tokio::fs::remove_dir_all(path).await?,
            Ok(_) => tokio::fs::remove_file(path).await?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        }
        Ok(())
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::try_exists(path).await.unwrap_or(false)
    }

    async fn read_to_string(&self, path: &Path) -> Result<String> {
        Ok(tokio::fs::read_to_string(path).await?)
    }

    async fn read_json(&self, path: &Path) -> Result<Value> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(serde_json::from_str(&content)?)
    }

    async fn write_json(&self, path: &Path, value: &Value) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let content = serde_json::to_string_pretty(value)?;
        tokio::fs::write(path, content).await?;
        Ok(())
    }
}
