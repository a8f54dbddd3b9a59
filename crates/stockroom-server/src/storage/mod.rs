//! Upload storage
//!
//! Accepted CSV files are written to a local directory injected at
//! construction. Stored files get a generated name so concurrent uploads of
//! the same original file never collide; the returned path is the durable
//! reference recorded on the import job.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct UploadStorage {
    root: PathBuf,
}

/// Location and size of a freshly written upload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub path: PathBuf,
    pub size: u64,
}

impl StoredFile {
    /// Path as recorded on the job
    pub fn path_string(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

impl UploadStorage {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Write `data` under a new unique `.csv` name, creating the directory if needed
    #[instrument(skip(self, data), fields(size = data.len()))]
    pub async fn save(&self, data: &[u8]) -> Result<StoredFile> {
        tokio::fs::create_dir_all(&self.root)
            .await
            .with_context(|| format!("Failed to create upload directory {}", self.root.display()))?;

        let path = self.root.join(format!("{}.csv", Uuid::new_v4()));
        tokio::fs::write(&path, data)
            .await
            .with_context(|| format!("Failed to write upload {}", path.display()))?;

        info!(path = %path.display(), "Stored upload");

        Ok(StoredFile {
            path,
            size: data.len() as u64,
        })
    }

    pub async fn read(&self, path: impl AsRef<Path>) -> Result<Vec<u8>> {
        let path = path.as_ref();
        tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read upload {}", path.display()))
    }

    /// Delete a stored file; a file that is already gone counts as removed
    pub async fn remove(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        match tokio::fs::remove_file(path).await {
            Ok(()) => {
                debug!(path = %path.display(), "Removed upload");
                Ok(())
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!(path = %path.display(), "Upload already removed");
                Ok(())
            },
            Err(e) => {
                Err(e).with_context(|| format!("Failed to remove upload {}", path.display()))
            },
        }
    }
}
