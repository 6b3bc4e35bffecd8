use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};
use tokio::fs;

use super::codec;
use crate::repository::{Snapshot, SnapshotRepository, StorageError};

/// Snapshot stored as a single JSON file.
///
/// Saves write a sibling temp file and rename it over the target, so a crash
/// mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct JsonFileRepository {
    path: PathBuf,
}

impl JsonFileRepository {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "snapshot.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

#[async_trait]
impl SnapshotRepository for JsonFileRepository {
    async fn load(&self) -> Result<Snapshot, StorageError> {
        let text = match fs::read_to_string(&self.path).await {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound);
            }
            Err(err) if err.kind() == io::ErrorKind::InvalidData => {
                return Err(StorageError::DataCorruption(err.to_string()));
            }
            Err(err) => return Err(err.into()),
        };
        codec::decode(&text)
    }

    async fn save(&self, snapshot: &Snapshot) -> Result<(), StorageError> {
        let text = codec::encode(snapshot)?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).await?;
        }
        let temp = self.temp_path();
        fs::write(&temp, text.as_bytes()).await?;
        if let Err(err) = fs::rename(&temp, &self.path).await {
            let _ = fs::remove_file(&temp).await;
            return Err(err.into());
        }
        tracing::debug!(path = %self.path.display(), bytes = text.len(), "snapshot saved");
        Ok(())
    }
}
