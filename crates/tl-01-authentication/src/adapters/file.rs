use crate::domain::errors::SequenceStoreError;
use crate::ports::outbound::SequencePersistence;
use async_trait::async_trait;
use shared_types::SequenceRecord;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tracing::{debug, info};

/// JSON file holding the whole sequence record.
///
/// Every save writes a temp file, syncs it and renames it over the target,
/// so a crash leaves either the old or the new record, never a torn one.
pub struct FileSequencePersistence {
    path: PathBuf,
}

impl FileSequencePersistence {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        self.path.with_extension("tmp")
    }
}

#[async_trait]
impl SequencePersistence for FileSequencePersistence {
    async fn load(&self) -> Result<SequenceRecord, SequenceStoreError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                info!(path = %self.path.display(), "No sequence record yet, starting empty");
                return Ok(SequenceRecord::new());
            }
            Err(e) => return Err(e.into()),
        };

        let record: SequenceRecord =
            serde_json::from_slice(&bytes).map_err(|e| SequenceStoreError::Corrupt {
                message: format!("{}: {}", self.path.display(), e),
            })?;

        info!(
            path = %self.path.display(),
            devices = record.len(),
            "Loaded sequence record"
        );
        Ok(record)
    }

    async fn save(&self, record: &SequenceRecord) -> Result<(), SequenceStoreError> {
        if let Some(parent) = self.path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let bytes = serde_json::to_vec(record).map_err(|e| SequenceStoreError::Io {
            message: e.to_string(),
        })?;

        let temp_path = self.temp_path();
        let mut file = tokio::fs::File::create(&temp_path).await?;
        file.write_all(&bytes).await?;
        file.sync_all().await?;
        drop(file);

        tokio::fs::rename(&temp_path, &self.path).await?;

        debug!(path = %self.path.display(), devices = record.len(), "Sequence record persisted");
        Ok(())
    }
}
