use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::fs;
use tokio::sync::Mutex;
use tracing::warn;

use super::{sort_records, JobStore};
use crate::error::StoreError;
use crate::state_machine::{JobPatch, JobRecord};

/// A store that keeps one JSON document per job in a directory.
///
/// Writes go to a temporary file first and are renamed into place, so a
/// reader never sees a half-written record. Read-modify-write merges are
/// serialized within the process.
#[derive(Debug)]
pub struct JsonFileStore {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStore {
    /// Open (and create if needed) the store directory.
    pub async fn open(dir: impl Into<PathBuf>) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir).await?;
        Ok(Self {
            dir,
            write_lock: Mutex::new(()),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, id: &str) -> Result<PathBuf, StoreError> {
        let usable = !id.is_empty()
            && id != "."
            && id != ".."
            && !id.contains(['/', '\\', '\0']);
        if !usable {
            return Err(StoreError::Io(std::io::Error::new(
                ErrorKind::InvalidInput,
                format!("job id {id:?} cannot be used as a file name"),
            )));
        }
        Ok(self.dir.join(format!("{id}.json")))
    }

    /// Read the record stored at `path`. The file name is the job id, so it
    /// wins over (or stands in for) any `id` field in the document.
    async fn read(&self, id: &str, path: &Path) -> Result<Option<JobRecord>, StoreError> {
        match fs::read(path).await {
            Ok(bytes) => {
                let mut record: JobRecord = serde_json::from_slice(&bytes)?;
                record.id = id.to_string();
                Ok(Some(record))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn write(&self, path: &Path, record: &JobRecord) -> Result<(), StoreError> {
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_vec_pretty(record)?).await?;
        fs::rename(&tmp, path).await?;
        Ok(())
    }
}

impl JobStore for JsonFileStore {
    async fn create(&self, record: JobRecord) -> Result<JobRecord, StoreError> {
        let path = self.path_for(&record.id)?;
        let _guard = self.write_lock.lock().await;
        if fs::try_exists(&path).await? {
            return Err(StoreError::Conflict(record.id));
        }
        self.write(&path, &record).await?;
        Ok(record)
    }

    async fn get(&self, id: &str) -> Result<Option<JobRecord>, StoreError> {
        let path = self.path_for(id)?;
        self.read(id, &path).await
    }

    async fn update(&self, id: &str, patch: JobPatch) -> Result<JobRecord, StoreError> {
        let path = self.path_for(id)?;
        let _guard = self.write_lock.lock().await;
        let mut record = self
            .read(id, &path)
            .await?
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.apply(patch);
        self.write(&path, &record).await?;
        Ok(record)
    }

    async fn find_by_external_handle(&self, handle: &str) -> Result<Option<JobRecord>, StoreError> {
        Ok(self
            .list()
            .await?
            .into_iter()
            .find(|r| r.external_job_handle.as_deref() == Some(handle)))
    }

    async fn list(&self) -> Result<Vec<JobRecord>, StoreError> {
        let mut records = Vec::new();
        let mut entries = fs::read_dir(&self.dir).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(id) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            match self.read(id, &path).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable job record"),
            }
        }
        sort_records(&mut records);
        Ok(records)
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let path = self.path_for(id)?;
        let _guard = self.write_lock.lock().await;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}
