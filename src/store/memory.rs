use std::collections::HashMap;

use tokio::sync::RwLock;

use super::{sort_records, JobStore};
use crate::error::StoreError;
use crate::state_machine::{JobPatch, JobRecord};

/// A store that keeps records in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<HashMap<String, JobRecord>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl JobStore for MemoryStore {
    async fn create(&self, record: JobRecord) -> Result<JobRecord, StoreError> {
        let mut records = self.records.write().await;
        if records.contains_key(&record.id) {
            return Err(StoreError::Conflict(record.id));
        }
        records.insert(record.id.clone(), record.clone());
        Ok(record)
    }

    async fn get(&self, id: &str) -> Result<Option<JobRecord>, StoreError> {
        Ok(self.records.read().await.get(id).cloned())
    }

    async fn update(&self, id: &str, patch: JobPatch) -> Result<JobRecord, StoreError> {
        let mut records = self.records.write().await;
        let record = records
            .get_mut(id)
            .ok_or_else(|| StoreError::NotFound(id.to_string()))?;
        record.apply(patch);
        Ok(record.clone())
    }

    async fn find_by_external_handle(&self, handle: &str) -> Result<Option<JobRecord>, StoreError> {
        Ok(self
            .records
            .read()
            .await
            .values()
            .find(|r| r.external_job_handle.as_deref() == Some(handle))
            .cloned())
    }

    async fn list(&self) -> Result<Vec<JobRecord>, StoreError> {
        let mut records: Vec<JobRecord> = self.records.read().await.values().cloned().collect();
        sort_records(&mut records);
        Ok(records)
    }

    async fn delete(&self, id: &str) -> Result<bool, StoreError> {
        Ok(self.records.write().await.remove(id).is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state_machine::JobStatus;

    fn record(id: &str, owner: &str) -> JobRecord {
        JobRecord {
            id: id.into(),
            name: Some(format!("job {id}")),
            owner_id: Some(owner.into()),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn create_get_and_conflict() {
        let store = MemoryStore::new();
        store.create(record("a", "u1")).await.unwrap();
        assert_eq!(store.get("a").await.unwrap().unwrap().name.as_deref(), Some("job a"));
        assert!(store.get("missing").await.unwrap().is_none());
        assert!(matches!(
            store.create(record("a", "u1")).await,
            Err(StoreError::Conflict(id)) if id == "a"
        ));
    }

    #[tokio::test]
    async fn update_merges_and_requires_record() {
        let store = MemoryStore::new();
        store.create(record("a", "u1")).await.unwrap();

        let updated = store.update("a", JobPatch::dispatched("transferJobs/a")).await.unwrap();
        assert_eq!(updated.status, JobStatus::InProgress);
        assert_eq!(updated.owner_id.as_deref(), Some("u1"));

        assert!(matches!(
            store.update("b", JobPatch::default()).await,
            Err(StoreError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn find_by_handle() {
        let store = MemoryStore::new();
        store.create(record("a", "u1")).await.unwrap();
        store.create(record("b", "u1")).await.unwrap();
        store.update("b", JobPatch::dispatched("transferJobs/b")).await.unwrap();

        let found = store.find_by_external_handle("transferJobs/b").await.unwrap();
        assert_eq!(found.unwrap().id, "b");
        assert!(store.find_by_external_handle("transferJobs/zzz").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn list_by_owner_and_delete() {
        let store = MemoryStore::new();
        store.create(record("a", "u1")).await.unwrap();
        store.create(record("b", "u2")).await.unwrap();
        store.create(record("c", "u1")).await.unwrap();

        let ids: Vec<String> = store
            .list_by_owner("u1")
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, ["a", "c"]);

        assert!(store.delete("a").await.unwrap());
        assert!(!store.delete("a").await.unwrap());
        assert_eq!(store.list().await.unwrap().len(), 2);
    }
}
