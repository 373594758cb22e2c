//! Job record persistence.
//!
//! [`JobStore`] is the only way handlers and the CLI touch job records.
//! Updates are field-level merges ([`JobPatch`]) so concurrent handlers
//! never overwrite each other's fields; the last write to a given field wins.

mod file;
#[cfg(test)]
mod memory;

pub use file::JsonFileStore;
#[cfg(test)]
pub use memory::MemoryStore;

use crate::error::StoreError;
use crate::state_machine::{JobPatch, JobRecord};

#[allow(async_fn_in_trait)]
pub trait JobStore {
    /// Insert a new record. Fails with [`StoreError::Conflict`] if the id is taken.
    async fn create(&self, record: JobRecord) -> Result<JobRecord, StoreError>;

    async fn get(&self, id: &str) -> Result<Option<JobRecord>, StoreError>;

    /// Merge `patch` into the record. Fails with [`StoreError::NotFound`]
    /// if there is no such record.
    async fn update(&self, id: &str, patch: JobPatch) -> Result<JobRecord, StoreError>;

    /// Find the record whose `externalJobHandle` equals `handle`.
    async fn find_by_external_handle(&self, handle: &str) -> Result<Option<JobRecord>, StoreError>;

    /// All records, oldest first.
    async fn list(&self) -> Result<Vec<JobRecord>, StoreError>;

    /// Records created by `owner_id`, oldest first.
    async fn list_by_owner(&self, owner_id: &str) -> Result<Vec<JobRecord>, StoreError> {
        let mut records = self.list().await?;
        records.retain(|r| r.owner_id.as_deref() == Some(owner_id));
        Ok(records)
    }

    /// Remove a record. Returns `false` if it did not exist.
    async fn delete(&self, id: &str) -> Result<bool, StoreError>;
}

// Oldest first, ties broken by id so listings are stable.
fn sort_records(records: &mut [JobRecord]) {
    records.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
}
