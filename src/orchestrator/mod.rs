//! Event handlers that drive jobs through their lifecycle.
//!
//! A [`JobOrchestrator`] owns the job store and the provider adapter and
//! exposes one async handler per trigger:
//! - [`handle_job_created`](JobOrchestrator::handle_job_created) when a record is written,
//! - [`handle_notification`](JobOrchestrator::handle_notification) when the transfer service reports back,
//! - [`resolve_artifacts`](JobOrchestrator::resolve_artifacts) to (re)publish download links.
//!
//! Handlers log failures and report them through their outcome; they never
//! panic and never retry on their own.

mod artifacts;
mod completion;
mod dispatch;

pub use artifacts::ResolveReport;
pub use completion::CompletionOutcome;
pub use dispatch::DispatchOutcome;

use crate::naming;
use crate::provider::{CloudBackend, ProviderAdapter};
use crate::store::JobStore;

/// Drives jobs from CREATED to a terminal status.
pub struct JobOrchestrator<S, B> {
    store: S,
    adapter: ProviderAdapter<B>,
}

impl<S: JobStore, B: CloudBackend> JobOrchestrator<S, B> {
    pub fn new(store: S, adapter: ProviderAdapter<B>) -> Self {
        Self { store, adapter }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    #[cfg(test)]
    pub fn adapter(&self) -> &ProviderAdapter<B> {
        &self.adapter
    }

    /// Destination bucket of a job.
    pub fn bucket_for(&self, job_id: &str) -> String {
        naming::bucket_name(&self.adapter.settings().project_id, job_id)
    }
}
