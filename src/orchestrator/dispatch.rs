use tracing::{error, info, warn};

use super::JobOrchestrator;
use crate::error::HandlerError;
use crate::provider::CloudBackend;
use crate::state_machine::{Job, JobPatch, JobRecord, JobSpec, JobStatus, TakeoutSource};
use crate::store::JobStore;

const TAKEOUT_HANDLE_PREFIX: &str = "takeouts/";

/// What happened to a newly created job.
#[derive(Debug)]
pub enum DispatchOutcome {
    /// The transfer was accepted; the job is now IN_PROGRESS.
    Submitted { handle: String },
    /// A takeout ran to completion in-process.
    TakeoutFinished { handle: String, status: JobStatus },
    /// The job already has a handle or has moved past CREATED.
    AlreadyDispatched,
    /// No record with that id.
    NotFound,
    /// Validation or the provider refused the job. A new job stays CREATED.
    Rejected(HandlerError),
}

impl<S: JobStore, B: CloudBackend> JobOrchestrator<S, B> {
    /// React to a job record being created.
    ///
    /// Safe to deliver more than once: a record that already carries an
    /// external handle is never submitted again. The one exception is a
    /// takeout still IN_PROGRESS, whose batch ran in a process that never
    /// recorded the outcome; it is run again.
    pub async fn handle_job_created(&self, job_id: &str) -> DispatchOutcome {
        match self.dispatch(job_id).await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(%job_id, error = %e, "dispatch failed");
                DispatchOutcome::Rejected(e)
            }
        }
    }

    async fn dispatch(&self, job_id: &str) -> Result<DispatchOutcome, HandlerError> {
        let Some(record) = self.store.get(job_id).await? else {
            warn!(%job_id, "job record not found");
            return Ok(DispatchOutcome::NotFound);
        };
        let resuming = is_interrupted_takeout(&record);
        if !resuming && (record.external_job_handle.is_some() || record.status != JobStatus::Created) {
            info!(%job_id, status = %record.status, "job already dispatched, skipping");
            return Ok(DispatchOutcome::AlreadyDispatched);
        }

        let job = Job::try_from(&record)?;
        let bucket = self.bucket_for(&job.id);

        match &job.spec {
            JobSpec::Transfer(_) if resuming => Ok(DispatchOutcome::AlreadyDispatched),
            JobSpec::Transfer(source) => {
                self.adapter
                    .provision_destination(&bucket)
                    .await
                    .map_err(HandlerError::Provision)?;
                let handle = self
                    .adapter
                    .start_transfer(&job.id, source, &bucket)
                    .await
                    .map_err(HandlerError::Adapter)?;
                self.store
                    .update(&job.id, JobPatch::dispatched(handle.clone()))
                    .await?;
                info!(job_id = %job.id, name = %job.name, %bucket, %handle, "job in progress");
                Ok(DispatchOutcome::Submitted { handle })
            }
            JobSpec::Takeout(source) => self.run_takeout(&job, record, source, &bucket).await,
        }
    }

    async fn run_takeout(
        &self,
        job: &Job,
        record: JobRecord,
        source: &TakeoutSource,
        bucket: &str,
    ) -> Result<DispatchOutcome, HandlerError> {
        // Fail before provisioning anything for sources without an integration.
        self.adapter
            .takeout_files(source)
            .map_err(HandlerError::Adapter)?;
        self.adapter
            .provision_destination(bucket)
            .await
            .map_err(HandlerError::Provision)?;

        let handle = format!("{TAKEOUT_HANDLE_PREFIX}{}", job.id);
        let record = if record.status == JobStatus::InProgress {
            warn!(job_id = %job.id, %handle, "takeout was interrupted, running it again");
            record
        } else {
            self.store
                .update(&job.id, JobPatch::dispatched(handle.clone()))
                .await?
        };
        info!(job_id = %job.id, %bucket, provider = source.provider(), "takeout started");

        let report = self
            .adapter
            .start_takeout(source, bucket)
            .await
            .map_err(HandlerError::Adapter)?;
        let status = if report.is_complete() {
            JobStatus::Success
        } else {
            JobStatus::Failed
        };
        info!(
            job_id = %job.id,
            copied = report.copied.len(),
            failed = report.failed.len(),
            "takeout batch finished"
        );

        self.complete(record, status, chrono::Utc::now(), report.error_details())
            .await?;
        Ok(DispatchOutcome::TakeoutFinished { handle, status })
    }
}

// Takeouts run in-process, so no notification will ever finish one that is
// left IN_PROGRESS.
fn is_interrupted_takeout(record: &JobRecord) -> bool {
    record.status == JobStatus::InProgress
        && record
            .external_job_handle
            .as_deref()
            .is_some_and(|h| h.starts_with(TAKEOUT_HANDLE_PREFIX))
}
