use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use super::JobOrchestrator;
use crate::error::HandlerError;
use crate::notification::TransferNotification;
use crate::provider::CloudBackend;
use crate::state_machine::{JobPatch, JobRecord, JobStatus, StateMachine, Transition};
use crate::store::JobStore;

/// What a completion notification did to its job.
#[derive(Debug)]
pub enum CompletionOutcome {
    /// The terminal status was recorded. `artifacts` is the number of signed
    /// links published, or `None` if resolving them failed.
    Applied {
        job_id: String,
        status: JobStatus,
        artifacts: Option<usize>,
    },
    /// The notification reports a non-terminal status.
    Ignored,
    /// No job carries this handle.
    Unresolved { handle: String },
    /// The job cannot move to the reported status (regression, or a
    /// notification that overtook its dispatch).
    OutOfOrder {
        job_id: String,
        from: JobStatus,
        to: JobStatus,
    },
    Rejected(HandlerError),
}

impl<S: JobStore, B: CloudBackend> JobOrchestrator<S, B> {
    /// React to a transfer completion notification.
    pub async fn handle_notification(&self, notification: &TransferNotification) -> CompletionOutcome {
        let handle = &notification.transfer_job_name;
        let Some(status) = notification.terminal_status() else {
            debug!(%handle, status = ?notification.status, "non-terminal notification ignored");
            return CompletionOutcome::Ignored;
        };

        let record = match self.store.find_by_external_handle(handle).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                warn!(%handle, "no job for transfer handle, dropping notification");
                return CompletionOutcome::Unresolved {
                    handle: handle.clone(),
                };
            }
            Err(e) => {
                error!(%handle, error = %e, "job lookup failed");
                return CompletionOutcome::Rejected(e.into());
            }
        };

        let at = notification.end_time.unwrap_or_else(Utc::now);
        let job_id = record.id.clone();
        match self
            .complete(record, status, at, notification.error_details.clone())
            .await
        {
            Ok(outcome) => outcome,
            Err(e) => {
                error!(%job_id, %handle, error = %e, "failed to record completion");
                CompletionOutcome::Rejected(e)
            }
        }
    }

    /// Move `record` to a terminal status and publish its artifacts.
    ///
    /// Shared by transfer notifications and in-process takeouts.
    pub(super) async fn complete(
        &self,
        record: JobRecord,
        status: JobStatus,
        at: DateTime<Utc>,
        error_details: Vec<String>,
    ) -> Result<CompletionOutcome, HandlerError> {
        let job_id = record.id;
        let transition = StateMachine::transition(record.status, status);
        let Some(target) = transition.target() else {
            let (from, to) = (record.status, status);
            warn!(%job_id, %from, %to, "status change rejected, dropping");
            return Ok(CompletionOutcome::OutOfOrder { job_id, from, to });
        };
        if matches!(transition, Transition::Replay(_)) {
            debug!(%job_id, status = %target, "duplicate completion");
        }

        if target == JobStatus::Failed {
            warn!(%job_id, details = ?error_details, "job failed");
        }
        self.store
            .update(&job_id, JobPatch::completed(target, at, error_details))
            .await?;
        info!(%job_id, status = %target, "job finished");

        let artifacts = match self.resolve_artifacts(&job_id).await {
            Ok(report) => Some(report.signed),
            Err(e) => {
                error!(%job_id, error = %e, "artifact resolution failed");
                None
            }
        };
        Ok(CompletionOutcome::Applied {
            job_id,
            status: target,
            artifacts,
        })
    }
}
