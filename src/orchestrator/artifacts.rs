use futures::TryStreamExt;
use tracing::{info, warn};

use super::JobOrchestrator;
use crate::error::HandlerError;
use crate::provider::{Artifact, CloudBackend};
use crate::state_machine::{AccessUrl, JobPatch};
use crate::store::JobStore;

/// Result of publishing a job's download links.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ResolveReport {
    pub signed: usize,
    /// Artifacts left out because they could not be signed.
    pub skipped: Vec<String>,
}

impl<S: JobStore, B: CloudBackend> JobOrchestrator<S, B> {
    /// Replace the job's `accessUrls` with a fresh signed link per artifact
    /// in its bucket, sorted by name.
    ///
    /// Only finished jobs can be resolved. Running it again re-signs the
    /// same set of artifacts; links are never appended.
    pub async fn resolve_artifacts(&self, job_id: &str) -> Result<ResolveReport, HandlerError> {
        let record = self
            .store
            .get(job_id)
            .await?
            .ok_or_else(|| HandlerError::NotFound(job_id.to_string()))?;
        if !record.status.is_terminal() {
            return Err(HandlerError::NotTerminal(record.status));
        }

        let bucket = self.bucket_for(job_id);
        let artifacts: Vec<Artifact> = self
            .adapter
            .list_artifacts(&bucket)
            .try_collect()
            .await
            .map_err(HandlerError::Artifacts)?;

        let mut urls = Vec::with_capacity(artifacts.len());
        let mut skipped = Vec::new();
        for artifact in artifacts {
            match self.adapter.sign_url(&artifact) {
                Ok(url) => urls.push(AccessUrl {
                    name: artifact.name,
                    url,
                }),
                Err(e) => {
                    warn!(%job_id, object = %artifact.name, error = %e, "could not sign artifact, omitting it");
                    skipped.push(artifact.name);
                }
            }
        }
        urls.sort_by(|a, b| a.name.cmp(&b.name));

        let signed = urls.len();
        self.store.update(job_id, JobPatch::access_urls(urls)).await?;
        info!(%job_id, %bucket, signed, skipped = skipped.len(), "access links published");
        Ok(ResolveReport { signed, skipped })
    }
}
