//! Provider-specific job logic on top of a [`CloudBackend`].
//!
//! The adapter turns a validated source into the calls a backend
//! understands: which data source block a transfer carries, how a takeout's
//! files land in the destination, how artifacts are enumerated and signed.

use std::collections::HashSet;

use chrono::{Datelike, NaiveDate, Utc};
use futures::stream::{self, Stream, StreamExt, TryStreamExt};
use tracing::{debug, info, warn};

use super::error::ProviderError;
use super::types::{
    Artifact, AwsAccessKey, AwsS3Data, AzureBlobStorageData, AzureCredentials, BucketRequest,
    DataSource, Date, GcsData, NotificationConfig, Schedule, TransferJob, TransferSpec,
};
use super::CloudBackend;
use crate::state_machine::{TakeoutFile, TakeoutSource, TransferSource};

/// Role that lets the transfer service write into the destination bucket.
const TRANSFER_WRITER_ROLE: &str = "roles/storage.legacyBucketWriter";

/// Transfer operation events we want published to the notification topic.
const NOTIFY_EVENTS: [&str; 3] = [
    "TRANSFER_OPERATION_SUCCESS",
    "TRANSFER_OPERATION_FAILED",
    "TRANSFER_OPERATION_ABORTED",
];

/// Where and how destination buckets are created.
#[derive(Debug, Clone)]
pub struct DestinationSettings {
    pub project_id: String,
    pub location: String,
    pub storage_class: String,
    pub notification_topic: String,
    pub max_concurrent_downloads: usize,
}

/// Per-file outcome of a takeout batch.
#[derive(Debug, Default)]
pub struct TakeoutReport {
    pub copied: Vec<String>,
    pub failed: Vec<(String, ProviderError)>,
}

impl TakeoutReport {
    /// A takeout only counts as done when every file made it.
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// One line per failed file, for the job record.
    pub fn error_details(&self) -> Vec<String> {
        self.failed
            .iter()
            .map(|(object, err)| format!("{object}: {err}"))
            .collect()
    }
}

/// Uniform entry point for every supported source provider.
pub struct ProviderAdapter<B> {
    backend: B,
    settings: DestinationSettings,
}

impl<B: CloudBackend> ProviderAdapter<B> {
    pub fn new(backend: B, settings: DestinationSettings) -> Self {
        Self { backend, settings }
    }

    #[cfg(test)]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn settings(&self) -> &DestinationSettings {
        &self.settings
    }

    /// Create the destination bucket and let the transfer service write to it.
    ///
    /// Safe to call repeatedly: an existing bucket and an existing IAM
    /// binding are both left as they are.
    pub async fn provision_destination(&self, bucket: &str) -> Result<(), ProviderError> {
        let request = BucketRequest {
            name: bucket.to_string(),
            location: self.settings.location.clone(),
            storage_class: self.settings.storage_class.clone(),
        };
        match self.backend.create_bucket(&request).await {
            Ok(()) => info!(%bucket, location = %request.location, "destination bucket created"),
            Err(e) if e.is_already_exists() => debug!(%bucket, "destination bucket already exists"),
            Err(e) => return Err(e),
        }

        let account = self.backend.transfer_service_account().await?;
        let member = format!("serviceAccount:{account}");
        let mut policy = self.backend.bucket_iam_policy(bucket).await?;
        if policy.grant(TRANSFER_WRITER_ROLE, &member) {
            self.backend.set_bucket_iam_policy(bucket, &policy).await?;
            debug!(%bucket, %member, "granted transfer service write access");
        }
        Ok(())
    }

    /// Submit a one-shot transfer from `source` into `bucket` and return
    /// the transfer job name.
    ///
    /// The name is derived from `job_id`, so a transfer that was already
    /// submitted for this job is taken over instead of failing.
    pub async fn start_transfer(
        &self,
        job_id: &str,
        source: &TransferSource,
        bucket: &str,
    ) -> Result<String, ProviderError> {
        let request = self.build_transfer_job(job_id, source, bucket, Utc::now().date_naive());
        match self.backend.create_transfer_job(&request).await {
            Ok(created) => {
                info!(%job_id, handle = %created.name, provider = source.provider(), "transfer submitted");
                Ok(created.name)
            }
            Err(e) if e.is_already_exists() => {
                info!(%job_id, handle = %request.name, "transfer already submitted, reusing it");
                Ok(request.name)
            }
            Err(e) => Err(e),
        }
    }

    pub(crate) fn build_transfer_job(
        &self,
        job_id: &str,
        source: &TransferSource,
        bucket: &str,
        today: NaiveDate,
    ) -> TransferJob {
        let data_source = match source {
            TransferSource::Gcloud { bucket: source_bucket } => DataSource::Gcs(GcsData {
                bucket_name: source_bucket.clone(),
            }),
            TransferSource::Aws {
                bucket: source_bucket,
                access_key_id,
                secret_access_key,
            } => DataSource::AwsS3(AwsS3Data {
                bucket_name: source_bucket.clone(),
                aws_access_key: AwsAccessKey {
                    access_key_id: access_key_id.clone(),
                    secret_access_key: secret_access_key.clone(),
                },
            }),
            TransferSource::Azure {
                storage_account,
                container,
                sas_token,
            } => DataSource::AzureBlobStorage(AzureBlobStorageData {
                storage_account: storage_account.clone(),
                container: container.clone(),
                azure_credentials: AzureCredentials {
                    sas_token: sas_token.clone(),
                },
            }),
        };

        let date = Date {
            year: today.year(),
            month: today.month(),
            day: today.day(),
        };

        TransferJob {
            name: transfer_job_name(job_id),
            description: Some(format!("cloudferry job {job_id}")),
            project_id: self.settings.project_id.clone(),
            status: Some("ENABLED".to_string()),
            transfer_spec: TransferSpec {
                data_source,
                gcs_data_sink: GcsData {
                    bucket_name: bucket.to_string(),
                },
            },
            schedule: Some(Schedule {
                schedule_start_date: date,
                schedule_end_date: date,
            }),
            notification_config: Some(NotificationConfig {
                pubsub_topic: self.topic_path(),
                event_types: NOTIFY_EVENTS.iter().map(|e| e.to_string()).collect(),
                payload_format: "JSON".to_string(),
            }),
        }
    }

    fn topic_path(&self) -> String {
        let topic = &self.settings.notification_topic;
        if topic.starts_with("projects/") {
            topic.clone()
        } else {
            format!("projects/{}/topics/{topic}", self.settings.project_id)
        }
    }

    /// The file list of a takeout source, or `NotImplemented` for sources
    /// without an integration.
    pub fn takeout_files<'a>(&self, source: &'a TakeoutSource) -> Result<&'a [TakeoutFile], ProviderError> {
        match source {
            TakeoutSource::Dropbox { files } => Ok(files),
            other => Err(ProviderError::NotImplemented(other.provider())),
        }
    }

    /// Copy every file of a takeout into `bucket`.
    ///
    /// Files are fetched concurrently, bounded by `max_concurrent_downloads`.
    /// Returns only once every file has finished, successfully or not.
    pub async fn start_takeout(&self, source: &TakeoutSource, bucket: &str) -> Result<TakeoutReport, ProviderError> {
        let files = self.takeout_files(source)?;
        let limit = self.settings.max_concurrent_downloads.max(1);

        let results = stream::iter(files.iter().zip(unique_object_names(files)))
            .map(|(file, object)| async move {
                let result = self.backend.copy_url_to_bucket(&file.link, bucket, &object).await;
                (object, result)
            })
            .buffer_unordered(limit)
            .collect::<Vec<_>>()
            .await;

        let mut report = TakeoutReport::default();
        for (object, result) in results {
            match result {
                Ok(()) => report.copied.push(object),
                Err(e) => {
                    warn!(%bucket, %object, error = %e, "takeout file failed");
                    report.failed.push((object, e));
                }
            }
        }
        report.copied.sort();
        report.failed.sort_by(|a, b| a.0.cmp(&b.0));
        Ok(report)
    }

    /// Lazily enumerate the objects in `bucket`, one backend page at a time.
    pub fn list_artifacts<'a>(&'a self, bucket: &'a str) -> impl Stream<Item = Result<Artifact, ProviderError>> + 'a {
        // None: done. Some(None): first page. Some(Some(token)): next page.
        stream::try_unfold(Some(None::<String>), move |cursor| async move {
            let Some(token) = cursor else {
                return Ok::<_, ProviderError>(None);
            };
            let page = self.backend.list_objects(bucket, token.as_deref()).await?;
            let artifacts = page
                .items
                .into_iter()
                .map(|item| {
                    Ok(Artifact {
                        bucket: bucket.to_string(),
                        size: item.size.as_deref().and_then(|s| s.parse().ok()),
                        name: item.name,
                    })
                })
                .collect::<Vec<Result<Artifact, ProviderError>>>();
            Ok::<_, ProviderError>(Some((stream::iter(artifacts), page.next_page_token.map(Some))))
        })
        .try_flatten()
    }

    /// Time-bounded link to one artifact.
    pub fn sign_url(&self, artifact: &Artifact) -> Result<String, ProviderError> {
        self.backend.sign_url(&artifact.bucket, &artifact.name)
    }
}

/// Object names for a takeout batch, in file order. Later files whose name is
/// already taken get `-1`, `-2`, ... before the extension.
fn unique_object_names(files: &[TakeoutFile]) -> Vec<String> {
    let mut taken = HashSet::new();
    files
        .iter()
        .map(|file| {
            let name = file.object_name();
            let mut candidate = name.clone();
            let mut n = 0;
            while !taken.insert(candidate.clone()) {
                n += 1;
                candidate = match name.rfind('.') {
                    Some(dot) if dot > 0 => format!("{}-{n}{}", &name[..dot], &name[dot..]),
                    _ => format!("{name}-{n}"),
                };
            }
            candidate
        })
        .collect()
}

/// Transfer job names must look like `transferJobs/[A-Za-z0-9-._~]*[A-Za-z0-9]`
/// and must not start with `transferJobs/OPI`.
fn transfer_job_name(job_id: &str) -> String {
    let mut suffix: String = job_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '.' | '_' | '~') {
                c
            } else {
                '-'
            }
        })
        .collect();
    while suffix.ends_with(|c: char| !c.is_ascii_alphanumeric()) {
        suffix.pop();
    }
    if suffix.is_empty() || suffix.starts_with("OPI") {
        suffix.insert_str(0, "job-");
        if suffix.ends_with('-') {
            suffix.push('0');
        }
    }
    format!("transferJobs/{suffix}")
}
