use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::state::JobStatus;
use crate::error::ValidationError;

/// Opaque credential material attached to a transfer job.
///
/// AWS sources use the access key pair; Azure sources use the container
/// name and a SAS token. Google Cloud sources need none of it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CredentialRef {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_access_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub container: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sas_token: Option<String>,
}

/// A file to pull in during a takeout, as handed over by the source's picker.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TakeoutFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub link: String,
}

impl TakeoutFile {
    /// Object name to store the file under: the explicit name, or the last
    /// path segment of the link.
    pub fn object_name(&self) -> String {
        if let Some(name) = self.name.as_deref().filter(|n| !n.trim().is_empty()) {
            return name.to_string();
        }
        let path = self.link.split(['?', '#']).next().unwrap_or_default();
        path.trim_end_matches('/')
            .rsplit('/')
            .next()
            .filter(|s| !s.is_empty())
            .unwrap_or("download")
            .to_string()
    }
}

/// A signed link to one output artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessUrl {
    pub name: String,
    pub url: String,
}

/// The persisted job document, as written by the front-end.
///
/// Fields are loosely typed on purpose: the record is validated into a
/// [`Job`] before any handler acts on it. Unknown fields are kept in
/// `extra` so merges never drop data written by other parties.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub job_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub credential_ref: Option<CredentialRef>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<TakeoutFile>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external_job_handle: Option<String>,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub access_urls: Vec<AccessUrl>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error_details: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub owner_id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl JobRecord {
    /// Merge a partial update into this record. Fields left as `None` in the
    /// patch are untouched.
    pub fn apply(&mut self, patch: JobPatch) {
        if let Some(handle) = patch.external_job_handle {
            self.external_job_handle = Some(handle);
        }
        if let Some(status) = patch.status {
            self.status = status;
        }
        if let Some(completed_at) = patch.completed_at {
            self.completed_at = Some(completed_at);
        }
        if let Some(access_urls) = patch.access_urls {
            self.access_urls = access_urls;
        }
        if let Some(error_details) = patch.error_details {
            self.error_details = error_details;
        }
    }
}

/// A field-level update to a [`JobRecord`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct JobPatch {
    pub external_job_handle: Option<String>,
    pub status: Option<JobStatus>,
    pub completed_at: Option<DateTime<Utc>>,
    pub access_urls: Option<Vec<AccessUrl>>,
    pub error_details: Option<Vec<String>>,
}

impl JobPatch {
    /// Patch recorded once the provider accepted the job.
    pub fn dispatched(handle: impl Into<String>) -> Self {
        Self {
            external_job_handle: Some(handle.into()),
            status: Some(JobStatus::InProgress),
            ..Default::default()
        }
    }

    /// Patch recorded when the job reaches a terminal status.
    pub fn completed(status: JobStatus, at: DateTime<Utc>, error_details: Vec<String>) -> Self {
        Self {
            status: Some(status),
            completed_at: Some(at),
            error_details: Some(error_details),
            ..Default::default()
        }
    }

    /// Patch replacing the full set of access links.
    pub fn access_urls(urls: Vec<AccessUrl>) -> Self {
        Self {
            access_urls: Some(urls),
            ..Default::default()
        }
    }
}

/// Where a transfer reads from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferSource {
    Gcloud {
        bucket: String,
    },
    Aws {
        bucket: String,
        access_key_id: String,
        secret_access_key: String,
    },
    Azure {
        storage_account: String,
        container: String,
        sas_token: String,
    },
}

impl TransferSource {
    pub fn provider(&self) -> &'static str {
        match self {
            TransferSource::Gcloud { .. } => "gcloud",
            TransferSource::Aws { .. } => "aws",
            TransferSource::Azure { .. } => "azure",
        }
    }
}

/// Where a takeout exports from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TakeoutSource {
    Dropbox { files: Vec<TakeoutFile> },
    GoogleDrive,
    OneDrive,
}

impl TakeoutSource {
    pub fn provider(&self) -> &'static str {
        match self {
            TakeoutSource::Dropbox { .. } => "dropbox",
            TakeoutSource::GoogleDrive => "gdrive",
            TakeoutSource::OneDrive => "odrive",
        }
    }
}

/// What a job does, keyed on its type and source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum JobSpec {
    Transfer(TransferSource),
    Takeout(TakeoutSource),
}

/// A validated job.
#[derive(Debug, Clone, PartialEq)]
pub struct Job {
    pub id: String,
    pub name: String,
    pub spec: JobSpec,
    pub status: JobStatus,
    pub external_job_handle: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
    pub owner_id: Option<String>,
}

impl TryFrom<&JobRecord> for Job {
    type Error = ValidationError;

    fn try_from(record: &JobRecord) -> Result<Self, Self::Error> {
        if record.id.trim().is_empty() {
            return Err(ValidationError::MissingField("id"));
        }
        let name = record
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or(ValidationError::EmptyName)?;

        let job_type = required(&record.job_type, "type")?;
        let source = required(&record.source, "source")?.to_ascii_lowercase();

        let spec = match job_type.to_ascii_lowercase().as_str() {
            "transfer" => JobSpec::Transfer(transfer_source(record, &source)?),
            "takeout" => JobSpec::Takeout(takeout_source(record, &source)?),
            other => return Err(ValidationError::UnknownType(other.to_string())),
        };

        Ok(Self {
            id: record.id.clone(),
            name: name.to_string(),
            spec,
            status: record.status,
            external_job_handle: record.external_job_handle.clone(),
            created_at: record.created_at,
            owner_id: record.owner_id.clone(),
        })
    }
}

fn required<'a>(value: &'a Option<String>, field: &'static str) -> Result<&'a str, ValidationError> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(ValidationError::MissingField(field))
}

fn transfer_source(record: &JobRecord, source: &str) -> Result<TransferSource, ValidationError> {
    let creds = record.credential_ref.clone().unwrap_or_default();
    match source {
        "gcloud" => Ok(TransferSource::Gcloud {
            bucket: required(&record.source_name, "sourceName")?.to_string(),
        }),
        "aws" => Ok(TransferSource::Aws {
            bucket: required(&record.source_name, "sourceName")?.to_string(),
            access_key_id: required(&creds.access_key_id, "credentialRef.accessKeyId")?.to_string(),
            secret_access_key: required(&creds.secret_access_key, "credentialRef.secretAccessKey")?
                .to_string(),
        }),
        "azure" => Ok(TransferSource::Azure {
            storage_account: required(&record.source_name, "sourceName")?.to_string(),
            container: required(&creds.container, "credentialRef.container")?.to_string(),
            sas_token: required(&creds.sas_token, "credentialRef.sasToken")?.to_string(),
        }),
        other => Err(ValidationError::UnsupportedSource {
            job_type: "transfer",
            provider: other.to_string(),
        }),
    }
}

fn takeout_source(record: &JobRecord, source: &str) -> Result<TakeoutSource, ValidationError> {
    match source {
        "dropbox" => {
            if record.files.is_empty() {
                return Err(ValidationError::NoFiles);
            }
            Ok(TakeoutSource::Dropbox {
                files: record.files.clone(),
            })
        }
        "gdrive" => Ok(TakeoutSource::GoogleDrive),
        "odrive" => Ok(TakeoutSource::OneDrive),
        other => Err(ValidationError::UnsupportedSource {
            job_type: "takeout",
            provider: other.to_string(),
        }),
    }
}
