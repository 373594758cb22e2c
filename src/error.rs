use thiserror::Error;

use crate::provider::ProviderError;
use crate::state_machine::JobStatus;

/// A job record that cannot be turned into a typed job.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("job name must not be empty")]
    EmptyName,

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("unknown job type: {0}")]
    UnknownType(String),

    #[error("unsupported {job_type} source: {provider}")]
    UnsupportedSource {
        job_type: &'static str,
        provider: String,
    },

    #[error("takeout job lists no files")]
    NoFiles,
}

/// Errors raised by a [`JobStore`](crate::store::JobStore) implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("Job already exists: {0}")]
    Conflict(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Everything that can stop a handler from moving a job forward.
///
/// Handlers never let these escape: they are logged at the handler boundary
/// and reported through the handler's outcome.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error("invalid job: {0}")]
    Validation(#[from] ValidationError),

    #[error("failed to provision destination: {0}")]
    Provision(#[source] ProviderError),

    #[error("provider rejected the job: {0}")]
    Adapter(#[source] ProviderError),

    #[error("failed to enumerate artifacts: {0}")]
    Artifacts(#[source] ProviderError),

    #[error("Job not found: {0}")]
    NotFound(String),

    #[error("job is not finished yet (status {0})")]
    NotTerminal(JobStatus),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}

/// A notification payload that cannot be decoded.
#[derive(Debug, Error)]
pub enum NotificationError {
    #[error("notification payload is empty")]
    Empty,

    #[error("notification data is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("notification is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("notification has no transferJobName")]
    MissingJobName,
}
