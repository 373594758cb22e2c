//! Error types for the cloud provider boundary.
//!
//! Defines [`ProviderError`] with variants for API rejections, network
//! failures, and the adapter-level failures a handler needs to tell apart.
//! Uses `thiserror` to derive `Display` and `Error` from the `#[error(...)]`
//! attributes.

use thiserror::Error;

/// Errors that can occur while talking to the storage or transfer backends.
///
/// The variants cover:
/// - [`AlreadyExists`](ProviderError::AlreadyExists): the resource exists (HTTP 409)
/// - [`ApiError`](ProviderError::ApiError): any other HTTP error (4xx/5xx)
/// - [`NetworkError`](ProviderError::NetworkError): failure in the network layer
/// - [`NotImplemented`](ProviderError::NotImplemented): a source with no backing integration
#[derive(Debug, Error)]
pub enum ProviderError {
    /// The bucket (or transfer job) already exists.
    #[error("resource already exists: {0}")]
    AlreadyExists(String),

    /// Error returned by the API (e.g. 401 bad token, 403 missing permission).
    /// Carries the HTTP status and the response body.
    #[error("API error (status {status}): {message}")]
    ApiError { status: u16, message: String },

    /// Underlying network failure (DNS, connection refused, timeout).
    #[error("network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// A takeout file could not be fetched from its source link.
    #[error("download of {url} failed: {reason}")]
    Download { url: String, reason: String },

    /// The takeout source is known but has no integration yet.
    #[error("takeout source `{0}` is not implemented")]
    NotImplemented(&'static str),

    /// A signed URL could not be produced.
    #[error("failed to sign URL for {object}: {reason}")]
    Signing { object: String, reason: String },

    /// The backend answered with something we could not read.
    #[error("failed to decode provider response: {0}")]
    Decode(String),
}

impl ProviderError {
    /// Whether the error means the resource is already there.
    pub fn is_already_exists(&self) -> bool {
        matches!(self, ProviderError::AlreadyExists(_))
    }
}
