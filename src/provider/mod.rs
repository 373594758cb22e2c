pub mod adapter;
pub mod client;
pub mod error;
#[cfg(test)]
pub(crate) mod mock;
pub mod signing;
pub mod types;

pub use adapter::{DestinationSettings, ProviderAdapter};
pub use client::GcpClient;
pub use error::ProviderError;
pub use signing::UrlSigner;
pub use types::{Artifact, BucketRequest, IamPolicy, ObjectPage, TransferJob};

/// Raw operations against the storage and transfer backends.
///
/// [`GcpClient`] talks to the real REST endpoints; tests provide in-memory
/// implementations. Provider-specific decisions live in [`ProviderAdapter`],
/// not here.
#[allow(async_fn_in_trait)]
pub trait CloudBackend {
    /// Create a bucket. Must return [`ProviderError::AlreadyExists`] when it
    /// is already there.
    async fn create_bucket(&self, request: &BucketRequest) -> Result<(), ProviderError>;

    /// Email of the service account the transfer service acts as.
    async fn transfer_service_account(&self) -> Result<String, ProviderError>;

    async fn bucket_iam_policy(&self, bucket: &str) -> Result<IamPolicy, ProviderError>;

    async fn set_bucket_iam_policy(&self, bucket: &str, policy: &IamPolicy) -> Result<(), ProviderError>;

    /// Submit a transfer job and return it as the backend stored it.
    async fn create_transfer_job(&self, job: &TransferJob) -> Result<TransferJob, ProviderError>;

    /// Fetch one page of objects. `page_token` is `None` for the first page.
    async fn list_objects(&self, bucket: &str, page_token: Option<&str>) -> Result<ObjectPage, ProviderError>;

    /// Download `url` and store it as `bucket/object`.
    async fn copy_url_to_bucket(&self, url: &str, bucket: &str, object: &str) -> Result<(), ProviderError>;

    /// Time-bounded GET link for `bucket/object`.
    fn sign_url(&self, bucket: &str, object: &str) -> Result<String, ProviderError>;
}
