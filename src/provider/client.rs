use std::time::Duration;

use chrono::Utc;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::debug;

use super::error::ProviderError;
use super::signing::UrlSigner;
use super::types::{BucketRequest, IamPolicy, ObjectPage, ServiceAccount, TransferJob};
use super::CloudBackend;

/// REST client for Cloud Storage and the Storage Transfer Service.
pub struct GcpClient {
    client: Client,
    access_token: String,
    project_id: String,
    storage_url: String,
    transfer_url: String,
    signer: Option<UrlSigner>,
}

impl GcpClient {
    /// Create a client for the given Cloud Storage and Storage Transfer
    /// endpoints.
    pub fn with_base_urls(
        project_id: String,
        access_token: String,
        storage_url: String,
        transfer_url: String,
    ) -> Result<Self, ProviderError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(300))
            .build()?;
        Ok(Self {
            client,
            access_token,
            project_id,
            storage_url: storage_url.trim_end_matches('/').to_string(),
            transfer_url: transfer_url.trim_end_matches('/').to_string(),
            signer: None,
        })
    }

    /// Attach the HMAC signer used for access links.
    pub fn with_signer(mut self, signer: UrlSigner) -> Self {
        self.signer = Some(signer);
        self
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        if self.access_token.is_empty() {
            builder
        } else {
            builder.bearer_auth(&self.access_token)
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, ProviderError> {
        let response = self.authorized(builder).send().await?;
        let status = response.status();

        if status == StatusCode::CONFLICT {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "conflict".to_string());
            return Err(ProviderError::AlreadyExists(message));
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(ProviderError::ApiError {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    async fn decode<T: DeserializeOwned>(response: Response) -> Result<T, ProviderError> {
        let body = response.bytes().await?;
        serde_json::from_slice(&body).map_err(|e| ProviderError::Decode(e.to_string()))
    }
}

impl CloudBackend for GcpClient {
    async fn create_bucket(&self, request: &BucketRequest) -> Result<(), ProviderError> {
        let url = format!("{}/storage/v1/b", self.storage_url);
        let builder = self
            .client
            .post(url)
            .query(&[("project", self.project_id.as_str())])
            .json(request);
        self.send(builder).await?;
        debug!(bucket = %request.name, "bucket created");
        Ok(())
    }

    async fn transfer_service_account(&self) -> Result<String, ProviderError> {
        let url = format!("{}/v1/googleServiceAccounts/{}", self.transfer_url, self.project_id);
        let account: ServiceAccount = Self::decode(self.send(self.client.get(url)).await?).await?;
        Ok(account.account_email)
    }

    async fn bucket_iam_policy(&self, bucket: &str) -> Result<IamPolicy, ProviderError> {
        let url = format!("{}/storage/v1/b/{bucket}/iam", self.storage_url);
        Self::decode(self.send(self.client.get(url)).await?).await
    }

    async fn set_bucket_iam_policy(&self, bucket: &str, policy: &IamPolicy) -> Result<(), ProviderError> {
        let url = format!("{}/storage/v1/b/{bucket}/iam", self.storage_url);
        self.send(self.client.put(url).json(policy)).await?;
        Ok(())
    }

    async fn create_transfer_job(&self, job: &TransferJob) -> Result<TransferJob, ProviderError> {
        let url = format!("{}/v1/transferJobs", self.transfer_url);
        Self::decode(self.send(self.client.post(url).json(job)).await?).await
    }

    async fn list_objects(&self, bucket: &str, page_token: Option<&str>) -> Result<ObjectPage, ProviderError> {
        let url = format!("{}/storage/v1/b/{bucket}/o", self.storage_url);
        let mut builder = self.client.get(url);
        if let Some(token) = page_token {
            builder = builder.query(&[("pageToken", token)]);
        }
        Self::decode(self.send(builder).await?).await
    }

    async fn copy_url_to_bucket(&self, url: &str, bucket: &str, object: &str) -> Result<(), ProviderError> {
        let download_error = |reason: String| ProviderError::Download {
            url: url.to_string(),
            reason,
        };

        // Source links are public share links; no bearer token.
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| download_error(e.to_string()))?;
        if !response.status().is_success() {
            return Err(download_error(format!("HTTP {}", response.status().as_u16())));
        }
        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("application/octet-stream")
            .to_string();
        let body = response
            .bytes()
            .await
            .map_err(|e| download_error(e.to_string()))?;

        let upload_url = format!("{}/upload/storage/v1/b/{bucket}/o", self.storage_url);
        let builder = self
            .client
            .post(upload_url)
            .query(&[("uploadType", "media"), ("name", object)])
            .header(reqwest::header::CONTENT_TYPE, content_type)
            .body(body);
        self.send(builder).await?;
        debug!(%bucket, %object, "takeout file stored");
        Ok(())
    }

    fn sign_url(&self, bucket: &str, object: &str) -> Result<String, ProviderError> {
        match &self.signer {
            Some(signer) => signer.sign(bucket, object, Utc::now()),
            None => Err(ProviderError::Signing {
                object: object.to_string(),
                reason: "no HMAC key configured".to_string(),
            }),
        }
    }
}
