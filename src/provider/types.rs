//! Request and response types for the Cloud Storage and Storage Transfer APIs.
//!
//! All structs derive `Serialize`/`Deserialize` and use the camelCase field
//! names the Google REST endpoints expect.

use serde::{Deserialize, Serialize};

/// Request body for `POST /storage/v1/b`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BucketRequest {
    pub name: String,
    pub location: String,
    pub storage_class: String,
}

/// A bucket IAM policy as returned by `GET /storage/v1/b/{bucket}/iam`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct IamPolicy {
    #[serde(default)]
    pub bindings: Vec<IamBinding>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub etag: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IamBinding {
    pub role: String,
    #[serde(default)]
    pub members: Vec<String>,
}

impl IamPolicy {
    /// Add `member` to `role`. Returns `false` when the binding was already present.
    pub fn grant(&mut self, role: &str, member: &str) -> bool {
        match self.bindings.iter_mut().find(|b| b.role == role) {
            Some(binding) if binding.members.iter().any(|m| m == member) => false,
            Some(binding) => {
                binding.members.push(member.to_string());
                true
            }
            None => {
                self.bindings.push(IamBinding {
                    role: role.to_string(),
                    members: vec![member.to_string()],
                });
                true
            }
        }
    }
}

/// Response of `GET /v1/googleServiceAccounts/{projectId}`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceAccount {
    pub account_email: String,
}

/// A Storage Transfer job, used both as request body and response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferJob {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub project_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    pub transfer_spec: TransferSpec,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schedule: Option<Schedule>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notification_config: Option<NotificationConfig>,
}

/// What to copy and where to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferSpec {
    #[serde(flatten)]
    pub data_source: DataSource,
    pub gcs_data_sink: GcsData,
}

/// The provider-specific half of a transfer spec. Serialized as exactly one
/// of `gcsDataSource`, `awsS3DataSource` or `azureBlobStorageDataSource`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum DataSource {
    #[serde(rename = "gcsDataSource")]
    Gcs(GcsData),
    #[serde(rename = "awsS3DataSource")]
    AwsS3(AwsS3Data),
    #[serde(rename = "azureBlobStorageDataSource")]
    AzureBlobStorage(AzureBlobStorageData),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GcsData {
    pub bucket_name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsS3Data {
    pub bucket_name: String,
    pub aws_access_key: AwsAccessKey,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AwsAccessKey {
    pub access_key_id: String,
    pub secret_access_key: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureBlobStorageData {
    pub storage_account: String,
    pub container: String,
    pub azure_credentials: AzureCredentials,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AzureCredentials {
    pub sas_token: String,
}

/// A calendar date in the shape the transfer API uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Date {
    pub year: i32,
    pub month: u32,
    pub day: u32,
}

/// One-shot schedule: start and end on the same day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schedule {
    pub schedule_start_date: Date,
    pub schedule_end_date: Date,
}

/// Where the transfer service publishes operation results.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationConfig {
    pub pubsub_topic: String,
    pub event_types: Vec<String>,
    pub payload_format: String,
}

/// One page of `GET /storage/v1/b/{bucket}/o`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectPage {
    #[serde(default)]
    pub items: Vec<ObjectInfo>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub next_page_token: Option<String>,
}

/// Metadata for a stored object. The JSON API reports sizes as strings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectInfo {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
}

/// An output object of a job, ready to be signed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub bucket: String,
    pub name: String,
    pub size: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn transfer_spec_flattens_data_source() {
        let spec = TransferSpec {
            data_source: DataSource::AwsS3(AwsS3Data {
                bucket_name: "src".into(),
                aws_access_key: AwsAccessKey {
                    access_key_id: "AKIA".into(),
                    secret_access_key: "secret".into(),
                },
            }),
            gcs_data_sink: GcsData {
                bucket_name: "dst".into(),
            },
        };
        let json = serde_json::to_value(&spec).unwrap();
        assert_eq!(json["awsS3DataSource"]["bucketName"], "src");
        assert_eq!(json["awsS3DataSource"]["awsAccessKey"]["accessKeyId"], "AKIA");
        assert_eq!(json["gcsDataSink"]["bucketName"], "dst");
        assert!(json.get("gcsDataSource").is_none());
    }

    #[test]
    fn object_page_deserialize_from_api_format() {
        let api_json = r#"{
            "kind": "storage#objects",
            "items": [{"kind": "storage#object", "name": "a.txt", "size": "12"}],
            "nextPageToken": "tok"
        }"#;
        let page: ObjectPage = serde_json::from_str(api_json).unwrap();
        assert_eq!(page.items[0].name, "a.txt");
        assert_eq!(page.items[0].size.as_deref(), Some("12"));
        assert_eq!(page.next_page_token.as_deref(), Some("tok"));
    }

    #[test]
    fn empty_bucket_listing_has_no_items_field() {
        let page: ObjectPage = serde_json::from_str(r#"{"kind":"storage#objects"}"#).unwrap();
        assert!(page.items.is_empty());
        assert!(page.next_page_token.is_none());
    }

    #[test]
    fn iam_grant_is_idempotent() {
        let mut policy = IamPolicy::default();
        assert!(policy.grant("roles/storage.legacyBucketWriter", "serviceAccount:sa@x"));
        assert!(!policy.grant("roles/storage.legacyBucketWriter", "serviceAccount:sa@x"));
        assert!(policy.grant("roles/storage.legacyBucketWriter", "serviceAccount:other@x"));
        assert_eq!(policy.bindings.len(), 1);
        assert_eq!(policy.bindings[0].members.len(), 2);
    }
}
