//! In-memory [`CloudBackend`] for tests.

use std::collections::{BTreeMap, BTreeSet, HashMap, HashSet};
use std::sync::{Mutex, MutexGuard};

use super::adapter::DestinationSettings;
use super::error::ProviderError;
use super::types::{BucketRequest, IamPolicy, ObjectInfo, ObjectPage, TransferJob};
use super::CloudBackend;

#[derive(Debug)]
pub struct MockState {
    pub buckets: BTreeMap<String, BTreeSet<String>>,
    pub policies: HashMap<String, IamPolicy>,
    pub transfer_jobs: Vec<TransferJob>,
    pub failing_links: HashSet<String>,
    pub unsignable: HashSet<String>,
    pub fail_create_bucket: bool,
    pub reject_transfers: bool,
    pub page_size: usize,
    pub set_policy_calls: usize,
    pub list_calls: usize,
    pub sign_calls: usize,
}

impl Default for MockState {
    fn default() -> Self {
        Self {
            buckets: BTreeMap::new(),
            policies: HashMap::new(),
            transfer_jobs: Vec::new(),
            failing_links: HashSet::new(),
            unsignable: HashSet::new(),
            fail_create_bucket: false,
            reject_transfers: false,
            page_size: 2,
            set_policy_calls: 0,
            list_calls: 0,
            sign_calls: 0,
        }
    }
}

#[derive(Debug, Default)]
pub struct MockBackend {
    state: Mutex<MockState>,
}

impl MockBackend {
    pub const SERVICE_ACCOUNT: &'static str = "sts@acme.iam.gserviceaccount.com";

    pub fn settings() -> DestinationSettings {
        DestinationSettings {
            project_id: "acme".into(),
            location: "asia-east2".into(),
            storage_class: "STANDARD".into(),
            notification_topic: "jobs".into(),
            max_concurrent_downloads: 4,
        }
    }

    pub fn with_objects(self, bucket: &str, names: &[&str]) -> Self {
        self.state().buckets.insert(
            bucket.to_string(),
            names.iter().map(|n| n.to_string()).collect(),
        );
        self
    }

    pub fn state(&self) -> MutexGuard<'_, MockState> {
        self.state.lock().unwrap()
    }
}

impl CloudBackend for MockBackend {
    async fn create_bucket(&self, request: &BucketRequest) -> Result<(), ProviderError> {
        let mut state = self.state();
        if state.fail_create_bucket {
            return Err(ProviderError::ApiError {
                status: 403,
                message: "storage.buckets.create denied".into(),
            });
        }
        if state.buckets.contains_key(&request.name) {
            return Err(ProviderError::AlreadyExists(request.name.clone()));
        }
        state.buckets.insert(request.name.clone(), BTreeSet::new());
        Ok(())
    }

    async fn transfer_service_account(&self) -> Result<String, ProviderError> {
        Ok(Self::SERVICE_ACCOUNT.to_string())
    }

    async fn bucket_iam_policy(&self, bucket: &str) -> Result<IamPolicy, ProviderError> {
        Ok(self.state().policies.get(bucket).cloned().unwrap_or_default())
    }

    async fn set_bucket_iam_policy(&self, bucket: &str, policy: &IamPolicy) -> Result<(), ProviderError> {
        let mut state = self.state();
        state.set_policy_calls += 1;
        state.policies.insert(bucket.to_string(), policy.clone());
        Ok(())
    }

    async fn create_transfer_job(&self, job: &TransferJob) -> Result<TransferJob, ProviderError> {
        let mut state = self.state();
        if state.reject_transfers {
            return Err(ProviderError::ApiError {
                status: 400,
                message: "invalid transfer spec".into(),
            });
        }
        if state.transfer_jobs.iter().any(|j| j.name == job.name) {
            return Err(ProviderError::AlreadyExists(job.name.clone()));
        }
        state.transfer_jobs.push(job.clone());
        Ok(job.clone())
    }

    async fn list_objects(&self, bucket: &str, page_token: Option<&str>) -> Result<ObjectPage, ProviderError> {
        let mut state = self.state();
        state.list_calls += 1;
        let page_size = state.page_size;
        let Some(objects) = state.buckets.get(bucket) else {
            return Err(ProviderError::ApiError {
                status: 404,
                message: format!("bucket {bucket} not found"),
            });
        };
        let start: usize = page_token.map(|t| t.parse().unwrap()).unwrap_or(0);
        let items: Vec<ObjectInfo> = objects
            .iter()
            .skip(start)
            .take(page_size)
            .map(|name| ObjectInfo {
                name: name.clone(),
                size: Some("1".into()),
            })
            .collect();
        let next = start + page_size;
        Ok(ObjectPage {
            items,
            next_page_token: (next < objects.len()).then(|| next.to_string()),
        })
    }

    async fn copy_url_to_bucket(&self, url: &str, bucket: &str, object: &str) -> Result<(), ProviderError> {
        let mut state = self.state();
        if state.failing_links.contains(url) {
            return Err(ProviderError::Download {
                url: url.to_string(),
                reason: "HTTP 404".into(),
            });
        }
        state
            .buckets
            .entry(bucket.to_string())
            .or_default()
            .insert(object.to_string());
        Ok(())
    }

    fn sign_url(&self, bucket: &str, object: &str) -> Result<String, ProviderError> {
        let mut state = self.state();
        if state.unsignable.contains(object) {
            return Err(ProviderError::Signing {
                object: object.to_string(),
                reason: "key revoked".into(),
            });
        }
        state.sign_calls += 1;
        Ok(format!(
            "https://signed.example/{bucket}/{object}?sig={}",
            state.sign_calls
        ))
    }
}
