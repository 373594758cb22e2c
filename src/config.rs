//! cloudferry configuration loaded from `cloudferry.toml`.
//!
//! [`CloudferryConfig`] holds every tunable. Fields missing from the file
//! fall back to defaults. Secrets and the project id can also come from the
//! environment, which takes precedence over the file.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::provider::DestinationSettings;

/// Default configuration file, looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "cloudferry.toml";

/// Top-level configuration loaded from `cloudferry.toml`.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CloudferryConfig {
    /// Project that owns the destination buckets and transfer jobs.
    pub project_id: String,

    /// Location of newly created destination buckets.
    pub region: String,

    pub storage_class: String,

    /// Pub/Sub topic transfer completions are published to. Either a bare
    /// topic name or a full `projects/<p>/topics/<t>` path.
    pub notification_topic: String,

    /// Directory holding one JSON document per job.
    pub store_dir: PathBuf,

    /// Validity of signed artifact links, in seconds (at most 7 days).
    pub signed_url_ttl_secs: u64,

    /// Upper bound on concurrent downloads during a takeout.
    pub max_concurrent_downloads: usize,

    pub storage_api_url: String,
    pub transfer_api_url: String,

    /// OAuth bearer token for the Cloud APIs.
    pub access_token: String,

    /// HMAC key used to sign artifact links.
    pub hmac_access_id: String,
    pub hmac_secret: String,
}

impl Default for CloudferryConfig {
    fn default() -> Self {
        Self {
            project_id: "cloudferry".to_string(),
            region: "asia-east2".to_string(),
            storage_class: "STANDARD".to_string(),
            notification_topic: "jobs".to_string(),
            store_dir: PathBuf::from(".cloudferry/jobs"),
            signed_url_ttl_secs: 7 * 24 * 60 * 60,
            max_concurrent_downloads: 4,
            storage_api_url: "https://storage.googleapis.com".to_string(),
            transfer_api_url: "https://storagetransfer.googleapis.com".to_string(),
            access_token: String::new(),
            hmac_access_id: String::new(),
            hmac_secret: String::new(),
        }
    }
}

impl CloudferryConfig {
    /// Load from `path`, or from `cloudferry.toml` in the working directory.
    ///
    /// A missing default file yields the defaults; an explicitly given file
    /// must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (p, true),
            None => (Path::new(DEFAULT_CONFIG_FILE), false),
        };
        let mut config = if explicit || path.exists() {
            let contents = std::fs::read_to_string(path)
                .with_context(|| format!("failed to read {}", path.display()))?;
            toml::from_str::<CloudferryConfig>(&contents)
                .with_context(|| format!("invalid configuration in {}", path.display()))?
        } else {
            Self::default()
        };

        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Override fields from environment variables. Empty values are ignored.
    fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let fields = [
            ("GOOGLE_OAUTH_ACCESS_TOKEN", &mut self.access_token),
            ("CLOUDFERRY_HMAC_ACCESS_ID", &mut self.hmac_access_id),
            ("CLOUDFERRY_HMAC_SECRET", &mut self.hmac_secret),
            ("CLOUDFERRY_PROJECT_ID", &mut self.project_id),
        ];
        for (key, field) in fields {
            if let Some(value) = lookup(key).filter(|v| !v.is_empty()) {
                *field = value;
            }
        }
    }

    pub fn signed_url_ttl(&self) -> Duration {
        Duration::from_secs(self.signed_url_ttl_secs)
    }

    /// Whether artifact links can be signed.
    pub fn has_signing_key(&self) -> bool {
        !self.hmac_access_id.is_empty() && !self.hmac_secret.is_empty()
    }

    pub fn destination_settings(&self) -> DestinationSettings {
        DestinationSettings {
            project_id: self.project_id.clone(),
            location: self.region.clone(),
            storage_class: self.storage_class.clone(),
            notification_topic: self.notification_topic.clone(),
            max_concurrent_downloads: self.max_concurrent_downloads,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn default_config_values() {
        let config = CloudferryConfig::default();
        assert_eq!(config.project_id, "cloudferry");
        assert_eq!(config.region, "asia-east2");
        assert_eq!(config.notification_topic, "jobs");
        assert_eq!(config.signed_url_ttl(), Duration::from_secs(604_800));
        assert_eq!(config.max_concurrent_downloads, 4);
        assert!(!config.has_signing_key());
    }

    #[test]
    fn deserialize_partial_toml() {
        let toml_str = r#"
            project_id = "acme-prod"
            region = "europe-west1"
            max_concurrent_downloads = 8
        "#;
        let config: CloudferryConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.project_id, "acme-prod");
        assert_eq!(config.region, "europe-west1");
        assert_eq!(config.max_concurrent_downloads, 8);
        assert_eq!(config.storage_class, "STANDARD");
        assert_eq!(config.store_dir, PathBuf::from(".cloudferry/jobs"));
    }

    #[test]
    fn env_overrides_file_values() {
        let mut config = CloudferryConfig {
            hmac_access_id: "from-file".into(),
            ..Default::default()
        };
        let env: HashMap<&str, &str> = [
            ("CLOUDFERRY_HMAC_ACCESS_ID", "GOOG1EXAMPLE"),
            ("CLOUDFERRY_HMAC_SECRET", "s3cr3t"),
            ("CLOUDFERRY_PROJECT_ID", ""),
        ]
        .into();
        config.apply_env(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(config.hmac_access_id, "GOOG1EXAMPLE");
        assert_eq!(config.hmac_secret, "s3cr3t");
        assert_eq!(config.project_id, "cloudferry");
        assert!(config.has_signing_key());
    }

    #[test]
    fn load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "notification_topic = \"projects/acme/topics/done\"\n").unwrap();

        let config = CloudferryConfig::load(Some(&path)).unwrap();
        assert_eq!(config.notification_topic, "projects/acme/topics/done");
        assert_eq!(config.destination_settings().location, "asia-east2");
    }

    #[test]
    fn load_rejects_missing_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(CloudferryConfig::load(Some(&dir.path().join("nope.toml"))).is_err());
    }
}
