//! Destination bucket naming.
//!
//! Every job writes into its own bucket. The name is derived from the job id
//! alone (plus the configured project id), so the dispatcher and the artifact
//! resolver compute the same name without sharing any state.

/// Maximum bucket name length accepted by Cloud Storage.
const MAX_BUCKET_LEN: usize = 63;

/// Number of hex characters of the digest kept in the name (128 bits).
const HASH_HEX_LEN: usize = 32;

/// Prefix used when the project id sanitizes down to nothing.
const FALLBACK_PREFIX: &str = "job";

/// Derive the destination bucket name for a job.
///
/// The result is `<prefix>-<hash>` where `hash` is the first 128 bits of the
/// BLAKE3 digest of `job_id` in lowercase hex, and `prefix` is `project_id`
/// rewritten to satisfy bucket naming rules.
pub fn bucket_name(project_id: &str, job_id: &str) -> String {
    let digest = blake3::hash(job_id.as_bytes()).to_hex();
    let hash = &digest.as_str()[..HASH_HEX_LEN];
    let prefix = sanitize_prefix(project_id, MAX_BUCKET_LEN - HASH_HEX_LEN - 1);
    format!("{prefix}-{hash}")
}

// Lowercase, map anything outside [a-z0-9-] to '-', collapse dashes, and keep
// clear of the reserved "goog" prefix and "google" substring.
fn sanitize_prefix(project_id: &str, max_len: usize) -> String {
    let mut out = String::with_capacity(project_id.len());
    for c in project_id.chars().flat_map(char::to_lowercase) {
        let c = if c.is_ascii_lowercase() || c.is_ascii_digit() {
            c
        } else {
            '-'
        };
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }

    let mut out = out.replace("google", "ggl");
    if out.starts_with("goog") {
        out.insert_str(0, "cf-");
    }

    out.truncate(max_len);
    let trimmed = out.trim_matches('-');
    if trimmed.is_empty() {
        FALLBACK_PREFIX.to_string()
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn is_valid_bucket(name: &str) -> bool {
        (3..=MAX_BUCKET_LEN).contains(&name.len())
            && name
                .chars()
                .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-')
            && !name.starts_with('-')
            && !name.ends_with('-')
            && !name.starts_with("goog")
            && !name.contains("google")
    }

    #[test]
    fn same_job_same_bucket() {
        assert_eq!(bucket_name("acme", "job1"), bucket_name("acme", "job1"));
    }

    #[test]
    fn different_jobs_different_buckets() {
        assert_ne!(bucket_name("acme", "job1"), bucket_name("acme", "job2"));
    }

    #[test]
    fn name_has_prefix_and_hash() {
        let name = bucket_name("acme", "job1");
        let (prefix, hash) = name.split_once('-').unwrap();
        assert_eq!(prefix, "acme");
        assert_eq!(hash.len(), HASH_HEX_LEN);
        assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    }

    #[test]
    fn job_id_is_not_used_verbatim() {
        let name = bucket_name("acme", "My Job/With Spaces");
        assert!(is_valid_bucket(&name));
        assert!(!name.contains("My Job"));
    }

    #[test]
    fn prefix_is_sanitized() {
        let name = bucket_name("My_Project..Prod", "job1");
        assert!(name.starts_with("my-project-prod-"));
        assert!(is_valid_bucket(&name));
    }

    #[test]
    fn long_project_is_truncated() {
        let project = "a".repeat(100);
        let name = bucket_name(&project, "job1");
        assert_eq!(name.len(), MAX_BUCKET_LEN);
        assert!(is_valid_bucket(&name));
    }

    #[test]
    fn reserved_words_are_avoided() {
        assert!(is_valid_bucket(&bucket_name("google-labs", "job1")));
        assert!(is_valid_bucket(&bucket_name("goog", "job1")));
        assert!(is_valid_bucket(&bucket_name("my-google-project", "job1")));
    }

    #[test]
    fn empty_project_uses_fallback() {
        assert!(bucket_name("", "job1").starts_with("job-"));
        assert!(bucket_name("___", "job1").starts_with("job-"));
    }
}
