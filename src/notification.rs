//! Decoding of transfer completion notifications.
//!
//! The transfer service publishes a `TransferOperation` JSON document to the
//! notification topic. It can reach us in three shapes:
//! - the bare operation JSON,
//! - a Pub/Sub push envelope `{"message": {"data": <base64>, "attributes": {..}}}`,
//! - a background event `{"data": <base64>}`.

use std::collections::HashMap;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::error::NotificationError;
use crate::state_machine::JobStatus;

/// Status reported by the transfer service for an operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OperationStatus {
    Success,
    Failed,
    /// Any non-terminal status (`IN_PROGRESS`, `PAUSED`, `QUEUED`, ...).
    Pending(String),
}

impl OperationStatus {
    fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_uppercase().as_str() {
            "SUCCESS" => OperationStatus::Success,
            "FAILED" | "ABORTED" => OperationStatus::Failed,
            other => OperationStatus::Pending(other.to_string()),
        }
    }

    // Attribute form: TRANSFER_OPERATION_SUCCESS and friends.
    fn from_event_type(event: &str) -> Self {
        Self::parse(event.trim_start_matches("TRANSFER_OPERATION_"))
    }
}

/// A decoded notification about one transfer operation.
#[derive(Debug, Clone, PartialEq)]
pub struct TransferNotification {
    pub transfer_job_name: String,
    pub status: OperationStatus,
    pub end_time: Option<DateTime<Utc>>,
    pub error_details: Vec<String>,
}

impl TransferNotification {
    /// The job status this notification settles on, if it is terminal.
    pub fn terminal_status(&self) -> Option<JobStatus> {
        match self.status {
            OperationStatus::Success => Some(JobStatus::Success),
            OperationStatus::Failed => Some(JobStatus::Failed),
            OperationStatus::Pending(_) => None,
        }
    }

    /// Decode a notification from any of the supported shapes.
    pub fn parse(payload: &[u8]) -> Result<Self, NotificationError> {
        if payload.iter().all(u8::is_ascii_whitespace) {
            return Err(NotificationError::Empty);
        }
        let value: Value = serde_json::from_slice(payload)?;

        if value.get("message").is_some_and(Value::is_object) {
            let envelope: PushEnvelope = serde_json::from_value(value)?;
            return Self::from_message(envelope.message);
        }
        if value.get("transferJobName").is_none() {
            if let Some(data) = value.get("data").and_then(Value::as_str) {
                return Self::from_operation(serde_json::from_slice(&STANDARD.decode(data)?)?);
            }
        }
        Self::from_operation(serde_json::from_value(value)?)
    }

    fn from_message(message: PubsubMessage) -> Result<Self, NotificationError> {
        if let Some(data) = message.data.as_deref().filter(|d| !d.is_empty()) {
            let operation: TransferOperation = serde_json::from_slice(&STANDARD.decode(data)?)?;
            let mut notification = Self::from_operation(operation)?;
            // Attributes are authoritative for the event when the body is a
            // non-terminal snapshot.
            if let (OperationStatus::Pending(_), Some(event)) =
                (&notification.status, message.attributes.get("eventType"))
            {
                notification.status = OperationStatus::from_event_type(event);
            }
            return Ok(notification);
        }

        let transfer_job_name = message
            .attributes
            .get("transferJobName")
            .filter(|n| !n.is_empty())
            .cloned()
            .ok_or(NotificationError::MissingJobName)?;
        let status = message
            .attributes
            .get("eventType")
            .map(|e| OperationStatus::from_event_type(e))
            .unwrap_or_else(|| OperationStatus::Pending("UNKNOWN".to_string()));
        Ok(Self {
            transfer_job_name,
            status,
            end_time: None,
            error_details: Vec::new(),
        })
    }

    fn from_operation(operation: TransferOperation) -> Result<Self, NotificationError> {
        let transfer_job_name = operation
            .transfer_job_name
            .filter(|n| !n.is_empty())
            .ok_or(NotificationError::MissingJobName)?;
        let status = operation
            .status
            .as_deref()
            .map(OperationStatus::parse)
            .unwrap_or_else(|| OperationStatus::Pending("UNKNOWN".to_string()));

        let mut error_details = Vec::new();
        for breakdown in operation.error_breakdowns {
            let code = breakdown.error_code.unwrap_or_else(|| "UNKNOWN".to_string());
            if breakdown.error_log_entries.is_empty() {
                let count = breakdown.error_count.map(|c| c.to_string()).unwrap_or_default();
                error_details.push(format!("{code} ({} errors)", count.trim_matches('"')));
                continue;
            }
            for entry in breakdown.error_log_entries {
                let url = entry.url.unwrap_or_default();
                error_details.push(format!("{code}: {url}: {}", entry.error_details.join("; ")));
            }
        }

        Ok(Self {
            transfer_job_name,
            status,
            end_time: operation.end_time,
            error_details,
        })
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct TransferOperation {
    #[serde(default)]
    transfer_job_name: Option<String>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    end_time: Option<DateTime<Utc>>,
    #[serde(default)]
    error_breakdowns: Vec<ErrorBreakdown>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorBreakdown {
    #[serde(default)]
    error_code: Option<String>,
    // int64 fields arrive as JSON strings.
    #[serde(default)]
    error_count: Option<Value>,
    #[serde(default)]
    error_log_entries: Vec<ErrorLogEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ErrorLogEntry {
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    error_details: Vec<String>,
}

#[derive(Debug, Deserialize)]
struct PushEnvelope {
    message: PubsubMessage,
}

#[derive(Debug, Deserialize)]
struct PubsubMessage {
    #[serde(default)]
    data: Option<String>,
    #[serde(default)]
    attributes: HashMap<String, String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const SUCCESS_OP: &str = r#"{
        "name": "transferOperations/transferJobs-job1-123",
        "projectId": "acme",
        "transferJobName": "transferJobs/job1",
        "status": "SUCCESS",
        "startTime": "2024-03-01T12:00:00Z",
        "endTime": "2024-03-01T12:05:00Z",
        "counters": {"objectsCopiedToSink": "3"}
    }"#;

    #[test]
    fn parse_raw_operation() {
        let n = TransferNotification::parse(SUCCESS_OP.as_bytes()).unwrap();
        assert_eq!(n.transfer_job_name, "transferJobs/job1");
        assert_eq!(n.status, OperationStatus::Success);
        assert_eq!(n.terminal_status(), Some(JobStatus::Success));
        assert_eq!(
            n.end_time,
            Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 5, 0).unwrap())
        );
        assert!(n.error_details.is_empty());
    }

    #[test]
    fn parse_push_envelope() {
        let envelope = serde_json::json!({
            "message": {
                "data": STANDARD.encode(SUCCESS_OP),
                "attributes": {"eventType": "TRANSFER_OPERATION_SUCCESS"},
                "messageId": "42"
            },
            "subscription": "projects/acme/subscriptions/jobs"
        });
        let n = TransferNotification::parse(envelope.to_string().as_bytes()).unwrap();
        assert_eq!(n.transfer_job_name, "transferJobs/job1");
        assert_eq!(n.status, OperationStatus::Success);
    }

    #[test]
    fn parse_background_event_data() {
        let event = serde_json::json!({ "data": STANDARD.encode(SUCCESS_OP) });
        let n = TransferNotification::parse(event.to_string().as_bytes()).unwrap();
        assert_eq!(n.status, OperationStatus::Success);
    }

    #[test]
    fn parse_attributes_only_envelope() {
        let envelope = serde_json::json!({
            "message": {
                "attributes": {
                    "transferJobName": "transferJobs/job9",
                    "eventType": "TRANSFER_OPERATION_ABORTED"
                }
            }
        });
        let n = TransferNotification::parse(envelope.to_string().as_bytes()).unwrap();
        assert_eq!(n.transfer_job_name, "transferJobs/job9");
        assert_eq!(n.terminal_status(), Some(JobStatus::Failed));
        assert!(n.end_time.is_none());
    }

    #[test]
    fn failed_operation_collects_error_details() {
        let op = r#"{
            "transferJobName": "transferJobs/job2",
            "status": "FAILED",
            "endTime": "2024-03-01T13:00:00Z",
            "errorBreakdowns": [
                {
                    "errorCode": "PERMISSION_DENIED",
                    "errorCount": "2",
                    "errorLogEntries": [
                        {"url": "s3://src/a", "errorDetails": ["Access Denied"]},
                        {"url": "s3://src/b", "errorDetails": ["Access Denied", "retry exhausted"]}
                    ]
                },
                {"errorCode": "NOT_FOUND", "errorCount": "7"}
            ]
        }"#;
        let n = TransferNotification::parse(op.as_bytes()).unwrap();
        assert_eq!(n.terminal_status(), Some(JobStatus::Failed));
        assert_eq!(
            n.error_details,
            vec![
                "PERMISSION_DENIED: s3://src/a: Access Denied".to_string(),
                "PERMISSION_DENIED: s3://src/b: Access Denied; retry exhausted".to_string(),
                "NOT_FOUND (7 errors)".to_string(),
            ]
        );
    }

    #[test]
    fn non_terminal_status_is_pending() {
        let op = r#"{"transferJobName": "transferJobs/job1", "status": "IN_PROGRESS"}"#;
        let n = TransferNotification::parse(op.as_bytes()).unwrap();
        assert_eq!(n.status, OperationStatus::Pending("IN_PROGRESS".into()));
        assert_eq!(n.terminal_status(), None);
    }

    #[test]
    fn malformed_payloads_are_errors() {
        assert!(matches!(
            TransferNotification::parse(b"  "),
            Err(NotificationError::Empty)
        ));
        assert!(matches!(
            TransferNotification::parse(b"{oops"),
            Err(NotificationError::Json(_))
        ));
        assert!(matches!(
            TransferNotification::parse(br#"{"status": "SUCCESS"}"#),
            Err(NotificationError::MissingJobName)
        ));
        assert!(matches!(
            TransferNotification::parse(br#"{"data": "%%%"}"#),
            Err(NotificationError::Base64(_))
        ));
    }
}
