use std::fmt;

use serde::{Deserialize, Serialize};

/// The four statuses a job moves through.
///
/// Each job flows through: CREATED → IN_PROGRESS → SUCCESS | FAILED
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    #[default]
    Created,
    InProgress,
    Success,
    Failed,
}

impl JobStatus {
    /// Whether the job has finished, successfully or not.
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Success | JobStatus::Failed)
    }

    fn rank(self) -> u8 {
        match self {
            JobStatus::Created => 0,
            JobStatus::InProgress => 1,
            JobStatus::Success | JobStatus::Failed => 2,
        }
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JobStatus::Created => write!(f, "CREATED"),
            JobStatus::InProgress => write!(f, "IN_PROGRESS"),
            JobStatus::Success => write!(f, "SUCCESS"),
            JobStatus::Failed => write!(f, "FAILED"),
        }
    }
}

/// The result of evaluating a requested status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Move forward to the given status.
    Advance(JobStatus),
    /// The job is already in the requested status; writing it again is harmless.
    Replay(JobStatus),
    /// The change would move the job backward or skip a required step.
    Rejected { from: JobStatus, to: JobStatus },
}

impl Transition {
    /// The status to persist, if the change may be written.
    pub fn target(self) -> Option<JobStatus> {
        match self {
            Transition::Advance(status) | Transition::Replay(status) => Some(status),
            Transition::Rejected { .. } => None,
        }
    }
}

/// Validates status changes against the job lifecycle.
pub struct StateMachine;

impl StateMachine {
    /// Compute the transition from `current` to `requested`.
    ///
    /// - CREATED may only advance to IN_PROGRESS.
    /// - IN_PROGRESS may advance to SUCCESS or FAILED.
    /// - A terminal status only accepts a replay of itself.
    pub fn transition(current: JobStatus, requested: JobStatus) -> Transition {
        if current == requested {
            return Transition::Replay(requested);
        }
        if current.is_terminal() || requested.rank() != current.rank() + 1 {
            return Transition::Rejected {
                from: current,
                to: requested,
            };
        }
        Transition::Advance(requested)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_walks_all_statuses() {
        assert_eq!(
            StateMachine::transition(JobStatus::Created, JobStatus::InProgress),
            Transition::Advance(JobStatus::InProgress)
        );
        assert_eq!(
            StateMachine::transition(JobStatus::InProgress, JobStatus::Success),
            Transition::Advance(JobStatus::Success)
        );
        assert_eq!(
            StateMachine::transition(JobStatus::InProgress, JobStatus::Failed),
            Transition::Advance(JobStatus::Failed)
        );
    }

    #[test]
    fn replay_is_accepted() {
        for status in [
            JobStatus::Created,
            JobStatus::InProgress,
            JobStatus::Success,
            JobStatus::Failed,
        ] {
            assert_eq!(
                StateMachine::transition(status, status),
                Transition::Replay(status)
            );
        }
    }

    #[test]
    fn terminal_never_regresses() {
        for to in [JobStatus::Created, JobStatus::InProgress, JobStatus::Failed] {
            let t = StateMachine::transition(JobStatus::Success, to);
            assert!(matches!(t, Transition::Rejected { .. }), "{to}");
            assert_eq!(t.target(), None);
        }
        let t = StateMachine::transition(JobStatus::Failed, JobStatus::Success);
        assert!(matches!(t, Transition::Rejected { .. }));
    }

    #[test]
    fn created_cannot_skip_to_terminal() {
        let t = StateMachine::transition(JobStatus::Created, JobStatus::Success);
        assert_eq!(
            t,
            Transition::Rejected {
                from: JobStatus::Created,
                to: JobStatus::Success
            }
        );
    }

    #[test]
    fn in_progress_cannot_go_back() {
        let t = StateMachine::transition(JobStatus::InProgress, JobStatus::Created);
        assert!(matches!(t, Transition::Rejected { .. }));
    }

    #[test]
    fn status_display_and_serde_agree() {
        for status in [
            JobStatus::Created,
            JobStatus::InProgress,
            JobStatus::Success,
            JobStatus::Failed,
        ] {
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
        }
    }

    #[test]
    fn default_status_is_created() {
        assert_eq!(JobStatus::default(), JobStatus::Created);
        assert!(!JobStatus::InProgress.is_terminal());
        assert!(JobStatus::Failed.is_terminal());
    }
}
