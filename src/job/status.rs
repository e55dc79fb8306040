use std::fmt;

use serde::Serialize;

/// Lifecycle status of a job as seen by the workflow engine
///
/// `NotSubmitted`, `Undefined` and `Stalled` are terminal for polling: once a job holds one of
/// them, status requests return it without asking the scheduler again.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobStatus {
    NotSubmitted,
    Queued,
    SuccessfullySubmitted,
    Running,
    Completed,
    Error,
    Stalled,
    Undefined,
}

impl JobStatus {
    /// Normalise a raw scheduler state token, anything unknown is `Undefined`
    pub fn from_token(token: Option<&str>) -> JobStatus {
        match token.map(str::trim) {
            Some("COMPLETE") | Some("COMPLETED") => JobStatus::Completed,
            Some("PENDING") | Some("CONFIGURING") => JobStatus::Queued,
            Some("RUNNING") => JobStatus::Running,
            Some("FAILED") | Some("NODE_FAIL") | Some("BOOT_FAIL") | Some("OUT_OF_MEMORY") => JobStatus::Error,
            _ => JobStatus::Undefined,
        }
    }

    pub fn is_sticky(&self) -> bool {
        matches!(self, JobStatus::NotSubmitted | JobStatus::Undefined | JobStatus::Stalled)
    }

    /// No further progress is expected from the scheduler
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Error | JobStatus::Stalled | JobStatus::Undefined
        )
    }
}

impl fmt::Display for JobStatus {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        let name = match self {
            JobStatus::NotSubmitted => "NOT_SUBMITTED",
            JobStatus::Queued => "QUEUED",
            JobStatus::SuccessfullySubmitted => "SUCCESSFULLY_SUBMITTED",
            JobStatus::Running => "RUNNING",
            JobStatus::Completed => "COMPLETED",
            JobStatus::Error => "ERROR",
            JobStatus::Stalled => "STALLED",
            JobStatus::Undefined => "UNDEFINED",
        };
        write!(f, "{}", name)
    }
}
