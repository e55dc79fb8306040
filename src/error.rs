//! Error taxonomy for remote job orchestration

use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// The connection could not be established or the call could not be dispatched
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote command ran but reported a non-zero exit code or wrote to stderr
    #[error("remote command `{command}` failed (exit code {exit_code}): {stderr}")]
    Command {
        command: String,
        exit_code: i32,
        stderr: String,
    },

    #[error("failed to stage files for job {job_id}: {source}")]
    Staging {
        job_id: String,
        #[source]
        source: Box<Error>,
    },

    #[error("failed to submit job {job_id}: {reason}")]
    Submission { job_id: String, reason: String },

    #[error("workflow {0} was not initialised within the readiness window")]
    ReadinessTimeout(String),

    #[error("can't parse {what}: {value:?}")]
    Parse { what: &'static str, value: String },

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("a job with id {0} is already registered in this workflow")]
    DuplicateJob(String),

    #[error("job {0} already has a scheduler id")]
    SchedulerIdAlreadySet(String),

    #[error("can't render batch script: {0}")]
    Template(#[from] tinytemplate::error::Error),

    #[error(transparent)]
    Io(#[from] io::Error),
}
