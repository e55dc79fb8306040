//! Run grid workflow jobs on a Slurm (or PBS) cluster over ssh
//!
//! Jobs are staged, wrapped in a generated batch script, submitted to the scheduler and polled
//! until they finish. Remote access goes through [`remote::Transport`].

/// Executor configuration: credentials and polling options
pub mod config;

/// Error taxonomy shared by every module
pub mod error;

/// Remote shell transport and captured command output
pub mod remote;

/// Typed remote commands and backend selection
pub mod command;

/// Per-job state machine
pub mod job;

/// Job set of one workflow and its background submission loop
pub mod manager;

pub use config::Config;
pub use error::{Error, Result};
pub use job::{Job, JobStatus};
pub use manager::WorkflowManager;
