//! Scheduler commands
//!
//! Submission and status queries differ between Slurm and PBS. Each pair shares its constructor
//! argument (a batch script path or a scheduler job id) so that
//! [`Alternative`](crate::command::Alternative) can build either one.

use crate::command::{quote, RemoteCommand};
use crate::remote::RemoteOutput;

/// `sbatch --parsable`, the result is the Slurm job id
#[derive(Debug, Clone)]
pub struct Sbatch {
    script_path: String,
}

impl From<String> for Sbatch {
    fn from(script_path: String) -> Self {
        Sbatch { script_path }
    }
}

impl RemoteCommand for Sbatch {
    fn command_line(&self) -> String {
        format!("sbatch --parsable {}", quote(&self.script_path))
    }

    /// `--parsable` prints `jobid[;cluster]` on the last line
    fn parse(&self, output: &RemoteOutput) -> Option<String> {
        let line = *output.stdout.lines().last()?;
        line.trim()
            .split(';')
            .next()
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    }
}

/// `qsub`, the result is the full PBS job id (`1234.server`)
#[derive(Debug, Clone)]
pub struct Qsub {
    script_path: String,
}

impl From<String> for Qsub {
    fn from(script_path: String) -> Self {
        Qsub { script_path }
    }
}

impl RemoteCommand for Qsub {
    fn command_line(&self) -> String {
        format!("qsub {}", quote(&self.script_path))
    }

    fn parse(&self, output: &RemoteOutput) -> Option<String> {
        output.stdout.lines().last().map(|line| line.trim().to_string())
    }
}

/// `scontrol show job`, the result is the raw `JobState` token
#[derive(Debug, Clone)]
pub struct Scontrol {
    job_id: String,
}

impl From<String> for Scontrol {
    fn from(job_id: String) -> Self {
        Scontrol { job_id }
    }
}

impl RemoteCommand for Scontrol {
    fn command_line(&self) -> String {
        format!("scontrol show job -o {}", quote(&self.job_id))
    }

    fn parse(&self, output: &RemoteOutput) -> Option<String> {
        output
            .stdout
            .last_row()?
            .into_iter()
            .find_map(|field| field.strip_prefix("JobState="))
            .map(str::to_string)
    }
}

/// `tracejob`, the result is the last field of the last `state` line
#[derive(Debug, Clone)]
pub struct Tracejob {
    job_id: String,
}

impl From<String> for Tracejob {
    fn from(job_id: String) -> Self {
        Tracejob { job_id }
    }
}

impl RemoteCommand for Tracejob {
    fn command_line(&self) -> String {
        format!("2>/dev/null tracejob {} | grep state | tail -n 1 | xargs", quote(&self.job_id))
    }

    fn parse(&self, output: &RemoteOutput) -> Option<String> {
        output.stdout.last_row()?.last().map(|field| field.to_string())
    }
}
