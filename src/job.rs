//! Job lifecycle on the cluster
//!
//! A [`Job`] is staged (inputs uploaded), gets a batch script written next to its inputs, is
//! submitted to the scheduler and is then polled until the scheduler reports a final state.
//! Every step blocks on remote I/O and runs in that fixed order.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use log::{error, info, warn};

use crate::command::scheduler::{Qsub, Sbatch, Scontrol, Tracejob};
use crate::command::shell::{Cat, WriteFile};
use crate::command::{Alternative, RemoteCommand};
use crate::config::Options;
use crate::error::{Error, Result};
use crate::remote::{transfer_all, Direction, Transport};

/// Identity, remote paths and staging lists of a job
pub mod data;

/// Status values and scheduler token normalisation
pub mod status;

/// Batch script rendering
pub mod batch;

/// Exit code classification and collected results
pub mod outcome;

pub use data::JobData;
pub use status::JobStatus;

pub struct Job {
    data: JobData,
    transport: Arc<dyn Transport>,
    options: Options,
    status: Mutex<JobStatus>,
    terminated: AtomicBool,
}

impl Job {
    pub fn new(data: JobData, transport: Arc<dyn Transport>, options: Options) -> Self {
        Job {
            data,
            transport,
            options,
            status: Mutex::new(JobStatus::NotSubmitted),
            terminated: AtomicBool::new(false),
        }
    }

    pub fn data(&self) -> &JobData {
        &self.data
    }

    pub fn job_id(&self) -> &str {
        self.data.job_id()
    }

    /// Last known status, without asking the scheduler
    pub fn status(&self) -> JobStatus {
        *self.status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn set_status(&self, status: JobStatus) {
        *self.status.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = status;
    }

    /// Set `to` only if the job is currently `from`, returns whether it changed
    pub(crate) fn transition(&self, from: JobStatus, to: JobStatus) -> bool {
        let mut status = self.status.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
        if *status != from {
            return false;
        }
        *status = to;
        true
    }

    pub fn is_terminated(&self) -> bool {
        self.terminated.load(Ordering::SeqCst)
    }

    pub fn mark_terminated(&self) {
        self.terminated.store(true, Ordering::SeqCst);
    }

    /// Upload every input of the job over one session
    ///
    /// Uploads that succeeded before a failure are left in place.
    pub async fn prepare(&self) -> Result<()> {
        info!("Staging {} file(s) for job {}", self.data.files_upload().len(), self.job_id());
        transfer_all(self.transport.as_ref(), Direction::Upload, self.data.files_upload())
            .await
            .map_err(|err| Error::Staging {
                job_id: self.job_id().to_string(),
                source: Box::new(err),
            })
    }

    /// Render the batch script and write it to the remote batch script path
    pub async fn create_batch_file(&self) -> Result<()> {
        let script = batch::render(&self.data, self.options.backend())?;
        let path = self.data.batch_script_path();

        WriteFile::new(path.clone(), script)
            .execute(self.transport.as_ref())
            .await?
            .check()?;

        info!("Batch script for job {} written to {}", self.job_id(), path);
        Ok(())
    }

    /// Submit the batch script and record the scheduler job id
    pub async fn submit(&self) -> Result<()> {
        let submission_error = |reason: String| Error::Submission {
            job_id: self.job_id().to_string(),
            reason,
        };

        let command = Alternative::<Qsub, Sbatch>::select(self.options.backend(), self.data.batch_script_path());
        let done = command
            .execute(self.transport.as_ref())
            .await
            .map_err(|err| submission_error(err.to_string()))?;

        if done.failed() {
            error!("Failed to submit job {}", self.job_id());
            return Err(submission_error(format!(
                "exit code {}: {}",
                done.output().exit_code,
                done.output().stderr.content().trim()
            )));
        }

        let scheduler_id = done
            .result()
            .ok_or_else(|| submission_error("scheduler returned no job id".to_string()))?;
        info!("Job {} submitted with {} job id {}", self.job_id(), self.options.backend(), scheduler_id);
        self.data.set_scheduler_job_id(scheduler_id)
    }

    /// Stage, write the batch script and submit, stopping at the first failure
    pub async fn start(&self) -> Result<()> {
        self.prepare().await?;
        self.create_batch_file().await?;
        self.submit().await?;
        self.set_status(JobStatus::SuccessfullySubmitted);
        Ok(())
    }

    async fn query_status(&self, scheduler_id: &str) -> JobStatus {
        let command = Alternative::<Tracejob, Scontrol>::select(self.options.backend(), scheduler_id.to_string());

        match command.execute(self.transport.as_ref()).await {
            Ok(done) if done.failed() => JobStatus::Undefined,
            Ok(done) => JobStatus::from_token(done.result().as_deref()),
            Err(err) => {
                error!("Failed to retrieve status of job {}: {}", self.job_id(), err);
                JobStatus::Undefined
            }
        }
    }

    /// Ask the scheduler for the job status, retrying inconclusive answers
    ///
    /// Sticky states are returned as is. A job without a scheduler id (submission in flight or
    /// failed) keeps its current status. When every attempt is inconclusive the job is
    /// `Stalled`, which is then sticky as well.
    pub async fn get_status(&self) -> JobStatus {
        let current = self.status();
        if current.is_sticky() {
            return current;
        }
        let Some(scheduler_id) = self.data.scheduler_job_id() else {
            return current;
        };

        let retries = self.options.status_retry;
        for attempt in 1..=retries {
            let status = self.query_status(scheduler_id).await;
            if status != JobStatus::Undefined {
                self.set_status(status);
                return status;
            }
            if attempt < retries {
                tokio::time::sleep(self.options.status_retry_wait()).await;
            }
        }

        warn!("Job {} stalled: status still undefined after {} attempt(s)", self.job_id(), retries);
        self.set_status(JobStatus::Stalled);
        JobStatus::Stalled
    }

    /// Exit code written by the batch script, `1` when it can't be read
    pub async fn get_exit_code(&self) -> i32 {
        let done = match Cat::new(self.data.exit_code_path()).execute(self.transport.as_ref()).await {
            Ok(done) => done,
            Err(err) => {
                error!("Can't retrieve exit code of job {}: {}", self.job_id(), err);
                return 1;
            }
        };
        if done.failed() {
            return 1;
        }

        let content = done.result().unwrap_or_default();
        content.parse::<i32>().unwrap_or_else(|_| {
            let err = Error::Parse { what: "exit code", value: content.clone() };
            warn!("Job {}: {}", self.job_id(), err);
            1
        })
    }

    /// Download the job outputs over one session, failures are only logged
    pub async fn download(&self) {
        let files = self.data.files_download();
        match transfer_all(self.transport.as_ref(), Direction::Download, files).await {
            Ok(()) => info!("Downloaded {} file(s) for job {}", files.len(), self.job_id()),
            Err(err) => error!("Failed to download the files of job {}: {}", self.job_id(), err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::{Duration, Instant};

    use super::*;
    use crate::config::test_config;
    use crate::remote::mock::MockTransport;
    use crate::remote::{FileTransfer, RemoteOutput};

    fn job(transport: &MockTransport, use_pbs: bool) -> Job {
        let mut options = test_config(".".into()).options;
        options.use_pbs = use_pbs;
        let data = JobData::new("j1", "echo hi", "/scratch/grid/wf/")
            .with_uploads(vec![
                FileTransfer::new("./inv/j1-invocation.json", "/scratch/grid/wf/"),
                FileTransfer::new("./sh/j1.sh", "/scratch/grid/wf/sh"),
            ])
            .with_downloads(vec![FileTransfer::new("./out/j1.sh.out", "/scratch/grid/wf/out/j1.sh.out")]);
        Job::new(data, Arc::new(transport.clone()), options)
    }

    fn submitted(transport: &MockTransport) -> Job {
        let job = job(transport, false);
        job.data().set_scheduler_job_id("42".to_string()).unwrap();
        job.set_status(JobStatus::SuccessfullySubmitted);
        job
    }

    #[tokio::test]
    async fn test_start_runs_steps_in_order() {
        let transport = MockTransport::new();
        transport.on("sbatch", RemoteOutput::success("42\n"));
        let job = job(&transport, false);

        job.start().await.unwrap();

        assert_eq!(transport.uploads().len(), 2);
        let commands = transport.commands();
        assert_eq!(commands.len(), 2);
        assert!(commands[0].starts_with("cat > '/scratch/grid/wf/j1.batch'"));
        assert_eq!(commands[1], "sbatch --parsable '/scratch/grid/wf/j1.batch'");
        assert_eq!(job.data().scheduler_job_id(), Some("42"));
        assert_eq!(job.status(), JobStatus::SuccessfullySubmitted);
    }

    #[tokio::test]
    async fn test_start_uses_qsub_for_pbs() {
        let transport = MockTransport::new();
        transport.on("qsub", RemoteOutput::success("77.pbs\n"));
        let job = job(&transport, true);

        job.start().await.unwrap();

        assert_eq!(transport.count("qsub '/scratch/grid/wf/j1.batch'"), 1);
        assert_eq!(transport.count("sbatch"), 0);
        assert_eq!(job.data().scheduler_job_id(), Some("77.pbs"));
    }

    #[tokio::test]
    async fn test_staging_failure_aborts_start() {
        let transport = MockTransport::new();
        transport.fail_transfer("/scratch/grid/wf/sh");
        let job = job(&transport, false);

        let result = job.start().await;

        assert!(matches!(result, Err(Error::Staging { .. })));
        assert!(transport.commands().is_empty());
        assert_eq!(transport.open_sessions(), 0);
        assert_eq!(job.data().scheduler_job_id(), None);
    }

    #[tokio::test]
    async fn test_batch_file_stderr_is_failure() {
        let transport = MockTransport::new();
        transport.on("cat >", RemoteOutput::new(0, "", "quota warning\n"));
        let job = job(&transport, false);

        assert!(matches!(job.start().await, Err(Error::Command { .. })));
        assert_eq!(transport.count("sbatch"), 0);
    }

    #[tokio::test]
    async fn test_failed_submission_records_nothing() {
        let transport = MockTransport::new();
        transport.on("sbatch", RemoteOutput::new(1, "", "sbatch: error: invalid partition\n"));
        let job = job(&transport, false);

        assert!(matches!(job.submit().await, Err(Error::Submission { .. })));
        assert_eq!(job.data().scheduler_job_id(), None);
        assert_eq!(job.status(), JobStatus::NotSubmitted);
    }

    #[tokio::test]
    async fn test_sticky_states_skip_remote_queries() {
        for sticky in [JobStatus::NotSubmitted, JobStatus::Undefined, JobStatus::Stalled] {
            let transport = MockTransport::new();
            let job = submitted(&transport);
            job.set_status(sticky);

            assert_eq!(job.get_status().await, sticky);
            assert!(transport.commands().is_empty());
        }
    }

    #[tokio::test]
    async fn test_status_without_scheduler_id_is_not_queried() {
        let transport = MockTransport::new();
        let job = job(&transport, false);
        job.set_status(JobStatus::Queued);

        assert_eq!(job.get_status().await, JobStatus::Queued);
        assert!(transport.commands().is_empty());
    }

    #[tokio::test]
    async fn test_status_retries_until_conclusive() {
        let transport = MockTransport::new();
        transport.on("scontrol", RemoteOutput::new(1, "", "slurm_load_jobs error\n"));
        transport.on("scontrol", RemoteOutput::success("JobId=42 JobState=RUNNING\n"));
        let job = submitted(&transport);

        assert_eq!(job.get_status().await, JobStatus::Running);
        assert_eq!(transport.count("scontrol"), 2);
        assert_eq!(job.status(), JobStatus::Running);
    }

    #[tokio::test]
    async fn test_inconclusive_status_stalls_after_retries() {
        let transport = MockTransport::new();
        transport.on("scontrol", RemoteOutput::success("JobId=42 JobState=SUSPENDED\n"));
        let job = submitted(&transport);

        let started = Instant::now();
        assert_eq!(job.get_status().await, JobStatus::Stalled);

        // three attempts, two waits of 5ms in between
        assert_eq!(transport.count("scontrol"), 3);
        assert!(started.elapsed() >= Duration::from_millis(10));

        assert_eq!(job.get_status().await, JobStatus::Stalled);
        assert_eq!(transport.count("scontrol"), 3);
    }

    #[tokio::test]
    async fn test_unreachable_scheduler_stalls() {
        let transport = MockTransport::new();
        transport.unreachable("scontrol");
        let job = submitted(&transport);

        assert_eq!(job.get_status().await, JobStatus::Stalled);
        assert_eq!(transport.count("scontrol"), 3);
    }

    #[tokio::test]
    async fn test_exit_code() {
        let transport = MockTransport::new();
        transport.on("cat '/scratch/grid/wf/j1.exitcode'", RemoteOutput::success("0\n"));
        assert_eq!(job(&transport, false).get_exit_code().await, 0);

        let transport = MockTransport::new();
        transport.on("cat", RemoteOutput::success("137\n"));
        assert_eq!(job(&transport, false).get_exit_code().await, 137);
    }

    #[tokio::test]
    async fn test_exit_code_defaults_to_one() {
        let transport = MockTransport::new();
        transport.on("cat", RemoteOutput::new(1, "", "cat: No such file or directory\n"));
        assert_eq!(job(&transport, false).get_exit_code().await, 1);

        let transport = MockTransport::new();
        transport.on("cat", RemoteOutput::success("segfault\n"));
        assert_eq!(job(&transport, false).get_exit_code().await, 1);

        let transport = MockTransport::new();
        transport.unreachable("cat");
        assert_eq!(job(&transport, false).get_exit_code().await, 1);
    }

    #[tokio::test]
    async fn test_download_failure_is_swallowed() {
        let transport = MockTransport::new();
        transport.refuse_connections();
        let job = job(&transport, false);

        job.download().await;
        assert!(transport.downloads().is_empty());
    }
}
