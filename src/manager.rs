//! Workflow manager
//!
//! Owns the jobs of one workflow and the remote working directory
//! `<working_dir>/<workflow_id>/{out,err,sh}`. The first submission starts a background loop
//! that waits for [`WorkflowManager::init`] and then submits every job still `NotSubmitted`.
//! Status polling and output collection are driven by the caller.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};

use chrono::Utc;
use log::{debug, error, info, warn};
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{self, Instant};

use crate::command::shell::{Mkdir, Rm};
use crate::command::RemoteCommand;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::job::outcome::{read_uploaded_results, ExitClassification, JobOutcome};
use crate::job::{Job, JobData, JobStatus};
use crate::remote::{FileTransfer, Transport};

/// Lifecycle of the background loop
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Phase {
    NotStarted,
    Running,
    Ended,
}

struct Shared {
    workflow_id: String,
    working_dir: String,
    config: Config,
    transport: Arc<dyn Transport>,
    jobs: Mutex<HashMap<String, Arc<Job>>>,
    inited: AtomicBool,
    phase: StdMutex<Phase>,
    wake: Notify,
}

pub struct WorkflowManager {
    shared: Arc<Shared>,
    runner: StdMutex<Option<JoinHandle<()>>>,
}

impl WorkflowManager {
    pub fn new(workflow_id: impl Into<String>, config: Config, transport: Arc<dyn Transport>) -> Self {
        let workflow_id = workflow_id.into();
        let working_dir = config.credentials.workflow_dir(&workflow_id);
        WorkflowManager {
            shared: Arc::new(Shared {
                workflow_id,
                working_dir,
                config,
                transport,
                jobs: Mutex::new(HashMap::new()),
                inited: AtomicBool::new(false),
                phase: StdMutex::new(Phase::NotStarted),
                wake: Notify::new(),
            }),
            runner: StdMutex::new(None),
        }
    }

    pub fn workflow_id(&self) -> &str {
        &self.shared.workflow_id
    }

    /// Remote workflow directory, with a trailing slash
    pub fn working_dir(&self) -> &str {
        &self.shared.working_dir
    }

    pub fn is_inited(&self) -> bool {
        self.shared.inited.load(Ordering::SeqCst)
    }

    /// Create the remote and local directories of the workflow
    ///
    /// The workflow directory itself must not exist yet; its subdirectories may. The manager
    /// stays uninitialised on any failure. Calling it again after a success does nothing.
    pub async fn init(&self) -> Result<()> {
        if self.is_inited() {
            return Ok(());
        }
        if let Err(err) = self.create_remote_dirs().await {
            error!("Failed to init workflow {}: {}", self.workflow_id(), err);
            return Err(err);
        }
        self.create_local_dirs().await?;

        self.shared.inited.store(true, Ordering::SeqCst);
        info!("Workflow {} initialised in {}", self.workflow_id(), self.working_dir());
        Ok(())
    }

    async fn create_remote_dirs(&self) -> Result<()> {
        let root = self.working_dir().trim_end_matches('/').to_string();
        let transport = self.shared.transport.as_ref();

        Mkdir::new(root.clone(), false).execute(transport).await?.check()?;
        for sub in ["out", "err", "sh"] {
            Mkdir::new(format!("{}/{}", root, sub), true).execute(transport).await?.check()?;
        }
        Ok(())
    }

    async fn create_local_dirs(&self) -> Result<()> {
        let local = &self.shared.config.credentials.local_dir;
        for dir in ["out", "err", "cache"] {
            tokio::fs::create_dir_all(local.join(dir)).await?;
        }
        Ok(())
    }

    /// Register a job, it is submitted by the background loop
    ///
    /// A job id that is already registered is rejected and the existing job is left untouched.
    pub async fn submit(&self, job_id: &str, command: &str) -> Result<Arc<Job>> {
        let data = job_data(job_id, command, self.working_dir(), &self.shared.config.credentials.local_dir);
        let job = Arc::new(Job::new(
            data,
            Arc::clone(&self.shared.transport),
            self.shared.config.options.clone(),
        ));

        {
            let mut jobs = self.shared.jobs.lock().await;
            if jobs.contains_key(job_id) {
                warn!("Job {} is already registered in workflow {}", job_id, self.workflow_id());
                return Err(Error::DuplicateJob(job_id.to_string()));
            }
            jobs.insert(job_id.to_string(), Arc::clone(&job));
        }
        info!("Job {} registered in workflow {}", job_id, self.workflow_id());

        self.start_runner();
        Ok(job)
    }

    /// Spawn the background loop on the first call only
    fn start_runner(&self) {
        {
            let mut phase = self.shared.phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner());
            if *phase != Phase::NotStarted {
                return;
            }
            *phase = Phase::Running;
        }

        let shared = Arc::clone(&self.shared);
        let handle = tokio::spawn(async move {
            if let Err(err) = shared.run().await {
                error!("Background loop of workflow {} stopped: {}", shared.workflow_id, err);
            }
        });
        *self.runner.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Some(handle);
    }

    pub async fn get_job(&self, job_id: &str) -> Option<Arc<Job>> {
        self.shared.jobs.lock().await.get(job_id).cloned()
    }

    pub async fn get_unfinished_jobs(&self) -> Vec<Arc<Job>> {
        self.shared
            .jobs
            .lock()
            .await
            .values()
            .filter(|job| !job.is_terminated())
            .cloned()
            .collect()
    }

    /// Download the outputs of a job, classify its exit code and forget it
    pub async fn collect(&self, job_id: &str) -> Option<JobOutcome> {
        let job = self.get_job(job_id).await?;

        job.download().await;
        let exit_code = job.get_exit_code().await;
        let local = &self.shared.config.credentials.local_dir;
        let stdout = local.join("out").join(format!("{}.sh.out", job_id));
        let stderr = local.join("err").join(format!("{}.sh.err", job_id));

        let outcome = JobOutcome {
            job_id: job_id.to_string(),
            exit: ExitClassification::from_code(exit_code),
            exit_code,
            uploaded_results: read_uploaded_results(&stdout).await,
            stdout,
            stderr,
            collected_at: Utc::now(),
        };

        job.mark_terminated();
        self.shared.jobs.lock().await.remove(job_id);
        info!("Job {} collected: {:?} (exit code {})", job_id, outcome.exit, exit_code);
        Some(outcome)
    }

    /// Stop the background loop and remove the remote workflow directory
    ///
    /// Failures are logged, never returned.
    pub async fn destroy(&self) {
        *self.shared.phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner()) = Phase::Ended;
        self.shared.wake.notify_waiters();

        let root = self.working_dir().trim_end_matches('/').to_string();
        let removed = match Rm::new(root).execute(self.shared.transport.as_ref()).await {
            Ok(done) => done.check().map(|_| ()),
            Err(err) => Err(err),
        };
        match removed {
            Ok(()) => info!("Workflow {} destroyed", self.workflow_id()),
            Err(err) => error!("Failed to destroy workflow {}: {}", self.workflow_id(), err),
        }
    }

    /// Wait for the background loop to finish, once [`destroy`](Self::destroy) was called
    pub async fn join(&self) {
        let handle = self.runner.lock().unwrap_or_else(|poisoned| poisoned.into_inner()).take();
        if let Some(handle) = handle {
            if let Err(err) = handle.await {
                warn!("Background loop of workflow {} panicked: {}", self.workflow_id(), err);
            }
        }
    }
}

impl Shared {
    fn phase(&self) -> Phase {
        *self.phase.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Sleep for the configured interval, or less if the manager is being destroyed
    async fn pause(&self) {
        tokio::select! {
            _ = time::sleep(self.config.options.sleep_time()) => {}
            _ = self.wake.notified() => {}
        }
    }

    async fn run(&self) -> Result<()> {
        let started = Instant::now();

        while !self.inited.load(Ordering::SeqCst) {
            if self.phase() == Phase::Ended {
                return Ok(());
            }
            if started.elapsed() > self.config.options.time_to_be_ready() {
                return Err(Error::ReadinessTimeout(self.workflow_id.clone()));
            }
            self.pause().await;
        }

        while self.phase() != Phase::Ended {
            for job in self.take_unsubmitted().await {
                info!("Starting job {}", job.job_id());
                if let Err(err) = job.start().await {
                    error!("Failed to start job {}: {}", job.job_id(), err);
                    job.set_status(JobStatus::Error);
                }
            }
            self.pause().await;
        }

        debug!("Background loop of workflow {} ended", self.workflow_id);
        Ok(())
    }

    /// Flip every `NotSubmitted` job to `Queued` under the job set lock
    async fn take_unsubmitted(&self) -> Vec<Arc<Job>> {
        let jobs = self.jobs.lock().await;
        jobs.values()
            .filter(|job| !job.is_terminated())
            .filter(|job| job.transition(JobStatus::NotSubmitted, JobStatus::Queued))
            .cloned()
            .collect()
    }
}

/// Build the data of a job with its fixed staging lists
///
/// Uploads: invocation, configuration script, job script and workflow descriptor. Downloads:
/// stderr, stdout, provenance file and the batch script.
fn job_data(job_id: &str, command: &str, working_dir: &str, local_dir: &Path) -> JobData {
    let data = JobData::new(job_id, command, working_dir);
    let local = |path: String| -> PathBuf { local_dir.join(path) };

    let uploads = vec![
        FileTransfer::new(local(format!("inv/{}-invocation.json", job_id)), data.working_dir()),
        FileTransfer::new(local(format!("config/{}-configuration.sh", job_id)), data.working_dir()),
        FileTransfer::new(local(format!("sh/{}.sh", job_id)), format!("{}sh", data.working_dir())),
        FileTransfer::new(local("workflow.json".to_string()), data.working_dir()),
    ];
    let downloads = vec![
        FileTransfer::new(local(format!("err/{}.sh.err", job_id)), data.stderr_path()),
        FileTransfer::new(local(format!("out/{}.sh.out", job_id)), data.stdout_path()),
        FileTransfer::new(local(format!("{}.sh.provenance.json", job_id)), data.provenance_path()),
        FileTransfer::new(local(format!("{}.batch", job_id)), data.batch_script_path()),
    ];

    data.with_uploads(uploads).with_downloads(downloads)
}
