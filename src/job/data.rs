use std::sync::OnceLock;

use crate::error::{Error, Result};
use crate::remote::FileTransfer;

/// The facts about one job
///
/// Every remote path of a job is derived from its id and working directory. The scheduler id is
/// unknown until a submission succeeds and is never replaced afterwards.
#[derive(Debug)]
pub struct JobData {
    job_id: String,
    command: String,
    /// Remote directory with a trailing slash
    working_dir: String,
    files_upload: Vec<FileTransfer>,
    files_download: Vec<FileTransfer>,
    scheduler_job_id: OnceLock<String>,
}

impl JobData {
    pub fn new(job_id: impl Into<String>, command: impl Into<String>, working_dir: impl Into<String>) -> Self {
        let mut working_dir = working_dir.into();
        if !working_dir.ends_with('/') {
            working_dir.push('/');
        }
        JobData {
            job_id: job_id.into(),
            command: command.into(),
            working_dir,
            files_upload: Vec::new(),
            files_download: Vec::new(),
            scheduler_job_id: OnceLock::new(),
        }
    }

    pub fn with_uploads(mut self, files: Vec<FileTransfer>) -> Self {
        self.files_upload = files;
        self
    }

    pub fn with_downloads(mut self, files: Vec<FileTransfer>) -> Self {
        self.files_download = files;
        self
    }

    pub fn job_id(&self) -> &str {
        &self.job_id
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    pub fn working_dir(&self) -> &str {
        &self.working_dir
    }

    pub fn files_upload(&self) -> &[FileTransfer] {
        &self.files_upload
    }

    pub fn files_download(&self) -> &[FileTransfer] {
        &self.files_download
    }

    pub fn stdout_path(&self) -> String {
        format!("{}out/{}.sh.out", self.working_dir, self.job_id)
    }

    pub fn stderr_path(&self) -> String {
        format!("{}err/{}.sh.err", self.working_dir, self.job_id)
    }

    pub fn exit_code_path(&self) -> String {
        format!("{}{}.exitcode", self.working_dir, self.job_id)
    }

    pub fn batch_script_path(&self) -> String {
        format!("{}{}.batch", self.working_dir, self.job_id)
    }

    /// Provenance file written next to the job script by the application wrapper
    pub fn provenance_path(&self) -> String {
        format!("{}{}.sh.provenance.json", self.working_dir, self.job_id)
    }

    pub fn scheduler_job_id(&self) -> Option<&str> {
        self.scheduler_job_id.get().map(String::as_str)
    }

    pub fn set_scheduler_job_id(&self, id: String) -> Result<()> {
        self.scheduler_job_id
            .set(id)
            .map_err(|_| Error::SchedulerIdAlreadySet(self.job_id.clone()))
    }
}
