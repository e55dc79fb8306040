//! Executor configuration
//!
//! A configuration file is a JSON document with two objects: `credentials` (where and how to
//! reach the cluster) and `options` (backend selection and polling tunables).

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::info;
use serde::{Deserialize, Serialize};

use crate::command::Backend;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    pub credentials: Credentials,
    pub options: Options,
}

/// Connection target and remote layout
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Credentials {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    pub user: String,
    /// Identity file passed to ssh with `-i`, the ssh agent is used when absent
    #[serde(default)]
    pub private_key: Option<PathBuf>,
    /// Remote root directory, each workflow gets a subdirectory named after its id
    pub working_dir: String,
    /// Local directory that receives inputs to upload and downloaded outputs
    #[serde(default = "default_local_dir")]
    pub local_dir: PathBuf,
}

/// Backend discriminator and polling tunables
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Options {
    /// Submit with qsub/tracejob instead of sbatch/scontrol
    #[serde(default)]
    pub use_pbs: bool,
    #[serde(default = "default_status_retry")]
    pub status_retry: u32,
    #[serde(default = "default_status_retry_wait_ms")]
    pub status_retry_wait_ms: u64,
    #[serde(default = "default_time_to_be_ready_secs")]
    pub time_to_be_ready_secs: u64,
    #[serde(default = "default_sleep_time_ms")]
    pub sleep_time_ms: u64,
}

fn default_port() -> u16 { 22 }

fn default_local_dir() -> PathBuf { PathBuf::from(".") }

fn default_status_retry() -> u32 { 5 }

fn default_status_retry_wait_ms() -> u64 { 2_000 }

fn default_time_to_be_ready_secs() -> u64 { 120 }

fn default_sleep_time_ms() -> u64 { 20_000 }

impl Default for Options {
    fn default() -> Self {
        Options {
            use_pbs: false,
            status_retry: default_status_retry(),
            status_retry_wait_ms: default_status_retry_wait_ms(),
            time_to_be_ready_secs: default_time_to_be_ready_secs(),
            sleep_time_ms: default_sleep_time_ms(),
        }
    }
}

impl Options {
    pub fn backend(&self) -> Backend {
        Backend::from_pbs_flag(self.use_pbs)
    }

    pub fn status_retry_wait(&self) -> Duration {
        Duration::from_millis(self.status_retry_wait_ms)
    }

    /// How long the background loop waits for `init` before giving up
    pub fn time_to_be_ready(&self) -> Duration {
        Duration::from_secs(self.time_to_be_ready_secs)
    }

    /// Pause between two iterations of the background loop
    pub fn sleep_time(&self) -> Duration {
        Duration::from_millis(self.sleep_time_ms)
    }
}

impl Credentials {
    /// `user@host` as understood by ssh and scp
    pub fn destination(&self) -> String {
        format!("{}@{}", self.user, self.host)
    }

    /// Remote directory of a workflow, always with a trailing slash
    pub fn workflow_dir(&self, workflow_id: &str) -> String {
        format!("{}/{}/", self.working_dir.trim_end_matches('/'), workflow_id)
    }
}

impl Config {
    pub fn from_path(path: &Path) -> Result<Config> {
        info!("Reading configuration from {}", path.display());
        let json = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&json)
            .map_err(|err| Error::Config(format!("{}: {}", path.display(), err)))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.credentials.host.is_empty() {
            return Err(Error::Config("host cannot be empty".to_string()));
        }
        if self.credentials.user.is_empty() {
            return Err(Error::Config("user cannot be empty".to_string()));
        }
        if self.credentials.working_dir.is_empty() {
            return Err(Error::Config("working_dir cannot be empty".to_string()));
        }
        // paths are single-quoted in remote commands, so no tilde expansion
        if !self.credentials.working_dir.starts_with('/') {
            return Err(Error::Config("working_dir must be an absolute path".to_string()));
        }
        if self.options.status_retry == 0 {
            return Err(Error::Config("status_retry must be greater than 0".to_string()));
        }
        if self.options.sleep_time_ms == 0 {
            return Err(Error::Config("sleep_time_ms must be greater than 0".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
pub(crate) fn test_config(local_dir: PathBuf) -> Config {
    Config {
        credentials: Credentials {
            host: "cluster.example.org".to_string(),
            port: 22,
            user: "grid".to_string(),
            private_key: None,
            working_dir: "/scratch/grid/".to_string(),
            local_dir,
        },
        options: Options {
            use_pbs: false,
            status_retry: 3,
            status_retry_wait_ms: 5,
            time_to_be_ready_secs: 1,
            sleep_time_ms: 10,
        },
    }
}
