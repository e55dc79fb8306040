//! Normalised job result handed back to the workflow engine

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use log::warn;
use serde::Serialize;

#[derive(Copy, Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ExitClassification {
    Success,
    ExecutionFailed,
    ErrorReadGrid,
    ErrorWriteGrid,
    ErrorWriteLocal,
    ExecutionCanceled,
}

impl ExitClassification {
    pub fn from_code(code: i32) -> Self {
        match code {
            0 => ExitClassification::Success,
            1 => ExitClassification::ErrorReadGrid,
            2 => ExitClassification::ErrorWriteGrid,
            6 => ExitClassification::ExecutionFailed,
            7 => ExitClassification::ErrorWriteLocal,
            _ => ExitClassification::ExecutionCanceled,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobOutcome {
    pub job_id: String,
    pub exit: ExitClassification,
    pub exit_code: i32,
    /// Result files reported by the job on its stdout
    pub uploaded_results: Vec<String>,
    pub stdout: PathBuf,
    pub stderr: PathBuf,
    pub collected_at: DateTime<Utc>,
}

/// Result references the application wrapper prints as `<file_name>uri</file_name>`
pub fn uploaded_results(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .filter_map(|line| {
            let start = line.find("<file_name>")? + "<file_name>".len();
            let end = line[start..].find("</file_name>")? + start;
            Some(line[start..end].trim().to_string())
        })
        .filter(|uri| !uri.is_empty())
        .collect()
}

/// Read a downloaded stdout file, a missing file has no results
pub async fn read_uploaded_results(path: &Path) -> Vec<String> {
    match tokio::fs::read_to_string(path).await {
        Ok(content) => uploaded_results(&content),
        Err(err) => {
            warn!("Can't read job stdout at {}: {}", path.display(), err);
            Vec::new()
        }
    }
}
