//! Render the batch script submitted to the scheduler
//!
//! The script carries the scheduler directives (job name, stdout, stderr), moves into the
//! workflow directory, runs the job command and stores its exit status in the exit code file.
//! Rendering only depends on the job data and the backend, so it is reproducible.

use serde::Serialize;
use tinytemplate::TinyTemplate;

use crate::command::{quote, Backend};
use crate::error::Result;
use crate::job::data::JobData;

/// Rendering context for the batch script
#[derive(Serialize)]
struct BatchContext<'a> {
    directive: &'static str,
    name_flag: &'static str,
    output_flag: &'static str,
    error_flag: &'static str,
    job_id: &'a str,
    stdout_path: String,
    stderr_path: String,
    working_dir: String,
    command: &'a str,
    exit_code_path: String,
}

pub fn render(data: &JobData, backend: Backend) -> Result<String> {
    /// included batch script template
    static BATCH: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/data/templates/batch.txt"));
    let mut tt = TinyTemplate::new();
    // job commands are shell, not HTML
    tt.set_default_formatter(&tinytemplate::format_unescaped);
    tt.add_template("batch", BATCH)?;

    let (name_flag, output_flag, error_flag) = match backend {
        Backend::Slurm => ("--job-name=", "--output=", "--error="),
        Backend::Pbs => ("-N ", "-o ", "-e "),
    };
    let context = BatchContext {
        directive: backend.directive(),
        name_flag,
        output_flag,
        error_flag,
        job_id: data.job_id(),
        stdout_path: data.stdout_path(),
        stderr_path: data.stderr_path(),
        working_dir: quote(data.working_dir()),
        command: data.command(),
        exit_code_path: quote(&data.exit_code_path()),
    };

    Ok(tt.render("batch", &context)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_slurm_script() {
        let data = JobData::new("j1", "echo hi && ls <in.txt", "/scratch/wf/");
        let script = render(&data, Backend::Slurm).unwrap();

        assert_eq!(
            script,
            "#!/bin/bash\n\
             #SBATCH --job-name=j1\n\
             #SBATCH --output=/scratch/wf/out/j1.sh.out\n\
             #SBATCH --error=/scratch/wf/err/j1.sh.err\n\
             cd '/scratch/wf/'\n\
             echo hi && ls <in.txt\n\
             echo $? > '/scratch/wf/j1.exitcode'\n"
        );
    }

    #[test]
    fn test_pbs_directives() {
        let data = JobData::new("j2", "true", "/scratch/wf/");
        let script = render(&data, Backend::Pbs).unwrap();

        assert!(script.contains("#PBS -N j2\n"));
        assert!(script.contains("#PBS -o /scratch/wf/out/j2.sh.out\n"));
        assert!(!script.contains("#SBATCH"));
    }

    #[test]
    fn test_rendering_is_reproducible() {
        let data = JobData::new("j3", "python run.py --seed 4", "/scratch/wf/");
        let first = render(&data, Backend::Slurm).unwrap();
        let second = render(&JobData::new("j3", "python run.py --seed 4", "/scratch/wf/"), Backend::Slurm).unwrap();
        assert_eq!(first, second);
    }
}
