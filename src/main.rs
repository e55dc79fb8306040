use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{anyhow, Context, Result};
use clap::Parser;
use log::{info, warn};

use slurm_executor::job::outcome::JobOutcome;
use slurm_executor::remote::ssh::SshTransport;
use slurm_executor::{Config, JobStatus, WorkflowManager};

/// Submit workflow jobs to a batch scheduler over ssh and wait for their results
#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// JSON configuration file with credentials and options
    #[arg(short, long)]
    config: PathBuf,

    /// Workflow id, names the remote working directory
    #[arg(short, long)]
    workflow_id: String,

    /// Job to run, as ID=COMMAND (repeatable)
    #[arg(short, long = "job", value_parser = parse_job, required = true)]
    jobs: Vec<(String, String)>,

    /// Keep the remote working directory when done
    #[arg(long)]
    keep: bool,
}

fn parse_job(value: &str) -> Result<(String, String)> {
    let (id, command) = value
        .split_once('=')
        .ok_or_else(|| anyhow!("expected ID=COMMAND, got {value:?}"))?;
    if id.is_empty() || command.is_empty() {
        return Err(anyhow!("job id and command can't be empty"));
    }
    Ok((id.to_string(), command.to_string()))
}

#[tokio::main]
async fn main() -> Result<()> {
    env_logger::init();
    info!("terve! starting up :)");

    let args = Args::parse();
    let config = Config::from_path(&args.config).context("Can't load configuration")?;
    let poll_interval = config.options.sleep_time();
    let transport = Arc::new(SshTransport::new(config.credentials.clone()));

    let manager = WorkflowManager::new(&args.workflow_id, config, transport);
    manager.init().await.context("Can't initialise the remote working directory")?;

    for (id, command) in &args.jobs {
        manager.submit(id, command).await?;
    }

    let outcomes = wait_for_jobs(&manager, poll_interval).await;
    println!("{}", serde_json::to_string_pretty(&outcomes)?);

    if args.keep {
        info!("--keep set, leaving {} in place", manager.working_dir());
    } else {
        manager.destroy().await;
    }
    Ok(())
}

/// Poll every unfinished job until it reaches a final state, then collect it
async fn wait_for_jobs(manager: &WorkflowManager, poll_interval: std::time::Duration) -> Vec<JobOutcome> {
    let mut outcomes = Vec::new();

    loop {
        let unfinished = manager.get_unfinished_jobs().await;
        if unfinished.is_empty() {
            return outcomes;
        }

        for job in unfinished {
            let status = job.get_status().await;
            if !status.is_final() {
                continue;
            }
            if status == JobStatus::Stalled {
                warn!("Job {} stalled, collecting whatever it left behind", job.job_id());
            }
            info!("Job {} finished with status {}", job.job_id(), status);
            if let Some(outcome) = manager.collect(job.job_id()).await {
                outcomes.push(outcome);
            }
        }

        tokio::time::sleep(poll_interval).await;
    }
}
