//! OpenSSH client transport
//!
//! Commands run through `ssh`, transfers through `scp`. A transfer session is an ssh
//! ControlMaster socket: every `scp` of the session reuses the authenticated connection and
//! `disconnect` tears the master down.

use std::path::PathBuf;
use std::process::{Output, Stdio};

use async_trait::async_trait;
use log::{debug, warn};
use tokio::process::Command;
use uuid::Uuid;

use crate::config::Credentials;
use crate::error::{Error, Result};
use crate::remote::{FileTransfer, RemoteOutput, Session, Transport};

pub struct SshTransport {
    credentials: Credentials,
}

impl SshTransport {
    pub fn new(credentials: Credentials) -> Self {
        SshTransport { credentials }
    }

    /// Options shared by every ssh invocation, without the destination
    fn ssh_options(&self) -> Vec<String> {
        let mut args = vec![
            "-p".to_string(),
            self.credentials.port.to_string(),
            "-o".to_string(),
            "BatchMode=yes".to_string(),
            "-o".to_string(),
            "ConnectTimeout=10".to_string(),
        ];
        if let Some(key) = &self.credentials.private_key {
            args.push("-i".to_string());
            args.push(key.display().to_string());
        }
        args
    }
}

async fn run(program: &str, args: &[String]) -> Result<Output> {
    debug!("{} {}", program, args.join(" "));
    Command::new(program)
        .args(args)
        .stdin(Stdio::null())
        .output()
        .await
        .map_err(|err| Error::Transport(format!("can't run {}: {}", program, err)))
}

#[async_trait]
impl Transport for SshTransport {
    async fn one_command(&self, command: &str) -> Result<RemoteOutput> {
        let mut args = self.ssh_options();
        args.push(self.credentials.destination());
        // one argument, so the remote shell handles pipes and redirections
        args.push(command.to_string());

        let output = run("ssh", &args).await?;
        let exit_code = output.status.code().unwrap_or(-1);

        // 255 is reserved by ssh for its own failures
        if exit_code == 255 {
            return Err(Error::Transport(format!(
                "ssh to {} failed: {}",
                self.credentials.destination(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(RemoteOutput::new(
            exit_code,
            String::from_utf8_lossy(&output.stdout),
            String::from_utf8_lossy(&output.stderr),
        ))
    }

    async fn connect(&self) -> Result<Box<dyn Session>> {
        let socket = std::env::temp_dir().join(format!("slurm-executor-{}.sock", Uuid::new_v4().simple()));

        let mut args = vec!["-M".to_string(), "-S".to_string(), socket.display().to_string(), "-fN".to_string()];
        args.extend(self.ssh_options());
        args.push(self.credentials.destination());

        let output = run("ssh", &args).await?;
        if !output.status.success() {
            return Err(Error::Transport(format!(
                "can't open a session to {}: {}",
                self.credentials.destination(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }

        Ok(Box::new(SshSession {
            socket,
            credentials: self.credentials.clone(),
            closed: false,
        }))
    }
}

struct SshSession {
    socket: PathBuf,
    credentials: Credentials,
    closed: bool,
}

impl SshSession {
    fn scp_args(&self, from: String, to: String) -> Vec<String> {
        let mut args = vec![
            "-q".to_string(),
            "-P".to_string(),
            self.credentials.port.to_string(),
            "-o".to_string(),
            format!("ControlPath={}", self.socket.display()),
        ];
        if let Some(key) = &self.credentials.private_key {
            args.push("-i".to_string());
            args.push(key.display().to_string());
        }
        args.push(from);
        args.push(to);
        args
    }

    fn remote_target(&self, path: &str) -> String {
        format!("{}:{}", self.credentials.destination(), path)
    }

    async fn scp(&self, from: String, to: String) -> Result<()> {
        let output = run("scp", &self.scp_args(from.clone(), to.clone())).await?;
        if output.status.success() {
            Ok(())
        } else {
            Err(Error::Transport(format!(
                "scp {} -> {} failed: {}",
                from,
                to,
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }

    fn exit_args(&self) -> Vec<String> {
        vec![
            "-S".to_string(),
            self.socket.display().to_string(),
            "-O".to_string(),
            "exit".to_string(),
            self.credentials.destination(),
        ]
    }
}

#[async_trait]
impl Session for SshSession {
    async fn upload(&mut self, file: &FileTransfer) -> Result<()> {
        self.scp(file.local.display().to_string(), self.remote_target(&file.remote)).await
    }

    async fn download(&mut self, file: &FileTransfer) -> Result<()> {
        self.scp(self.remote_target(&file.remote), file.local.display().to_string()).await
    }

    async fn disconnect(mut self: Box<Self>) -> Result<()> {
        self.closed = true;
        let output = run("ssh", &self.exit_args()).await?;
        if !output.status.success() {
            return Err(Error::Transport(format!(
                "can't close session {}: {}",
                self.socket.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            )));
        }
        Ok(())
    }
}

impl Drop for SshSession {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        warn!("Session {} dropped without disconnect, closing it", self.socket.display());
        let _ = std::process::Command::new("ssh")
            .args(self.exit_args())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
    }
}
