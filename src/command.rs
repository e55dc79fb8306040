//! Typed remote commands
//!
//! A command is a value built from its arguments. Executing it issues exactly one remote
//! invocation and keeps the captured output next to the command, so the command can extract its
//! own result from it.

use async_trait::async_trait;
use log::{debug, warn};

use crate::error::{Error, Result};
use crate::remote::{RemoteOutput, Transport};

/// Backend-independent shell commands: mkdir, rm, cat and file writes
pub mod shell;

/// Submit and status commands of the Slurm and PBS command line tools
pub mod scheduler;

/// Pick one of two command implementations from the backend discriminator
pub mod alternative;

pub use alternative::{Alternative, Backend};

#[async_trait]
pub trait RemoteCommand: Send + Sync {
    /// Shell command line sent to the remote host
    fn command_line(&self) -> String;

    /// Command-specific extraction from the captured output
    fn parse(&self, output: &RemoteOutput) -> Option<String>;

    async fn execute(self, transport: &dyn Transport) -> Result<Executed<Self>>
    where
        Self: Sized,
    {
        let line = self.command_line();
        debug!("Running remote command: {}", line);
        let output = transport.one_command(&line).await?;
        let executed = Executed { command: self, output };
        if executed.failed() {
            warn!(
                "Remote command failed (exit code {}): {}",
                executed.output.exit_code,
                executed.output.stderr.content().trim()
            );
        }
        Ok(executed)
    }
}

/// A command together with the output of its single execution
#[derive(Debug)]
pub struct Executed<C> {
    command: C,
    output: RemoteOutput,
}

impl<C: RemoteCommand> Executed<C> {
    #[cfg(test)]
    pub(crate) fn new(command: C, output: RemoteOutput) -> Self {
        Executed { command, output }
    }

    /// Any output on stderr counts as a failure, even with exit code 0
    pub fn failed(&self) -> bool {
        self.output.exit_code != 0 || !self.output.stderr.is_empty()
    }

    pub fn result(&self) -> Option<String> {
        self.command.parse(&self.output)
    }

    pub fn output(&self) -> &RemoteOutput {
        &self.output
    }

    /// Turn a failed execution into [`Error::Command`]
    pub fn check(self) -> Result<Self> {
        if self.failed() {
            return Err(Error::Command {
                command: self.command.command_line(),
                exit_code: self.output.exit_code,
                stderr: self.output.stderr.content().trim().to_string(),
            });
        }
        Ok(self)
    }
}

/// Single-quote a word for a POSIX shell
pub fn quote(word: &str) -> String {
    format!("'{}'", word.replace('\'', r"'\''"))
}
