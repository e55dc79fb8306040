//! Remote shell transport
//!
//! Everything that talks to the cluster goes through [`Transport`]: one-shot command execution
//! and scoped file transfer sessions.

use std::path::PathBuf;

use async_trait::async_trait;

use crate::error::Result;

/// Captured exit code, stdout and stderr of a remote command
pub mod output;

/// OpenSSH client implementation of the transport
pub mod ssh;

#[cfg(test)]
pub mod mock;

pub use output::{RemoteOutput, RemoteStream};

/// A single file transfer between the local machine and the cluster
///
/// The same pair is used in both directions: uploads copy `local` to `remote`, downloads copy
/// `remote` to `local`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTransfer {
    pub local: PathBuf,
    pub remote: String,
}

impl FileTransfer {
    pub fn new(local: impl Into<PathBuf>, remote: impl Into<String>) -> Self {
        FileTransfer { local: local.into(), remote: remote.into() }
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Run one shell command line on the remote host and capture its output
    async fn one_command(&self, command: &str) -> Result<RemoteOutput>;

    /// Open a session for file transfers
    async fn connect(&self) -> Result<Box<dyn Session>>;
}

#[async_trait]
pub trait Session: Send {
    async fn upload(&mut self, file: &FileTransfer) -> Result<()>;

    async fn download(&mut self, file: &FileTransfer) -> Result<()>;

    async fn disconnect(self: Box<Self>) -> Result<()>;
}

/// Which way a batch of transfers goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Upload,
    Download,
}

/// Open a session, run every transfer in order and always close the session
///
/// Stops at the first failing transfer. The session is released before returning on every path.
pub async fn transfer_all(
    transport: &dyn Transport,
    direction: Direction,
    files: &[FileTransfer],
) -> Result<()> {
    let mut session = transport.connect().await?;

    let mut outcome = Ok(());
    for file in files {
        let result = match direction {
            Direction::Upload => session.upload(file).await,
            Direction::Download => session.download(file).await,
        };
        if let Err(err) = result {
            outcome = Err(err);
            break;
        }
    }

    let closed = session.disconnect().await;
    outcome.and(closed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::mock::MockTransport;

    fn files() -> Vec<FileTransfer> {
        vec![
            FileTransfer::new("./a", "/r/a"),
            FileTransfer::new("./b", "/r/b"),
            FileTransfer::new("./c", "/r/c"),
        ]
    }

    #[tokio::test]
    async fn test_transfer_all_in_order() {
        let transport = MockTransport::new();
        transfer_all(&transport, Direction::Upload, &files()).await.unwrap();

        let uploads = transport.uploads();
        assert_eq!(uploads.len(), 3);
        assert_eq!(uploads[0].remote, "/r/a");
        assert_eq!(uploads[2].remote, "/r/c");
        assert_eq!(transport.open_sessions(), 0);
    }

    #[tokio::test]
    async fn test_transfer_all_stops_and_releases_on_failure() {
        let transport = MockTransport::new();
        transport.fail_transfer("/r/b");

        let result = transfer_all(&transport, Direction::Download, &files()).await;

        assert!(result.is_err());
        assert_eq!(transport.downloads().len(), 1);
        assert_eq!(transport.open_sessions(), 0);
    }
}
