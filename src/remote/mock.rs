//! Scripted in-memory transport for tests
//!
//! Responses are registered per command fragment. The first rule whose fragment appears in the
//! command line answers it: queued outputs are consumed in order and the last one repeats.
//! Commands without a matching rule succeed with empty output.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use crate::error::{Error, Result};
use crate::remote::{FileTransfer, RemoteOutput, Session, Transport};

struct Rule {
    fragment: String,
    responses: VecDeque<Option<RemoteOutput>>,
}

#[derive(Default)]
struct State {
    rules: Vec<Rule>,
    commands: Vec<String>,
    uploads: Vec<FileTransfer>,
    downloads: Vec<FileTransfer>,
    failing_transfers: Vec<String>,
    refuse_connections: bool,
    open_sessions: usize,
}

#[derive(Clone, Default)]
pub struct MockTransport {
    state: Arc<Mutex<State>>,
}

impl MockTransport {
    pub fn new() -> Self {
        MockTransport::default()
    }

    /// Answer commands containing `fragment` with `output`
    pub fn on(&self, fragment: &str, output: RemoteOutput) {
        self.push(fragment, Some(output));
    }

    /// Fail commands containing `fragment` with a transport error
    pub fn unreachable(&self, fragment: &str) {
        self.push(fragment, None);
    }

    fn push(&self, fragment: &str, response: Option<RemoteOutput>) {
        let mut state = self.state.lock().unwrap();
        match state.rules.iter().position(|rule| rule.fragment == fragment) {
            Some(index) => state.rules[index].responses.push_back(response),
            None => state.rules.push(Rule {
                fragment: fragment.to_string(),
                responses: VecDeque::from([response]),
            }),
        }
    }

    pub fn fail_transfer(&self, remote: &str) {
        self.state.lock().unwrap().failing_transfers.push(remote.to_string());
    }

    pub fn refuse_connections(&self) {
        self.state.lock().unwrap().refuse_connections = true;
    }

    pub fn commands(&self) -> Vec<String> {
        self.state.lock().unwrap().commands.clone()
    }

    /// Number of recorded commands containing `fragment`
    pub fn count(&self, fragment: &str) -> usize {
        self.commands().iter().filter(|c| c.contains(fragment)).count()
    }

    pub fn uploads(&self) -> Vec<FileTransfer> {
        self.state.lock().unwrap().uploads.clone()
    }

    pub fn downloads(&self) -> Vec<FileTransfer> {
        self.state.lock().unwrap().downloads.clone()
    }

    pub fn open_sessions(&self) -> usize {
        self.state.lock().unwrap().open_sessions
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn one_command(&self, command: &str) -> Result<RemoteOutput> {
        let mut state = self.state.lock().unwrap();
        state.commands.push(command.to_string());

        let response = match state.rules.iter_mut().find(|rule| command.contains(&rule.fragment)) {
            Some(rule) if rule.responses.len() > 1 => rule.responses.pop_front().flatten(),
            Some(rule) => rule.responses.front().cloned().flatten(),
            None => Some(RemoteOutput::default()),
        };
        response.ok_or_else(|| Error::Transport(format!("mock refused `{}`", command)))
    }

    async fn connect(&self) -> Result<Box<dyn Session>> {
        let mut state = self.state.lock().unwrap();
        if state.refuse_connections {
            return Err(Error::Transport("mock refused connection".to_string()));
        }
        state.open_sessions += 1;
        Ok(Box::new(MockSession { state: Arc::clone(&self.state) }))
    }
}

struct MockSession {
    state: Arc<Mutex<State>>,
}

impl MockSession {
    fn record(&self, file: &FileTransfer, upload: bool) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        if state.failing_transfers.contains(&file.remote) {
            return Err(Error::Transport(format!("mock transfer of {} failed", file.remote)));
        }
        if upload {
            state.uploads.push(file.clone());
        } else {
            state.downloads.push(file.clone());
        }
        Ok(())
    }
}

#[async_trait]
impl Session for MockSession {
    async fn upload(&mut self, file: &FileTransfer) -> Result<()> {
        self.record(file, true)
    }

    async fn download(&mut self, file: &FileTransfer) -> Result<()> {
        self.record(file, false)
    }

    async fn disconnect(self: Box<Self>) -> Result<()> {
        self.state.lock().unwrap().open_sessions -= 1;
        Ok(())
    }
}
