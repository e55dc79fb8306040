/// One captured output stream of a remote command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteStream {
    content: String,
}

impl RemoteStream {
    pub fn new(content: impl Into<String>) -> Self {
        RemoteStream { content: content.into() }
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_empty()
    }

    /// Non-empty lines, in order
    pub fn lines(&self) -> Vec<&str> {
        self.content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .collect()
    }

    /// Whitespace-delimited fields of the `index`-th non-empty line
    pub fn row(&self, index: usize) -> Option<Vec<&str>> {
        self.lines()
            .get(index)
            .map(|line| line.split_whitespace().collect())
    }

    /// Fields of the last non-empty line
    pub fn last_row(&self) -> Option<Vec<&str>> {
        self.lines()
            .last()
            .map(|line| line.split_whitespace().collect())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemoteOutput {
    pub exit_code: i32,
    pub stdout: RemoteStream,
    pub stderr: RemoteStream,
}

impl RemoteOutput {
    pub fn new(exit_code: i32, stdout: impl Into<String>, stderr: impl Into<String>) -> Self {
        RemoteOutput {
            exit_code,
            stdout: RemoteStream::new(stdout),
            stderr: RemoteStream::new(stderr),
        }
    }

    /// Exit code 0 with the given stdout and nothing on stderr
    pub fn success(stdout: impl Into<String>) -> Self {
        RemoteOutput::new(0, stdout, "")
    }
}
