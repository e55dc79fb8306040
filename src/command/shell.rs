use crate::command::{quote, RemoteCommand};
use crate::remote::RemoteOutput;

/// Delimiter of the heredoc used by [`WriteFile`]
static HEREDOC_MARK: &str = "SLURM_EXECUTOR_EOF";

#[derive(Debug, Clone)]
pub struct Mkdir {
    path: String,
    parents: bool,
}

impl Mkdir {
    /// With `parents`, existing directories are not an error (`mkdir -p`)
    pub fn new(path: impl Into<String>, parents: bool) -> Self {
        Mkdir { path: path.into(), parents }
    }
}

impl RemoteCommand for Mkdir {
    fn command_line(&self) -> String {
        match self.parents {
            true => format!("mkdir -p {}", quote(&self.path)),
            false => format!("mkdir {}", quote(&self.path)),
        }
    }

    fn parse(&self, _output: &RemoteOutput) -> Option<String> {
        None
    }
}

/// Recursive, forced removal
#[derive(Debug, Clone)]
pub struct Rm {
    path: String,
}

impl Rm {
    pub fn new(path: impl Into<String>) -> Self {
        Rm { path: path.into() }
    }
}

impl RemoteCommand for Rm {
    fn command_line(&self) -> String {
        format!("rm -rf {}", quote(&self.path))
    }

    fn parse(&self, _output: &RemoteOutput) -> Option<String> {
        None
    }
}

/// Read a remote file, the result is its trimmed content
#[derive(Debug, Clone)]
pub struct Cat {
    path: String,
}

impl Cat {
    pub fn new(path: impl Into<String>) -> Self {
        Cat { path: path.into() }
    }
}

impl RemoteCommand for Cat {
    fn command_line(&self) -> String {
        format!("cat {}", quote(&self.path))
    }

    fn parse(&self, output: &RemoteOutput) -> Option<String> {
        Some(output.stdout.content().trim().to_string())
    }
}

/// Write `content` verbatim to a remote file, replacing it
///
/// The content goes through a quoted heredoc so the remote shell expands nothing in it.
/// Content that does not end with a newline gets one.
#[derive(Debug, Clone)]
pub struct WriteFile {
    path: String,
    content: String,
}

impl WriteFile {
    pub fn new(path: impl Into<String>, content: impl Into<String>) -> Self {
        WriteFile { path: path.into(), content: content.into() }
    }
}

impl RemoteCommand for WriteFile {
    fn command_line(&self) -> String {
        let newline = if self.content.ends_with('\n') { "" } else { "\n" };
        format!(
            "cat > {} << '{mark}'\n{}{}{mark}",
            quote(&self.path),
            self.content,
            newline,
            mark = HEREDOC_MARK
        )
    }

    fn parse(&self, _output: &RemoteOutput) -> Option<String> {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_lines() {
        assert_eq!(Mkdir::new("/w/wf", false).command_line(), "mkdir '/w/wf'");
        assert_eq!(Mkdir::new("/w/wf/out", true).command_line(), "mkdir -p '/w/wf/out'");
        assert_eq!(Rm::new("/w/wf").command_line(), "rm -rf '/w/wf'");
        assert_eq!(Cat::new("/w/wf/j1.exit").command_line(), "cat '/w/wf/j1.exit'");
    }

    #[test]
    fn test_cat_result_is_trimmed_content() {
        let output = RemoteOutput::success("0\n");
        assert_eq!(Cat::new("/x").parse(&output), Some("0".to_string()));
    }

    #[test]
    fn test_write_file_uses_quoted_heredoc() {
        let line = WriteFile::new("/w/j1.batch", "#!/bin/bash\necho $HOME\n").command_line();
        assert_eq!(
            line,
            "cat > '/w/j1.batch' << 'SLURM_EXECUTOR_EOF'\n#!/bin/bash\necho $HOME\nSLURM_EXECUTOR_EOF"
        );

        let unterminated = WriteFile::new("/w/f", "x").command_line();
        assert!(unterminated.ends_with("\nx\nSLURM_EXECUTOR_EOF"));
    }
}
