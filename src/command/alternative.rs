use std::fmt;

use crate::command::RemoteCommand;
use crate::remote::RemoteOutput;

/// Batch scheduler family of a deployment
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Backend {
    Pbs,
    Slurm,
}

impl Backend {
    pub fn from_pbs_flag(use_pbs: bool) -> Self {
        match use_pbs {
            true => Backend::Pbs,
            false => Backend::Slurm,
        }
    }

    /// Prefix of scheduler directives in a batch script
    pub fn directive(&self) -> &'static str {
        match self {
            Backend::Pbs => "#PBS",
            Backend::Slurm => "#SBATCH",
        }
    }
}

impl fmt::Display for Backend {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Backend::Pbs => write!(f, "pbs"),
            Backend::Slurm => write!(f, "slurm"),
        }
    }
}

/// One of two commands built from the same arguments, chosen by the backend
///
/// Call sites build the alternative and execute it without knowing which scheduler is in use.
/// A new backend is one more variant here.
#[derive(Debug, Clone)]
pub enum Alternative<P, S> {
    Pbs(P),
    Slurm(S),
}

impl<P, S> Alternative<P, S> {
    pub fn select<T>(backend: Backend, args: T) -> Self
    where
        P: From<T>,
        S: From<T>,
    {
        match backend {
            Backend::Pbs => Alternative::Pbs(P::from(args)),
            Backend::Slurm => Alternative::Slurm(S::from(args)),
        }
    }
}

impl<P: RemoteCommand, S: RemoteCommand> RemoteCommand for Alternative<P, S> {
    fn command_line(&self) -> String {
        match self {
            Alternative::Pbs(command) => command.command_line(),
            Alternative::Slurm(command) => command.command_line(),
        }
    }

    fn parse(&self, output: &RemoteOutput) -> Option<String> {
        match self {
            Alternative::Pbs(command) => command.parse(output),
            Alternative::Slurm(command) => command.parse(output),
        }
    }
}
