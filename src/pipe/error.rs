use std::io;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Transport failures surfaced to the workflow.
///
/// Only `PipeUnavailable` is expected while the host is still starting; every
/// other variant ends the run.
#[derive(Debug, Error)]
pub enum PipeError {
    /// The host has not created the pipe yet, or nobody is listening on it.
    #[error("host pipe {} is not available: {reason}", path.display())]
    PipeUnavailable { path: PathBuf, reason: String },

    /// Startup polling or a reply wait exceeded its budget.
    #[error("timed out after {:.1}s waiting for {what}", waited.as_secs_f64())]
    Timeout { what: &'static str, waited: Duration },

    /// The host closed its end of the command pipe while we were writing.
    #[error("the pipe for writing commands to the host broke down")]
    BrokenPipe,

    /// The host closed the reply pipe; it has probably crashed or exited.
    #[error("the pipe for reading host replies broke down; the host has probably crashed")]
    Broken,

    /// The connection was already closed by this process.
    #[error("connection to the host is closed")]
    Closed,

    /// The run was interrupted.
    #[error("cancelled")]
    Cancelled,

    /// Any other transport failure.
    #[error("pipe I/O error: {0}")]
    Io(#[from] io::Error),
}

impl PipeError {
    pub(crate) fn unavailable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::PipeUnavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }

    /// True when the connection can never be used again after this error.
    pub fn is_fatal(&self) -> bool {
        !matches!(self, PipeError::PipeUnavailable { .. })
    }
}

/// Reply content we could not make sense of. Logged, never fatal on its own.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("protocol error: {0}")]
pub struct ProtocolError(pub String);
