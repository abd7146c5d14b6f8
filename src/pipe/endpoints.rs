use std::path::{Path, PathBuf};

#[cfg(windows)]
const WINDOWS_WRITE_PIPE: &str = r"\\.\pipe\ToSrvPipe";
#[cfg(windows)]
const WINDOWS_READ_PIPE: &str = r"\\.\pipe\FromSrvPipe";
#[cfg(windows)]
const LINE_TERMINATOR: &str = "\r\n\0";

#[cfg(not(windows))]
const FIFO_DIR: &str = "/tmp";
#[cfg(not(windows))]
const LINE_TERMINATOR: &str = "\n";

const WRITE_FIFO_PREFIX: &str = "audacity_script_pipe.to.";
const READ_FIFO_PREFIX: &str = "audacity_script_pipe.from.";

/// Where the host's pipes live and how outbound lines are terminated.
///
/// Resolved once at startup and never changed afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PipeEndpoints {
    write_path: PathBuf,
    read_path: PathBuf,
    line_terminator: String,
}

impl PipeEndpoints {
    pub fn new(
        write_path: impl Into<PathBuf>,
        read_path: impl Into<PathBuf>,
        line_terminator: impl Into<String>,
    ) -> Self {
        Self {
            write_path: write_path.into(),
            read_path: read_path.into(),
            line_terminator: line_terminator.into(),
        }
    }

    /// Named pipes on Windows, per-user FIFOs in `/tmp` elsewhere.
    #[cfg(windows)]
    pub fn for_platform() -> Self {
        Self::new(WINDOWS_WRITE_PIPE, WINDOWS_READ_PIPE, LINE_TERMINATOR)
    }

    /// Named pipes on Windows, per-user FIFOs in `/tmp` elsewhere.
    #[cfg(not(windows))]
    pub fn for_platform() -> Self {
        Self::in_dir(Path::new(FIFO_DIR))
    }

    /// The host's FIFO names for the current user, placed under `dir`.
    pub fn in_dir(dir: &Path) -> Self {
        let suffix = user_suffix();
        Self::new(
            dir.join(format!("{WRITE_FIFO_PREFIX}{suffix}")),
            dir.join(format!("{READ_FIFO_PREFIX}{suffix}")),
            LINE_TERMINATOR,
        )
    }

    /// Pipe the host reads commands from.
    pub fn write_path(&self) -> &Path {
        &self.write_path
    }

    /// Pipe the host writes replies to.
    pub fn read_path(&self) -> &Path {
        &self.read_path
    }

    pub fn line_terminator(&self) -> &str {
        &self.line_terminator
    }

    /// Both pipes exist, so the host's script module is up.
    pub fn both_exist(&self) -> bool {
        self.write_path.exists() && self.read_path.exists()
    }
}

#[cfg(unix)]
fn user_suffix() -> String {
    // SAFETY: getuid has no preconditions and cannot fail.
    let uid = unsafe { libc::getuid() };
    uid.to_string()
}

#[cfg(not(unix))]
fn user_suffix() -> String {
    std::env::var("USERNAME").unwrap_or_else(|_| "0".to_string())
}
