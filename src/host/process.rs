use anyhow::{anyhow, Context, Result};
use std::io;
use std::path::Path;
use std::process::{Child, Command, Stdio};
use std::time::{Duration, Instant};

use crate::cancel::CancelToken;
use crate::log_debug;
use crate::pipe::PipeError;

/// How long a spawned host gets to exit after SIGTERM before it is killed.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_secs(5);
const EXIT_POLL: Duration = Duration::from_millis(50);

#[cfg(windows)]
pub const DEFAULT_HOST_IMAGE: &str = "audacity.exe";
#[cfg(not(windows))]
pub const DEFAULT_HOST_IMAGE: &str = "audacity";

/// The host we are driving, and whether we are responsible for its process.
#[derive(Debug)]
pub enum HostProcess {
    /// Started by this run.
    Spawned { child: Child, label: String },
    /// Was already running; only its image name is known.
    Attached { image: String },
    /// Shut down, or never ours to stop.
    Stopped,
}

/// Split a host command line into program and arguments.
pub fn split_host_command(command: &str) -> (String, Vec<String>) {
    let trimmed = command.trim();
    if trimmed.is_empty() {
        return (String::new(), Vec::new());
    }
    let parts = shell_words::split(trimmed)
        .unwrap_or_else(|_| trimmed.split_whitespace().map(|s| s.to_string()).collect());
    match parts.split_first() {
        Some((program, args)) => (program.clone(), args.to_vec()),
        None => (String::new(), Vec::new()),
    }
}

/// File name of the program, which is what `pkill`/`taskkill` match on.
pub fn image_name(program: &str) -> String {
    Path::new(program)
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .unwrap_or_else(|| program.to_string())
}

impl HostProcess {
    /// Start the host with our stdio detached.
    pub fn launch(command: &str) -> Result<Self> {
        let (program, args) = split_host_command(command);
        if program.is_empty() {
            return Err(anyhow!("host command is empty"));
        }
        let mut cmd = Command::new(&program);
        cmd.args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null());
        #[cfg(unix)]
        {
            use std::os::unix::process::CommandExt;
            // Keep Ctrl-C in our terminal from reaching the host directly.
            cmd.process_group(0);
        }
        let child = cmd
            .spawn()
            .with_context(|| format!("failed to start host `{program}`"))?;
        log_debug(&format!("launched host {program} (pid {})", child.id()));
        Ok(HostProcess::Spawned {
            child,
            label: image_name(&program),
        })
    }

    pub fn attach(image: impl Into<String>) -> Self {
        let image = image.into();
        log_debug(&format!("attaching to running host {image}"));
        HostProcess::Attached { image }
    }

    pub fn label(&self) -> &str {
        match self {
            HostProcess::Spawned { label, .. } => label,
            HostProcess::Attached { image } => image,
            HostProcess::Stopped => "stopped host",
        }
    }

    pub fn is_stopped(&self) -> bool {
        matches!(self, HostProcess::Stopped)
    }

    /// True once a host we spawned has exited on its own.
    pub fn has_exited(&mut self) -> bool {
        match self {
            HostProcess::Spawned { child, .. } => matches!(child.try_wait(), Ok(Some(_))),
            HostProcess::Attached { .. } => false,
            HostProcess::Stopped => true,
        }
    }

    /// Fixed warm-up wait after the pipes appear, while the host loads its
    /// scripting module.
    pub fn settle(&self, duration: Duration, cancel: &CancelToken) -> Result<(), PipeError> {
        if duration.is_zero() {
            return Ok(());
        }
        log_debug(&format!(
            "letting {} settle for {} ms",
            self.label(),
            duration.as_millis()
        ));
        if cancel.sleep(duration) {
            Ok(())
        } else {
            Err(PipeError::Cancelled)
        }
    }

    /// Stop the host. Best effort: problems are logged, never returned.
    pub fn shutdown(&mut self) {
        self.shutdown_with_grace(DEFAULT_SHUTDOWN_GRACE);
    }

    pub fn shutdown_with_grace(&mut self, grace: Duration) {
        match std::mem::replace(self, HostProcess::Stopped) {
            HostProcess::Spawned { mut child, label } => stop_child(&mut child, &label, grace),
            HostProcess::Attached { image } => kill_by_image(&image),
            HostProcess::Stopped => {}
        }
    }

    /// Forget the host without stopping it.
    pub fn release(&mut self) {
        if let HostProcess::Spawned { label, .. } | HostProcess::Attached { image: label } = self {
            log_debug(&format!("leaving {label} running"));
        }
        *self = HostProcess::Stopped;
    }
}

fn stop_child(child: &mut Child, label: &str, grace: Duration) {
    if let Ok(Some(status)) = child.try_wait() {
        log_debug(&format!("{label} already exited: {status}"));
        return;
    }
    if request_exit(child.id()) && wait_for_exit(child, grace) {
        log_debug(&format!("{label} exited after SIGTERM"));
        return;
    }
    log_debug(&format!("killing {label}"));
    if let Err(err) = child.kill() {
        if err.kind() != io::ErrorKind::InvalidInput {
            log_debug(&format!("failed to kill {label}: {err}"));
        }
    }
    if let Err(err) = child.wait() {
        log_debug(&format!("failed to reap {label}: {err}"));
    }
}

fn wait_for_exit(child: &mut Child, timeout: Duration) -> bool {
    let start = Instant::now();
    loop {
        match child.try_wait() {
            Ok(Some(_)) => return true,
            Ok(None) => {}
            Err(err) => {
                log_debug(&format!("waiting on pid {} failed: {err}", child.id()));
                return false;
            }
        }
        if start.elapsed() >= timeout {
            return false;
        }
        std::thread::sleep(EXIT_POLL);
    }
}

/// Ask the host to exit. Returns false when no request could be sent.
#[cfg(unix)]
fn request_exit(pid: u32) -> bool {
    // SAFETY: pid comes from a Child we own and have not reaped yet.
    if unsafe { libc::kill(pid as i32, libc::SIGTERM) } != 0 {
        log_debug(&format!(
            "failed to send SIGTERM to host pid {pid}: {}",
            io::Error::last_os_error()
        ));
        return false;
    }
    true
}

#[cfg(not(unix))]
fn request_exit(_pid: u32) -> bool {
    false
}

/// Stop a host we did not start, by image name.
fn kill_by_image(image: &str) {
    let mut cmd = kill_command(image);
    match cmd.stdout(Stdio::null()).stderr(Stdio::null()).status() {
        Ok(status) if status.success() => log_debug(&format!("stopped {image}")),
        Ok(status) => log_debug(&format!("stopping {image} exited with {status}")),
        Err(err) => log_debug(&format!("could not run kill for {image}: {err}")),
    }
}

#[cfg(windows)]
fn kill_command(image: &str) -> Command {
    let mut cmd = Command::new("taskkill");
    cmd.args(["/f", "/im", image, "/t"]);
    cmd
}

#[cfg(not(windows))]
fn kill_command(image: &str) -> Command {
    let mut cmd = Command::new("pkill");
    cmd.args(["-x", image]);
    cmd
}
