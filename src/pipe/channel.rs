use crate::cancel::CancelToken;
use crate::command::Command;
use crate::log_debug;
use crossbeam_channel::bounded;
use std::fs::{File, OpenOptions};
use std::io::{self, ErrorKind, Write};
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::endpoints::PipeEndpoints;
use super::error::PipeError;
use super::reader::{spawn_reply_reader, ReaderShared};
use super::reply::ReplySlot;

/// How often blocked waits wake up to check for cancellation and shutdown.
pub const DEFAULT_REPLY_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Tunables for a connection.
#[derive(Debug, Clone)]
pub struct ConnectOptions {
    /// Give up on a reply after this long; `None` waits as long as the host works.
    pub reply_timeout: Option<Duration>,
    pub poll_interval: Duration,
}

impl Default for ConnectOptions {
    fn default() -> Self {
        Self {
            reply_timeout: None,
            poll_interval: DEFAULT_REPLY_POLL_INTERVAL,
        }
    }
}

/// The one open connection to the host for this run.
pub struct Connection {
    endpoints: PipeEndpoints,
    writer: Option<File>,
    replies: ReplySlot,
    broken: Arc<AtomicBool>,
    stop: Arc<AtomicBool>,
    reader: Option<thread::JoinHandle<()>>,
    reply_timeout: Option<Duration>,
    cancel: CancelToken,
}

impl Connection {
    /// Open both pipes and start the reply reader.
    ///
    /// Fails right away with `PipeUnavailable` when the host has not created the
    /// pipes or is not listening yet; retrying is the caller's business.
    pub fn open(
        endpoints: &PipeEndpoints,
        options: ConnectOptions,
        cancel: CancelToken,
    ) -> Result<Self, PipeError> {
        let writer = open_writer(endpoints.write_path())?;
        let reader_file = open_reader(endpoints.read_path())?;

        let broken = Arc::new(AtomicBool::new(false));
        let stop = Arc::new(AtomicBool::new(false));
        let (tx, rx) = bounded(1);
        let reader = spawn_reply_reader(
            reader_file,
            tx,
            ReaderShared {
                broken: Arc::clone(&broken),
                stop: Arc::clone(&stop),
                poll_interval: options.poll_interval,
            },
        )?;
        log_debug(&format!(
            "connected: write={} read={}",
            endpoints.write_path().display(),
            endpoints.read_path().display()
        ));

        Ok(Self {
            endpoints: endpoints.clone(),
            writer: Some(writer),
            replies: ReplySlot::new(rx, Arc::clone(&broken), options.poll_interval),
            broken,
            stop,
            reader: Some(reader),
            reply_timeout: options.reply_timeout,
            cancel,
        })
    }

    pub fn endpoints(&self) -> &PipeEndpoints {
        &self.endpoints
    }

    pub fn is_broken(&self) -> bool {
        self.broken.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.writer.is_none()
    }

    /// One request/reply round trip.
    pub fn send_command(&mut self, command: &Command) -> Result<String, PipeError> {
        if self.is_broken() {
            return Err(PipeError::Broken);
        }
        self.replies.arm()?;
        self.write_line(&command.encode())?;
        self.replies.await_reply(self.reply_timeout, &self.cancel)
    }

    /// Write one line plus the platform terminator and flush it.
    ///
    /// Any failure leaves the connection broken; nothing is written after that.
    pub fn write_line(&mut self, line: &str) -> Result<(), PipeError> {
        if self.is_broken() {
            return Err(PipeError::Broken);
        }
        let writer = self.writer.as_mut().ok_or(PipeError::Closed)?;
        let mut frame = String::with_capacity(line.len() + self.endpoints.line_terminator().len());
        frame.push_str(line);
        frame.push_str(self.endpoints.line_terminator());

        let result = writer
            .write_all(frame.as_bytes())
            .and_then(|_| writer.flush());
        if let Err(err) = result {
            self.broken.store(true, Ordering::SeqCst);
            return Err(classify_write_error(err));
        }
        Ok(())
    }

    /// Release both handles and join the reader. Safe to call repeatedly.
    pub fn close(&mut self) {
        if self.writer.take().is_some() {
            log_debug("closing host connection");
        }
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.reader.take() {
            join_reader(handle);
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(unix)]
fn join_reader(handle: thread::JoinHandle<()>) {
    if handle.join().is_err() {
        log_debug("reply reader thread panicked");
    }
}

/// A named pipe read cannot be interrupted, so the reader is left to finish
/// when the host closes its end.
#[cfg(not(unix))]
fn join_reader(handle: thread::JoinHandle<()>) {
    if handle.is_finished() {
        let _ = handle.join();
    }
}

pub(super) fn classify_write_error(err: io::Error) -> PipeError {
    if err.kind() == ErrorKind::BrokenPipe {
        PipeError::BrokenPipe
    } else {
        PipeError::Io(err)
    }
}

#[cfg(unix)]
fn open_writer(path: &Path) -> Result<File, PipeError> {
    use std::os::unix::fs::OpenOptionsExt;

    ensure_fifo(path)?;
    // O_NONBLOCK makes the open fail with ENXIO instead of waiting for a reader.
    let file = OpenOptions::new()
        .write(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
        .map_err(|err| open_error(path, err))?;
    // SAFETY: the fd belongs to `file`, which outlives the call.
    unsafe { set_blocking(&file)? };
    Ok(file)
}

#[cfg(unix)]
fn open_reader(path: &Path) -> Result<File, PipeError> {
    use std::os::unix::fs::OpenOptionsExt;

    ensure_fifo(path)?;
    OpenOptions::new()
        .read(true)
        .custom_flags(libc::O_NONBLOCK)
        .open(path)
        .map_err(|err| open_error(path, err))
}

#[cfg(not(unix))]
fn open_writer(path: &Path) -> Result<File, PipeError> {
    OpenOptions::new()
        .write(true)
        .open(path)
        .map_err(|err| open_error(path, err))
}

#[cfg(not(unix))]
fn open_reader(path: &Path) -> Result<File, PipeError> {
    OpenOptions::new()
        .read(true)
        .open(path)
        .map_err(|err| open_error(path, err))
}

#[cfg(unix)]
fn ensure_fifo(path: &Path) -> Result<(), PipeError> {
    use std::os::unix::fs::FileTypeExt;

    let metadata = std::fs::metadata(path).map_err(|err| open_error(path, err))?;
    if !metadata.file_type().is_fifo() {
        return Err(PipeError::unavailable(path, "not a FIFO"));
    }
    Ok(())
}

fn open_error(path: &Path, err: io::Error) -> PipeError {
    if is_unavailable(&err) {
        PipeError::unavailable(path, err.to_string())
    } else {
        PipeError::Io(err)
    }
}

#[cfg(unix)]
fn is_unavailable(err: &io::Error) -> bool {
    err.kind() == ErrorKind::NotFound || err.raw_os_error() == Some(libc::ENXIO)
}

#[cfg(not(unix))]
fn is_unavailable(err: &io::Error) -> bool {
    // ERROR_PIPE_BUSY: the host has the pipe but is serving another client.
    err.kind() == ErrorKind::NotFound || err.raw_os_error() == Some(231)
}

/// Clear `O_NONBLOCK` so writes wait for pipe space instead of failing.
///
/// # Safety
///
/// `file` must wrap a valid, open file descriptor.
#[cfg(unix)]
unsafe fn set_blocking(file: &File) -> Result<(), PipeError> {
    use std::os::unix::io::AsRawFd;

    let fd = file.as_raw_fd();
    let flags = libc::fcntl(fd, libc::F_GETFL, 0);
    if flags < 0 {
        return Err(PipeError::Io(io::Error::last_os_error()));
    }
    if libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) < 0 {
        return Err(PipeError::Io(io::Error::last_os_error()));
    }
    Ok(())
}
