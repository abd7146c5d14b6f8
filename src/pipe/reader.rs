use crate::log_debug;
use crossbeam_channel::{SendTimeoutError, Sender};
use std::fs::File;
use std::io::{self, ErrorKind, Read};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::framer::ReplyFramer;
use super::reply::ReaderEvent;

/// Shared between the connection and its reader thread.
pub(super) struct ReaderShared {
    pub(super) broken: Arc<AtomicBool>,
    pub(super) stop: Arc<AtomicBool>,
    pub(super) poll_interval: Duration,
}

pub(super) fn should_retry_read_error(err: &io::Error) -> bool {
    err.kind() == ErrorKind::Interrupted || err.kind() == ErrorKind::WouldBlock
}

/// Read replies until the host hangs up or the connection asks us to stop.
pub(super) fn spawn_reply_reader(
    file: File,
    tx: Sender<ReaderEvent>,
    shared: ReaderShared,
) -> io::Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("reply-reader".to_string())
        .spawn(move || read_replies(file, tx, shared))
}

fn read_replies(mut file: File, tx: Sender<ReaderEvent>, shared: ReaderShared) {
    let mut framer = ReplyFramer::new();
    let mut buffer = [0u8; 4096];
    loop {
        if shared.stop.load(Ordering::SeqCst) {
            break;
        }
        match wait_readable(&file, shared.poll_interval) {
            Ok(true) => {}
            Ok(false) => continue,
            Err(err) => {
                log_debug(&format!("reply pipe poll failed: {err}"));
                close_stream(&mut framer, &tx, &shared);
                break;
            }
        }
        match file.read(&mut buffer) {
            Ok(0) => {
                close_stream(&mut framer, &tx, &shared);
                break;
            }
            Ok(n) => {
                let chunk = buffer.get(..n).unwrap_or(&[]);
                for reply in framer.push(chunk) {
                    if !publish(&tx, &shared, ReaderEvent::Reply(reply)) {
                        return;
                    }
                }
            }
            Err(err) if should_retry_read_error(&err) => continue,
            Err(err) => {
                log_debug(&format!("reply pipe read error: {err}"));
                close_stream(&mut framer, &tx, &shared);
                break;
            }
        }
    }
}

/// End-of-stream: flush the partial reply and mark the connection dead for good.
fn close_stream(framer: &mut ReplyFramer, tx: &Sender<ReaderEvent>, shared: &ReaderShared) {
    let partial = framer.finish();
    shared.broken.store(true, Ordering::SeqCst);
    let _ = publish(tx, shared, ReaderEvent::Closed { partial });
}

/// Hand an event to the caller. The slot holds one event, so this waits for the
/// caller to take the previous one but gives up once a stop is requested.
fn publish(tx: &Sender<ReaderEvent>, shared: &ReaderShared, event: ReaderEvent) -> bool {
    let mut pending = event;
    loop {
        match tx.send_timeout(pending, shared.poll_interval) {
            Ok(()) => return true,
            Err(SendTimeoutError::Timeout(event)) => {
                if shared.stop.load(Ordering::SeqCst) {
                    return false;
                }
                pending = event;
            }
            Err(SendTimeoutError::Disconnected(_)) => return false,
        }
    }
}

/// Wait up to `timeout` for the pipe to have data or report a hangup.
///
/// A FIFO that no writer has opened yet reports neither, which keeps a slow
/// host from looking like a crashed one.
#[cfg(unix)]
fn wait_readable(file: &File, timeout: Duration) -> io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    let mut pfd = libc::pollfd {
        fd: file.as_raw_fd(),
        events: libc::POLLIN,
        revents: 0,
    };
    let millis = timeout.as_millis().min(libc::c_int::MAX as u128) as libc::c_int;
    // SAFETY: pfd is a valid pollfd for the lifetime of the call and nfds is 1.
    let ret = unsafe { libc::poll(&mut pfd, 1, millis) };
    if ret < 0 {
        let err = io::Error::last_os_error();
        if err.kind() == ErrorKind::Interrupted {
            return Ok(false);
        }
        return Err(err);
    }
    Ok(ret > 0 && pfd.revents & (libc::POLLIN | libc::POLLHUP | libc::POLLERR) != 0)
}

/// Named pipes have no poll; reads simply block until the host writes.
#[cfg(not(unix))]
fn wait_readable(_file: &File, _timeout: Duration) -> io::Result<bool> {
    Ok(true)
}
