use crate::cancel::CancelToken;
use crate::{log_debug, log_debug_content};
use crossbeam_channel::{Receiver, RecvTimeoutError, TryRecvError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use super::error::{PipeError, ProtocolError};

/// What the reader thread hands to the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum ReaderEvent {
    /// One complete, blank-line terminated reply.
    Reply(String),
    /// The host closed the pipe; `partial` is whatever was buffered.
    Closed { partial: String },
}

/// Caller side of the reply handoff for one connection.
///
/// The reader publishes into a depth-1 channel, so a reply is a value that is
/// taken exactly once rather than a flag that can be observed twice.
pub struct ReplySlot {
    events: Receiver<ReaderEvent>,
    broken: Arc<AtomicBool>,
    poll_interval: Duration,
}

impl ReplySlot {
    pub(crate) fn new(
        events: Receiver<ReaderEvent>,
        broken: Arc<AtomicBool>,
        poll_interval: Duration,
    ) -> Self {
        Self {
            events,
            broken,
            poll_interval,
        }
    }

    pub fn is_broken(&self) -> bool {
        self.broken.load(Ordering::SeqCst)
    }

    /// Drop anything queued before the next command goes out.
    ///
    /// Must run right before the write it belongs to; the connection does both
    /// in one call so no other request can slip in between.
    pub fn arm(&self) -> Result<(), PipeError> {
        loop {
            match self.events.try_recv() {
                Ok(ReaderEvent::Reply(text)) => {
                    let issue = ProtocolError("discarding a reply nobody asked for".to_string());
                    log_debug(&format!("{issue} ({} bytes)", text.len()));
                    log_debug_content(&format!("discarded reply: {text:?}"));
                }
                Ok(ReaderEvent::Closed { partial }) => {
                    self.mark_broken(&partial);
                    return Err(PipeError::Broken);
                }
                Err(TryRecvError::Empty) => return Ok(()),
                Err(TryRecvError::Disconnected) => {
                    self.mark_broken("");
                    return Err(PipeError::Broken);
                }
            }
        }
    }

    /// Block until the reply to the armed command arrives.
    ///
    /// Wakes at least every poll interval to honour `cancel` and `timeout`.
    pub fn await_reply(
        &self,
        timeout: Option<Duration>,
        cancel: &CancelToken,
    ) -> Result<String, PipeError> {
        let started = Instant::now();
        loop {
            if cancel.is_cancelled() {
                return Err(PipeError::Cancelled);
            }
            let wait = match timeout {
                Some(limit) => {
                    let elapsed = started.elapsed();
                    if elapsed >= limit {
                        return Err(PipeError::Timeout {
                            what: "a reply from the host",
                            waited: elapsed,
                        });
                    }
                    (limit - elapsed).min(self.poll_interval)
                }
                None => self.poll_interval,
            };
            match self.events.recv_timeout(wait) {
                Ok(ReaderEvent::Reply(text)) => return Ok(text),
                Ok(ReaderEvent::Closed { partial }) => {
                    self.mark_broken(&partial);
                    return Err(PipeError::Broken);
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    self.mark_broken("");
                    return Err(PipeError::Broken);
                }
            }
        }
    }

    fn mark_broken(&self, partial: &str) {
        self.broken.store(true, Ordering::SeqCst);
        log_debug("reply pipe closed by host");
        if !partial.is_empty() {
            log_debug_content(&format!("partial reply at close: {partial:?}"));
        }
    }
}
