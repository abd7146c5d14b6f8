use std::time::{Duration, Instant};

use crate::cancel::CancelToken;
use crate::log_debug;
use crate::pipe::{PipeEndpoints, PipeError};

/// How often the pipe paths are checked while the host starts.
pub const DEFAULT_READY_POLL: Duration = Duration::from_secs(1);

/// Wait until the host has created both pipes.
///
/// Checks immediately, then every `poll_interval`, and gives up once `timeout`
/// has elapsed. The last sleep is cut short so the deadline is never overshot.
pub fn await_host_ready(
    endpoints: &PipeEndpoints,
    timeout: Duration,
    poll_interval: Duration,
    cancel: &CancelToken,
) -> Result<(), PipeError> {
    let started = Instant::now();
    let poll_interval = poll_interval.max(Duration::from_millis(1));
    loop {
        if endpoints.both_exist() {
            log_debug(&format!(
                "host pipes ready after {} ms",
                started.elapsed().as_millis()
            ));
            return Ok(());
        }
        if cancel.is_cancelled() {
            return Err(PipeError::Cancelled);
        }
        let elapsed = started.elapsed();
        if elapsed >= timeout {
            return Err(PipeError::Timeout {
                what: "the host to create its pipes",
                waited: elapsed,
            });
        }
        let nap = poll_interval.min(timeout - elapsed);
        if !cancel.sleep(nap) {
            return Err(PipeError::Cancelled);
        }
    }
}
