//! Run-wide cancellation flag plus the SIGINT/SIGTERM hook that trips it.

use anyhow::Result;
#[cfg(unix)]
use anyhow::anyhow;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

use crate::log_debug;

/// Flag the signal handler raises; set once from the token passed to
/// `install_interrupt_handler`.
static INTERRUPT_FLAG: OnceLock<Arc<AtomicBool>> = OnceLock::new();

/// Shared cancellation flag checked by every blocking wait of a run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Sleep for `duration` in short slices; returns false if cancelled meanwhile.
    pub fn sleep(&self, duration: Duration) -> bool {
        let deadline = Instant::now() + duration;
        loop {
            if self.is_cancelled() {
                return false;
            }
            let now = Instant::now();
            if now >= deadline {
                return true;
            }
            thread::sleep((deadline - now).min(Duration::from_millis(50)));
        }
    }
}

/// First SIGINT/SIGTERM cancels the run; a second one exits immediately.
///
/// Only async-signal-safe work happens in here: an atomic swap and `_exit`.
#[cfg(unix)]
extern "C" fn handle_interrupt(_: libc::c_int) {
    if let Some(flag) = INTERRUPT_FLAG.get() {
        if flag.swap(true, Ordering::SeqCst) {
            // SAFETY: _exit is async-signal-safe.
            unsafe { libc::_exit(130) };
        }
    }
}

/// Route Ctrl-C and termination requests to `token`.
#[cfg(unix)]
pub fn install_interrupt_handler(token: &CancelToken) -> Result<()> {
    if INTERRUPT_FLAG.set(Arc::clone(&token.flag)).is_err() {
        log_debug("interrupt handler already installed; keeping the first token");
        return Ok(());
    }
    unsafe {
        // SAFETY: handle_interrupt only touches an atomic and calls _exit.
        let handler = handle_interrupt as *const () as libc::sighandler_t;
        for signo in [libc::SIGINT, libc::SIGTERM] {
            if libc::signal(signo, handler) == libc::SIG_ERR {
                log_debug(&format!("failed to install handler for signal {signo}"));
                return Err(anyhow!("failed to install handler for signal {signo}"));
            }
        }
    }
    Ok(())
}

#[cfg(not(unix))]
pub fn install_interrupt_handler(token: &CancelToken) -> Result<()> {
    let _ = INTERRUPT_FLAG.set(Arc::clone(&token.flag));
    log_debug("interrupt handling unsupported on this platform; Ctrl-C ends the process");
    Ok(())
}
