//! Default values for the operational flags.

/// Seconds to wait for the host to create its pipes.
pub const DEFAULT_STARTUP_TIMEOUT_SECS: u64 = 15;
pub const MAX_STARTUP_TIMEOUT_SECS: u64 = 600;

/// Warm-up after the pipes appear, while the host finishes loading.
pub const DEFAULT_SETTLE_MS: u64 = 3_000;
pub const MAX_SETTLE_MS: u64 = 60_000;

/// Pause between commands so the host can finish redrawing.
pub const DEFAULT_COMMAND_DELAY_MS: u64 = 500;
pub const MAX_COMMAND_DELAY_MS: u64 = 10_000;

pub const MAX_REPLY_TIMEOUT_SECS: u64 = 24 * 60 * 60;

/// Extension the export step writes.
pub const OUTPUT_EXTENSION: &str = "mp3";
