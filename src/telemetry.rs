//! Structured per-command trace, separate from the plain debug log.

use crate::config::AppConfig;
use crate::log_debug;
use std::env;
use std::fs::OpenOptions;
use std::path::PathBuf;
use std::sync::OnceLock;
use tracing_subscriber::fmt::time::UtcTime;

static TRACE_PATH: OnceLock<Option<PathBuf>> = OnceLock::new();

pub fn tracing_log_path() -> PathBuf {
    env::var("AUDIO_JOIN_TRACE_LOG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| env::temp_dir().join("audio_join_trace.jsonl"))
}

/// Route `tracing` events (one per host command) to a JSON lines file.
///
/// Returns the trace file path when a subscriber is active.
pub fn init_tracing(config: &AppConfig) -> Option<PathBuf> {
    if !config.logs || config.no_logs {
        return None;
    }

    TRACE_PATH
        .get_or_init(|| {
            let path = tracing_log_path();
            let file = match OpenOptions::new().create(true).append(true).open(&path) {
                Ok(file) => file,
                Err(err) => {
                    log_debug(&format!("trace log {} unavailable: {err}", path.display()));
                    return None;
                }
            };
            let subscriber = tracing_subscriber::fmt()
                .json()
                .with_timer(UtcTime::rfc_3339())
                .with_writer(file)
                .with_target(false)
                .with_current_span(false)
                .with_span_list(false)
                .finish();
            tracing::subscriber::set_global_default(subscriber).ok()?;
            Some(path)
        })
        .clone()
}
