pub mod cancel;
pub mod command;
pub mod config;
pub mod host;
pub mod manifest;
pub mod pipe;
pub mod settings;
mod telemetry;
pub mod workflow;

mod app;

#[cfg(all(test, unix))]
mod test_support;

pub use app::*;
pub use cancel::{install_interrupt_handler, CancelToken};
pub use telemetry::{init_tracing, tracing_log_path};
