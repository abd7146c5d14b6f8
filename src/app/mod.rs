mod logging;
mod run;

#[cfg(all(test, unix))]
mod tests;

pub use logging::{
    crash_log_path, init_logging, log_debug, log_debug_content, log_file_path, log_panic,
};
pub use run::{is_interrupted, run_join};
