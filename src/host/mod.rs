//! Host process lifecycle: readiness, warm-up, and shutdown.

mod process;
mod ready;

#[cfg(test)]
mod tests;

pub use process::{
    image_name, split_host_command, HostProcess, DEFAULT_HOST_IMAGE, DEFAULT_SHUTDOWN_GRACE,
};
pub use ready::{await_host_ready, DEFAULT_READY_POLL};
