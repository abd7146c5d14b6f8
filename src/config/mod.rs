//! Command-line parsing and validation helpers.

mod defaults;
mod validation;

use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

use crate::pipe::{ConnectOptions, PipeEndpoints, DEFAULT_REPLY_POLL_INTERVAL};
use crate::workflow::EffectMode;

pub use defaults::{
    DEFAULT_COMMAND_DELAY_MS, DEFAULT_SETTLE_MS, DEFAULT_STARTUP_TIMEOUT_SECS, OUTPUT_EXTENSION,
};
pub use validation::{ensure_output_extension, resolve_output_path};

/// CLI options for audio-join.
#[derive(Debug, Parser, Clone)]
#[command(
    name = "audio-join",
    about = "Join audio files end to end by driving Audacity through its scripting pipe",
    author,
    version
)]
pub struct AppConfig {
    /// Two or more audio files, or one .lof file listing them
    #[arg(
        value_name = "FILES",
        required_unless_present = "envoptions",
        value_parser = validation::parse_input_file
    )]
    pub files: Vec<PathBuf>,

    /// Output file name (.mp3 is appended when missing)
    #[arg(short, long, value_name = "NAME", required_unless_present = "envoptions")]
    pub output: Option<PathBuf>,

    /// Normalize the audio: each track (independent) or the mix (combined)
    #[arg(short, long, value_enum, default_value_t = EffectMode::None)]
    pub amplify: EffectMode,

    /// Cut silence at track edges so movements join seamlessly
    #[arg(short, long, default_value_t = false)]
    pub truncate: bool,

    /// Silence handling; two seconds of lead and trail silence are always added
    #[arg(short, long, value_enum, default_value_t = EffectMode::None)]
    pub silence: EffectMode,

    /// Directory to save the output in, instead of the saved default
    #[arg(short = 'p', long = "path", value_name = "DIR")]
    pub save_dir: Option<PathBuf>,

    /// Sort the inputs by name (movements of a classical piece)
    #[arg(short, long, default_value_t = false)]
    pub classical: bool,

    /// Set up the saved default save directory and host executable, then exit
    #[arg(long, default_value_t = false, conflicts_with_all = ["files", "output"])]
    pub envoptions: bool,

    /// Command that starts the host when it is not already running
    #[arg(long = "host-cmd", env = "AUDIO_JOIN_HOST_CMD", value_name = "CMD")]
    pub host_cmd: Option<String>,

    /// Seconds to wait for the host to create its pipes
    #[arg(long = "startup-timeout-secs", default_value_t = DEFAULT_STARTUP_TIMEOUT_SECS)]
    pub startup_timeout_secs: u64,

    /// Warm-up after the pipes appear (milliseconds)
    #[arg(long = "settle-ms", default_value_t = DEFAULT_SETTLE_MS)]
    pub settle_ms: u64,

    /// Give up on a single reply after this many seconds (default: wait)
    #[arg(long = "reply-timeout-secs", value_name = "SECS")]
    pub reply_timeout_secs: Option<u64>,

    /// Pause between commands (milliseconds)
    #[arg(long = "command-delay-ms", default_value_t = DEFAULT_COMMAND_DELAY_MS)]
    pub command_delay_ms: u64,

    /// Directory holding the host's FIFOs (POSIX only; default /tmp)
    #[arg(long = "pipe-dir", env = "AUDIO_JOIN_PIPE_DIR", value_name = "DIR")]
    pub pipe_dir: Option<PathBuf>,

    /// Settings file to use instead of the per-user default
    #[arg(long = "settings", env = "AUDIO_JOIN_SETTINGS", value_name = "FILE")]
    pub settings: Option<PathBuf>,

    /// Leave the host running when the join finishes
    #[arg(long = "keep-host", default_value_t = false)]
    pub keep_host: bool,

    /// Enable file logging (debug)
    #[arg(long = "logs", env = "AUDIO_JOIN_LOGS", default_value_t = false)]
    pub logs: bool,

    /// Disable all file logging (overrides --logs and log env vars)
    #[arg(long = "no-logs", env = "AUDIO_JOIN_NO_LOGS", default_value_t = false)]
    pub no_logs: bool,

    /// Allow logging host replies and file paths (debug log only)
    #[arg(
        long = "log-content",
        env = "AUDIO_JOIN_LOG_CONTENT",
        default_value_t = false
    )]
    pub log_content: bool,
}

impl AppConfig {
    pub fn startup_timeout(&self) -> Duration {
        Duration::from_secs(self.startup_timeout_secs)
    }

    pub fn settle(&self) -> Duration {
        Duration::from_millis(self.settle_ms)
    }

    pub fn command_delay(&self) -> Duration {
        Duration::from_millis(self.command_delay_ms)
    }

    pub fn connect_options(&self) -> ConnectOptions {
        ConnectOptions {
            reply_timeout: self.reply_timeout_secs.map(Duration::from_secs),
            poll_interval: DEFAULT_REPLY_POLL_INTERVAL,
        }
    }

    /// Pipe paths for this run: the platform defaults unless `--pipe-dir` is set.
    pub fn endpoints(&self) -> PipeEndpoints {
        match &self.pipe_dir {
            Some(dir) => PipeEndpoints::in_dir(dir),
            None => PipeEndpoints::for_platform(),
        }
    }
}
