//! The audio-join command plan and the sequencer that drives it.

mod plan;
mod sequencer;


use clap::ValueEnum;
use std::path::PathBuf;
use thiserror::Error;

use crate::command::Command;
use crate::pipe::{Connection, PipeError};

pub use plan::{plan, Stage, Step};
pub use sequencer::{reply_status, ReplyStatus, RunSummary, Sequencer};

/// How an effect is applied across the imported tracks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum, Default)]
pub enum EffectMode {
    #[default]
    None,
    /// Apply to each track before they are mixed together
    #[value(alias = "i")]
    Independent,
    /// Apply once to the mixed track
    #[value(alias = "c")]
    Combined,
}

impl EffectMode {
    pub fn label(self) -> &'static str {
        match self {
            EffectMode::None => "none",
            EffectMode::Independent => "independent",
            EffectMode::Combined => "combined",
        }
    }
}

impl std::fmt::Display for EffectMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Validated inputs of one join run. Built once, read-only afterwards.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkflowConfig {
    pub truncate_enabled: bool,
    /// Accepted for compatibility; lead and trail silence are always inserted.
    pub silence_mode: EffectMode,
    pub amplify_mode: EffectMode,
    pub output_path: PathBuf,
    pub manifest_path: PathBuf,
}

/// Anything that can carry one command to the host and return its reply.
pub trait CommandSink {
    fn exchange(&mut self, command: &Command) -> Result<String, PipeError>;
}

impl CommandSink for Connection {
    fn exchange(&mut self, command: &Command) -> Result<String, PipeError> {
        self.send_command(command)
    }
}

#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("manifest {} does not exist", .0.display())]
    ManifestMissing(PathBuf),
    #[error("{stage}: `{command}` failed to reach the host: {source}")]
    Transport {
        stage: Stage,
        command: String,
        #[source]
        source: PipeError,
    },
    #[error("{stage}: host rejected `{command}`: {reply}")]
    CommandFailed {
        stage: Stage,
        command: String,
        reply: String,
    },
}

impl WorkflowError {
    /// True when the run stopped because of Ctrl-C rather than a failure.
    pub fn is_cancelled(&self) -> bool {
        matches!(
            self,
            WorkflowError::Transport {
                source: PipeError::Cancelled,
                ..
            }
        )
    }
}
