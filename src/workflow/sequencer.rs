use std::path::PathBuf;
use std::time::{Duration, Instant};

use crate::cancel::CancelToken;
use crate::pipe::{PipeError, ProtocolError};
use crate::{log_debug, log_debug_content};

use super::plan::{plan, Stage, Step};
use super::{CommandSink, WorkflowConfig, WorkflowError};

const STATUS_PREFIX: &str = "BatchCommand finished:";

/// Outcome the host reports on the last line of a reply.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplyStatus {
    Ok,
    Failed,
}

/// Find the `BatchCommand finished: ...` line of a reply.
pub fn reply_status(reply: &str) -> Result<ReplyStatus, ProtocolError> {
    let status = reply
        .lines()
        .rev()
        .find_map(|line| line.trim().strip_prefix(STATUS_PREFIX))
        .ok_or_else(|| ProtocolError("reply has no status line".to_string()))?;
    let status = status.trim();
    if status.starts_with("OK") {
        Ok(ReplyStatus::Ok)
    } else if status.starts_with("Failed") {
        Ok(ReplyStatus::Failed)
    } else {
        Err(ProtocolError(format!("unknown reply status {status:?}")))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub commands_sent: usize,
    /// Replies that could not be parsed but did not stop the run.
    pub protocol_warnings: usize,
    pub output_path: PathBuf,
}

/// Sends a plan to the host one command at a time.
#[derive(Debug, Clone)]
pub struct Sequencer {
    pause: Duration,
    cancel: CancelToken,
}

impl Sequencer {
    pub fn new(pause: Duration, cancel: CancelToken) -> Self {
        Self { pause, cancel }
    }

    pub fn run<S: CommandSink>(
        &self,
        sink: &mut S,
        config: &WorkflowConfig,
    ) -> Result<RunSummary, WorkflowError> {
        self.run_with_progress(sink, config, |_| {})
    }

    /// Like `run`, calling `on_stage` each time the run enters a new stage.
    pub fn run_with_progress<S, F>(
        &self,
        sink: &mut S,
        config: &WorkflowConfig,
        mut on_stage: F,
    ) -> Result<RunSummary, WorkflowError>
    where
        S: CommandSink,
        F: FnMut(Stage),
    {
        let steps = plan(config);
        let mut summary = RunSummary {
            commands_sent: 0,
            protocol_warnings: 0,
            output_path: config.output_path.clone(),
        };
        let mut current = None;

        for (index, step) in steps.iter().enumerate() {
            if current != Some(step.stage) {
                current = Some(step.stage);
                on_stage(step.stage);
            }
            if step.stage == Stage::Importing && !config.manifest_path.exists() {
                return Err(WorkflowError::ManifestMissing(config.manifest_path.clone()));
            }
            if index > 0 && !self.cancel.sleep(self.pause) {
                return Err(transport(step, PipeError::Cancelled));
            }

            let started = Instant::now();
            let reply = sink
                .exchange(&step.command)
                .map_err(|source| transport(step, source))?;
            summary.commands_sent += 1;
            log_debug(&format!(
                "{}: {} answered in {} ms",
                step.stage,
                step.command.name(),
                started.elapsed().as_millis()
            ));
            log_debug_content(&format!("reply to {}: {reply:?}", step.command));

            match reply_status(&reply) {
                Ok(ReplyStatus::Ok) => {
                    tracing::info!(
                        stage = step.stage.label(),
                        command = step.command.name(),
                        elapsed_ms = started.elapsed().as_millis() as u64,
                        "host command ok"
                    );
                }
                Ok(ReplyStatus::Failed) => {
                    tracing::warn!(
                        stage = step.stage.label(),
                        command = step.command.name(),
                        "host command failed"
                    );
                    return Err(WorkflowError::CommandFailed {
                        stage: step.stage,
                        command: step.command.encode(),
                        reply: reply.trim_end().to_string(),
                    });
                }
                Err(issue) => {
                    summary.protocol_warnings += 1;
                    log_debug(&format!("{}: {issue}", step.command.name()));
                    tracing::warn!(
                        stage = step.stage.label(),
                        command = step.command.name(),
                        "{issue}"
                    );
                }
            }
        }

        on_stage(Stage::Done);
        Ok(summary)
    }
}

fn transport(step: &Step, source: PipeError) -> WorkflowError {
    WorkflowError::Transport {
        stage: step.stage,
        command: step.command.encode(),
        source,
    }
}
