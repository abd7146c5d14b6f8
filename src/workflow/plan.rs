use std::fmt;

use crate::command::vocab::{self, TimeAnchor, SILENCE_SECONDS};
use crate::command::Command;

use super::{EffectMode, WorkflowConfig};

/// Where in the join a step belongs. Used for progress output and errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Importing,
    Preparing,
    Aligning,
    Truncating,
    Realigning,
    Amplifying,
    Mixing,
    SilenceInsertion,
    Exporting,
    Done,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::Importing => "importing",
            Stage::Preparing => "preparing",
            Stage::Aligning => "aligning",
            Stage::Truncating => "truncating silence",
            Stage::Realigning => "realigning",
            Stage::Amplifying => "amplifying",
            Stage::Mixing => "mixing",
            Stage::SilenceInsertion => "inserting silence",
            Stage::Exporting => "exporting",
            Stage::Done => "done",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    pub stage: Stage,
    pub command: Command,
}

fn step(stage: Stage, command: Command) -> Step {
    Step { stage, command }
}

/// Build the ordered command list for one run.
///
/// Most effects act on the selection, so nearly every effect is preceded by a
/// `SelectAll`.
pub fn plan(config: &WorkflowConfig) -> Vec<Step> {
    let mut steps = vec![
        step(Stage::Importing, vocab::import(&config.manifest_path)),
        step(Stage::Preparing, vocab::select_all_tracks()),
        step(Stage::Aligning, vocab::select_all()),
        step(Stage::Aligning, vocab::align_end_to_end()),
    ];

    if config.truncate_enabled {
        steps.push(step(Stage::Truncating, vocab::select_all()));
        steps.push(step(Stage::Truncating, vocab::truncate_silence()));
    }
    steps.push(step(Stage::Realigning, vocab::select_all()));
    steps.push(step(Stage::Realigning, vocab::align_end_to_end()));

    // Per-track loudness only exists while the tracks are still separate.
    if config.amplify_mode == EffectMode::Independent {
        steps.push(step(Stage::Amplifying, vocab::select_all()));
        steps.push(step(Stage::Amplifying, vocab::normalize()));
    }

    steps.push(step(Stage::Mixing, vocab::select_all()));
    steps.push(step(Stage::Mixing, vocab::mix_and_render()));

    if config.amplify_mode == EffectMode::Combined {
        steps.push(step(Stage::Amplifying, vocab::select_all()));
        steps.push(step(Stage::Amplifying, vocab::normalize()));
    }

    steps.extend([
        step(Stage::SilenceInsertion, vocab::select_none()),
        step(Stage::SilenceInsertion, vocab::select_all_tracks()),
        step(
            Stage::SilenceInsertion,
            vocab::select_time(TimeAnchor::ProjectStart, SILENCE_SECONDS),
        ),
        step(
            Stage::SilenceInsertion,
            vocab::insert_silence(TimeAnchor::ProjectStart),
        ),
        step(
            Stage::SilenceInsertion,
            vocab::select_time(TimeAnchor::ProjectEnd, SILENCE_SECONDS),
        ),
        step(
            Stage::SilenceInsertion,
            vocab::insert_silence(TimeAnchor::ProjectEnd),
        ),
        step(Stage::SilenceInsertion, vocab::select_all()),
        step(Stage::SilenceInsertion, vocab::join()),
        step(Stage::Exporting, vocab::export(&config.output_path)),
    ]);
    steps
}
