//! The host commands the join workflow uses.

use super::Command;
use std::path::Path;

/// Length of the silence added before and after the joined track.
pub const SILENCE_SECONDS: u32 = 2;

/// Quiet floor below which silence between tracks is cut (dB).
pub const TRUNCATE_THRESHOLD_DB: i32 = -59;
/// Shortest silence the truncate effect acts on (seconds).
pub const TRUNCATE_MINIMUM_SECONDS: f64 = 0.001;
/// Peak the normalize step raises the audio to (dB).
pub const NORMALIZE_PEAK_DB: i32 = 0;
pub const EXPORT_CHANNELS: u32 = 2;

// The host has no plain "insert silence" macro, so a Nyquist snippet replaces
// the selected span with rest followed (or preceded) by the original audio.
const LEAD_SILENCE_NYQUIST: &str = "(defun insertlead (sig) (sum (s-rest 2) (at 1 (cue sig)))) \
     (multichan-expand #'insertlead s)";
const TRAIL_SILENCE_NYQUIST: &str = "(defun inserttrail (sig) (sum (s-rest 2) (at 0 (cue sig)))) \
     (multichan-expand #'inserttrail s)";

/// Which end of the project a time selection is measured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeAnchor {
    ProjectStart,
    ProjectEnd,
}

impl TimeAnchor {
    pub fn label(self) -> &'static str {
        match self {
            TimeAnchor::ProjectStart => "ProjectStart",
            TimeAnchor::ProjectEnd => "ProjectEnd",
        }
    }
}

/// Open every file listed in a `.lof` manifest as one multi-track project.
pub fn import(manifest: &Path) -> Command {
    Command::new("Import2").arg("Filename", manifest.display())
}

pub fn select_all() -> Command {
    Command::new("SelectAll")
}

pub fn select_none() -> Command {
    Command::new("SelectNone")
}

/// Select every track without a time range; gives the cursor a track to act on.
pub fn select_all_tracks() -> Command {
    Command::new("SelAllTracks")
}

pub fn select_time(anchor: TimeAnchor, seconds: u32) -> Command {
    Command::new("SelectTime")
        .arg("Start", 0)
        .arg("End", seconds)
        .arg("RelativeTo", anchor.label())
}

pub fn align_end_to_end() -> Command {
    Command::new("Align_EndToEnd")
}

/// Cut silence at track edges so movements played attacca join seamlessly.
pub fn truncate_silence() -> Command {
    Command::new("TruncateSilence")
        .arg("Threshold", TRUNCATE_THRESHOLD_DB)
        .arg("Minimum", TRUNCATE_MINIMUM_SECONDS)
        .arg("Truncate", 0)
        .arg("Independent", "True")
}

pub fn mix_and_render() -> Command {
    Command::new("MixAndRender")
}

/// Amplify is not scriptable; normalizing to a 0 dB peak has the same effect.
pub fn normalize() -> Command {
    Command::new("Normalize")
        .arg("PeakLevel", NORMALIZE_PEAK_DB)
        .arg("RemoveDcOffset", "False")
}

/// Insert silence over the current selection. Needs a selection to work.
pub fn insert_silence(anchor: TimeAnchor) -> Command {
    let snippet = match anchor {
        TimeAnchor::ProjectStart => LEAD_SILENCE_NYQUIST,
        TimeAnchor::ProjectEnd => TRAIL_SILENCE_NYQUIST,
    };
    Command::new("NyquistPrompt").arg("Command", snippet)
}

pub fn join() -> Command {
    Command::new("Join")
}

/// Export takes bitrate and quality from the host's last-used export settings.
pub fn export(output: &Path) -> Command {
    Command::new("Export2")
        .arg("Filename", output.display())
        .arg("NumChannels", EXPORT_CHANNELS)
}
