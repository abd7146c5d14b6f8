use super::defaults::{
    MAX_COMMAND_DELAY_MS, MAX_REPLY_TIMEOUT_SECS, MAX_SETTLE_MS, MAX_STARTUP_TIMEOUT_SECS,
    OUTPUT_EXTENSION,
};
use super::AppConfig;
use crate::workflow::WorkflowConfig;
use anyhow::{bail, Context, Result};
use clap::Parser;
use std::env;
use std::ffi::OsString;
use std::path::{Path, PathBuf};

impl AppConfig {
    /// Parse CLI arguments and validate them right away.
    pub fn parse_args() -> Result<Self> {
        let mut config = Self::parse();
        config.validate()?;
        Ok(config)
    }

    /// Check CLI values that clap cannot express.
    pub fn validate(&mut self) -> Result<()> {
        if !(1..=MAX_STARTUP_TIMEOUT_SECS).contains(&self.startup_timeout_secs) {
            bail!(
                "--startup-timeout-secs must be between 1 and {MAX_STARTUP_TIMEOUT_SECS}, got {}",
                self.startup_timeout_secs
            );
        }
        if self.settle_ms > MAX_SETTLE_MS {
            bail!(
                "--settle-ms must be at most {MAX_SETTLE_MS}, got {}",
                self.settle_ms
            );
        }
        if self.command_delay_ms > MAX_COMMAND_DELAY_MS {
            bail!(
                "--command-delay-ms must be at most {MAX_COMMAND_DELAY_MS}, got {}",
                self.command_delay_ms
            );
        }
        if let Some(secs) = self.reply_timeout_secs {
            if !(1..=MAX_REPLY_TIMEOUT_SECS).contains(&secs) {
                bail!("--reply-timeout-secs must be between 1 and {MAX_REPLY_TIMEOUT_SECS}, got {secs}");
            }
        }

        if let Some(cmd) = self.host_cmd.take() {
            let trimmed = cmd.trim();
            if trimmed.is_empty() {
                bail!("--host-cmd cannot be empty");
            }
            shell_words::split(trimmed)
                .with_context(|| format!("--host-cmd could not be parsed: {trimmed}"))?;
            self.host_cmd = Some(trimmed.to_string());
        }

        if let Some(dir) = &self.pipe_dir {
            if !dir.is_dir() {
                bail!("--pipe-dir {} is not a directory", dir.display());
            }
        }
        if let Some(dir) = &self.save_dir {
            if !dir.is_dir() {
                bail!("--path {} is not a directory", dir.display());
            }
        }

        if self.envoptions {
            return Ok(());
        }
        if let Some(output) = &self.output {
            if output.file_name().is_none() || ends_with_separator(output) {
                bail!("--output must name a file, got {}", output.display());
            }
        }
        Ok(())
    }

    /// Freeze the validated flags for the sequencer.
    pub fn workflow_config(&self, manifest_path: PathBuf, output_path: PathBuf) -> WorkflowConfig {
        WorkflowConfig {
            truncate_enabled: self.truncate,
            silence_mode: self.silence,
            amplify_mode: self.amplify,
            output_path,
            manifest_path,
        }
    }
}

fn ends_with_separator(path: &Path) -> bool {
    let text = path.as_os_str().to_string_lossy();
    text.ends_with('/') || text.ends_with(std::path::MAIN_SEPARATOR)
}

/// clap value parser: inputs must carry an extension, since some audio files
/// have two and guessing is not safe.
pub(super) fn parse_input_file(value: &str) -> Result<PathBuf, String> {
    let path = PathBuf::from(value);
    if path.extension().is_none() {
        return Err(format!("{value} has no file extension"));
    }
    Ok(path)
}

/// Append `.mp3` unless the name already ends with it.
pub fn ensure_output_extension(path: &Path) -> PathBuf {
    let has_mp3 = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(OUTPUT_EXTENSION));
    if has_mp3 {
        return path.to_path_buf();
    }
    let mut name = OsString::from(path.as_os_str());
    name.push(".");
    name.push(OUTPUT_EXTENSION);
    PathBuf::from(name)
}

/// Where the export lands.
///
/// Absolute names are used as given. Otherwise the file name goes under
/// `explicit_dir` (`-p`), then the saved default directory, then the current
/// directory.
pub fn resolve_output_path(
    output: &Path,
    explicit_dir: Option<&Path>,
    default_dir: Option<&Path>,
) -> Result<PathBuf> {
    if output.is_absolute() {
        return Ok(ensure_output_extension(output));
    }
    let Some(name) = output.file_name() else {
        bail!("--output must name a file, got {}", output.display());
    };
    let dir = match explicit_dir.or(default_dir) {
        Some(dir) => dir.to_path_buf(),
        None => env::current_dir().context("failed to read the current directory")?,
    };
    Ok(ensure_output_extension(&dir.join(name)))
}
