//! Saved defaults: where joined files go and which host executable to launch.

mod setup;


use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::log_debug;

pub use setup::{run_setup, search_for_exe};

const SETTINGS_DIR: &str = "audio-join";
const SETTINGS_FILE: &str = "settings.json";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostSettings {
    /// Directory relative output names are placed in.
    pub default_save_dir: PathBuf,
    pub host_executable: PathBuf,
}

/// Where settings live, given an explicit override and the environment.
pub fn settings_path(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    settings_path_from(
        env::var_os("XDG_CONFIG_HOME").map(PathBuf::from),
        env::var_os("HOME").map(PathBuf::from),
        env::var_os("APPDATA").map(PathBuf::from),
    )
}

pub(crate) fn settings_path_from(
    xdg_config_home: Option<PathBuf>,
    home: Option<PathBuf>,
    appdata: Option<PathBuf>,
) -> Option<PathBuf> {
    let base = if cfg!(windows) {
        appdata.or(xdg_config_home)?
    } else {
        xdg_config_home
            .filter(|dir| dir.is_absolute())
            .or_else(|| home.map(|home| home.join(".config")))?
    };
    Some(base.join(SETTINGS_DIR).join(SETTINGS_FILE))
}

impl HostSettings {
    /// Read saved settings; `Ok(None)` when none have been saved yet.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read {}", path.display()))
            }
        };
        let settings = serde_json::from_str(&text)
            .with_context(|| format!("{} is not valid settings JSON", path.display()))?;
        log_debug(&format!("loaded settings from {}", path.display()));
        Ok(Some(settings))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let text = serde_json::to_string_pretty(self).context("failed to encode settings")?;
        fs::write(path, text).with_context(|| format!("failed to write {}", path.display()))?;
        log_debug(&format!("saved settings to {}", path.display()));
        Ok(())
    }

    /// Saved paths can go stale; both must still point at the right kind of file.
    pub fn validate(&self) -> Result<()> {
        if !self.default_save_dir.is_dir() {
            bail!(
                "default save directory {} no longer exists; run with --envoptions to reset it",
                self.default_save_dir.display()
            );
        }
        if !is_executable(&self.host_executable) {
            bail!(
                "host executable {} is missing or not executable; run with --envoptions to reset it",
                self.host_executable.display()
            );
        }
        Ok(())
    }
}

#[cfg(unix)]
pub fn is_executable(path: &Path) -> bool {
    use std::os::unix::fs::PermissionsExt;

    fs::metadata(path)
        .map(|meta| meta.is_file() && meta.permissions().mode() & 0o111 != 0)
        .unwrap_or(false)
}

#[cfg(not(unix))]
pub fn is_executable(path: &Path) -> bool {
    path.is_file()
}
