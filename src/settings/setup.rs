use anyhow::{bail, Result};
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Input};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use super::{is_executable, HostSettings};

#[cfg(windows)]
const HOST_BINARY: &str = "audacity.exe";
#[cfg(not(windows))]
const HOST_BINARY: &str = "audacity";

/// Look for the host on PATH, then in the usual install locations.
pub fn search_for_exe() -> Option<PathBuf> {
    if let Ok(found) = which::which(HOST_BINARY) {
        return Some(found);
    }
    install_candidates()
        .into_iter()
        .find(|candidate| is_executable(candidate))
}

#[cfg(windows)]
fn install_candidates() -> Vec<PathBuf> {
    ["ProgramFiles", "ProgramFiles(x86)"]
        .iter()
        .filter_map(|var| env::var_os(var))
        .map(|dir| PathBuf::from(dir).join("Audacity").join(HOST_BINARY))
        .collect()
}

#[cfg(not(windows))]
fn install_candidates() -> Vec<PathBuf> {
    let mut candidates: Vec<PathBuf> = [
        "/usr/bin/audacity",
        "/usr/local/bin/audacity",
        "/snap/bin/audacity",
        "/var/lib/flatpak/exports/bin/org.audacityteam.Audacity",
        "/Applications/Audacity.app/Contents/MacOS/Audacity",
    ]
    .iter()
    .map(PathBuf::from)
    .collect();
    if let Some(home) = env::var_os("HOME") {
        candidates.push(PathBuf::from(home).join("Applications/Audacity.AppImage"));
    }
    candidates
}

/// Interactive `--envoptions` setup. Saves to `path` and returns what was saved.
pub fn run_setup(path: &Path) -> Result<HostSettings> {
    let theme = ColorfulTheme::default();

    let search = Confirm::with_theme(&theme)
        .with_prompt("Search for Audacity automatically?")
        .default(true)
        .interact()?;
    let found = if search { search_for_exe() } else { None };
    let host_executable = match found {
        Some(exe) => {
            println!("Audacity located at {}.", exe.display());
            exe
        }
        None => {
            if search {
                println!("Audacity could not be found automatically.");
            }
            prompt_for_exe(&theme)?
        }
    };

    let save_dir: String = Input::<String>::with_theme(&theme)
        .with_prompt("Default directory for joined files")
        .interact_text()?;
    let default_save_dir = PathBuf::from(save_dir.trim());
    if default_save_dir.is_dir() {
        println!("Default save location found at {}.", default_save_dir.display());
    } else {
        let create = Confirm::with_theme(&theme)
            .with_prompt(format!(
                "{} does not exist. Create it?",
                default_save_dir.display()
            ))
            .default(true)
            .interact()?;
        if !create {
            bail!("a default save directory is required");
        }
        fs::create_dir_all(&default_save_dir)?;
    }

    let settings = HostSettings {
        default_save_dir,
        host_executable,
    };
    settings.save(path)?;
    println!("Saved settings to {}.", path.display());
    Ok(settings)
}

fn prompt_for_exe(theme: &ColorfulTheme) -> Result<PathBuf> {
    let answer: String = Input::<String>::with_theme(theme)
        .with_prompt("Path to the Audacity executable")
        .interact_text()?;
    let exe = PathBuf::from(answer.trim());
    if !is_executable(&exe) {
        bail!("{} is not an executable file", exe.display());
    }
    Ok(exe)
}
