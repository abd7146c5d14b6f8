//! Input collection and the `.lof` manifest the host imports.
//!
//! A manifest is plain text with one `file "<absolute path>"` line per input.
//! Either the user hands us one, or we write a temporary one from the file
//! arguments and delete it once the join has succeeded.


use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};
use thiserror::Error;

use crate::log_debug;

pub const MANIFEST_EXTENSION: &str = "lof";
/// Joining needs at least this many inputs.
pub const MIN_INPUTS: usize = 2;

static MANIFEST_COUNTER: AtomicU32 = AtomicU32::new(0);

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("pass a .lof file listing two or more files, or two or more audio files")]
    NotEnoughInputs,
    #[error("input {} is not readable: {source}", path.display())]
    InputMissing {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("{}: {reason}", path.display())]
    Invalid { path: PathBuf, reason: String },
    #[error("manifest I/O failed: {0}")]
    Io(#[from] io::Error),
}

/// The manifest for one run.
#[derive(Debug)]
pub struct Manifest {
    path: PathBuf,
    generated: bool,
    entries: Vec<PathBuf>,
}

impl Manifest {
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// True when we wrote this file and own its removal.
    pub fn is_generated(&self) -> bool {
        self.generated
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    /// Delete a generated manifest. User manifests are never touched.
    pub fn remove(&mut self) -> io::Result<()> {
        if !self.generated {
            return Ok(());
        }
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => return Err(err),
        }
        log_debug(&format!("removed manifest {}", self.path.display()));
        self.generated = false;
        Ok(())
    }
}

/// Turn the positional arguments into a manifest.
///
/// One `.lof` argument is verified and used as is; two or more files are
/// resolved (and sorted when `sort` is set) into a fresh temporary manifest.
pub fn prepare(inputs: &[PathBuf], sort: bool) -> Result<Manifest, ManifestError> {
    match inputs {
        [single] if is_manifest(single) => {
            let path = resolve(single)?;
            let entries = verify_manifest(&path)?;
            Ok(Manifest {
                path,
                generated: false,
                entries,
            })
        }
        _ if inputs.len() >= MIN_INPUTS => {
            let entries = collect_inputs(inputs, sort)?;
            let path = write_manifest(&entries, &std::env::temp_dir())?;
            Ok(Manifest {
                path,
                generated: true,
                entries,
            })
        }
        _ => Err(ManifestError::NotEnoughInputs),
    }
}

pub fn is_manifest(path: &Path) -> bool {
    path.extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case(MANIFEST_EXTENSION))
}

/// Resolve every input to an absolute path; each one must exist.
pub fn collect_inputs(inputs: &[PathBuf], sort: bool) -> Result<Vec<PathBuf>, ManifestError> {
    let mut ordered: Vec<&PathBuf> = inputs.iter().collect();
    if sort {
        ordered.sort();
    }
    ordered.into_iter().map(|path| resolve(path)).collect()
}

fn resolve(path: &Path) -> Result<PathBuf, ManifestError> {
    fs::canonicalize(path).map_err(|source| ManifestError::InputMissing {
        path: path.to_path_buf(),
        source,
    })
}

pub fn render_manifest(entries: &[PathBuf]) -> String {
    entries
        .iter()
        .map(|path| format!("file \"{}\"", path.display()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Write `entries` to a new, uniquely named `.lof` under `dir`.
pub fn write_manifest(entries: &[PathBuf], dir: &Path) -> Result<PathBuf, ManifestError> {
    let contents = render_manifest(entries);
    loop {
        let path = dir.join(unique_name());
        let mut file = match OpenOptions::new().write(true).create_new(true).open(&path) {
            Ok(file) => file,
            Err(err) if err.kind() == io::ErrorKind::AlreadyExists => continue,
            Err(err) => return Err(err.into()),
        };
        file.write_all(contents.as_bytes())?;
        file.flush()?;
        log_debug(&format!(
            "wrote manifest {} with {} entries",
            path.display(),
            entries.len()
        ));
        return Ok(path);
    }
}

fn unique_name() -> String {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    let count = MANIFEST_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!(
        "audio-join-{}-{nanos:09}-{count}.{MANIFEST_EXTENSION}",
        std::process::id()
    )
}

/// Check a user-supplied manifest and return the files it lists.
///
/// Relative entries are taken relative to the manifest's own directory.
pub fn verify_manifest(path: &Path) -> Result<Vec<PathBuf>, ManifestError> {
    let text = fs::read_to_string(path)?;
    let base = path.parent().unwrap_or_else(|| Path::new("."));
    let mut entries = Vec::new();
    for (number, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let entry = parse_entry(line).ok_or_else(|| ManifestError::Invalid {
            path: path.to_path_buf(),
            reason: format!("line {} is not a `file \"...\"` entry", number + 1),
        })?;
        let entry = base.join(entry);
        if !entry.exists() {
            return Err(ManifestError::Invalid {
                path: path.to_path_buf(),
                reason: format!("listed file {} does not exist", entry.display()),
            });
        }
        entries.push(entry);
    }
    if entries.len() < MIN_INPUTS {
        return Err(ManifestError::Invalid {
            path: path.to_path_buf(),
            reason: format!(
                "lists {} file(s); at least {MIN_INPUTS} are needed",
                entries.len()
            ),
        });
    }
    Ok(entries)
}

fn parse_entry(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("file")?.trim_start();
    let value = match rest.strip_prefix('"') {
        Some(inner) => inner.strip_suffix('"')?,
        None if !rest.contains('"') => rest,
        None => return None,
    };
    (!value.is_empty()).then_some(value)
}
