use anyhow::{anyhow, bail, Context, Result};
use std::time::{Duration, Instant};

use super::logging::{log_debug, log_debug_content};
use crate::cancel::CancelToken;
use crate::config::{resolve_output_path, AppConfig};
use crate::host::{await_host_ready, image_name, HostProcess, DEFAULT_HOST_IMAGE, DEFAULT_READY_POLL};
use crate::manifest::{self, Manifest};
use crate::pipe::{Connection, PipeEndpoints, PipeError};
use crate::settings::{settings_path, HostSettings};
use crate::workflow::{RunSummary, Sequencer, Stage, WorkflowConfig};

/// Pause between attempts to open pipes that exist but are not served yet.
const CONNECT_RETRY: Duration = Duration::from_millis(250);

/// Run one join from validated flags.
///
/// The connection is always closed and the host always shut down (unless
/// `--keep-host`), whatever the outcome. A generated manifest is removed only
/// when the export succeeded.
pub fn run_join(config: &AppConfig, cancel: &CancelToken) -> Result<RunSummary> {
    let settings = load_settings(config)?;
    let output = config
        .output
        .as_deref()
        .ok_or_else(|| anyhow!("--output is required"))?;

    let mut manifest = manifest::prepare(&config.files, config.classical)?;
    for entry in manifest.entries() {
        println!("  {}", entry.display());
    }
    let output_path = resolve_output_path(
        output,
        config.save_dir.as_deref(),
        settings.as_ref().map(|s| s.default_save_dir.as_path()),
    )?;
    let workflow = config.workflow_config(manifest.path().to_path_buf(), output_path);
    log_debug_content(&format!(
        "manifest {} -> {}",
        workflow.manifest_path.display(),
        workflow.output_path.display()
    ));

    let endpoints = config.endpoints();
    let mut host = match start_host(config, settings.as_ref(), &endpoints) {
        Ok(host) => host,
        Err(err) => {
            // Nothing reached the host, so the manifest is of no further use.
            discard_manifest(&mut manifest);
            return Err(err);
        }
    };
    let outcome = join_with_host(config, &endpoints, &workflow, &host, cancel);
    if config.keep_host {
        host.release();
    } else {
        host.shutdown();
    }

    match &outcome {
        Ok(_) => discard_manifest(&mut manifest),
        Err(_) if manifest.is_generated() => {
            log_debug(&format!("kept manifest {} after failure", manifest.path().display()));
        }
        Err(_) => {}
    }
    outcome
}

/// Remove a generated manifest; failures are logged, never returned.
pub(super) fn discard_manifest(manifest: &mut Manifest) {
    if let Err(err) = manifest.remove() {
        log_debug(&format!(
            "failed to remove manifest {}: {err}",
            manifest.path().display()
        ));
    }
}

fn load_settings(config: &AppConfig) -> Result<Option<HostSettings>> {
    let Some(path) = settings_path(config.settings.as_deref()) else {
        log_debug("no settings location (HOME/APPDATA unset)");
        return Ok(None);
    };
    let settings = HostSettings::load(&path)?;
    if let Some(settings) = &settings {
        settings
            .validate()
            .with_context(|| format!("settings in {} are out of date", path.display()))?;
    }
    Ok(settings)
}

/// Attach to a running host, or launch one.
fn start_host(
    config: &AppConfig,
    settings: Option<&HostSettings>,
    endpoints: &PipeEndpoints,
) -> Result<HostProcess> {
    let command = config.host_cmd.clone().or_else(|| {
        settings.map(|s| shell_words::quote(&s.host_executable.to_string_lossy()).into_owned())
    });

    if endpoints.both_exist() {
        let image = command
            .as_deref()
            .map(|cmd| image_name(&crate::host::split_host_command(cmd).0))
            .filter(|image| !image.is_empty())
            .unwrap_or_else(|| DEFAULT_HOST_IMAGE.to_string());
        return Ok(HostProcess::attach(image));
    }

    let Some(command) = command else {
        bail!(
            "the host is not running and no executable is configured; pass --host-cmd or run --envoptions"
        );
    };
    println!("Starting {command}");
    HostProcess::launch(&command)
}

fn join_with_host(
    config: &AppConfig,
    endpoints: &PipeEndpoints,
    workflow: &WorkflowConfig,
    host: &HostProcess,
    cancel: &CancelToken,
) -> Result<RunSummary> {
    await_host_ready(endpoints, config.startup_timeout(), DEFAULT_READY_POLL, cancel)
        .context("host did not start")?;
    host.settle(config.settle(), cancel)?;
    let deadline = Instant::now() + config.startup_timeout();

    let mut connection = connect(config, endpoints, cancel, deadline)?;
    let sequencer = Sequencer::new(config.command_delay(), cancel.clone());
    let result = sequencer.run_with_progress(&mut connection, workflow, report_stage);
    connection.close();
    Ok(result?)
}

/// Open the connection, retrying while the pipes exist but nobody serves them.
fn connect(
    config: &AppConfig,
    endpoints: &PipeEndpoints,
    cancel: &CancelToken,
    deadline: Instant,
) -> Result<Connection> {
    loop {
        match Connection::open(endpoints, config.connect_options(), cancel.clone()) {
            Ok(connection) => return Ok(connection),
            Err(err @ PipeError::PipeUnavailable { .. }) => {
                if Instant::now() >= deadline {
                    return Err(err).context("host pipes never became usable");
                }
                log_debug(&format!("{err}; retrying"));
                if !cancel.sleep(CONNECT_RETRY) {
                    return Err(PipeError::Cancelled.into());
                }
            }
            Err(err) => return Err(err).context("failed to connect to the host"),
        }
    }
}

fn report_stage(stage: Stage) {
    match stage {
        Stage::Done => println!("Done."),
        other => println!("{}...", capitalize(other.label())),
    }
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// True when the error chain ends in a Ctrl-C rather than a real failure.
pub fn is_interrupted(err: &anyhow::Error) -> bool {
    err.chain().any(|cause| {
        matches!(cause.downcast_ref::<PipeError>(), Some(PipeError::Cancelled))
            || cause
                .downcast_ref::<crate::workflow::WorkflowError>()
                .is_some_and(|err| err.is_cancelled())
    })
}
