use super::*;
use crate::cancel::CancelToken;
use crate::command::Command;
use crate::config::AppConfig;
use crate::pipe::PipeError;
use crate::test_support::{fifo_pair, spawn_host, Script};
use crate::workflow::WorkflowError;
use clap::Parser;
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

struct Fixture {
    dir: TempDir,
    inputs: Vec<PathBuf>,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let inputs = ["1 Allegro.wav", "2 Adagio.wav"]
            .iter()
            .map(|name| {
                let path = dir.path().join(name);
                fs::write(&path, b"RIFF").unwrap();
                path
            })
            .collect();
        Self { dir, inputs }
    }

    /// Flags for a run against the FIFOs in our temp dir, leaving the
    /// stand-in host alone at the end.
    fn config(&self, extra: &[&str]) -> AppConfig {
        let dir = self.dir.path();
        let mut argv: Vec<String> = vec!["audio-join".to_string()];
        argv.extend(self.inputs.iter().map(|p| p.display().to_string()));
        argv.extend([
            "-o".to_string(),
            dir.join("joined").display().to_string(),
            "--pipe-dir".to_string(),
            dir.display().to_string(),
            "--settings".to_string(),
            dir.join("settings.json").display().to_string(),
            "--settle-ms".to_string(),
            "0".to_string(),
            "--command-delay-ms".to_string(),
            "0".to_string(),
            "--startup-timeout-secs".to_string(),
            "5".to_string(),
            "--keep-host".to_string(),
        ]);
        argv.extend(extra.iter().map(|s| s.to_string()));
        let mut config = AppConfig::parse_from(argv);
        config.validate().expect("valid config");
        config
    }
}

fn imported_manifest(received: &[String]) -> PathBuf {
    let import = Command::decode(&received[0]).expect("import line");
    assert_eq!(import.name(), "Import2");
    PathBuf::from(import.param("Filename").expect("filename"))
}

#[test]
fn join_runs_the_whole_plan_and_cleans_up() {
    let fixture = Fixture::new();
    let endpoints = fifo_pair(fixture.dir.path());
    let host = spawn_host(&endpoints, Script::Echo);

    let config = fixture.config(&["-t", "-a", "combined"]);
    let summary = run_join(&config, &CancelToken::new()).expect("join succeeds");
    assert_eq!(summary.commands_sent, 21);
    assert_eq!(summary.output_path, fixture.dir.path().join("joined.mp3"));

    let received = host.join().unwrap();
    assert_eq!(received.len(), 21);
    let manifest = imported_manifest(&received);
    assert!(!manifest.exists(), "generated manifest is removed");
    assert_eq!(
        received.last().map(String::as_str),
        Some(
            Command::new("Export2")
                .arg("Filename", fixture.dir.path().join("joined.mp3").display())
                .arg("NumChannels", 2)
                .encode()
                .as_str()
        )
    );
}

#[test]
fn rejected_command_keeps_the_manifest() {
    let fixture = Fixture::new();
    let endpoints = fifo_pair(fixture.dir.path());
    let host = spawn_host(&endpoints, Script::FailFirst);

    let err = run_join(&fixture.config(&[]), &CancelToken::new()).unwrap_err();
    assert!(matches!(
        err.downcast_ref::<WorkflowError>(),
        Some(WorkflowError::CommandFailed { .. })
    ));
    assert!(!is_interrupted(&err));

    let received = host.join().unwrap();
    assert_eq!(received.len(), 1);
    let manifest = imported_manifest(&received);
    assert!(manifest.exists(), "manifest is kept for a retry");
    fs::remove_file(manifest).unwrap();
}

#[test]
fn host_hangup_aborts_the_join() {
    let fixture = Fixture::new();
    let endpoints = fifo_pair(fixture.dir.path());
    let host = spawn_host(&endpoints, Script::CloseRepliesAfterFirst);

    let err = run_join(&fixture.config(&[]), &CancelToken::new()).unwrap_err();
    match err.downcast_ref::<WorkflowError>() {
        Some(WorkflowError::Transport { source, .. }) => {
            assert!(matches!(source, PipeError::Broken));
        }
        other => panic!("unexpected error: {other:?}"),
    }
    let received = host.join().unwrap();
    assert!(received.len() <= 2);
    let manifest = imported_manifest(&received);
    let _ = fs::remove_file(manifest);
}

#[test]
fn missing_host_without_command_is_a_usage_error() {
    let fixture = Fixture::new();
    let err = run_join(&fixture.config(&[]), &CancelToken::new()).unwrap_err();
    assert!(err.to_string().contains("--host-cmd"));
}

#[test]
fn discarding_a_generated_manifest_deletes_it_once() {
    let fixture = Fixture::new();
    let mut manifest = crate::manifest::prepare(&fixture.inputs, false).unwrap();
    let path = manifest.path().to_path_buf();
    assert!(path.exists());
    super::run::discard_manifest(&mut manifest);
    assert!(!path.exists());
    super::run::discard_manifest(&mut manifest);
}

#[test]
fn discarding_a_user_manifest_leaves_it_alone() {
    let fixture = Fixture::new();
    let lof = fixture.dir.path().join("mine.lof");
    let lines: Vec<String> = fixture
        .inputs
        .iter()
        .map(|p| format!("file \"{}\"", p.display()))
        .collect();
    fs::write(&lof, lines.join("\n")).unwrap();
    let mut manifest = crate::manifest::prepare(&[lof.clone()], false).unwrap();
    super::run::discard_manifest(&mut manifest);
    assert!(lof.exists());
}

#[test]
fn host_that_never_creates_pipes_times_out() {
    let fixture = Fixture::new();
    let mut config = fixture.config(&["--host-cmd", "sleep 30"]);
    config.startup_timeout_secs = 1;
    config.keep_host = false;
    let err = run_join(&config, &CancelToken::new()).unwrap_err();
    assert!(err.to_string().contains("host did not start"));
    assert!(err
        .chain()
        .any(|cause| matches!(cause.downcast_ref::<PipeError>(), Some(PipeError::Timeout { .. }))));
}

#[test]
fn interrupted_join_is_reported_as_such() {
    let fixture = Fixture::new();
    let endpoints = fifo_pair(fixture.dir.path());
    let host = spawn_host(&endpoints, Script::Silent);
    let cancel = CancelToken::new();
    let remote = cancel.clone();
    let canceller = std::thread::spawn(move || {
        std::thread::sleep(std::time::Duration::from_millis(1000));
        remote.cancel();
    });

    let err = run_join(&fixture.config(&[]), &cancel).unwrap_err();
    assert!(is_interrupted(&err), "{err:#}");
    canceller.join().unwrap();
    let received = host.join().unwrap();
    let _ = fs::remove_file(imported_manifest(&received));
}

#[test]
fn output_goes_to_saved_default_dir() {
    let fixture = Fixture::new();
    let endpoints = fifo_pair(fixture.dir.path());
    let host = spawn_host(&endpoints, Script::Echo);

    let save_dir = fixture.dir.path().join("library");
    fs::create_dir(&save_dir).unwrap();
    let settings = crate::settings::HostSettings {
        default_save_dir: save_dir.clone(),
        host_executable: PathBuf::from("/bin/sh"),
    };
    settings
        .save(&fixture.dir.path().join("settings.json"))
        .unwrap();

    let mut config = fixture.config(&[]);
    config.output = Some(PathBuf::from("symphony"));
    let summary = run_join(&config, &CancelToken::new()).expect("join succeeds");
    assert_eq!(summary.output_path, save_dir.join("symphony.mp3"));
    host.join().unwrap();
}
