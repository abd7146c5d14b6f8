use super::*;
use crate::cancel::CancelToken;
use crate::pipe::{PipeEndpoints, PipeError};
use std::thread;
use std::time::{Duration, Instant};

fn endpoints_in(dir: &std::path::Path) -> PipeEndpoints {
    PipeEndpoints::in_dir(dir)
}

#[test]
fn ready_times_out_on_the_deadline() {
    let dir = tempfile::tempdir().unwrap();
    let start = Instant::now();
    let result = await_host_ready(
        &endpoints_in(dir.path()),
        Duration::from_secs(1),
        DEFAULT_READY_POLL,
        &CancelToken::new(),
    );
    let elapsed = start.elapsed();
    assert!(matches!(result, Err(PipeError::Timeout { .. })));
    assert!(elapsed >= Duration::from_secs(1), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(2), "{elapsed:?}");
}

#[test]
fn ready_succeeds_immediately_when_pipes_exist() {
    let dir = tempfile::tempdir().unwrap();
    let endpoints = endpoints_in(dir.path());
    std::fs::write(endpoints.write_path(), b"").unwrap();
    std::fs::write(endpoints.read_path(), b"").unwrap();
    let start = Instant::now();
    await_host_ready(
        &endpoints,
        Duration::from_secs(5),
        DEFAULT_READY_POLL,
        &CancelToken::new(),
    )
    .expect("ready");
    assert!(start.elapsed() < Duration::from_millis(500));
}

#[test]
fn ready_notices_pipes_created_later() {
    let dir = tempfile::tempdir().unwrap();
    let endpoints = endpoints_in(dir.path());
    let write_path = endpoints.write_path().to_path_buf();
    let read_path = endpoints.read_path().to_path_buf();
    let creator = thread::spawn(move || {
        thread::sleep(Duration::from_millis(150));
        std::fs::write(write_path, b"").unwrap();
        std::fs::write(read_path, b"").unwrap();
    });
    await_host_ready(
        &endpoints,
        Duration::from_secs(5),
        Duration::from_millis(20),
        &CancelToken::new(),
    )
    .expect("ready");
    creator.join().unwrap();
}

#[test]
fn ready_needs_both_pipes() {
    let dir = tempfile::tempdir().unwrap();
    let endpoints = endpoints_in(dir.path());
    std::fs::write(endpoints.write_path(), b"").unwrap();
    let result = await_host_ready(
        &endpoints,
        Duration::from_millis(100),
        Duration::from_millis(20),
        &CancelToken::new(),
    );
    assert!(matches!(result, Err(PipeError::Timeout { .. })));
}

#[test]
fn ready_honours_cancel() {
    let dir = tempfile::tempdir().unwrap();
    let cancel = CancelToken::new();
    cancel.cancel();
    let result = await_host_ready(
        &endpoints_in(dir.path()),
        Duration::from_secs(10),
        DEFAULT_READY_POLL,
        &cancel,
    );
    assert!(matches!(result, Err(PipeError::Cancelled)));
}

#[test]
fn settle_is_cut_short_by_cancel() {
    let host = HostProcess::attach("audacity");
    let cancel = CancelToken::new();
    cancel.cancel();
    let start = Instant::now();
    let result = host.settle(Duration::from_secs(5), &cancel);
    assert!(matches!(result, Err(PipeError::Cancelled)));
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[test]
fn host_command_is_split_like_a_shell() {
    let (program, args) = split_host_command(r#""/opt/Audacity App/audacity" --safe-mode"#);
    assert_eq!(program, "/opt/Audacity App/audacity");
    assert_eq!(args, vec!["--safe-mode".to_string()]);
    assert_eq!(split_host_command("   "), (String::new(), Vec::new()));
    assert_eq!(image_name("/usr/bin/audacity"), "audacity");
}

#[test]
fn launch_rejects_empty_command() {
    assert!(HostProcess::launch("  ").is_err());
}

#[test]
fn launch_reports_missing_program() {
    let err = HostProcess::launch("/definitely/not/a/host-binary").unwrap_err();
    assert!(err.to_string().contains("failed to start host"));
}

#[test]
fn release_leaves_nothing_to_stop() {
    let mut host = HostProcess::attach("audacity");
    host.release();
    assert!(host.is_stopped());
    host.shutdown();
    assert!(host.is_stopped());
}

#[cfg(unix)]
#[test]
fn shutdown_terminates_spawned_host() {
    let mut host = HostProcess::launch("sleep 30").expect("spawn sleep");
    assert_eq!(host.label(), "sleep");
    assert!(!host.has_exited());
    let start = Instant::now();
    host.shutdown();
    assert!(start.elapsed() < Duration::from_secs(3));
    assert!(host.is_stopped());
    host.shutdown();
}

#[cfg(unix)]
#[test]
fn shutdown_kills_host_that_ignores_term() {
    let mut host = HostProcess::launch(r#"sh -c "trap '' TERM; exec sleep 30""#)
        .expect("spawn stubborn host");
    // Give the shell time to install the trap before exec.
    thread::sleep(Duration::from_millis(200));
    let start = Instant::now();
    host.shutdown_with_grace(Duration::from_millis(300));
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(300), "{elapsed:?}");
    assert!(elapsed < Duration::from_secs(3), "{elapsed:?}");
    assert!(host.is_stopped());
}
