use super::channel::classify_write_error;
use super::{
    ConnectOptions, Connection, PipeEndpoints, PipeError, ReaderEvent, ReplyFramer, ReplySlot,
};
use crate::cancel::CancelToken;
use crate::command::Command;
use crossbeam_channel::bounded;
use std::io;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

fn slot_with_channel() -> (crossbeam_channel::Sender<ReaderEvent>, ReplySlot) {
    let (tx, rx) = bounded(1);
    let slot = ReplySlot::new(
        rx,
        Arc::new(AtomicBool::new(false)),
        Duration::from_millis(20),
    );
    (tx, slot)
}

#[test]
fn framer_splits_on_blank_line() {
    let mut framer = ReplyFramer::new();
    let replies = framer.push(b"Clip info\nBatchCommand finished: OK\n\nnext\n");
    assert_eq!(replies, vec!["Clip info\nBatchCommand finished: OK\n".to_string()]);
    assert!(!framer.is_idle());
    assert_eq!(framer.push(b"\n"), vec!["next\n".to_string()]);
    assert!(framer.is_idle());
}

#[test]
fn framer_handles_crlf_terminators() {
    let mut framer = ReplyFramer::new();
    let replies = framer.push(b"BatchCommand finished: OK\r\n\r\n");
    assert_eq!(replies, vec!["BatchCommand finished: OK\n".to_string()]);
}

#[test]
fn framer_reassembles_lines_split_across_reads() {
    let mut framer = ReplyFramer::new();
    assert!(framer.push("caf".as_bytes()).is_empty());
    assert!(framer.push(&[0xC3]).is_empty());
    let replies = framer.push(&[0xA9, b'\n', b'\n']);
    assert_eq!(replies, vec!["café\n".to_string()]);
}

#[test]
fn framer_finish_flushes_partial_reply() {
    let mut framer = ReplyFramer::new();
    assert!(framer.push(b"half a reply\nand a tail").is_empty());
    assert_eq!(framer.finish(), "half a reply\nand a tail\n");
    assert!(framer.is_idle());
    assert_eq!(framer.finish(), "");
}

#[test]
fn arm_discards_stale_reply() {
    let (tx, slot) = slot_with_channel();
    tx.send(ReaderEvent::Reply("old".to_string())).unwrap();
    slot.arm().expect("arm");
    tx.send(ReaderEvent::Reply("fresh".to_string())).unwrap();
    let reply = slot
        .await_reply(Some(Duration::from_secs(1)), &CancelToken::new())
        .expect("reply");
    assert_eq!(reply, "fresh");
}

#[test]
fn arm_reports_closed_stream() {
    let (tx, slot) = slot_with_channel();
    tx.send(ReaderEvent::Closed {
        partial: String::new(),
    })
    .unwrap();
    assert!(matches!(slot.arm(), Err(PipeError::Broken)));
    assert!(slot.is_broken());
}

#[test]
fn await_reply_times_out() {
    let (_tx, slot) = slot_with_channel();
    let start = Instant::now();
    let result = slot.await_reply(Some(Duration::from_millis(100)), &CancelToken::new());
    assert!(matches!(result, Err(PipeError::Timeout { .. })));
    let elapsed = start.elapsed();
    assert!(elapsed >= Duration::from_millis(100));
    assert!(elapsed < Duration::from_secs(1));
}

#[test]
fn await_reply_returns_broken_when_reader_exits() {
    let (tx, slot) = slot_with_channel();
    drop(tx);
    let result = slot.await_reply(None, &CancelToken::new());
    assert!(matches!(result, Err(PipeError::Broken)));
}

#[test]
fn await_reply_honours_cancel() {
    let (_tx, slot) = slot_with_channel();
    let cancel = CancelToken::new();
    let remote = cancel.clone();
    let canceller = thread::spawn(move || {
        thread::sleep(Duration::from_millis(50));
        remote.cancel();
    });
    let start = Instant::now();
    let result = slot.await_reply(None, &cancel);
    assert!(matches!(result, Err(PipeError::Cancelled)));
    assert!(start.elapsed() < Duration::from_secs(1));
    canceller.join().unwrap();
}

#[test]
fn broken_pipe_write_error_is_classified() {
    let err = classify_write_error(io::Error::from(io::ErrorKind::BrokenPipe));
    assert!(matches!(err, PipeError::BrokenPipe));
    let err = classify_write_error(io::Error::from(io::ErrorKind::PermissionDenied));
    assert!(matches!(err, PipeError::Io(_)));
}

#[test]
fn only_unavailable_is_recoverable() {
    assert!(!PipeError::unavailable("/tmp/x", "missing").is_fatal());
    assert!(PipeError::Broken.is_fatal());
    assert!(PipeError::Cancelled.is_fatal());
}

#[test]
fn endpoints_use_user_specific_fifo_names() {
    let endpoints = PipeEndpoints::in_dir(std::path::Path::new("/run/test"));
    let write = endpoints.write_path().to_string_lossy().to_string();
    let read = endpoints.read_path().to_string_lossy().to_string();
    assert!(write.starts_with("/run/test/audacity_script_pipe.to."));
    assert!(read.starts_with("/run/test/audacity_script_pipe.from."));
    assert!(!endpoints.both_exist());
}

#[cfg(unix)]
mod fifo {
    use super::*;
    use crate::test_support::{fifo_pair, spawn_host, Script};

    fn connect(endpoints: &PipeEndpoints, options: ConnectOptions) -> Connection {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            match Connection::open(endpoints, options.clone(), CancelToken::new()) {
                Ok(connection) => return connection,
                Err(PipeError::PipeUnavailable { .. }) if Instant::now() < deadline => {
                    thread::sleep(Duration::from_millis(10));
                }
                Err(err) => panic!("connect failed: {err}"),
            }
        }
    }

    #[test]
    fn open_fails_fast_when_pipes_are_missing() {
        let dir = tempfile::tempdir().unwrap();
        let endpoints = PipeEndpoints::in_dir(dir.path());
        let start = Instant::now();
        let result = Connection::open(&endpoints, ConnectOptions::default(), CancelToken::new());
        assert!(matches!(result, Err(PipeError::PipeUnavailable { .. })));
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn open_fails_fast_when_nobody_listens() {
        let dir = tempfile::tempdir().unwrap();
        let endpoints = fifo_pair(dir.path());
        let result = Connection::open(&endpoints, ConnectOptions::default(), CancelToken::new());
        assert!(matches!(result, Err(PipeError::PipeUnavailable { .. })));
    }

    #[test]
    fn open_rejects_regular_files() {
        let dir = tempfile::tempdir().unwrap();
        let endpoints = PipeEndpoints::in_dir(dir.path());
        std::fs::write(endpoints.write_path(), b"").unwrap();
        std::fs::write(endpoints.read_path(), b"").unwrap();
        let result = Connection::open(&endpoints, ConnectOptions::default(), CancelToken::new());
        assert!(matches!(result, Err(PipeError::PipeUnavailable { .. })));
    }

    #[test]
    fn replies_match_their_commands() {
        let dir = tempfile::tempdir().unwrap();
        let endpoints = fifo_pair(dir.path());
        let host = spawn_host(&endpoints, Script::Echo);
        let mut connection = connect(&endpoints, ConnectOptions::default());

        for name in ["SelectAll", "Align_EndToEnd", "MixAndRender", "Join"] {
            let reply = connection
                .send_command(&Command::new(name))
                .expect("reply");
            assert_eq!(reply, format!("Echo:{name}\nBatchCommand finished: OK\n"));
        }

        connection.close();
        let received = host.join().unwrap();
        assert_eq!(
            received,
            vec!["SelectAll", "Align_EndToEnd", "MixAndRender", "Join"]
        );
    }

    #[test]
    fn close_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let endpoints = fifo_pair(dir.path());
        let host = spawn_host(&endpoints, Script::Echo);
        let mut connection = connect(&endpoints, ConnectOptions::default());
        connection.close();
        connection.close();
        assert!(connection.is_closed());
        assert!(matches!(
            connection.write_line("SelectAll"),
            Err(PipeError::Closed)
        ));
        drop(connection);
        assert!(host.join().unwrap().is_empty());
    }

    #[test]
    fn host_hangup_is_reported_and_stops_writes() {
        let dir = tempfile::tempdir().unwrap();
        let endpoints = fifo_pair(dir.path());
        let host = spawn_host(&endpoints, Script::CloseRepliesAfterFirst);
        let mut connection = connect(&endpoints, ConnectOptions::default());

        connection
            .send_command(&Command::new("SelectAll"))
            .expect("first reply");

        let start = Instant::now();
        let second = connection.send_command(&Command::new("Join"));
        assert!(matches!(second, Err(PipeError::Broken)), "{second:?}");
        assert!(start.elapsed() < Duration::from_secs(1));
        assert!(connection.is_broken());

        assert!(matches!(
            connection.send_command(&Command::new("Export2")),
            Err(PipeError::Broken)
        ));
        assert!(matches!(
            connection.write_line("Export2"),
            Err(PipeError::Broken)
        ));

        connection.close();
        let received = host.join().unwrap();
        assert!(!received.iter().any(|line| line == "Export2"));
    }

    #[test]
    fn silent_host_hits_reply_timeout() {
        let dir = tempfile::tempdir().unwrap();
        let endpoints = fifo_pair(dir.path());
        let host = spawn_host(&endpoints, Script::Silent);
        let options = ConnectOptions {
            reply_timeout: Some(Duration::from_millis(200)),
            ..ConnectOptions::default()
        };
        let mut connection = connect(&endpoints, options);

        let result = connection.send_command(&Command::new("SelectAll"));
        assert!(matches!(result, Err(PipeError::Timeout { .. })));

        connection.close();
        assert_eq!(host.join().unwrap(), vec!["SelectAll"]);
    }
}
