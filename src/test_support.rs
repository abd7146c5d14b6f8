//! A stand-in host on real FIFOs, for tests that exercise the pipes.

use std::ffi::CString;
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::os::unix::ffi::OsStrExt;
use std::path::Path;
use std::thread;

use crate::command::Command;
use crate::pipe::PipeEndpoints;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Script {
    /// Reply `OK` to every command, echoing its name.
    Echo,
    /// Reply to the first command, then close the reply pipe.
    CloseRepliesAfterFirst,
    /// Reject the first command, answer the rest.
    FailFirst,
    /// Read commands but never answer.
    Silent,
}

pub(crate) fn make_fifo(path: &Path) {
    let c_path = CString::new(path.as_os_str().as_bytes()).unwrap();
    // SAFETY: c_path is a valid NUL-terminated path.
    let rc = unsafe { libc::mkfifo(c_path.as_ptr(), 0o600) };
    assert_eq!(
        rc,
        0,
        "mkfifo {}: {}",
        path.display(),
        io::Error::last_os_error()
    );
}

/// Create the host's two FIFOs under `dir`.
pub(crate) fn fifo_pair(dir: &Path) -> PipeEndpoints {
    let endpoints = PipeEndpoints::in_dir(dir);
    make_fifo(endpoints.write_path());
    make_fifo(endpoints.read_path());
    endpoints
}

fn command_name(line: &str) -> String {
    Command::decode(line)
        .map(|command| command.name().to_string())
        .unwrap_or_default()
}

pub(crate) fn ok_reply(line: &str) -> String {
    format!("Echo:{}\nBatchCommand finished: OK\n\n", command_name(line))
}

fn failed_reply(line: &str) -> String {
    format!(
        "Rejected:{}\nBatchCommand finished: Failed!\n\n",
        command_name(line)
    )
}

/// Play the host on a thread; the handle returns every command line received.
pub(crate) fn spawn_host(
    endpoints: &PipeEndpoints,
    script: Script,
) -> thread::JoinHandle<Vec<String>> {
    let commands_path = endpoints.write_path().to_path_buf();
    let replies_path = endpoints.read_path().to_path_buf();
    thread::spawn(move || {
        let commands = File::open(&commands_path).expect("host opens command pipe");
        let mut replies = Some(
            OpenOptions::new()
                .write(true)
                .open(&replies_path)
                .expect("host opens reply pipe"),
        );
        let mut reader = BufReader::new(commands);
        let mut received = Vec::new();
        let mut line = String::new();
        loop {
            line.clear();
            match reader.read_line(&mut line) {
                Ok(0) | Err(_) => break,
                Ok(_) => {}
            }
            let text = line.trim_end().to_string();
            received.push(text.clone());
            let reply = match script {
                Script::Echo => ok_reply(&text),
                Script::FailFirst if received.len() == 1 => failed_reply(&text),
                Script::FailFirst => ok_reply(&text),
                Script::CloseRepliesAfterFirst => {
                    if let Some(mut pipe) = replies.take() {
                        let _ = pipe.write_all(ok_reply(&text).as_bytes());
                    }
                    continue;
                }
                Script::Silent => continue,
            };
            if let Some(pipe) = replies.as_mut() {
                let _ = pipe.write_all(reply.as_bytes());
            }
        }
        received
    })
}
