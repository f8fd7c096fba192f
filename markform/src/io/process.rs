//! Child process execution with a timeout and bounded output capture.

use std::io::{Read, Write};
use std::process::{Command, ExitStatus, Stdio};
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use tracing::{debug, warn};
use wait_timeout::ChildExt;

#[derive(Debug)]
pub struct CommandOutput {
    pub status: ExitStatus,
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// Bytes dropped beyond the output limit, per stream.
    pub stdout_truncated: usize,
    pub stderr_truncated: usize,
    pub timed_out: bool,
}

impl CommandOutput {
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Run `cmd` to completion or until `timeout`, feeding `stdin` and capturing
/// both output streams. Streams are drained on reader threads while the child
/// runs, so a chatty child cannot deadlock on a full pipe; only the first
/// `output_limit_bytes` of each stream are kept.
pub fn run_command_with_timeout(
    mut cmd: Command,
    stdin: Option<&[u8]>,
    timeout: Duration,
    output_limit_bytes: usize,
) -> Result<CommandOutput> {
    cmd.stdin(if stdin.is_some() {
        Stdio::piped()
    } else {
        Stdio::null()
    });
    cmd.stdout(Stdio::piped()).stderr(Stdio::piped());

    debug!(timeout_secs = timeout.as_secs(), "spawning agent command");
    let mut child = cmd.spawn().context("spawn command")?;

    if let Some(input) = stdin {
        let mut child_stdin = child
            .stdin
            .take()
            .ok_or_else(|| anyhow!("stdin was not piped"))?;
        child_stdin.write_all(input).context("write stdin")?;
        // Dropping the handle closes the pipe so the child sees EOF.
    }

    let stdout = child
        .stdout
        .take()
        .ok_or_else(|| anyhow!("stdout was not piped"))?;
    let stderr = child
        .stderr
        .take()
        .ok_or_else(|| anyhow!("stderr was not piped"))?;
    let stdout_handle = thread::spawn(move || drain_limited(stdout, output_limit_bytes));
    let stderr_handle = thread::spawn(move || drain_limited(stderr, output_limit_bytes));

    let mut timed_out = false;
    let status = match child.wait_timeout(timeout).context("wait for command")? {
        Some(status) => status,
        None => {
            warn!(timeout_secs = timeout.as_secs(), "command timed out, killing");
            timed_out = true;
            child.kill().context("kill command")?;
            child.wait().context("wait after kill")?
        }
    };

    let (stdout, stdout_truncated) = join_reader(stdout_handle).context("join stdout")?;
    let (stderr, stderr_truncated) = join_reader(stderr_handle).context("join stderr")?;
    if stdout_truncated > 0 || stderr_truncated > 0 {
        warn!(stdout_truncated, stderr_truncated, "command output truncated");
    }
    debug!(exit_code = ?status.code(), timed_out, "command finished");

    Ok(CommandOutput {
        status,
        stdout,
        stderr,
        stdout_truncated,
        stderr_truncated,
        timed_out,
    })
}

fn join_reader(handle: thread::JoinHandle<Result<(Vec<u8>, usize)>>) -> Result<(Vec<u8>, usize)> {
    handle
        .join()
        .unwrap_or_else(|_| Err(anyhow!("output reader thread panicked")))
}

/// Read everything, keeping at most `limit` bytes and counting the rest.
fn drain_limited<R: Read>(mut reader: R, limit: usize) -> Result<(Vec<u8>, usize)> {
    let mut kept = Vec::new();
    let mut dropped = 0usize;
    let mut chunk = [0u8; 8192];
    loop {
        let n = reader.read(&mut chunk).context("read output")?;
        if n == 0 {
            break;
        }
        let room = limit.saturating_sub(kept.len());
        let take = n.min(room);
        kept.extend_from_slice(&chunk[..take]);
        dropped += n - take;
    }
    Ok((kept, dropped))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_and_exit_status() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "printf hello"]);
        let output =
            run_command_with_timeout(cmd, None, Duration::from_secs(5), 1024).expect("run");
        assert!(output.status.success());
        assert_eq!(output.stdout, b"hello");
        assert!(!output.timed_out);
    }

    #[test]
    fn stdin_is_piped_through() {
        let cmd = Command::new("cat");
        let output = run_command_with_timeout(cmd, Some(b"ping"), Duration::from_secs(5), 1024)
            .expect("run");
        assert_eq!(output.stdout, b"ping");
    }

    #[test]
    fn output_beyond_the_limit_is_counted_not_kept() {
        let mut cmd = Command::new("sh");
        cmd.args(["-c", "printf '0123456789'"]);
        let output = run_command_with_timeout(cmd, None, Duration::from_secs(5), 4).expect("run");
        assert_eq!(output.stdout, b"0123");
        assert_eq!(output.stdout_truncated, 6);
    }

    #[test]
    fn timeout_kills_the_child() {
        let mut cmd = Command::new("sleep");
        cmd.arg("30");
        let output =
            run_command_with_timeout(cmd, None, Duration::from_millis(100), 1024).expect("run");
        assert!(output.timed_out);
    }
}
