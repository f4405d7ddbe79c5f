//! Timeout-bounded subprocess execution (§5).
//!
//! `std::process::Command` has no native timeout, and naively reading
//! stdout/stderr to completion before checking the clock can deadlock once
//! either pipe's OS buffer fills. Each stream is drained on its own thread
//! while the caller polls `try_wait()` against a deadline.

use std::io::Read;
use std::path::Path;
use std::process::{Command, Stdio};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

/// Outcome of a bounded subprocess run.
#[derive(Debug, Clone)]
pub struct CapturedOutput {
    pub status_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
    pub timed_out: bool,
}

impl CapturedOutput {
    pub fn success(&self) -> bool {
        !self.timed_out && self.status_code == Some(0)
    }
}

/// Run `program args...` with `cwd` as its working directory, killing it if
/// it outlives `timeout`.
pub fn run_captured(
    program: &str,
    args: &[&str],
    cwd: &Path,
    stdin_data: Option<&[u8]>,
    timeout: Duration,
) -> std::io::Result<CapturedOutput> {
    let mut child = Command::new(program)
        .args(args)
        .current_dir(cwd)
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    if let Some(data) = stdin_data {
        use std::io::Write;
        if let Some(mut stdin) = child.stdin.take() {
            let _ = stdin.write_all(data);
        }
    } else {
        drop(child.stdin.take());
    }

    let stdout_handle = child.stdout.take();
    let stderr_handle = child.stderr.take();
    let (stdout_tx, stdout_rx) = mpsc::channel();
    let (stderr_tx, stderr_rx) = mpsc::channel();

    spawn_drain_thread(stdout_handle, stdout_tx);
    spawn_drain_thread(stderr_handle, stderr_tx);

    let deadline = Instant::now() + timeout;
    let timed_out = loop {
        match child.try_wait()? {
            Some(_) => break false,
            None => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    break true;
                }
                thread::sleep(Duration::from_millis(20));
            }
        }
    };

    let status_code = if timed_out {
        None
    } else {
        child.wait()?.code()
    };

    let stdout = stdout_rx.recv().unwrap_or_default();
    let stderr = stderr_rx.recv().unwrap_or_default();

    Ok(CapturedOutput {
        status_code,
        stdout,
        stderr,
        timed_out,
    })
}

fn spawn_drain_thread<R>(handle: Option<R>, tx: mpsc::Sender<String>)
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut buf = String::new();
        if let Some(mut h) = handle {
            let _ = h.read_to_string(&mut buf);
        }
        let _ = tx.send(buf);
    });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn captures_stdout_of_a_quick_command() {
        let out = run_captured("echo", &["hello"], Path::new("."), None, Duration::from_secs(5))
            .unwrap();
        assert!(out.success());
        assert_eq!(out.stdout.trim(), "hello");
    }

    #[test]
    fn times_out_a_long_running_command() {
        let out = run_captured(
            "sleep",
            &["5"],
            Path::new("."),
            None,
            Duration::from_millis(100),
        )
        .unwrap();
        assert!(out.timed_out);
        assert!(!out.success());
    }

    #[test]
    fn feeds_stdin_through_to_the_child() {
        let out = run_captured(
            "cat",
            &[],
            Path::new("."),
            Some(b"piped through\n"),
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(out.stdout, "piped through\n");
    }
}
