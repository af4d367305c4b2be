//! Subprocess execution with explicit deadlines.
//!
//! Every external tool the pipeline shells out to (compilers, binaries,
//! the symbolic engine and its dumper) goes through [`run_with_timeout`]:
//! stdio is piped and drained on reader threads so a chatty child cannot
//! deadlock on a full pipe, and a child past its deadline is killed.

use std::io::Read;
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("failed to spawn {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("{program} exceeded its {}s timeout", timeout.as_secs())]
    Timeout { program: String, timeout: Duration },
    #[error("I/O error while running {program}: {source}")]
    Io {
        program: String,
        #[source]
        source: std::io::Error,
    },
}

/// Captured result of a completed child process.
#[derive(Debug, Clone)]
pub struct ExecOutput {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: Option<i32>,
    pub duration: Duration,
}

impl ExecOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

const POLL_INTERVAL: Duration = Duration::from_millis(20);

/// Run a command to completion or kill it at the deadline.
pub fn run_with_timeout(command: &mut Command, timeout: Duration) -> Result<ExecOutput, ExecError> {
    let program = command.get_program().to_string_lossy().into_owned();
    let started = Instant::now();

    let mut child = command
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|source| ExecError::Spawn {
            program: program.clone(),
            source,
        })?;

    let stdout_reader = spawn_reader(child.stdout.take());
    let stderr_reader = spawn_reader(child.stderr.take());

    let deadline = started + timeout;
    let status = loop {
        match child.try_wait() {
            Ok(Some(status)) => break status,
            Ok(None) => {
                if Instant::now() >= deadline {
                    let _ = child.kill();
                    let _ = child.wait();
                    join_reader(stdout_reader);
                    join_reader(stderr_reader);
                    return Err(ExecError::Timeout { program, timeout });
                }
                std::thread::sleep(POLL_INTERVAL);
            }
            Err(source) => {
                let _ = child.kill();
                return Err(ExecError::Io { program, source });
            }
        }
    };

    Ok(ExecOutput {
        stdout: join_reader(stdout_reader),
        stderr: join_reader(stderr_reader),
        exit_code: status.code(),
        duration: started.elapsed(),
    })
}

fn spawn_reader<R: Read + Send + 'static>(
    source: Option<R>,
) -> Option<std::thread::JoinHandle<String>> {
    source.map(|mut reader| {
        std::thread::spawn(move || {
            let mut buffer = Vec::new();
            let _ = reader.read_to_end(&mut buffer);
            String::from_utf8_lossy(&buffer).into_owned()
        })
    })
}

fn join_reader(handle: Option<std::thread::JoinHandle<String>>) -> String {
    handle
        .and_then(|h| h.join().ok())
        .unwrap_or_default()
}

/// Probe a tool by running it with one argument (typically `--version`).
pub fn probe_tool(program: &str, arg: &str) -> bool {
    let mut command = Command::new(program);
    command.arg(arg);
    matches!(
        run_with_timeout(&mut command, Duration::from_secs(5)),
        Ok(output) if output.success()
    )
}
