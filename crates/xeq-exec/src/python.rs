use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, ExitStatus, Stdio};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use log::debug;
use serde::Serialize;
use thiserror::Error;
use xeq_core::{ExecutionResult, bounded_diagnostic};

use crate::wire::{HarnessReply, decode_reply};
use crate::{Executor, ModuleSet, NamedOrLastSelector, ResultSelector};

pub const DEFAULT_PYTHON: &str = "python3";

const MAX_HARNESS_STDIN_BYTES: usize = 16 * 1_048_576;
const MAX_HARNESS_STDOUT_BYTES: usize = 64 * 1_048_576;
const MAX_HARNESS_STDERR_BYTES: usize = 262_144;
const HARNESS_RAW_DIAGNOSTIC_BYTES: usize = 256;
const HARNESS_STDERR_DIAGNOSTIC_BYTES: usize = 256;
const HARNESS_POLL_INTERVAL: Duration = Duration::from_millis(2);

const HARNESS_SCRIPT: &str = include_str!("harness.py");

#[derive(Debug, Error)]
pub enum HarnessError {
    #[error("failed to serialize harness payload: {0}")]
    Payload(#[source] serde_json::Error),
    #[error("harness {stream} exceeds max bytes: actual={actual} max={max}")]
    TooLarge {
        stream: &'static str,
        actual: usize,
        max: usize,
    },
    #[error("failed to spawn python harness via {python}: {source}")]
    Spawn { python: String, source: io::Error },
    #[error("python harness {0} stream unavailable")]
    StreamUnavailable(&'static str),
    #[error("failed writing harness stdin payload: {0}")]
    Stdin(#[source] io::Error),
    #[error("python harness {stream} read failed: {source}")]
    Read {
        stream: &'static str,
        source: io::Error,
    },
    #[error("python harness {0} reader thread panicked")]
    ReaderPanicked(&'static str),
    #[error("python harness process wait failed: {0}")]
    Wait(#[source] io::Error),
    #[error("python harness timed out after {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("python harness exited with status {status}: {stderr}")]
    Exit { status: String, stderr: String },
    #[error("python harness stdout was not utf8: {0}")]
    Utf8(#[source] std::string::FromUtf8Error),
    #[error("python harness produced empty stdout")]
    EmptyOutput,
    #[error("python harness output parse failure: {message}; raw={raw}")]
    Parse { message: String, raw: String },
}

#[derive(Serialize)]
struct HarnessRequest<'a> {
    code: &'a str,
    modules: Vec<&'static str>,
}

/// Executes snippets in a child `python3` process, one process per snippet.
#[derive(Debug, Clone)]
pub struct PythonExecutor<S = NamedOrLastSelector> {
    python: PathBuf,
    timeout: Option<Duration>,
    modules: ModuleSet,
    selector: S,
}

impl Default for PythonExecutor {
    fn default() -> Self {
        Self::new(DEFAULT_PYTHON)
    }
}

impl PythonExecutor {
    #[must_use]
    pub fn new(python: impl Into<PathBuf>) -> Self {
        Self {
            python: python.into(),
            timeout: None,
            modules: ModuleSet::all(),
            selector: NamedOrLastSelector,
        }
    }
}

impl<S> PythonExecutor<S> {
    /// `None` waits for the child indefinitely.
    #[must_use]
    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_modules(mut self, modules: ModuleSet) -> Self {
        self.modules = modules;
        self
    }

    #[must_use]
    pub fn with_selector<T: ResultSelector>(self, selector: T) -> PythonExecutor<T> {
        PythonExecutor {
            python: self.python,
            timeout: self.timeout,
            modules: self.modules,
            selector,
        }
    }

    #[must_use]
    pub fn python(&self) -> &Path {
        &self.python
    }

    #[must_use]
    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Runs `code` through the harness. The outer error is a fault of the
    /// child process itself; the inner one is the exception the snippet
    /// raised.
    pub fn run(&self, code: &str) -> Result<HarnessReply, HarnessError> {
        let request = HarnessRequest {
            code,
            modules: self
                .modules
                .enabled()
                .into_iter()
                .map(|framework| framework.name())
                .collect(),
        };
        let body = serde_json::to_vec(&request).map_err(HarnessError::Payload)?;
        validate_stdin_bounds(body.len())?;

        let mut child = Command::new(&self.python)
            .arg("-c")
            .arg(HARNESS_SCRIPT)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| HarnessError::Spawn {
                python: self.python.display().to_string(),
                source,
            })?;

        let Some(mut stdin) = child.stdin.take() else {
            terminate_and_reap_child(&mut child);
            return Err(HarnessError::StreamUnavailable("stdin"));
        };
        if let Err(error) = stdin.write_all(body.as_slice()) {
            terminate_and_reap_child(&mut child);
            return Err(HarnessError::Stdin(error));
        }
        drop(stdin);

        let Some(stdout) = child.stdout.take() else {
            terminate_and_reap_child(&mut child);
            return Err(HarnessError::StreamUnavailable("stdout"));
        };
        let Some(stderr) = child.stderr.take() else {
            terminate_and_reap_child(&mut child);
            return Err(HarnessError::StreamUnavailable("stderr"));
        };

        let overflow_flag = Arc::new(AtomicBool::new(false));
        let stdout_overflow = Arc::clone(&overflow_flag);
        let stdout_reader = std::thread::spawn(move || {
            read_stream_capped(
                stdout,
                MAX_HARNESS_STDOUT_BYTES,
                stdout_overflow.as_ref(),
                "stdout",
            )
        });
        let stderr_overflow = Arc::clone(&overflow_flag);
        let stderr_reader = std::thread::spawn(move || {
            read_stream_capped(
                stderr,
                MAX_HARNESS_STDERR_BYTES,
                stderr_overflow.as_ref(),
                "stderr",
            )
        });

        let wait_result = wait_for_exit(&mut child, overflow_flag.as_ref(), self.timeout);
        let stdout_capture = stdout_reader
            .join()
            .map_err(|_| HarnessError::ReaderPanicked("stdout"))??;
        let stderr_capture = stderr_reader
            .join()
            .map_err(|_| HarnessError::ReaderPanicked("stderr"))??;
        let status = wait_result?;

        validate_stream_bounds(stdout_capture.total_bytes, stderr_capture.total_bytes)?;
        if !status.success() {
            return Err(exit_error(&status, stderr_capture.bytes.as_slice()));
        }

        let stdout = String::from_utf8(stdout_capture.bytes).map_err(HarnessError::Utf8)?;
        parse_stdout(stdout.as_str())
    }
}

impl<S: ResultSelector> Executor for PythonExecutor<S> {
    fn execute(&self, code: &str) -> ExecutionResult {
        match self.run(code) {
            Ok(Ok(bindings)) => Ok(self.selector.select(bindings)),
            Ok(Err(message)) => {
                debug!("snippet raised: {message}");
                Err(message)
            }
            Err(error) => {
                debug!("python harness fault: {error}");
                Err(error.to_string())
            }
        }
    }
}

fn wait_for_exit(
    child: &mut Child,
    overflow_flag: &AtomicBool,
    timeout: Option<Duration>,
) -> Result<ExitStatus, HarnessError> {
    let started_at = Instant::now();
    let mut killed_for_overflow = false;
    loop {
        if overflow_flag.load(Ordering::Relaxed) && !killed_for_overflow {
            terminate_and_reap_child(child);
            killed_for_overflow = true;
        }

        match child.try_wait() {
            Ok(Some(status)) => return Ok(status),
            Ok(None) => {}
            Err(error) => {
                terminate_and_reap_child(child);
                return Err(HarnessError::Wait(error));
            }
        }

        if let Some(limit) = timeout {
            if started_at.elapsed() > limit {
                terminate_and_reap_child(child);
                return Err(HarnessError::Timeout(limit));
            }
        }
        std::thread::sleep(HARNESS_POLL_INTERVAL);
    }
}

fn terminate_and_reap_child(child: &mut Child) {
    let _ = child.kill();
    let _ = child.wait();
}

fn parse_stdout(stdout: &str) -> Result<HarnessReply, HarnessError> {
    let line = stdout
        .lines()
        .rev()
        .find(|candidate| !candidate.trim().is_empty())
        .ok_or(HarnessError::EmptyOutput)?;

    decode_reply(line).map_err(|error| HarnessError::Parse {
        message: error.to_string(),
        raw: bounded_diagnostic(line, HARNESS_RAW_DIAGNOSTIC_BYTES),
    })
}

#[derive(Debug)]
struct CappedStreamCapture {
    bytes: Vec<u8>,
    total_bytes: usize,
}

fn read_stream_capped<R: Read>(
    mut reader: R,
    max_bytes: usize,
    overflow_flag: &AtomicBool,
    stream: &'static str,
) -> Result<CappedStreamCapture, HarnessError> {
    let mut bytes = Vec::with_capacity(max_bytes.min(8192));
    let mut total_bytes = 0usize;
    let mut chunk = [0_u8; 8192];

    loop {
        let read_len = reader
            .read(&mut chunk)
            .map_err(|source| HarnessError::Read { stream, source })?;
        if read_len == 0 {
            break;
        }

        total_bytes = total_bytes.saturating_add(read_len);
        if bytes.len() < max_bytes {
            let remaining = max_bytes - bytes.len();
            let copy_len = read_len.min(remaining);
            bytes.extend_from_slice(&chunk[..copy_len]);
        }
        if total_bytes > max_bytes {
            overflow_flag.store(true, Ordering::Relaxed);
        }
    }

    Ok(CappedStreamCapture { bytes, total_bytes })
}

fn validate_stream_bounds(stdout_len: usize, stderr_len: usize) -> Result<(), HarnessError> {
    if stdout_len > MAX_HARNESS_STDOUT_BYTES {
        return Err(HarnessError::TooLarge {
            stream: "stdout",
            actual: stdout_len,
            max: MAX_HARNESS_STDOUT_BYTES,
        });
    }
    if stderr_len > MAX_HARNESS_STDERR_BYTES {
        return Err(HarnessError::TooLarge {
            stream: "stderr",
            actual: stderr_len,
            max: MAX_HARNESS_STDERR_BYTES,
        });
    }
    Ok(())
}

fn validate_stdin_bounds(stdin_len: usize) -> Result<(), HarnessError> {
    if stdin_len > MAX_HARNESS_STDIN_BYTES {
        return Err(HarnessError::TooLarge {
            stream: "stdin",
            actual: stdin_len,
            max: MAX_HARNESS_STDIN_BYTES,
        });
    }
    Ok(())
}

fn exit_error(status: &ExitStatus, stderr: &[u8]) -> HarnessError {
    let stderr_text = String::from_utf8_lossy(stderr);
    HarnessError::Exit {
        status: status.to_string(),
        stderr: bounded_diagnostic(stderr_text.trim(), HARNESS_STDERR_DIAGNOSTIC_BYTES),
    }
}
