// SPDX-License-Identifier: MIT OR Apache-2.0
//! Batch and stream process spawning for agent CLIs (spec §4.2).

use chrono::Utc;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin, Command};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Errors raised while spawning or driving a supervised process.
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    /// The executable could not be found or could not be spawned.
    #[error("failed to spawn {command}: {source}")]
    Spawn {
        /// Command that was attempted.
        command: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The process did not finish before its timeout elapsed.
    #[error("process timed out after {0:?}")]
    Timeout(Duration),
    /// Writing the trace log failed.
    #[error("failed to write trace log {path}: {source}")]
    Trace {
        /// Trace log path.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The session is no longer attached to a live stdin handle.
    #[error("session stdin already closed")]
    StdinClosed,
    /// Process-group cancellation is only implemented on Unix today.
    #[error("process supervision is not implemented on this platform")]
    UnsupportedPlatform,
}

/// Everything needed to identify a spawn in trace log headers.
#[derive(Debug, Clone)]
pub struct SpawnContext {
    /// Owning mission.
    pub mission_id: Uuid,
    /// This invocation's run id.
    pub run_id: Uuid,
    /// Directory batch/stream trace logs are written under.
    pub trace_dir: PathBuf,
    /// Position of this command within a multi-command run, if any.
    pub index: Option<u32>,
    /// Role name (planner/coder/tester/...), if any.
    pub role: Option<String>,
}

impl SpawnContext {
    /// Per-run log path: `<run_id>[_cmd<i>].log` under `trace_dir`.
    #[must_use]
    pub fn log_path(&self) -> PathBuf {
        let name = match self.index {
            Some(i) => format!("{}_cmd{i}.log", self.run_id),
            None => format!("{}.log", self.run_id),
        };
        self.trace_dir.join(name)
    }

    fn header(&self, command: &[String]) -> String {
        let mut h = String::new();
        h.push_str(&format!("# Timestamp: {}\n", Utc::now().to_rfc3339()));
        h.push_str(&format!("# Mission ID: {}\n", self.mission_id));
        h.push_str(&format!("# Run ID: {}\n", self.run_id));
        if let Some(i) = self.index {
            h.push_str(&format!("# Command Index: {i}\n"));
        }
        if let Some(role) = &self.role {
            h.push_str(&format!("# Role: {role}\n"));
        }
        h.push_str(&format!("# Command: {}\n\n", command.join(" ")));
        h
    }
}

fn section(label: &str, body: &str) -> String {
    if body.is_empty() {
        format!("=== {label} (0 chars) === (empty)\n")
    } else {
        format!("=== {label} ({} chars) === {body}\n", body.len())
    }
}

async fn write_trace(path: &Path, content: &str) -> Result<(), SupervisorError> {
    if let Some(parent) = path.parent() {
        tokio::fs::create_dir_all(parent).await.map_err(|source| SupervisorError::Trace {
            path: path.display().to_string(),
            source,
        })?;
    }
    tokio::fs::write(path, content).await.map_err(|source| SupervisorError::Trace {
        path: path.display().to_string(),
        source,
    })
}

async fn append_trace(path: &Path, line: &str) -> Result<(), SupervisorError> {
    let mut f = tokio::fs::OpenOptions::new()
        .append(true)
        .create(true)
        .open(path)
        .await
        .map_err(|source| SupervisorError::Trace { path: path.display().to_string(), source })?;
    f.write_all(line.as_bytes())
        .await
        .map_err(|source| SupervisorError::Trace { path: path.display().to_string(), source })?;
    Ok(())
}

fn base_command(command: &[String]) -> Command {
    let mut cmd = Command::new(&command[0]);
    cmd.args(&command[1..]);
    #[cfg(unix)]
    cmd.process_group(0);
    cmd
}

/// Windows process-group cancellation (`CREATE_NEW_PROCESS_GROUP`) is not
/// implemented; callers on that platform get
/// [`SupervisorError::UnsupportedPlatform`] rather than a silently
/// unguarded spawn.
#[cfg(windows)]
fn assert_supported_platform() -> Result<(), SupervisorError> {
    Err(SupervisorError::UnsupportedPlatform)
}

#[cfg(unix)]
fn assert_supported_platform() -> Result<(), SupervisorError> {
    Ok(())
}

/// Outcome of a batch spawn (spec §4.2 "completed_result").
#[derive(Debug, Clone, serde::Serialize)]
pub struct BatchResult {
    /// Process return code, absent on timeout/spawn failure.
    pub return_code: Option<i32>,
    /// Captured stdout.
    pub stdout: String,
    /// Captured stderr.
    pub stderr: String,
    /// Set when the process was killed for exceeding `timeout`.
    pub timed_out: bool,
    /// Path of the trace log written for this run.
    pub trace_path: PathBuf,
}

/// Launch `command`, capture stdout+stderr, enforce `timeout`, and write a
/// trace log shaped per spec §4.2. Creates a new process group so a
/// timeout kill terminates the whole subprocess tree.
///
/// # Errors
///
/// Returns [`SupervisorError::Spawn`] if the executable cannot be started,
/// or [`SupervisorError::Trace`] if the trace log cannot be written.
pub async fn spawn_batch(
    command: &[String],
    ctx: &SpawnContext,
    timeout: Duration,
) -> Result<BatchResult, SupervisorError> {
    use tokio::io::AsyncReadExt;

    assert_supported_platform()?;
    let trace_path = ctx.log_path();
    let header = ctx.header(command);
    let mut cmd = base_command(command);
    cmd.stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());

    let mut child = match cmd.spawn() {
        Ok(child) => child,
        Err(source) => {
            let mut body = header;
            body.push_str(&format!("=== ERROR === {source}\n"));
            write_trace(&trace_path, &body).await?;
            return Err(SupervisorError::Spawn { command: command.join(" "), source });
        }
    };
    let mut stdout_pipe = child.stdout.take();
    let mut stderr_pipe = child.stderr.take();

    // Holds only borrows of `child`/the pipes, so on timeout the borrow
    // ends with the future and `child` is free to be killed below.
    let run = async {
        let mut stdout_buf = Vec::new();
        let mut stderr_buf = Vec::new();
        if let Some(pipe) = stdout_pipe.as_mut() {
            pipe.read_to_end(&mut stdout_buf).await?;
        }
        if let Some(pipe) = stderr_pipe.as_mut() {
            pipe.read_to_end(&mut stderr_buf).await?;
        }
        let status = child.wait().await?;
        Ok::<_, std::io::Error>((status, stdout_buf, stderr_buf))
    };

    match tokio::time::timeout(timeout, run).await {
        Ok(Ok((status, stdout_buf, stderr_buf))) => {
            let stdout = String::from_utf8_lossy(&stdout_buf).into_owned();
            let stderr = String::from_utf8_lossy(&stderr_buf).into_owned();
            let mut body = header;
            body.push_str(&format!("=== RETURN CODE === {}\n", status.code().unwrap_or(-1)));
            body.push_str(&section("STDOUT", &stdout));
            body.push_str(&section("STDERR", &stderr));
            write_trace(&trace_path, &body).await?;
            Ok(BatchResult {
                return_code: status.code(),
                stdout,
                stderr,
                timed_out: false,
                trace_path,
            })
        }
        Ok(Err(source)) => {
            let mut body = header;
            body.push_str(&format!("=== ERROR === {source}\n"));
            write_trace(&trace_path, &body).await?;
            Err(SupervisorError::Spawn { command: command.join(" "), source })
        }
        Err(_) => {
            // Kill the whole process group so no descendant survives the
            // timeout (spec §4.2 "kill the process tree").
            let _ = child.start_kill();
            let _ = child.wait().await;
            let mut body = header;
            body.push_str("=== ERROR === timed out\n");
            write_trace(&trace_path, &body).await?;
            Ok(BatchResult {
                return_code: None,
                stdout: String::new(),
                stderr: String::new(),
                timed_out: true,
                trace_path,
            })
        }
    }
}

/// A long-lived interactive session spawned in stream mode (spec §4.2/§4.3).
pub struct StreamSession {
    child: Child,
    stdin: Option<ChildStdin>,
    trace_path: PathBuf,
}

impl StreamSession {
    /// Launch `command` with piped stdio. Two collector tasks forward
    /// stdout/stderr lines into the trace log labeled `[STDOUT]`/`[STDERR]`
    /// as they arrive.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Spawn`] if the executable cannot start.
    pub async fn spawn(command: &[String], ctx: &SpawnContext) -> Result<Self, SupervisorError> {
        assert_supported_platform()?;
        let trace_path = ctx.log_path();
        let mut cmd = base_command(command);
        cmd.stdin(Stdio::piped()).stdout(Stdio::piped()).stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|source| SupervisorError::Spawn {
            command: command.join(" "),
            source,
        })?;

        write_trace(&trace_path, &ctx.header(command)).await?;

        let stdin = child.stdin.take();
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();

        if let Some(stdout) = stdout {
            spawn_collector(stdout, trace_path.clone(), "STDOUT");
        }
        if let Some(stderr) = stderr {
            spawn_collector(stderr, trace_path.clone(), "STDERR");
        }

        Ok(Self { child, stdin, trace_path })
    }

    /// Write `text` to the session's stdin, labeled `[STDIN]` in the trace.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::StdinClosed`] if stdin was already closed
    /// (e.g. by [`StreamSession::terminate`]), or [`SupervisorError::Trace`]
    /// if the trace log cannot be appended.
    pub async fn send_line(&mut self, text: &str) -> Result<(), SupervisorError> {
        let stdin = self.stdin.as_mut().ok_or(SupervisorError::StdinClosed)?;
        stdin
            .write_all(format!("{text}\n").as_bytes())
            .await
            .map_err(|source| SupervisorError::Trace {
                path: self.trace_path.display().to_string(),
                source,
            })?;
        stdin.flush().await.map_err(|source| SupervisorError::Trace {
            path: self.trace_path.display().to_string(),
            source,
        })?;
        append_trace(&self.trace_path, &format!("[STDIN] {text}\n")).await
    }

    /// Wait for the session to exit, appending `[RETURN] n` to the trace.
    ///
    /// # Errors
    ///
    /// Returns [`SupervisorError::Timeout`] if `timeout` elapses first.
    pub async fn wait(&mut self, timeout: Duration) -> Result<i32, SupervisorError> {
        match tokio::time::timeout(timeout, self.child.wait()).await {
            Ok(Ok(status)) => {
                let code = status.code().unwrap_or(-1);
                append_trace(&self.trace_path, &format!("[RETURN] {code}\n")).await?;
                Ok(code)
            }
            Ok(Err(source)) => {
                Err(SupervisorError::Trace { path: self.trace_path.display().to_string(), source })
            }
            Err(_) => Err(SupervisorError::Timeout(timeout)),
        }
    }

    /// Non-blocking check for exit, appending `[RETURN] n` and returning
    /// `Some(code)` if the process has already exited, `None` if it is
    /// still running. Used to poll a registered session (e.g. from a CLI
    /// `attach` loopback server) without taking it out of circulation the
    /// way [`StreamSession::wait`] would.
    pub async fn try_wait(&mut self) -> Result<Option<i32>, SupervisorError> {
        match self.child.try_wait() {
            Ok(Some(status)) => {
                let code = status.code().unwrap_or(-1);
                append_trace(&self.trace_path, &format!("[RETURN] {code}\n")).await?;
                Ok(Some(code))
            }
            Ok(None) => Ok(None),
            Err(source) => {
                Err(SupervisorError::Trace { path: self.trace_path.display().to_string(), source })
            }
        }
    }

    /// Close stdin, then wait up to `grace` for a clean exit before killing
    /// the process. Always appends `[RETURN] n` (or `-1` if the exit code
    /// is unavailable) to the trace.
    pub async fn terminate(&mut self, grace: Duration) {
        self.stdin = None;
        let code = match tokio::time::timeout(grace, self.child.wait()).await {
            Ok(Ok(status)) => status.code().unwrap_or(-1),
            _ => {
                let _ = self.child.kill().await;
                let _ = self.child.wait().await;
                -1
            }
        };
        let _ = append_trace(&self.trace_path, &format!("[RETURN] {code}\n")).await;
    }

    /// Path of this session's trace log.
    #[must_use]
    pub fn trace_path(&self) -> &Path {
        &self.trace_path
    }
}

fn spawn_collector<R>(reader: R, trace_path: PathBuf, label: &'static str)
where
    R: tokio::io::AsyncRead + Unpin + Send + 'static,
{
    let (tx, mut rx) = mpsc::unbounded_channel::<String>();
    tokio::spawn(async move {
        let mut lines = BufReader::new(reader).lines();
        while let Ok(Some(line)) = lines.next_line().await {
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    tokio::spawn(async move {
        while let Some(line) = rx.recv().await {
            let _ = append_trace(&trace_path, &format!("[{label}] {line}\n")).await;
        }
    });
}
