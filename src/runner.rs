//! Renderer process execution
//!
//! Spawns the renderer once per call, feeds the HTML on stdin and collects
//! stdout, stderr and the exit status. Writing and draining run concurrently
//! so a renderer that starts producing output before it has read all of its
//! input cannot deadlock on full pipe buffers.

use crate::command::CommandLine;
use crate::error::{RenderError, Result};
use async_trait::async_trait;
use std::process::Stdio;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::process::{Child, ChildStdin, Command};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Everything one renderer invocation produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionResult {
    pub stdout: Vec<u8>,
    pub stderr: Vec<u8>,
    /// `None` when the process was terminated by a signal
    pub exit_code: Option<i32>,
}

impl ExecutionResult {
    pub fn stderr_text(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

/// Runs a renderer command against an input payload.
///
/// Non-zero exits and renderer diagnostics are data, not errors: they come
/// back in the [`ExecutionResult`]. Only failures to run the process at all
/// are returned as `Err`.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Execute: Send + Sync {
    async fn execute(&self, command: &CommandLine, input: &[u8]) -> Result<ExecutionResult>;
}

/// Executes commands as real child processes
#[derive(Debug, Clone, Default)]
pub struct ProcessRunner {
    timeout: Option<Duration>,
}

impl ProcessRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(timeout: Option<Duration>) -> Self {
        Self { timeout }
    }

    pub async fn run(&self, command: &CommandLine, input: &[u8]) -> Result<ExecutionResult> {
        let mut child = Command::new(command.program())
            .args(command.args())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| RenderError::SpawnFailed {
                command: command.to_shell_string(),
                reason: e.to_string(),
            })?;

        debug!(
            "Spawned renderer pid {:?}, writing {} bytes",
            child.id(),
            input.len()
        );

        let outcome = match self.timeout {
            Some(limit) => timeout(limit, exchange(&mut child, input))
                .await
                .map_err(|_| limit),
            None => Ok(exchange(&mut child, input).await),
        };

        match outcome {
            Ok(Ok(result)) => {
                debug!(
                    "Renderer exited with {:?}: {} bytes stdout, {} bytes stderr",
                    result.exit_code,
                    result.stdout.len(),
                    result.stderr.len()
                );
                Ok(result)
            }
            Ok(Err(e)) => {
                reap(&mut child).await;
                Err(e)
            }
            Err(limit) => {
                warn!("Renderer exceeded {:?}, killing it", limit);
                reap(&mut child).await;
                Err(RenderError::Timeout(limit))
            }
        }
    }
}

#[async_trait]
impl Execute for ProcessRunner {
    async fn execute(&self, command: &CommandLine, input: &[u8]) -> Result<ExecutionResult> {
        self.run(command, input).await
    }
}

/// Write `input`, drain both output pipes and wait for exit.
async fn exchange(child: &mut Child, input: &[u8]) -> Result<ExecutionResult> {
    let stdin = child.stdin.take();
    let stdout = child.stdout.take();
    let stderr = child.stderr.take();

    let (written, stdout, stderr) = tokio::join!(
        write_input(stdin, input),
        drain(stdout),
        drain(stderr),
    );
    written?;
    let stdout = stdout?;
    let stderr = stderr?;

    let status = child.wait().await?;

    Ok(ExecutionResult {
        stdout,
        stderr,
        exit_code: status.code(),
    })
}

async fn write_input(stdin: Option<ChildStdin>, input: &[u8]) -> Result<()> {
    let Some(mut stdin) = stdin else {
        return Ok(());
    };

    match stdin.write_all(input).await {
        Ok(()) => {}
        // The renderer may exit without reading everything; judge it by its output.
        Err(e) if e.kind() == std::io::ErrorKind::BrokenPipe => {
            debug!("Renderer closed stdin early");
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    }

    match stdin.shutdown().await {
        Err(e) if e.kind() != std::io::ErrorKind::BrokenPipe => Err(e.into()),
        _ => Ok(()),
    }
}

async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>) -> Result<Vec<u8>> {
    let mut buffer = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buffer).await?;
    }
    Ok(buffer)
}

async fn reap(child: &mut Child) {
    if let Err(e) = child.kill().await {
        debug!("Renderer already gone: {}", e);
    }
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_echo_arguments() {
        let command = CommandLine::new("/bin/echo").value("test");
        let result = ProcessRunner::new().run(&command, b"test").await.unwrap();

        assert_eq!(
            result,
            ExecutionResult {
                stdout: b"test\n".to_vec(),
                stderr: Vec::new(),
                exit_code: Some(0),
            }
        );
    }

    #[tokio::test]
    async fn test_stdin_reaches_renderer() {
        let command = CommandLine::new("/bin/cat");
        let result = ProcessRunner::new().run(&command, b"html").await.unwrap();

        assert_eq!(result.stdout, b"html");
        assert!(result.stderr.is_empty());
        assert_eq!(result.exit_code, Some(0));
    }

    #[tokio::test]
    async fn test_large_payload_does_not_deadlock() {
        let payload: Vec<u8> = (0..1024 * 1024).map(|i| (i % 251) as u8).collect();
        let command = CommandLine::new("/bin/cat");

        let runner = ProcessRunner::with_timeout(Some(Duration::from_secs(30)));
        let result = runner.run(&command, &payload).await.unwrap();

        assert_eq!(result.stdout.len(), payload.len());
        assert_eq!(result.stdout, payload);
    }

    #[tokio::test]
    async fn test_stderr_and_exit_code_are_data() {
        let command = CommandLine::new("/bin/sh")
            .value("-c")
            .value("echo wrong 1>&2; exit 3");
        let result = ProcessRunner::new().run(&command, b"").await.unwrap();

        assert!(result.stdout.is_empty());
        assert_eq!(result.stderr_text(), "wrong\n");
        assert_eq!(result.exit_code, Some(3));
    }

    #[tokio::test]
    async fn test_spawn_failure() {
        let command = CommandLine::new("/bin/nonexisting").value("test");
        let err = ProcessRunner::new().run(&command, b"test").await.unwrap_err();

        match err {
            RenderError::SpawnFailed { command, .. } => {
                assert_eq!(command, "/bin/nonexisting 'test'");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timeout_kills_renderer() {
        let command = CommandLine::new("/bin/sleep").value("5");
        let runner = ProcessRunner::with_timeout(Some(Duration::from_millis(200)));

        let started = std::time::Instant::now();
        let err = runner.run(&command, b"").await.unwrap_err();

        assert!(matches!(err, RenderError::Timeout(d) if d == Duration::from_millis(200)));
        assert!(started.elapsed() < Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_renderer_ignoring_stdin() {
        let command = CommandLine::new("/bin/true");
        let payload = vec![b'x'; 512 * 1024];
        let result = ProcessRunner::new().run(&command, &payload).await.unwrap();

        assert!(result.stdout.is_empty());
        assert!(result.stderr.is_empty());
        assert_eq!(result.exit_code, Some(0));
    }
}
