//! Stdio transport for child-process tool servers
//!
//! [`StdioTransport`] spawns a child process and talks to it over its
//! stdin/stdout pipes with newline-delimited JSON framing.
//!
//! - Outbound messages are written to stdin as one JSON object followed by
//!   `\n`.
//! - Inbound messages are read from stdout, one JSON object per line. Blank
//!   lines are skipped.
//! - stderr is forwarded to a diagnostic stream and logged at debug level.
//!
//! The child inherits the parent environment; configured variables are
//! layered on top. When the transport is closed or dropped, a best-effort
//! SIGTERM (Unix) or `start_kill` (non-Unix) is sent to the child.

use std::collections::HashMap;
use std::pin::Pin;
use std::process::Stdio;
use std::sync::Arc;

use futures::Stream;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{mpsc, Mutex};

use crate::error::{Result, RelayError};
use crate::mcp::transport::Transport;

/// Stdio-based transport that drives a child process.
///
/// # Examples
///
/// ```no_run
/// use std::collections::HashMap;
/// use toolrelay::mcp::transport::stdio::StdioTransport;
///
/// # #[tokio::main]
/// # async fn main() -> anyhow::Result<()> {
/// let transport = StdioTransport::spawn(
///     "npx",
///     &["-y".to_string(), "@modelcontextprotocol/server-filesystem".to_string()],
///     &HashMap::new(),
/// )?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct StdioTransport {
    /// Sender side of the stdin channel; `send()` writes here.
    stdin_tx: mpsc::UnboundedSender<String>,
    /// Shared receiver for stdout lines.
    stdout_rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    /// Shared receiver for stderr lines.
    stderr_rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
    /// Handle to the spawned child process.
    child: Arc<Mutex<Child>>,
}

impl StdioTransport {
    /// Spawn `command` with `args` and wire up its stdio pipes.
    ///
    /// `env` is applied on top of the inherited parent environment.
    ///
    /// # Errors
    ///
    /// Returns [`RelayError::McpTransport`] if the process cannot be spawned
    /// or a stdio pipe is unavailable.
    pub fn spawn(command: &str, args: &[String], env: &HashMap<String, String>) -> Result<Self> {
        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd.spawn().map_err(|e| {
            RelayError::McpTransport(format!("failed to spawn `{command}`: {e}"))
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| RelayError::McpTransport("child stdin unavailable".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| RelayError::McpTransport("child stdout unavailable".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| RelayError::McpTransport("child stderr unavailable".into()))?;

        let (stdin_tx, mut stdin_rx) = mpsc::unbounded_channel::<String>();
        let (stdout_tx, stdout_rx) = mpsc::unbounded_channel::<String>();
        let (stderr_tx, stderr_rx) = mpsc::unbounded_channel::<String>();

        tokio::spawn(async move {
            let mut stdin = stdin;
            while let Some(msg) = stdin_rx.recv().await {
                let line = format!("{msg}\n");
                if stdin.write_all(line.as_bytes()).await.is_err() {
                    break;
                }
                if stdin.flush().await.is_err() {
                    break;
                }
            }
        });

        tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    continue;
                }
                if stdout_tx.send(trimmed.to_string()).is_err() {
                    break;
                }
            }
        });

        let label = command.to_string();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                tracing::debug!(command = %label, "tool server stderr: {line}");
                if stderr_tx.send(line).is_err() {
                    break;
                }
            }
        });

        Ok(Self {
            stdin_tx,
            stdout_rx: Arc::new(Mutex::new(stdout_rx)),
            stderr_rx: Arc::new(Mutex::new(stderr_rx)),
            child: Arc::new(Mutex::new(child)),
        })
    }
}

fn channel_stream(
    rx: Arc<Mutex<mpsc::UnboundedReceiver<String>>>,
) -> Pin<Box<dyn Stream<Item = String> + Send + 'static>> {
    Box::pin(futures::stream::unfold(rx, |rx| async move {
        let mut guard = rx.lock().await;
        let item = guard.recv().await?;
        drop(guard);
        Some((item, rx))
    }))
}

#[async_trait::async_trait]
impl Transport for StdioTransport {
    async fn send(&self, message: String) -> Result<()> {
        self.stdin_tx
            .send(message)
            .map_err(|e| RelayError::McpTransport(format!("stdin channel closed: {e}")).into())
    }

    fn receive(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>> {
        channel_stream(Arc::clone(&self.stdout_rx))
    }

    fn receive_err(&self) -> Pin<Box<dyn Stream<Item = String> + Send + '_>> {
        channel_stream(Arc::clone(&self.stderr_rx))
    }

    async fn close(&self) -> Result<()> {
        let mut child = self.child.lock().await;
        if let Err(e) = child.start_kill() {
            tracing::debug!("tool server already exited: {e}");
        }
        let _ = child.wait().await;
        Ok(())
    }
}

impl Drop for StdioTransport {
    fn drop(&mut self) {
        // Skip if another task holds the lock; kill_on_drop covers it.
        if let Ok(child) = self.child.try_lock() {
            #[cfg(unix)]
            {
                if let Some(pid) = child.id() {
                    // SAFETY: pid was obtained from a live tokio::process::Child.
                    unsafe {
                        libc::kill(pid as libc::pid_t, libc::SIGTERM);
                    }
                }
            }
            #[cfg(not(unix))]
            {
                let mut child = child;
                let _ = child.start_kill();
            }
        }
    }
}
