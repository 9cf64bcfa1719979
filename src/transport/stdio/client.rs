//! Client-side stdio transport: spawns a subprocess and speaks NDJSON over
//! its stdin/stdout (spec.md §4.6.1).

use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::process::{Child, ChildStdin};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};

use crate::protocol::Frame;
use crate::transport::{FrameHandler, Transport, TransportError, TransportResult};

/// A callback invoked per stderr line the child process writes. Defaults to
/// logging at `warn`.
pub type StderrHandler = Arc<dyn Fn(String) + Send + Sync>;

/// Construction-time configuration for [`StdioClientTransport`].
#[derive(Clone)]
pub struct StdioClientConfig {
    pub command: String,
    pub args: Vec<String>,
    pub env: HashMap<String, String>,
    pub working_dir: Option<String>,
    /// How long `close()` waits for a graceful exit before killing the child.
    pub close_deadline: Duration,
    pub stderr_handler: Option<StderrHandler>,
}

impl StdioClientConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            env: HashMap::new(),
            working_dir: None,
            close_deadline: Duration::from_secs(5),
            stderr_handler: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }
}

/// Spawns `command` as a child process and carries frames over its stdio
/// pipes, one NDJSON line per frame.
pub struct StdioClientTransport {
    config: StdioClientConfig,
    child: Option<Arc<Mutex<Child>>>,
    stdin: Option<Arc<Mutex<ChildStdin>>>,
    handler: Option<Arc<dyn FrameHandler>>,
    connected: Arc<AtomicBool>,
    reader_task: Option<JoinHandle<()>>,
    stderr_task: Option<JoinHandle<()>>,
}

impl StdioClientTransport {
    pub fn new(config: StdioClientConfig) -> Self {
        Self {
            config,
            child: None,
            stdin: None,
            handler: None,
            connected: Arc::new(AtomicBool::new(false)),
            reader_task: None,
            stderr_task: None,
        }
    }
}

#[async_trait]
impl Transport for StdioClientTransport {
    async fn start(&mut self) -> TransportResult<()> {
        let mut command = tokio::process::Command::new(&self.config.command);
        command
            .args(&self.config.args)
            .envs(&self.config.env)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        if let Some(dir) = &self.config.working_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(TransportError::Io)?;
        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::Other("child has no stdin".into()))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::Other("child has no stdout".into()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| TransportError::Other("child has no stderr".into()))?;

        self.connected.store(true, Ordering::SeqCst);
        self.stdin = Some(Arc::new(Mutex::new(stdin)));
        let child = Arc::new(Mutex::new(child));
        self.child = Some(Arc::clone(&child));

        let handler = self.handler.clone();
        let connected = Arc::clone(&self.connected);
        self.reader_task = Some(tokio::spawn(async move {
            let mut lines = BufReader::new(stdout).lines();
            loop {
                match lines.next_line().await {
                    Ok(Some(line)) => {
                        if line.trim().is_empty() {
                            continue;
                        }
                        match Frame::decode(line.as_bytes()) {
                            Ok(frame) => {
                                if let Some(handler) = &handler {
                                    handler.handle_frame(frame).await;
                                }
                            }
                            Err(e) => {
                                warn!(error = %e, "dropping unparseable line from child stdout");
                            }
                        }
                    }
                    Ok(None) => {
                        // spec.md §4.6.1: child exit must fail every pending
                        // request with `ProcessExited`, not a plain disconnect.
                        let status = child
                            .lock()
                            .await
                            .wait()
                            .await
                            .map(|status| status.to_string())
                            .unwrap_or_else(|e| format!("unknown ({e})"));
                        if let Some(handler) = &handler {
                            handler.handle_error(TransportError::ProcessExited { status }).await;
                        }
                        break;
                    }
                    Err(e) => {
                        if let Some(handler) = &handler {
                            handler.handle_error(TransportError::ReadFailed(e.to_string())).await;
                        }
                        break;
                    }
                }
            }
            connected.store(false, Ordering::SeqCst);
            if let Some(handler) = &handler {
                handler.handle_close().await;
            }
        }));

        let stderr_handler = self.config.stderr_handler.clone();
        self.stderr_task = Some(tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                match &stderr_handler {
                    Some(handler) => handler(line),
                    None => warn!(stderr = %line, "child process stderr"),
                }
            }
        }));

        self.child = Some(child);
        debug!(command = %self.config.command, "stdio client transport started");
        Ok(())
    }

    async fn send(&self, frame: &Frame) -> TransportResult<()> {
        let stdin = self
            .stdin
            .as_ref()
            .ok_or(TransportError::NotConnected)?;
        let mut line = frame.encode()?;
        line.push('\n');
        let mut guard = stdin.lock().await;
        guard
            .write_all(line.as_bytes())
            .await
            .map_err(|e| TransportError::WriteFailed(e.to_string()))?;
        trace!("wrote frame to child stdin");
        Ok(())
    }

    fn set_frame_handler(&mut self, handler: Arc<dyn FrameHandler>) {
        self.handler = Some(handler);
    }

    async fn close(&mut self) -> TransportResult<()> {
        self.connected.store(false, Ordering::SeqCst);
        // Closing stdin sends EOF to the child; give it a chance to exit
        // cleanly before killing it.
        self.stdin.take();

        if let Some(child) = self.child.take() {
            let deadline = self.config.close_deadline;
            let mut child = child.lock().await;
            let exited = tokio::time::timeout(deadline, child.wait()).await;
            match exited {
                Ok(Ok(status)) => {
                    debug!(%status, "child exited after close");
                }
                _ => {
                    let _ = child.kill().await;
                }
            }
        }
        if let Some(task) = self.reader_task.take() {
            task.abort();
        }
        if let Some(task) = self.stderr_task.take() {
            task.abort();
        }
        Ok(())
    }

    fn session_id(&self) -> Option<String> {
        None
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    fn transport_type(&self) -> &'static str {
        "stdio"
    }
}
