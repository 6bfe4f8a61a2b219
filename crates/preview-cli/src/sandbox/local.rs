//! Sandbox backed by child processes in a local working directory

use async_trait::async_trait;
use futures::{FutureExt, StreamExt};
use once_cell::sync::Lazy;
use preview_core::{PreviewError, Result, Sandbox, SpawnedProcess};
use preview_types::ServerReady;
use regex::Regex;
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

static ANSI_ESCAPE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\x1b\[[0-9;?]*[A-Za-z]").unwrap());

static LOCAL_URL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(https?://(?:localhost|127\.0\.0\.1|\[::1\]|0\.0\.0\.0):(\d+))").unwrap()
});

/// Find the first local server URL in a line of process output
pub fn detect_server_url(line: &str) -> Option<ServerReady> {
    let clean = ANSI_ESCAPE.replace_all(line, "");
    let captures = LOCAL_URL.captures(&clean)?;
    let port = captures.get(2)?.as_str().parse().ok()?;
    let url = captures.get(1)?.as_str().replace("0.0.0.0", "localhost");
    Some(ServerReady::new(port, url))
}

/// Runs commands as real processes inside `workdir`.
///
/// Each process's output is scanned for a local URL; the first one found
/// is announced on the server-ready channel. Spawning a command line that
/// is already running kills the previous process.
pub struct LocalSandbox {
    workdir: PathBuf,
    ready_tx: broadcast::Sender<ServerReady>,
    running: Mutex<HashMap<String, oneshot::Sender<()>>>,
}

impl LocalSandbox {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        let (ready_tx, _) = broadcast::channel(16);
        Self {
            workdir: workdir.into(),
            ready_tx,
            running: Mutex::new(HashMap::new()),
        }
    }

    fn register(&self, command_line: String, kill: oneshot::Sender<()>) {
        let mut running = self.running.lock().unwrap_or_else(|e| e.into_inner());
        // Dropping the previous sender stops the previous process.
        if running.insert(command_line.clone(), kill).is_some() {
            info!(command = %command_line, "Replacing running process");
        }
    }
}

#[async_trait]
impl Sandbox for LocalSandbox {
    async fn spawn(&self, command: &str, args: &[String]) -> Result<SpawnedProcess> {
        let lookup = command.to_string();
        let program = tokio::task::spawn_blocking(move || which::which(lookup))
            .await
            .map_err(|e| PreviewError::Sandbox(format!("command lookup failed: {}", e)))?
            .map_err(|_| PreviewError::Sandbox(format!("{}: command not found", command)))?;

        let command_line = std::iter::once(command)
            .chain(args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        debug!(program = %program.display(), workdir = %self.workdir.display(), "Spawning {}", command_line);

        let mut child = Command::new(&program)
            .args(args)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let (line_tx, line_rx) = mpsc::unbounded_channel();
        let announced = Arc::new(AtomicBool::new(false));
        if let Some(stdout) = child.stdout.take() {
            forward_lines(stdout, line_tx.clone(), self.ready_tx.clone(), announced.clone());
        }
        if let Some(stderr) = child.stderr.take() {
            forward_lines(stderr, line_tx, self.ready_tx.clone(), announced);
        }

        let (kill_tx, kill_rx) = oneshot::channel();
        self.register(command_line.clone(), kill_tx);

        let (exit_tx, exit_rx) = oneshot::channel();
        tokio::spawn(async move {
            let status = tokio::select! {
                status = child.wait() => status.map(|s| s.code().unwrap_or(-1)),
                _ = kill_rx => {
                    if let Err(e) = child.kill().await {
                        warn!(command = %command_line, "Failed to kill process: {}", e);
                    }
                    Ok(-1)
                }
            };
            debug!(command = %command_line, status = ?status, "Process ended");
            let _ = exit_tx.send(status);
        });

        let output = futures::stream::unfold(line_rx, |mut rx| async move {
            rx.recv().await.map(|line| (line, rx))
        })
        .boxed();

        let exit = async move {
            match exit_rx.await {
                Ok(status) => status.map_err(PreviewError::from),
                Err(_) => Err(PreviewError::Sandbox("process monitor stopped".to_string())),
            }
        }
        .boxed();

        Ok(SpawnedProcess { output, exit })
    }

    fn on_server_ready(&self) -> broadcast::Receiver<ServerReady> {
        self.ready_tx.subscribe()
    }
}

fn forward_lines<R>(
    reader: R,
    lines: mpsc::UnboundedSender<String>,
    ready_tx: broadcast::Sender<ServerReady>,
    announced: Arc<AtomicBool>,
) where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut reader = BufReader::new(reader).lines();
        while let Ok(Some(line)) = reader.next_line().await {
            if !announced.load(Ordering::SeqCst) {
                if let Some(ready) = detect_server_url(&line) {
                    if !announced.swap(true, Ordering::SeqCst) {
                        info!(port = ready.port, url = %ready.url, "Server is listening");
                        let _ = ready_tx.send(ready);
                    }
                }
            }
            // The pipe is drained even after the output stream is dropped.
            let _ = lines.send(line);
        }
    });
}
