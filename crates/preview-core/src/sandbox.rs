//! Sandbox capability trait
//!
//! A sandbox runs shell-like commands inside an isolated environment and
//! announces when one of them starts serving a port.

use crate::error::Result;
use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::stream::BoxStream;
use preview_types::ServerReady;
use tokio::sync::broadcast;

/// Handle to a process started inside a sandbox
pub struct SpawnedProcess {
    /// Text chunks written by the process, stdout and stderr interleaved
    pub output: BoxStream<'static, String>,
    /// Resolves to the exit code once the process ends
    pub exit: BoxFuture<'static, Result<i32>>,
}

impl std::fmt::Debug for SpawnedProcess {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpawnedProcess").finish_non_exhaustive()
    }
}

/// Isolated execution environment used by preview sessions
#[async_trait]
pub trait Sandbox: Send + Sync {
    /// Start `command` with `args`
    async fn spawn(&self, command: &str, args: &[String]) -> Result<SpawnedProcess>;

    /// Subscribe to server-ready notifications.
    ///
    /// There is no unsubscribe; dropping the receiver is the only cleanup.
    fn on_server_ready(&self) -> broadcast::Receiver<ServerReady>;
}

#[cfg(test)]
pub(crate) mod fake {
    //! Scripted in-memory sandbox for session tests

    use super::*;
    use crate::error::PreviewError;
    use futures::{FutureExt, StreamExt};
    use std::sync::Mutex;
    use tokio::sync::watch;

    pub(crate) struct FakeSandbox {
        ready_tx: broadcast::Sender<ServerReady>,
        spawns: Mutex<Vec<(String, Vec<String>)>>,
        install_exit_code: Mutex<i32>,
        install_output: Vec<String>,
        dev_output: Vec<String>,
        fail_install_spawn: bool,
        fail_dev_spawn: bool,
        install_gate: watch::Sender<bool>,
    }

    impl FakeSandbox {
        pub(crate) fn new() -> Self {
            let (ready_tx, _) = broadcast::channel(16);
            let (install_gate, _) = watch::channel(true);
            Self {
                ready_tx,
                spawns: Mutex::new(Vec::new()),
                install_exit_code: Mutex::new(0),
                install_output: vec!["added 42 packages in 3s".to_string()],
                dev_output: vec!["  VITE v5.0.0  ready in 312 ms\n".to_string()],
                fail_install_spawn: false,
                fail_dev_spawn: false,
                install_gate,
            }
        }

        pub(crate) fn with_install_exit_code(self, code: i32) -> Self {
            *self.install_exit_code.lock().unwrap() = code;
            self
        }

        pub(crate) fn with_failing_install_spawn(mut self) -> Self {
            self.fail_install_spawn = true;
            self
        }

        pub(crate) fn with_failing_dev_spawn(mut self) -> Self {
            self.fail_dev_spawn = true;
            self
        }

        pub(crate) fn with_dev_output(mut self, lines: &[&str]) -> Self {
            self.dev_output = lines.iter().map(|l| l.to_string()).collect();
            self
        }

        /// Hold install processes until `open_install_gate` is called
        pub(crate) fn with_closed_install_gate(self) -> Self {
            self.install_gate.send_replace(false);
            self
        }

        pub(crate) fn open_install_gate(&self) {
            self.install_gate.send_replace(true);
        }

        pub(crate) fn emit_ready(&self, port: u16, url: &str) {
            let _ = self.ready_tx.send(ServerReady::new(port, url));
        }

        pub(crate) fn spawned(&self) -> Vec<(String, Vec<String>)> {
            self.spawns.lock().unwrap().clone()
        }

        pub(crate) fn install_spawns(&self) -> usize {
            self.spawned()
                .iter()
                .filter(|(_, args)| args.first().map(String::as_str) == Some("install"))
                .count()
        }

        pub(crate) fn dev_spawns(&self) -> usize {
            self.spawned()
                .iter()
                .filter(|(_, args)| args.first().map(String::as_str) == Some("run"))
                .count()
        }
    }

    #[async_trait]
    impl Sandbox for FakeSandbox {
        async fn spawn(&self, command: &str, args: &[String]) -> Result<SpawnedProcess> {
            self.spawns
                .lock()
                .unwrap()
                .push((command.to_string(), args.to_vec()));

            let is_install = args.first().map(String::as_str) == Some("install");
            if is_install && self.fail_install_spawn {
                return Err(PreviewError::Sandbox("npm: command not found".to_string()));
            }
            if !is_install && self.fail_dev_spawn {
                return Err(PreviewError::Sandbox("spawn EACCES".to_string()));
            }

            if is_install {
                let code = *self.install_exit_code.lock().unwrap();
                let mut gate = self.install_gate.subscribe();
                Ok(SpawnedProcess {
                    output: futures::stream::iter(self.install_output.clone()).boxed(),
                    exit: async move {
                        let _ = gate.wait_for(|open| *open).await;
                        Ok(code)
                    }
                    .boxed(),
                })
            } else {
                Ok(SpawnedProcess {
                    output: futures::stream::iter(self.dev_output.clone()).boxed(),
                    exit: futures::future::pending().boxed(),
                })
            }
        }

        fn on_server_ready(&self) -> broadcast::Receiver<ServerReady> {
            self.ready_tx.subscribe()
        }
    }
}
