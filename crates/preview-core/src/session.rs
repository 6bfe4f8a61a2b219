//! Preview session orchestration
//!
//! A [`PreviewSession`] turns a project file tree into a live preview URL:
//! locate the manifest, make sure dependencies are installed (sharing one
//! [`InstallCoordinator`] with every other session on the same sandbox),
//! start the dev server and wait for the sandbox to report it ready.
//!
//! [`PreviewController`] is the mount-level handle a host keeps around. Each
//! new file tree cancels the previous run and starts a new one.

use crate::config::PreviewConfig;
use crate::coordinator::InstallCoordinator;
use crate::error::{PreviewError, Result};
use crate::file_tree::find_manifest;
use crate::fingerprint::{fingerprint, ManifestFingerprint};
use crate::installer::DependencyInstaller;
use crate::launcher::ServerLauncher;
use crate::reporter::{NoopObserver, PreviewObserver, StatusReporter};
use crate::sandbox::Sandbox;
use preview_types::{FileNode, PreviewPhase, ServerReady, SessionStatus};
use std::sync::{Arc, Mutex};
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Progress once the manifest was found
const MANIFEST_FOUND_PROGRESS: u8 = 10;
/// Progress when the dev server is being started
const LAUNCH_PROGRESS: u8 = 85;

/// Per-run switches
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunOptions {
    /// Reinstall even when the manifest fingerprint is cached
    pub force: bool,
}

/// Drives install and launch for one mount
pub struct PreviewSession {
    sandbox: Option<Arc<dyn Sandbox>>,
    coordinator: Arc<InstallCoordinator>,
    config: PreviewConfig,
    installer: DependencyInstaller,
    launcher: ServerLauncher,
    status: Arc<watch::Sender<SessionStatus>>,
    observer: Arc<dyn PreviewObserver>,
}

impl PreviewSession {
    /// Create a session. A `None` sandbox makes every run fail with
    /// `SandboxUnavailable`.
    pub fn new(
        sandbox: Option<Arc<dyn Sandbox>>,
        coordinator: Arc<InstallCoordinator>,
        config: PreviewConfig,
    ) -> Result<Self> {
        let installer = DependencyInstaller::new(
            config.install_command.clone(),
            config.install_args.clone(),
            config.install_progress_regex()?,
        );
        let launcher = ServerLauncher::new(
            config.dev_command.clone(),
            config.dev_args.clone(),
            config.server_ready_regex()?,
        );
        let (status, _) = watch::channel(SessionStatus::default());

        Ok(Self {
            sandbox,
            coordinator,
            config,
            installer,
            launcher,
            status: Arc::new(status),
            observer: Arc::new(NoopObserver),
        })
    }

    pub fn with_observer(mut self, observer: Arc<dyn PreviewObserver>) -> Self {
        self.observer = observer;
        self
    }

    /// Current status
    pub fn status(&self) -> SessionStatus {
        self.status.borrow().clone()
    }

    /// Receiver notified on every status change
    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.status.subscribe()
    }

    /// Run the whole pipeline for `files` and return the preview URL.
    ///
    /// Every failure is also published as a `Failed` status; the returned
    /// error is for callers that want it programmatically. Cancelling
    /// `cancel` stops the run at its next suspension point without touching
    /// processes already started in the sandbox.
    pub async fn run(
        &self,
        files: &[FileNode],
        options: RunOptions,
        cancel: CancellationToken,
    ) -> Result<String> {
        let reporter = StatusReporter::new(self.status.clone(), self.observer.clone(), cancel.clone());
        reporter.begin();

        let result = tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(PreviewError::Cancelled),
            result = self.drive(files, options, &reporter) => result,
        };

        match &result {
            Ok(url) => info!(url = %url, "Preview ready"),
            Err(PreviewError::Cancelled) => debug!("Preview run cancelled"),
            Err(e) => {
                error!("Preview failed: {}", e);
                if let Some(kind) = e.failure_kind() {
                    reporter.fail(kind, e.to_string());
                }
            }
        }
        result
    }

    async fn drive(
        &self,
        files: &[FileNode],
        options: RunOptions,
        reporter: &StatusReporter,
    ) -> Result<String> {
        let sandbox = self.sandbox.clone().ok_or(PreviewError::SandboxUnavailable)?;
        // Subscribe before anything is spawned so an early ready event is kept.
        let mut ready_rx = sandbox.on_server_ready();

        reporter.update(
            PreviewPhase::LocatingManifest,
            MANIFEST_FOUND_PROGRESS,
            "Checking project files...",
        );
        let manifest = find_manifest(files, &self.config.manifest_file)
            .and_then(FileNode::non_empty_content)
            .ok_or_else(|| PreviewError::ManifestMissing(self.config.manifest_file.clone()))?;
        debug!(manifest = %self.config.manifest_file, "Found manifest, checking dependencies");

        let fingerprint = fingerprint(manifest);
        self.ensure_dependencies(&sandbox, &fingerprint, options.force, reporter)
            .await?;

        reporter.update(
            PreviewPhase::Launching,
            LAUNCH_PROGRESS,
            "Starting development server...",
        );
        self.launcher
            .start_dev_server(sandbox.as_ref(), reporter)
            .await?;

        reporter.update(PreviewPhase::AwaitingReady, LAUNCH_PROGRESS, "Server starting...");
        let ready = self.await_ready(&mut ready_rx).await?;
        info!(port = ready.port, url = %ready.url, "Server ready");
        reporter.ready(&ready.url);
        Ok(ready.url)
    }

    /// Install dependencies unless the fingerprint is cached, waiting out any
    /// install another session is running.
    async fn ensure_dependencies(
        &self,
        sandbox: &Arc<dyn Sandbox>,
        fingerprint: &ManifestFingerprint,
        force: bool,
        reporter: &StatusReporter,
    ) -> Result<()> {
        loop {
            if self.coordinator.should_skip_install(fingerprint, force) {
                info!(fingerprint = %fingerprint, "Dependencies already installed, skipping install");
                reporter.update(
                    PreviewPhase::CacheHit,
                    MANIFEST_FOUND_PROGRESS,
                    "Dependencies cached, starting server...",
                );
                return Ok(());
            }

            match self.coordinator.begin_install() {
                Some(guard) => {
                    // The install runs on its own task so that a cancelled run
                    // still lets it finish and record its outcome.
                    let install = tokio::spawn(self.installer.clone().install(
                        sandbox.clone(),
                        guard,
                        fingerprint.clone(),
                        reporter.clone(),
                    ));
                    return match install.await {
                        Ok(result) => result,
                        Err(e) => Err(PreviewError::InstallFailure(format!(
                            "Installation error occurred: {}",
                            e
                        ))),
                    };
                }
                None => {
                    info!("Installation already in progress, waiting");
                    reporter.update(
                        PreviewPhase::WaitingForInstall,
                        MANIFEST_FOUND_PROGRESS,
                        "Installation in progress...",
                    );
                    self.coordinator.wait_until_idle().await;
                }
            }
        }
    }

    async fn await_ready(&self, ready_rx: &mut broadcast::Receiver<ServerReady>) -> Result<ServerReady> {
        let wait = async {
            loop {
                match ready_rx.recv().await {
                    Ok(ready) => return Ok(ready),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!(skipped, "Missed server-ready notifications");
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        return Err(PreviewError::SandboxUnavailable);
                    }
                }
            }
        };

        match self.config.ready_timeout() {
            Some(limit) => tokio::time::timeout(limit, wait)
                .await
                .map_err(|_| PreviewError::ReadyTimeout(limit.as_secs()))?,
            None => wait.await,
        }
    }
}

struct ActiveRun {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// Mount-level handle owning the current run of a [`PreviewSession`].
///
/// Must be used from within a Tokio runtime. Dropping the controller
/// unmounts it.
pub struct PreviewController {
    session: Arc<PreviewSession>,
    active: Mutex<Option<ActiveRun>>,
}

impl PreviewController {
    pub fn mount(session: PreviewSession) -> Self {
        Self {
            session: Arc::new(session),
            active: Mutex::new(None),
        }
    }

    pub fn session(&self) -> &Arc<PreviewSession> {
        &self.session
    }

    pub fn status(&self) -> SessionStatus {
        self.session.status()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionStatus> {
        self.session.subscribe()
    }

    /// Start over with a new file tree
    pub fn update_files(&self, files: Vec<FileNode>) {
        self.update_files_with(files, RunOptions::default());
    }

    /// Start over with a new file tree and explicit run options
    pub fn update_files_with(&self, files: Vec<FileNode>, options: RunOptions) {
        let cancel = CancellationToken::new();
        let session = self.session.clone();
        let token = cancel.clone();

        let mut active = self.active.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = active.take() {
            previous.cancel.cancel();
        }
        let task = tokio::spawn(async move {
            // Failures are already published as status.
            let _ = session.run(&files, options, token).await;
        });
        *active = Some(ActiveRun { cancel, task });
    }

    /// Whether the current run has finished (ready, failed or cancelled)
    pub fn is_idle(&self) -> bool {
        self.active
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .as_ref()
            .map(|run| run.task.is_finished())
            .unwrap_or(true)
    }

    /// Stop reacting to the current run. Sandbox processes keep running.
    pub fn unmount(&self) {
        if let Some(run) = self.active.lock().unwrap_or_else(|e| e.into_inner()).take() {
            run.cancel.cancel();
        }
    }
}

impl Drop for PreviewController {
    fn drop(&mut self) {
        self.unmount();
    }
}
