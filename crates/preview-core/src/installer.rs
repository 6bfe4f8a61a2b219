//! Dependency install execution

use crate::coordinator::InstallGuard;
use crate::error::{PreviewError, Result};
use crate::fingerprint::ManifestFingerprint;
use crate::reporter::StatusReporter;
use crate::sandbox::{Sandbox, SpawnedProcess};
use futures::StreamExt;
use preview_types::PreviewPhase;
use regex::Regex;
use std::sync::Arc;
use tracing::{debug, error, info};

/// Progress when the install starts
const INSTALL_START_PROGRESS: u8 = 25;
/// Ceiling for output-driven install progress
const INSTALL_STREAM_CAP: u8 = 75;
/// Progress added for each matching output line
const INSTALL_STREAM_STEP: u8 = 10;
/// Progress once the install exited cleanly
const INSTALL_DONE_PROGRESS: u8 = 80;

/// Runs the install command inside a sandbox
#[derive(Clone)]
pub struct DependencyInstaller {
    command: String,
    args: Vec<String>,
    progress_hint: Regex,
}

impl DependencyInstaller {
    pub fn new(command: impl Into<String>, args: Vec<String>, progress_hint: Regex) -> Self {
        Self {
            command: command.into(),
            args,
            progress_hint,
        }
    }

    /// Run one install attempt while holding the install slot.
    ///
    /// The slot is always handed back: completed with the outcome on exit,
    /// or released by the guard if this future is dropped or panics.
    pub async fn install(
        self,
        sandbox: Arc<dyn Sandbox>,
        guard: InstallGuard,
        fingerprint: ManifestFingerprint,
        reporter: StatusReporter,
    ) -> Result<()> {
        reporter.update(
            PreviewPhase::Installing,
            INSTALL_START_PROGRESS,
            "Installing dependencies...",
        );
        info!(
            command = %self.command,
            args = ?self.args,
            fingerprint = %fingerprint,
            "Running dependency install"
        );

        let SpawnedProcess { output, exit } = match sandbox.spawn(&self.command, &self.args).await {
            Ok(process) => process,
            Err(e) => {
                error!("Error during dependency install: {}", e);
                guard.complete(false, &fingerprint);
                return Err(PreviewError::InstallFailure(format!(
                    "Installation error occurred: {}",
                    e
                )));
            }
        };

        let hint = self.progress_hint.clone();
        let output_reporter = reporter.clone();
        tokio::spawn(async move {
            let mut output = output;
            while let Some(chunk) = output.next().await {
                debug!(target: "preview::install", "{}", chunk.trim_end());
                if hint.is_match(&chunk) {
                    output_reporter.advance_progress(INSTALL_STREAM_STEP, INSTALL_STREAM_CAP);
                }
            }
        });

        match exit.await {
            Ok(0) => {
                guard.complete(true, &fingerprint);
                reporter.update(
                    PreviewPhase::Installing,
                    INSTALL_DONE_PROGRESS,
                    "Dependencies installed successfully",
                );
                Ok(())
            }
            Ok(code) => {
                error!(exit_code = code, "Dependency install failed");
                guard.complete(false, &fingerprint);
                Err(PreviewError::InstallFailure(format!(
                    "Dependency installation failed (exit code {})",
                    code
                )))
            }
            Err(e) => {
                error!("Error while waiting for dependency install: {}", e);
                guard.complete(false, &fingerprint);
                Err(PreviewError::InstallFailure(format!(
                    "Installation error occurred: {}",
                    e
                )))
            }
        }
    }
}
