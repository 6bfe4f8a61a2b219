//! Development server launch

use crate::error::{PreviewError, Result};
use crate::reporter::StatusReporter;
use crate::sandbox::{Sandbox, SpawnedProcess};
use futures::StreamExt;
use regex::Regex;
use tracing::{debug, info, warn};

/// Progress once the dev server output looks ready
const OUTPUT_HINT_PROGRESS: u8 = 95;

/// Starts the dev server and watches its output for a readiness hint.
///
/// The hint only moves the progress gauge. Whether the server is actually
/// serving is decided by the sandbox's ready notification.
pub struct ServerLauncher {
    command: String,
    args: Vec<String>,
    ready_hint: Regex,
}

impl ServerLauncher {
    pub fn new(command: impl Into<String>, args: Vec<String>, ready_hint: Regex) -> Self {
        Self {
            command: command.into(),
            args,
            ready_hint,
        }
    }

    pub async fn start_dev_server(
        &self,
        sandbox: &dyn Sandbox,
        reporter: &StatusReporter,
    ) -> Result<()> {
        info!(command = %self.command, args = ?self.args, "Starting development server");

        let SpawnedProcess { output, exit } = sandbox
            .spawn(&self.command, &self.args)
            .await
            .map_err(|e| PreviewError::LaunchFailure(e.to_string()))?;

        let hint = self.ready_hint.clone();
        let output_reporter = reporter.clone();
        tokio::spawn(async move {
            let mut output = output;
            let mut hinted = false;
            while let Some(chunk) = output.next().await {
                debug!(target: "preview::dev", "{}", chunk.trim_end());
                if !hinted && hint.is_match(&chunk) {
                    hinted = true;
                    output_reporter.raise_progress(OUTPUT_HINT_PROGRESS);
                }
            }
        });

        let command = self.command.clone();
        tokio::spawn(async move {
            match exit.await {
                Ok(code) => warn!(command = %command, exit_code = code, "Development server exited"),
                Err(e) => warn!(command = %command, "Development server ended with error: {}", e),
            }
        });

        Ok(())
    }
}
