//! Status publishing for a single preview run

use preview_types::{FailureKind, PreviewPhase, SessionStatus};
use std::sync::Arc;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Host-side callbacks for a preview mount
pub trait PreviewObserver: Send + Sync {
    /// Every published status, in order
    fn on_status(&self, _status: &SessionStatus) {}

    /// Called once with `true` when a run reaches `Ready`
    fn on_status_change(&self, _ready: bool) {}

    /// Called once with the live URL when a run reaches `Ready`
    fn on_url_change(&self, _url: &str) {}
}

/// Observer that ignores everything
pub struct NoopObserver;

impl PreviewObserver for NoopObserver {}

/// Publishes status for one run of a session.
///
/// Once the run's token is cancelled every method becomes a no-op, so a
/// superseded run can keep draining process output without touching the
/// status of the run that replaced it.
#[derive(Clone)]
pub struct StatusReporter {
    tx: Arc<watch::Sender<SessionStatus>>,
    observer: Arc<dyn PreviewObserver>,
    cancel: CancellationToken,
}

impl StatusReporter {
    pub fn new(
        tx: Arc<watch::Sender<SessionStatus>>,
        observer: Arc<dyn PreviewObserver>,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            tx,
            observer,
            cancel,
        }
    }

    pub fn is_active(&self) -> bool {
        !self.cancel.is_cancelled()
    }

    /// Start a fresh status for a new run
    pub fn begin(&self) {
        self.publish(|status| *status = SessionStatus::default());
    }

    /// Move to `phase`. Progress never goes backwards within a run.
    pub fn update(&self, phase: PreviewPhase, progress: u8, message: impl Into<String>) {
        let message = message.into();
        self.publish(|status| {
            status.phase = phase;
            status.progress = status.progress.max(progress.min(100));
            status.message = message;
        });
    }

    /// Raise progress to at least `progress`, keeping phase and message
    pub fn raise_progress(&self, progress: u8) {
        self.publish(|status| status.progress = status.progress.max(progress.min(100)));
    }

    /// Add `step` to progress without passing `cap`
    pub fn advance_progress(&self, step: u8, cap: u8) {
        self.publish(|status| {
            let next = status.progress.saturating_add(step).min(cap);
            status.progress = status.progress.max(next);
        });
    }

    pub fn fail(&self, kind: FailureKind, message: impl Into<String>) {
        let message = message.into();
        self.publish(|status| {
            status.phase = PreviewPhase::Failed;
            status.message = message;
            status.failure = Some(kind);
        });
    }

    /// Publish the live URL and notify the observer
    pub fn ready(&self, url: &str) {
        if !self.is_active() {
            return;
        }
        self.publish(|status| {
            status.phase = PreviewPhase::Ready;
            status.progress = 100;
            status.message = "Ready".to_string();
            status.preview_url = Some(url.to_string());
            status.failure = None;
        });
        self.observer.on_url_change(url);
        self.observer.on_status_change(true);
    }

    pub fn current(&self) -> SessionStatus {
        self.tx.borrow().clone()
    }

    fn publish(&self, apply: impl FnOnce(&mut SessionStatus)) {
        if !self.is_active() {
            return;
        }
        let mut snapshot = None;
        self.tx.send_modify(|status| {
            apply(status);
            snapshot = Some(status.clone());
        });
        if let Some(status) = snapshot {
            debug!(
                phase = %status.phase,
                progress = status.progress,
                message = %status.message,
                "Preview status"
            );
            self.observer.on_status(&status);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder {
        statuses: Mutex<Vec<SessionStatus>>,
        urls: Mutex<Vec<String>>,
    }

    impl PreviewObserver for Recorder {
        fn on_status(&self, status: &SessionStatus) {
            self.statuses.lock().unwrap().push(status.clone());
        }

        fn on_url_change(&self, url: &str) {
            self.urls.lock().unwrap().push(url.to_string());
        }
    }

    fn reporter(observer: Arc<Recorder>) -> (StatusReporter, CancellationToken) {
        let (tx, _) = watch::channel(SessionStatus::default());
        let cancel = CancellationToken::new();
        (
            StatusReporter::new(Arc::new(tx), observer, cancel.clone()),
            cancel,
        )
    }

    #[test]
    fn test_progress_is_monotonic() {
        let (reporter, _) = reporter(Arc::new(Recorder::default()));
        reporter.update(PreviewPhase::Installing, 25, "Installing dependencies...");
        for _ in 0..10 {
            reporter.advance_progress(10, 75);
        }
        assert_eq!(reporter.current().progress, 75);

        reporter.update(PreviewPhase::Launching, 10, "Starting development server...");
        assert_eq!(reporter.current().progress, 75);
        assert_eq!(reporter.current().phase, PreviewPhase::Launching);

        reporter.ready("http://localhost:5173");
        reporter.raise_progress(95);
        assert_eq!(reporter.current().progress, 100);
    }

    #[test]
    fn test_cancelled_reporter_is_silent() {
        let recorder = Arc::new(Recorder::default());
        let (reporter, cancel) = reporter(recorder.clone());
        reporter.update(PreviewPhase::LocatingManifest, 10, "Checking project files...");
        cancel.cancel();
        reporter.update(PreviewPhase::Installing, 25, "Installing dependencies...");
        reporter.ready("http://localhost:3000");

        assert_eq!(reporter.current().phase, PreviewPhase::LocatingManifest);
        assert_eq!(recorder.statuses.lock().unwrap().len(), 1);
        assert!(recorder.urls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_begin_resets_previous_run() {
        let (reporter, _) = reporter(Arc::new(Recorder::default()));
        reporter.fail(FailureKind::ManifestMissing, "No package.json found");
        reporter.begin();
        assert_eq!(reporter.current(), SessionStatus::default());
    }
}
