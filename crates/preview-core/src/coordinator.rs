//! Process-wide install coordination
//!
//! All sessions that share one sandbox share one [`InstallCoordinator`]. It
//! answers three questions: can this fingerprint skip the install, may this
//! session start an install right now, and when has the running install
//! finished.

use crate::fingerprint::ManifestFingerprint;
use once_cell::sync::Lazy;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::watch;
use tracing::{debug, info, warn};

static GLOBAL: Lazy<Arc<InstallCoordinator>> = Lazy::new(|| Arc::new(InstallCoordinator::new()));

/// Shared install state
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct InstallState {
    pub last_successful_fingerprint: Option<ManifestFingerprint>,
    pub installed: bool,
    pub install_in_progress: bool,
}

/// Gatekeeper for dependency installs
pub struct InstallCoordinator {
    state: watch::Sender<InstallState>,
}

impl Default for InstallCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl InstallCoordinator {
    /// Create a coordinator with empty state
    pub fn new() -> Self {
        let (state, _) = watch::channel(InstallState::default());
        Self { state }
    }

    /// The process-wide coordinator
    pub fn global() -> Arc<InstallCoordinator> {
        GLOBAL.clone()
    }

    /// Copy of the current state
    pub fn snapshot(&self) -> InstallState {
        self.state.borrow().clone()
    }

    /// Restore the empty state
    pub fn reset(&self) {
        self.state.send_replace(InstallState::default());
    }

    /// Whether an install for `fingerprint` can be skipped
    pub fn should_skip_install(&self, fingerprint: &ManifestFingerprint, force: bool) -> bool {
        if force {
            return false;
        }
        let state = self.state.borrow();
        state.installed && state.last_successful_fingerprint.as_ref() == Some(fingerprint)
    }

    /// Claim the install slot. Returns false if another install is running.
    pub fn try_begin_install(&self) -> bool {
        let claimed = self.state.send_if_modified(|state| {
            if state.install_in_progress {
                false
            } else {
                state.install_in_progress = true;
                true
            }
        });
        if claimed {
            debug!("Install slot claimed");
        }
        claimed
    }

    /// Record the outcome of an install and release the slot
    pub fn complete_install(&self, success: bool, fingerprint: &ManifestFingerprint) {
        self.state.send_modify(|state| {
            if success {
                state.last_successful_fingerprint = Some(fingerprint.clone());
                state.installed = true;
            }
            state.install_in_progress = false;
        });
        if success {
            info!(fingerprint = %fingerprint, "Dependencies installed");
        } else {
            warn!(fingerprint = %fingerprint, "Install failed, cache left untouched");
        }
    }

    /// Claim the install slot, releasing it when the returned guard is dropped
    pub fn begin_install(self: &Arc<Self>) -> Option<InstallGuard> {
        self.try_begin_install().then(|| InstallGuard {
            coordinator: Arc::clone(self),
            completed: false,
        })
    }

    /// Wait until no install is in progress
    pub async fn wait_until_idle(&self) {
        let mut rx = self.state.subscribe();
        // The sender lives in `self`, so the channel cannot close while we wait.
        let _ = rx.wait_for(|state| !state.install_in_progress).await;
    }

    fn release(&self) {
        self.state.send_if_modified(|state| {
            let was_running = state.install_in_progress;
            state.install_in_progress = false;
            was_running
        });
    }
}

/// Ownership of the install slot.
///
/// Dropping the guard without calling [`InstallGuard::complete`] releases the
/// slot as a failed attempt, so an error, a panic or a dropped task never
/// leaves the coordinator stuck.
pub struct InstallGuard {
    coordinator: Arc<InstallCoordinator>,
    completed: bool,
}

impl InstallGuard {
    pub fn complete(mut self, success: bool, fingerprint: &ManifestFingerprint) {
        self.completed = true;
        self.coordinator.complete_install(success, fingerprint);
    }
}

impl Drop for InstallGuard {
    fn drop(&mut self) {
        if !self.completed {
            warn!("Install aborted before completion, releasing install slot");
            self.coordinator.release();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fingerprint::fingerprint;
    use std::time::Duration;

    #[test]
    fn test_skip_requires_matching_successful_install() {
        let coordinator = InstallCoordinator::new();
        let fp = fingerprint("{\"dependencies\": {}}");

        assert!(!coordinator.should_skip_install(&fp, false));

        assert!(coordinator.try_begin_install());
        coordinator.complete_install(true, &fp);

        assert!(coordinator.should_skip_install(&fp, false));
        assert!(!coordinator.should_skip_install(&fp, true));
        assert!(!coordinator.should_skip_install(&fingerprint("{}"), false));
    }

    #[test]
    fn test_try_begin_install_is_exclusive() {
        let coordinator = InstallCoordinator::new();
        assert!(coordinator.try_begin_install());
        assert!(!coordinator.try_begin_install());

        coordinator.complete_install(false, &fingerprint("a"));
        assert!(coordinator.try_begin_install());
    }

    #[test]
    fn test_failed_install_keeps_previous_cache() {
        let coordinator = InstallCoordinator::new();
        let good = fingerprint("good");
        let bad = fingerprint("bad");

        assert!(coordinator.try_begin_install());
        coordinator.complete_install(true, &good);

        assert!(coordinator.try_begin_install());
        coordinator.complete_install(false, &bad);

        let state = coordinator.snapshot();
        assert_eq!(state.last_successful_fingerprint, Some(good.clone()));
        assert!(state.installed);
        assert!(!state.install_in_progress);
        assert!(coordinator.should_skip_install(&good, false));
    }

    #[test]
    fn test_failed_first_install_leaves_state_empty() {
        let coordinator = InstallCoordinator::new();
        assert!(coordinator.try_begin_install());
        coordinator.complete_install(false, &fingerprint("x"));

        assert_eq!(coordinator.snapshot(), InstallState::default());
    }

    #[test]
    fn test_dropped_guard_releases_slot() {
        let coordinator = Arc::new(InstallCoordinator::new());
        {
            let guard = coordinator.begin_install();
            assert!(guard.is_some());
            assert!(coordinator.begin_install().is_none());
        }
        let state = coordinator.snapshot();
        assert!(!state.install_in_progress);
        assert!(!state.installed);
    }

    #[test]
    fn test_guard_released_on_panic() {
        let coordinator = Arc::new(InstallCoordinator::new());
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _guard = coordinator.begin_install().unwrap();
            panic!("install blew up");
        }));
        assert!(result.is_err());
        assert!(!coordinator.snapshot().install_in_progress);
    }

    #[tokio::test]
    async fn test_waiters_resume_when_install_completes() {
        let coordinator = Arc::new(InstallCoordinator::new());
        assert!(coordinator.try_begin_install());

        let mut waiters = Vec::new();
        for _ in 0..3 {
            let coordinator = coordinator.clone();
            waiters.push(tokio::spawn(async move {
                coordinator.wait_until_idle().await;
            }));
        }

        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(waiters.iter().all(|w| !w.is_finished()));

        coordinator.complete_install(true, &fingerprint("deps"));
        for waiter in waiters {
            tokio::time::timeout(Duration::from_secs(1), waiter)
                .await
                .expect("waiter should resume")
                .unwrap();
        }
    }

    #[tokio::test]
    async fn test_wait_until_idle_returns_immediately_when_idle() {
        let coordinator = InstallCoordinator::new();
        tokio::time::timeout(Duration::from_millis(100), coordinator.wait_until_idle())
            .await
            .expect("idle coordinator should not block");
    }

    #[test]
    fn test_wait_until_idle_wakes_on_completion() {
        let coordinator = InstallCoordinator::new();
        assert!(coordinator.try_begin_install());

        let mut wait = tokio_test::task::spawn(coordinator.wait_until_idle());
        tokio_test::assert_pending!(wait.poll());

        coordinator.complete_install(false, &fingerprint("deps"));
        assert!(wait.is_woken());
        tokio_test::assert_ready!(wait.poll());
    }

    #[test]
    fn test_reset_clears_state() {
        let coordinator = InstallCoordinator::new();
        assert!(coordinator.try_begin_install());
        coordinator.complete_install(true, &fingerprint("deps"));
        coordinator.reset();
        assert_eq!(coordinator.snapshot(), InstallState::default());
    }
}
