//! Session status published to the host UI

use serde::{Deserialize, Serialize};

/// Phase of a preview session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PreviewPhase {
    Initializing,
    LocatingManifest,
    Installing,
    /// Another session owns the install; waiting for it to finish
    WaitingForInstall,
    CacheHit,
    Launching,
    AwaitingReady,
    Ready,
    Failed,
}

impl PreviewPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            PreviewPhase::Initializing => "initializing",
            PreviewPhase::LocatingManifest => "locating_manifest",
            PreviewPhase::Installing => "installing",
            PreviewPhase::WaitingForInstall => "waiting_for_install",
            PreviewPhase::CacheHit => "cache_hit",
            PreviewPhase::Launching => "launching",
            PreviewPhase::AwaitingReady => "awaiting_ready",
            PreviewPhase::Ready => "ready",
            PreviewPhase::Failed => "failed",
        }
    }

    /// Whether the session has stopped making progress on its own
    pub fn is_terminal(&self) -> bool {
        matches!(self, PreviewPhase::Ready | PreviewPhase::Failed)
    }
}

impl std::fmt::Display for PreviewPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Why a session ended in [`PreviewPhase::Failed`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    ManifestMissing,
    InstallFailure,
    LaunchFailure,
    SandboxUnavailable,
    ReadyTimeout,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::ManifestMissing => "manifest_missing",
            FailureKind::InstallFailure => "install_failure",
            FailureKind::LaunchFailure => "launch_failure",
            FailureKind::SandboxUnavailable => "sandbox_unavailable",
            FailureKind::ReadyTimeout => "ready_timeout",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Transient per-mount status
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub phase: PreviewPhase,
    /// Advisory gauge, 0-100
    pub progress: u8,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
}

impl Default for SessionStatus {
    fn default() -> Self {
        Self {
            phase: PreviewPhase::Initializing,
            progress: 0,
            message: "Initializing...".to_string(),
            preview_url: None,
            failure: None,
        }
    }
}

impl SessionStatus {
    pub fn is_ready(&self) -> bool {
        self.phase == PreviewPhase::Ready
    }

    pub fn is_failed(&self) -> bool {
        self.phase == PreviewPhase::Failed
    }

    /// Hint shown under the progress gauge
    pub fn stage_hint(&self) -> &'static str {
        match self.progress {
            0..=24 => "Optimizing dependencies...",
            25..=79 => "Installing packages...",
            80..=94 => "Starting server...",
            _ => "Almost ready...",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_hint_boundaries() {
        let mut status = SessionStatus::default();
        assert_eq!(status.stage_hint(), "Optimizing dependencies...");
        status.progress = 25;
        assert_eq!(status.stage_hint(), "Installing packages...");
        status.progress = 80;
        assert_eq!(status.stage_hint(), "Starting server...");
        status.progress = 95;
        assert_eq!(status.stage_hint(), "Almost ready...");
    }

    #[test]
    fn test_failed_status_serializes_failure_kind() {
        let status = SessionStatus {
            phase: PreviewPhase::Failed,
            progress: 10,
            message: "No package.json found".to_string(),
            preview_url: None,
            failure: Some(FailureKind::ManifestMissing),
        };
        let value = serde_json::to_value(&status).unwrap();
        assert_eq!(value["phase"], "failed");
        assert_eq!(value["failure"], "manifest_missing");
        assert!(value.get("preview_url").is_none());
    }
}
