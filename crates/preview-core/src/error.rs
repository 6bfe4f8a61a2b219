//! Error types for preview orchestration

use preview_types::FailureKind;
use thiserror::Error;

/// Main error type for the preview core
#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("No {0} found")]
    ManifestMissing(String),

    #[error("{0}")]
    InstallFailure(String),

    #[error("Failed to start development server: {0}")]
    LaunchFailure(String),

    #[error("Sandbox not available")]
    SandboxUnavailable,

    #[error("Server did not become ready within {0} seconds")]
    ReadyTimeout(u64),

    #[error("Preview run was superseded")]
    Cancelled,

    #[error("Sandbox error: {0}")]
    Sandbox(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Archive error: {0}")]
    Archive(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("YAML parse error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("JSON parse error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Watch error: {0}")]
    Watch(String),
}

impl PreviewError {
    /// Status category shown to the host, if this error ends a session
    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self {
            PreviewError::ManifestMissing(_) => Some(FailureKind::ManifestMissing),
            PreviewError::InstallFailure(_) => Some(FailureKind::InstallFailure),
            PreviewError::LaunchFailure(_) => Some(FailureKind::LaunchFailure),
            PreviewError::SandboxUnavailable => Some(FailureKind::SandboxUnavailable),
            PreviewError::ReadyTimeout(_) => Some(FailureKind::ReadyTimeout),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, PreviewError>;
