//! Preview Runner - Core Library
//!
//! Turns an in-memory project file tree into a running development server
//! inside a sandbox: manifest lookup and fingerprinting, a shared install
//! coordinator, dev server launch and a per-mount status state machine.

#[cfg(feature = "archive")]
pub mod archive;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod file_tree;
pub mod fingerprint;
pub mod installer;
pub mod launcher;
pub mod reporter;
pub mod sandbox;
pub mod session;
pub mod watcher;

pub use config::*;
pub use coordinator::{InstallCoordinator, InstallGuard, InstallState};
pub use error::*;
pub use fingerprint::{fingerprint, ManifestFingerprint};
pub use reporter::{NoopObserver, PreviewObserver, StatusReporter};
pub use sandbox::{Sandbox, SpawnedProcess};
pub use session::{PreviewController, PreviewSession, RunOptions};
pub use watcher::{WatchEvent, Watcher};

pub use preview_types;
