//! Preview Types - Pure type definitions shared by the core and its hosts
//!
//! This crate contains only pure data types with no async runtime dependencies,
//! so a host UI can depend on it without pulling in the orchestration engine.

pub mod file;
pub mod status;

pub use file::*;
pub use status::*;

use serde::{Deserialize, Serialize};

/// Notification emitted by a sandbox once a spawned server accepts connections
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerReady {
    pub port: u16,
    pub url: String,
}

impl ServerReady {
    pub fn new(port: u16, url: impl Into<String>) -> Self {
        Self {
            port,
            url: url.into(),
        }
    }
}

impl std::fmt::Display for ServerReady {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} (port {})", self.url, self.port)
    }
}
