//! CLI command implementations

pub mod export;
pub mod fingerprint;
pub mod init;
pub mod serve;
pub mod tree;
pub mod validate;

use anyhow::{Context, Result};
use preview_core::{file_tree, ConfigManager, PreviewConfig};
use preview_types::FileNode;
use std::path::{Path, PathBuf};

/// Where a project comes from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProjectSource {
    /// A project directory on disk
    Directory(PathBuf),
    /// A JSON file holding a serialized file tree
    TreeFile(PathBuf),
}

impl ProjectSource {
    pub fn from_path(path: &Path) -> Result<Self> {
        let path = path
            .canonicalize()
            .with_context(|| format!("Project path not found: {}", path.display()))?;
        if path.is_dir() {
            Ok(Self::Directory(path))
        } else {
            Ok(Self::TreeFile(path))
        }
    }

    /// Directory searched for `preview.config.*`
    pub fn config_dir(&self) -> &Path {
        match self {
            Self::Directory(dir) => dir,
            Self::TreeFile(file) => file.parent().unwrap_or_else(|| Path::new(".")),
        }
    }

    /// Path watched for changes
    pub fn watch_root(&self) -> &Path {
        self.config_dir()
    }

    pub fn display_name(&self) -> String {
        let path = match self {
            Self::Directory(dir) => dir.file_name(),
            Self::TreeFile(file) => file.file_stem(),
        };
        path.and_then(|n| n.to_str())
            .unwrap_or("project")
            .to_string()
    }

    /// Read the current file tree
    pub fn load(&self, config: &PreviewConfig) -> Result<Vec<FileNode>> {
        match self {
            Self::Directory(dir) => file_tree::load_from_dir(dir, &config.ignore)
                .with_context(|| format!("Failed to read project directory {}", dir.display())),
            Self::TreeFile(file) => file_tree::load_json(file)
                .with_context(|| format!("Failed to read file tree {}", file.display())),
        }
    }
}

/// Load the project's configuration, falling back to defaults
pub fn load_config(source: &ProjectSource) -> Result<(PreviewConfig, Option<PathBuf>)> {
    let manager = ConfigManager::new();
    manager
        .load_from_directory(source.config_dir())
        .map_err(|e| anyhow::anyhow!("Failed to load configuration: {}", e))
}
