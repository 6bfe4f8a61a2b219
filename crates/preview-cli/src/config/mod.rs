//! Local directories used by the CLI

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};

pub struct PreviewHome;

impl PreviewHome {
    /// Get the preview home directory (~/.preview)
    pub fn root() -> Result<PathBuf> {
        if let Ok(path) = std::env::var("PREVIEW_HOME") {
            return Ok(PathBuf::from(path));
        }
        let home = dirs::home_dir().context("Could not find home directory")?;
        Ok(home.join(".preview"))
    }

    /// Directory holding materialized project trees
    pub fn sandboxes_dir() -> Result<PathBuf> {
        Ok(Self::root()?.join("sandboxes"))
    }

    /// Working directory for a project loaded from a tree file
    pub fn sandbox_for(tree_file: &Path) -> Result<PathBuf> {
        let stem = tree_file
            .file_stem()
            .and_then(|s| s.to_str())
            .filter(|s| !s.is_empty())
            .unwrap_or("project");
        let dir = Self::sandboxes_dir()?.join(stem);
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create sandbox directory {:?}", dir))?;
        Ok(dir)
    }
}
