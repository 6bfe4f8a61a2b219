//! Configuration management for preview sessions

use crate::error::{PreviewError, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Configuration file names to search for
pub const CONFIG_FILE_NAMES: &[&str] = &[
    "preview.config.yaml",
    "preview.config.yml",
    "preview.config.json",
];

/// Well-known dependency manifest
pub const DEFAULT_MANIFEST_FILE: &str = "package.json";

/// Commands, heuristics and limits used by a preview session
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// File name of the dependency manifest
    pub manifest_file: String,
    pub install_command: String,
    pub install_args: Vec<String>,
    pub dev_command: String,
    pub dev_args: Vec<String>,
    /// Install output lines matching this pattern bump the progress gauge
    pub install_progress_pattern: String,
    /// Dev server output matching this pattern is taken as a readiness hint
    pub server_ready_pattern: String,
    /// Give up waiting for the ready notification after this many seconds.
    /// Unset waits forever.
    pub ready_timeout_secs: Option<u64>,
    /// Directory names skipped when loading a project from disk
    pub ignore: Vec<String>,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            manifest_file: DEFAULT_MANIFEST_FILE.to_string(),
            install_command: "npm".to_string(),
            install_args: [
                "install",
                "--prefer-offline",
                "--no-audit",
                "--no-fund",
                "--silent",
                "--no-optional",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            dev_command: "npm".to_string(),
            dev_args: vec!["run".to_string(), "dev".to_string()],
            install_progress_pattern: "added|installed".to_string(),
            server_ready_pattern: "Local:|ready".to_string(),
            ready_timeout_secs: None,
            ignore: vec![
                "node_modules".to_string(),
                ".git".to_string(),
                "dist".to_string(),
            ],
        }
    }
}

impl PreviewConfig {
    pub fn ready_timeout(&self) -> Option<Duration> {
        self.ready_timeout_secs.map(Duration::from_secs)
    }

    pub fn with_ready_timeout(mut self, secs: Option<u64>) -> Self {
        self.ready_timeout_secs = secs;
        self
    }

    pub fn install_progress_regex(&self) -> Result<Regex> {
        compile_pattern("install_progress_pattern", &self.install_progress_pattern)
    }

    pub fn server_ready_regex(&self) -> Result<Regex> {
        compile_pattern("server_ready_pattern", &self.server_ready_pattern)
    }

    /// Human readable install command line
    pub fn install_command_line(&self) -> String {
        command_line(&self.install_command, &self.install_args)
    }

    /// Human readable dev server command line
    pub fn dev_command_line(&self) -> String {
        command_line(&self.dev_command, &self.dev_args)
    }
}

fn compile_pattern(field: &str, pattern: &str) -> Result<Regex> {
    Regex::new(pattern).map_err(|e| PreviewError::InvalidConfig(format!("{}: {}", field, e)))
}

fn command_line(command: &str, args: &[String]) -> String {
    std::iter::once(command)
        .chain(args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

/// A configuration problem that makes sessions unusable
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationError {
    pub field: String,
    pub message: String,
    pub code: String,
}

/// A configuration smell that sessions can live with
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ValidationWarning {
    pub field: String,
    pub message: String,
    pub suggestion: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    pub errors: Vec<ValidationError>,
    pub warnings: Vec<ValidationWarning>,
}

impl ValidationResult {
    pub fn ok() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn with_error(mut self, error: ValidationError) -> Self {
        self.errors.push(error);
        self
    }

    pub fn with_warning(mut self, warning: ValidationWarning) -> Self {
        self.warnings.push(warning);
        self
    }
}

/// Loads and saves [`PreviewConfig`] files
#[derive(Debug, Default)]
pub struct ConfigManager;

impl ConfigManager {
    pub fn new() -> Self {
        Self
    }

    /// Find configuration file in a directory
    pub fn find_config_file(dir: &Path) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| dir.join(name))
            .find(|path| path.exists())
    }

    /// Load configuration from a file
    pub fn load(&self, config_path: &Path) -> Result<PreviewConfig> {
        let content = std::fs::read_to_string(config_path)?;
        let config = if is_json(config_path) {
            serde_json::from_str(&content)?
        } else {
            serde_yaml::from_str(&content)?
        };
        Ok(config)
    }

    /// Load configuration from a project directory, defaulting when absent
    pub fn load_from_directory(&self, dir: &Path) -> Result<(PreviewConfig, Option<PathBuf>)> {
        match Self::find_config_file(dir) {
            Some(path) => {
                let config = self.load(&path)?;
                Ok((config, Some(path)))
            }
            None => Ok((PreviewConfig::default(), None)),
        }
    }

    /// Validate a configuration
    pub fn validate(&self, config: &PreviewConfig) -> ValidationResult {
        let mut result = ValidationResult::ok();

        if config.manifest_file.is_empty() || config.manifest_file.contains(['/', '\\']) {
            result = result.with_error(ValidationError {
                field: "manifest_file".to_string(),
                message: "Manifest file must be a plain file name".to_string(),
                code: "INVALID_MANIFEST".to_string(),
            });
        }

        for (field, command) in [
            ("install_command", &config.install_command),
            ("dev_command", &config.dev_command),
        ] {
            if command.trim().is_empty() {
                result = result.with_error(ValidationError {
                    field: field.to_string(),
                    message: "Command must not be empty".to_string(),
                    code: "EMPTY_COMMAND".to_string(),
                });
            }
        }

        for (field, pattern) in [
            ("install_progress_pattern", &config.install_progress_pattern),
            ("server_ready_pattern", &config.server_ready_pattern),
        ] {
            if let Err(e) = Regex::new(pattern) {
                result = result.with_error(ValidationError {
                    field: field.to_string(),
                    message: format!("Pattern does not compile: {}", e),
                    code: "INVALID_PATTERN".to_string(),
                });
            }
        }

        if config.ready_timeout_secs == Some(0) {
            result = result.with_warning(ValidationWarning {
                field: "ready_timeout_secs".to_string(),
                message: "A zero timeout fails every session immediately after launch".to_string(),
                suggestion: Some("Remove the field to wait without a limit".to_string()),
            });
        }

        if config.ignore.iter().all(|d| d != "node_modules") {
            result = result.with_warning(ValidationWarning {
                field: "ignore".to_string(),
                message: "node_modules is not ignored".to_string(),
                suggestion: Some("Add node_modules to keep project trees small".to_string()),
            });
        }

        result
    }

    /// Save configuration to a file
    pub fn save(&self, config: &PreviewConfig, config_path: &Path) -> Result<()> {
        let content = if is_json(config_path) {
            serde_json::to_string_pretty(config)?
        } else {
            serde_yaml::to_string(config)?
        };

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(config_path, content)?;

        Ok(())
    }
}

fn is_json(path: &Path) -> bool {
    path.extension().map(|e| e == "json").unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_npm_workflow() {
        let config = PreviewConfig::default();
        assert_eq!(config.manifest_file, "package.json");
        assert_eq!(config.dev_command_line(), "npm run dev");
        assert!(config.install_command_line().starts_with("npm install --prefer-offline"));
        assert!(config.ready_timeout().is_none());
        assert!(ConfigManager::new().validate(&config).is_valid());
    }

    #[test]
    fn test_partial_yaml_fills_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("preview.config.yaml");
        std::fs::write(
            &path,
            "dev_args: [\"run\", \"start\"]\nready_timeout_secs: 90\n",
        )?;

        let manager = ConfigManager::new();
        let (config, found) = manager.load_from_directory(dir.path())?;

        assert_eq!(found, Some(path));
        assert_eq!(config.dev_command_line(), "npm run start");
        assert_eq!(config.ready_timeout(), Some(Duration::from_secs(90)));
        assert_eq!(config.manifest_file, "package.json");
        Ok(())
    }

    #[test]
    fn test_missing_config_uses_defaults() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let (config, found) = ConfigManager::new().load_from_directory(dir.path())?;
        assert!(found.is_none());
        assert_eq!(config, PreviewConfig::default());
        Ok(())
    }

    #[test]
    fn test_validate_reports_bad_fields() {
        let config = PreviewConfig {
            manifest_file: "app/package.json".to_string(),
            dev_command: " ".to_string(),
            server_ready_pattern: "(unclosed".to_string(),
            ready_timeout_secs: Some(0),
            ..PreviewConfig::default()
        };

        let result = ConfigManager::new().validate(&config);
        let codes: Vec<_> = result.errors.iter().map(|e| e.code.as_str()).collect();
        assert_eq!(codes, vec!["INVALID_MANIFEST", "EMPTY_COMMAND", "INVALID_PATTERN"]);
        assert_eq!(result.warnings.len(), 1);
        assert!(config.server_ready_regex().is_err());
    }

    #[test]
    fn test_reload_reads_current_file() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("preview.config.yaml");
        let manager = ConfigManager::new();

        std::fs::write(&path, "ready_timeout_secs: 10\n")?;
        assert_eq!(manager.load(&path)?.ready_timeout_secs, Some(10));

        std::fs::write(&path, "ready_timeout_secs: 20\n")?;
        assert_eq!(manager.load(&path)?.ready_timeout_secs, Some(20));
        Ok(())
    }

    #[test]
    fn test_save_then_load_json() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("preview.config.json");
        let config = PreviewConfig::default().with_ready_timeout(Some(30));

        let manager = ConfigManager::new();
        manager.save(&config, &path)?;
        assert_eq!(manager.load(&path)?, config);
        Ok(())
    }
}
