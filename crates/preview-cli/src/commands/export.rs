//! Export command - Write the project tree to a zip archive

use super::{load_config, ProjectSource};
use anyhow::{Context, Result};
use colored::Colorize;
use preview_core::archive;
use std::path::PathBuf;

pub async fn run(path: PathBuf, output: Option<PathBuf>, name: Option<String>) -> Result<()> {
    let source = ProjectSource::from_path(&path)?;
    let (config, _) = load_config(&source)?;
    let files = source.load(&config)?;

    let project_name = name.unwrap_or_else(|| source.display_name());
    let output = output.unwrap_or_else(|| PathBuf::from(format!("{}.zip", project_name)));

    println!(
        "{} {}",
        "📦 Exporting".cyan().bold(),
        project_name.cyan()
    );

    let written = archive::export_to_file(&files, &project_name, &output)
        .with_context(|| format!("Failed to export archive to {}", output.display()))?;

    println!(
        "{} {} files written to {}",
        "✅".green(),
        written,
        output.display().to_string().cyan()
    );
    Ok(())
}
