//! Validate command - Validate preview configuration

use super::{load_config, ProjectSource};
use anyhow::Result;
use colored::Colorize;
use preview_core::{file_tree, ConfigManager};
use std::path::PathBuf;

pub async fn run(path: PathBuf) -> Result<()> {
    println!("{}", "🔍 Validating preview configuration...".cyan().bold());

    let source = ProjectSource::from_path(&path)?;
    let (config, config_path) = load_config(&source)?;

    match config_path {
        Some(path) => println!("  📁 Config file: {}", path.display().to_string().dimmed()),
        None => println!("  📁 Config file: {}", "none, using defaults".dimmed()),
    }
    println!();

    println!("{}", "📋 Configuration validation:".yellow());
    let result = ConfigManager::new().validate(&config);
    let mut has_errors = false;

    if result.is_valid() {
        println!("  {} Schema is valid", "✅".green());
    } else {
        has_errors = true;
        println!("  {} Schema validation failed", "❌".red());
        for error in &result.errors {
            println!("      {} {}: {}", "•".red(), error.field.red(), error.message);
        }
    }

    for warning in &result.warnings {
        println!("  {} {}: {}", "⚠️".yellow(), warning.field.yellow(), warning.message);
        if let Some(ref suggestion) = warning.suggestion {
            println!("      💡 {}", suggestion.dimmed());
        }
    }
    println!();

    println!("{}", "📦 Project:".yellow());
    let files = source.load(&config)?;
    match file_tree::find_manifest(&files, &config.manifest_file)
        .and_then(|node| node.non_empty_content())
    {
        Some(manifest) => println!(
            "  {} {} ({})",
            "✅".green(),
            config.manifest_file,
            preview_core::fingerprint(manifest).to_string().dimmed()
        ),
        None => {
            has_errors = true;
            println!("  {} No {} found", "❌".red(), config.manifest_file.red());
        }
    }
    println!();

    if has_errors {
        println!("{}", "❌ Validation failed - please fix the errors above".red().bold());
        return Err(anyhow::anyhow!("Validation failed"));
    }
    println!("{}", "✅ Project is ready to preview!".green().bold());
    Ok(())
}
