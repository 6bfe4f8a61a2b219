//! Init command - Write a default preview configuration

use anyhow::Result;
use colored::Colorize;
use preview_core::{ConfigManager, PreviewConfig, CONFIG_FILE_NAMES};
use std::path::Path;

pub async fn run(dir: &Path, overwrite: bool) -> Result<()> {
    println!("{}", "🚀 Initializing preview configuration...".cyan().bold());

    if !dir.exists() {
        tokio::fs::create_dir_all(dir).await?;
    }

    if let Some(existing) = ConfigManager::find_config_file(dir) {
        if !overwrite {
            println!(
                "{} Configuration file already exists: {}",
                "⚠️".yellow(),
                existing.display()
            );
            return Ok(());
        }
    }

    let config_path = dir.join(CONFIG_FILE_NAMES[0]);
    ConfigManager::new()
        .save(&PreviewConfig::default(), &config_path)
        .map_err(|e| anyhow::anyhow!("Failed to write configuration: {}", e))?;

    println!("{}", "✅ Configuration created!".green().bold());
    println!();
    println!("Created files:");
    println!("  {} - Preview configuration", CONFIG_FILE_NAMES[0].cyan());
    println!();
    println!("Next steps:");
    println!("  1. Adjust install and dev commands in {}", CONFIG_FILE_NAMES[0].cyan());
    println!("  2. Run {} to start a preview", "preview serve .".cyan());

    Ok(())
}
