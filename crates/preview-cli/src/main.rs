//! Preview Runner CLI
//!
//! Installs dependencies and starts the dev server for a project, printing
//! the live preview URL once the server is listening.

mod commands;
mod config;
mod sandbox;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "preview")]
#[command(author, version, about = "Preview Runner - live previews for JavaScript projects", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Install dependencies, start the dev server and print the preview URL
    Serve {
        /// Project directory or JSON file tree
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Reinstall even if the manifest is unchanged
        #[arg(short, long)]
        force: bool,

        /// Restart the preview when project files change
        #[arg(short, long)]
        watch: bool,

        /// Open the preview in the system browser once ready
        #[arg(short, long)]
        open: bool,

        /// Fail if the server is not ready after this many seconds
        #[arg(long, value_name = "SECS", env = "PREVIEW_READY_TIMEOUT")]
        ready_timeout: Option<u64>,

        /// Directory to materialize JSON file trees in
        #[arg(long, value_name = "DIR")]
        workdir: Option<PathBuf>,
    },

    /// Export the project tree as a zip archive
    Export {
        /// Project directory or JSON file tree
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Output file (defaults to <name>.zip)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Root folder name inside the archive
        #[arg(long)]
        name: Option<String>,
    },

    /// Print the fingerprint of a dependency manifest
    Fingerprint {
        /// Manifest file
        file: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show the file tree a preview session would receive
    Tree {
        /// Project directory or JSON file tree
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Write a default preview.config.yaml
    Init {
        /// Project directory
        #[arg(default_value = ".")]
        dir: PathBuf,

        /// Overwrite an existing configuration
        #[arg(long)]
        force: bool,
    },

    /// Validate configuration and project layout
    Validate {
        /// Project directory or JSON file tree
        #[arg(default_value = ".")]
        path: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(if cli.verbose {
            "preview_cli=debug,preview_core=debug"
        } else {
            "preview_cli=info,preview_core=warn"
        })
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .finish();

    tracing::subscriber::set_global_default(subscriber)?;
    info!("Starting Preview Runner CLI");

    let result = match cli.command {
        Commands::Serve {
            path,
            force,
            watch,
            open,
            ready_timeout,
            workdir,
        } => {
            commands::serve::run(commands::serve::ServeOptions {
                path,
                force,
                watch,
                open,
                ready_timeout,
                workdir,
            })
            .await
        }
        Commands::Export { path, output, name } => commands::export::run(path, output, name).await,
        Commands::Fingerprint { file, json } => commands::fingerprint::run(file, json).await,
        Commands::Tree { path, json } => commands::tree::run(path, json).await,
        Commands::Init { dir, force } => commands::init::run(&dir, force).await,
        Commands::Validate { path } => commands::validate::run(path).await,
    };

    if let Err(ref e) = result {
        error!("Command failed: {}", e);
        eprintln!("{} {}", "Error:".red().bold(), e);
        std::process::exit(1);
    }

    result
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serve_flags_parse() {
        let cli = Cli::parse_from([
            "preview",
            "serve",
            "app.json",
            "--force",
            "--watch",
            "--ready-timeout",
            "30",
        ]);
        match cli.command {
            Commands::Serve {
                path,
                force,
                watch,
                open,
                ready_timeout,
                workdir,
            } => {
                assert_eq!(path, PathBuf::from("app.json"));
                assert!(force && watch && !open);
                assert_eq!(ready_timeout, Some(30));
                assert!(workdir.is_none());
            }
            _ => panic!("expected serve"),
        }
    }

    #[test]
    fn test_verbose_is_global() {
        let cli = Cli::parse_from(["preview", "tree", "--verbose"]);
        assert!(cli.verbose);
    }
}
