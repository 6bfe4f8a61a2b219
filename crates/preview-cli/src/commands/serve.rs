//! Serve command - Install, start and watch a project preview

use super::{load_config, ProjectSource};
use crate::config::PreviewHome;
use crate::sandbox::LocalSandbox;
use anyhow::{Context, Result};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use preview_core::{
    file_tree, ConfigManager, InstallCoordinator, PreviewController, PreviewObserver,
    PreviewSession, RunOptions, Sandbox, WatchEvent, Watcher,
};
use preview_types::{FileNode, SessionStatus};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

pub struct ServeOptions {
    pub path: PathBuf,
    pub force: bool,
    pub watch: bool,
    pub open: bool,
    pub ready_timeout: Option<u64>,
    pub workdir: Option<PathBuf>,
}

/// Opens the live URL in the system browser
struct BrowserOpener;

impl PreviewObserver for BrowserOpener {
    fn on_url_change(&self, url: &str) {
        if let Err(e) = webbrowser::open(url) {
            warn!("Failed to open browser: {}", e);
        }
    }
}

pub async fn run(options: ServeOptions) -> Result<()> {
    println!("{}", "🚀 Starting preview...".cyan().bold());

    let source = ProjectSource::from_path(&options.path)?;
    let (mut config, config_path) = load_config(&source)?;
    if options.ready_timeout.is_some() {
        config = config.with_ready_timeout(options.ready_timeout);
    }

    match config_path {
        Some(path) => println!("  📁 Config file: {}", path.display().to_string().dimmed()),
        None => println!("  📁 Config file: {}", "defaults".dimmed()),
    }

    let validation = ConfigManager::new().validate(&config);
    if !validation.is_valid() {
        for error in &validation.errors {
            println!("  {} {}: {}", "•".red(), error.field.red(), error.message);
        }
        return Err(anyhow::anyhow!("Invalid configuration"));
    }

    let workdir = resolve_workdir(&source, options.workdir.as_deref())?;
    println!("  📦 Working directory: {}", workdir.display().to_string().dimmed());
    println!("  🔧 Install: {}", config.install_command_line().dimmed());
    println!("  🔧 Dev server: {}", config.dev_command_line().dimmed());
    println!();

    let files = load_tree(&source, &config, &workdir)?;

    let sandbox: Arc<dyn Sandbox> = Arc::new(LocalSandbox::new(&workdir));
    let mut session =
        PreviewSession::new(Some(sandbox), InstallCoordinator::global(), config.clone())?;
    if options.open {
        session = session.with_observer(Arc::new(BrowserOpener));
    }
    let controller = PreviewController::mount(session);
    let mut status_rx = controller.subscribe();

    let mut watcher = if options.watch {
        let mut watcher = Watcher::new()
            .with_debounce(500)
            .with_ignore(config.ignore.clone());
        watcher
            .watch(source.watch_root())
            .map_err(|e| anyhow::anyhow!("Failed to start watcher: {}", e))?;
        Some(watcher)
    } else {
        None
    };

    let bar = progress_bar()?;
    controller.update_files_with(files, RunOptions { force: options.force });

    let mut announced_url: Option<String> = None;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                bar.finish_and_clear();
                println!("{}", "👋 Stopping preview...".yellow());
                break;
            }
            changed = status_rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let status = status_rx.borrow_and_update().clone();
                render(&bar, &status);

                if status.is_ready() && announced_url != status.preview_url {
                    announced_url = status.preview_url.clone();
                    if let Some(url) = &announced_url {
                        bar.println(format!("{} {}", "✅ Preview ready:".green().bold(), url.cyan()));
                    }
                    if watcher.is_some() {
                        bar.println(format!("{}", "👀 Watching for changes... (Ctrl+C to stop)".cyan()));
                    }
                }

                if status.is_failed() {
                    bar.println(format!("{} {}", "❌".red(), status.message.red()));
                    if watcher.is_none() {
                        bar.abandon();
                        return Err(anyhow::anyhow!(status.message));
                    }
                    announced_url = None;
                }
            }
            Some(event) = next_watch_event(watcher.as_mut()) => {
                match event {
                    WatchEvent::Changed(path) => {
                        if !is_relevant_change(&source, &path) {
                            continue;
                        }
                        if let Some(w) = watcher.as_mut() {
                            let dropped = w.drain();
                            debug!(dropped, "Coalesced watch events");
                        }
                        bar.println(format!("{} {}", "📝 Changed:".yellow(), path.display()));
                        match load_tree(&source, &config, &workdir) {
                            Ok(files) => {
                                info!(files = file_tree::walk_files(&files).len(), "Reloading preview");
                                announced_url = None;
                                controller.update_files(files);
                            }
                            Err(e) => bar.println(format!("{} {:#}", "❌ Reload failed:".red(), e)),
                        }
                    }
                    WatchEvent::Error(msg) => {
                        bar.println(format!("{} {}", "⚠️ Watch error:".yellow(), msg));
                    }
                }
            }
        }
    }

    controller.unmount();
    Ok(())
}

/// Directory the sandbox runs commands in
fn resolve_workdir(source: &ProjectSource, explicit: Option<&Path>) -> Result<PathBuf> {
    if let Some(dir) = explicit {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create working directory {}", dir.display()))?;
        return Ok(dir.to_path_buf());
    }
    match source {
        ProjectSource::Directory(dir) => Ok(dir.clone()),
        ProjectSource::TreeFile(file) => PreviewHome::sandbox_for(file),
    }
}

/// Read the project tree and materialize it in `workdir` when it does not
/// already live there
fn load_tree(
    source: &ProjectSource,
    config: &preview_core::PreviewConfig,
    workdir: &Path,
) -> Result<Vec<FileNode>> {
    let files = source.load(config)?;
    let in_place = matches!(source, ProjectSource::Directory(dir) if dir == workdir);
    if !in_place {
        let written = file_tree::write_to_dir(&files, workdir)
            .with_context(|| format!("Failed to write project into {}", workdir.display()))?;
        debug!(written, workdir = %workdir.display(), "Materialized project tree");
    }
    Ok(files)
}

/// Files the install step writes into the project root
const LOCKFILES: &[&str] = &["package-lock.json", "yarn.lock", "pnpm-lock.yaml", "bun.lockb"];

fn is_relevant_change(source: &ProjectSource, path: &Path) -> bool {
    match source {
        ProjectSource::Directory(_) => !path
            .file_name()
            .and_then(|n| n.to_str())
            .map(|name| LOCKFILES.contains(&name))
            .unwrap_or(false),
        ProjectSource::TreeFile(file) => path == file,
    }
}

async fn next_watch_event(watcher: Option<&mut Watcher>) -> Option<WatchEvent> {
    match watcher {
        Some(watcher) => watcher.next_event().await,
        None => std::future::pending().await,
    }
}

fn progress_bar() -> Result<ProgressBar> {
    let bar = ProgressBar::new(100);
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} [{bar:40.cyan/blue}] {pos:>3}% {msg}")?
            .progress_chars("=>-"),
    );
    bar.enable_steady_tick(Duration::from_millis(120));
    Ok(bar)
}

fn render(bar: &ProgressBar, status: &SessionStatus) {
    bar.set_position(u64::from(status.progress));
    if status.phase.is_terminal() {
        bar.set_message(status.message.clone());
    } else {
        bar.set_message(format!("{} {}", status.message, status.stage_hint().dimmed()));
    }
}
