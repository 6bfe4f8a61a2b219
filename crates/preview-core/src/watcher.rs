//! Project directory watcher used to feed new file trees to a session

use crate::error::{PreviewError, Result};
use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, DebouncedEventKind, Debouncer};
use std::path::{Component, Path, PathBuf};
use std::time::Duration;
use tokio::sync::mpsc;

/// Events emitted by the file watcher
#[derive(Debug, Clone)]
pub enum WatchEvent {
    Changed(PathBuf),
    Error(String),
}

/// Debounced recursive watcher over a project directory
pub struct Watcher {
    rx: Option<mpsc::UnboundedReceiver<WatchEvent>>,
    _debouncer: Option<Debouncer<RecommendedWatcher>>,
    debounce_ms: u64,
    ignore: Vec<String>,
}

impl Default for Watcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Watcher {
    pub fn new() -> Self {
        Self {
            rx: None,
            _debouncer: None,
            debounce_ms: 500,
            ignore: Vec::new(),
        }
    }

    /// Set debounce duration in milliseconds
    pub fn with_debounce(mut self, ms: u64) -> Self {
        self.debounce_ms = ms;
        self
    }

    /// Directory names whose changes are not reported
    pub fn with_ignore(mut self, ignore: Vec<String>) -> Self {
        self.ignore = ignore;
        self
    }

    /// Start watching a directory
    pub fn watch(&mut self, path: &Path) -> Result<()> {
        let (tx, rx) = mpsc::unbounded_channel();
        let root = path.to_path_buf();
        let ignore = self.ignore.clone();

        let mut debouncer = new_debouncer(
            Duration::from_millis(self.debounce_ms),
            move |res: std::result::Result<
                Vec<notify_debouncer_mini::DebouncedEvent>,
                notify::Error,
            >| match res {
                Ok(events) => {
                    for event in events {
                        if !matches!(event.kind, DebouncedEventKind::Any)
                            || is_ignored(&root, &event.path, &ignore)
                        {
                            continue;
                        }
                        let _ = tx.send(WatchEvent::Changed(event.path));
                    }
                }
                Err(e) => {
                    let _ = tx.send(WatchEvent::Error(e.to_string()));
                }
            },
        )
        .map_err(|e| PreviewError::Watch(e.to_string()))?;

        debouncer
            .watcher()
            .watch(path, RecursiveMode::Recursive)
            .map_err(|e| PreviewError::Watch(e.to_string()))?;

        self._debouncer = Some(debouncer);
        self.rx = Some(rx);
        Ok(())
    }

    /// Wait for the next event. Returns `None` when not watching.
    pub async fn next_event(&mut self) -> Option<WatchEvent> {
        match self.rx.as_mut() {
            Some(rx) => rx.recv().await,
            None => None,
        }
    }

    /// Drain events that are already queued, returning how many were dropped
    pub fn drain(&mut self) -> usize {
        let mut drained = 0;
        if let Some(rx) = self.rx.as_mut() {
            while rx.try_recv().is_ok() {
                drained += 1;
            }
        }
        drained
    }
}

/// Whether `path` lies inside an ignored directory below `root`
pub fn is_ignored(root: &Path, path: &Path, ignore: &[String]) -> bool {
    let relative = path.strip_prefix(root).unwrap_or(path);
    relative.components().any(|c| match c {
        Component::Normal(name) => ignore.iter().any(|i| name == i.as_str()),
        _ => false,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ignored_paths() {
        let root = Path::new("/work/app");
        let ignore = vec!["node_modules".to_string(), ".git".to_string()];

        assert!(is_ignored(root, Path::new("/work/app/node_modules/react/index.js"), &ignore));
        assert!(is_ignored(root, Path::new("/work/app/.git/HEAD"), &ignore));
        assert!(!is_ignored(root, Path::new("/work/app/src/main.ts"), &ignore));
        assert!(!is_ignored(
            Path::new("/work/node_modules/app"),
            Path::new("/work/node_modules/app/package.json"),
            &ignore
        ));
    }

    #[tokio::test]
    async fn test_next_event_without_watch_is_none() {
        let mut watcher = Watcher::new();
        assert!(watcher.next_event().await.is_none());
        assert_eq!(watcher.drain(), 0);
    }
}
