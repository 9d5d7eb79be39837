//! Hot reload of the configuration file.
//!
//! Watches the file's parent directory (editors often replace files by
//! rename), debounces bursts of events, then reloads the file into an
//! [`InMemoryConfigStore`]. A reload that fails to read, parse or validate
//! keeps the previous snapshot.

use crate::error::ConfigError;
use crate::loader::load_config;
use crate::store::InMemoryConfigStore;
use notify::{Event, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// Quiet period after the last file event before reloading
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(250);

/// Reloads a store whenever its configuration file changes
pub struct ConfigWatcher {
    path: PathBuf,
    _watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for ConfigWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConfigWatcher")
            .field("path", &self.path)
            .field("running", &!self.task.is_finished())
            .finish_non_exhaustive()
    }
}

impl ConfigWatcher {
    /// Start watching `path`; must be called inside a Tokio runtime
    ///
    /// # Errors
    /// Returns error if the file system watcher cannot be created
    pub fn start(
        path: impl AsRef<Path>,
        store: Arc<InMemoryConfigStore>,
        debounce: Duration,
    ) -> Result<Self, ConfigError> {
        let path = path.as_ref().to_path_buf();
        let file_name = path
            .file_name()
            .map(ToOwned::to_owned)
            .ok_or_else(|| ConfigError::Watch(format!("'{}' names no file", path.display())))?;
        let directory = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        };

        let (tx, rx) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |result: notify::Result<Event>| match result {
            Ok(event) => {
                let touches_file = event
                    .paths
                    .iter()
                    .any(|p| p.file_name() == Some(file_name.as_os_str()));
                if touches_file && (event.kind.is_modify() || event.kind.is_create()) {
                    let _ = tx.send(());
                }
            }
            Err(e) => warn!(error = %e, "Config watcher error"),
        })
        .map_err(|e| ConfigError::Watch(e.to_string()))?;

        watcher
            .watch(&directory, RecursiveMode::NonRecursive)
            .map_err(|e| ConfigError::Watch(e.to_string()))?;

        let task = tokio::spawn(reload_loop(path.clone(), store, rx, debounce));
        info!(path = %path.display(), "Watching configuration file");

        Ok(Self {
            path,
            _watcher: watcher,
            task,
        })
    }

    /// Watched file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for ConfigWatcher {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn reload_loop(
    path: PathBuf,
    store: Arc<InMemoryConfigStore>,
    mut events: mpsc::UnboundedReceiver<()>,
    debounce: Duration,
) {
    while events.recv().await.is_some() {
        // Swallow the rest of the burst
        loop {
            match tokio::time::timeout(debounce, events.recv()).await {
                Ok(Some(())) => continue,
                Ok(None) => return,
                Err(_) => break,
            }
        }

        debug!(path = %path.display(), "Configuration file changed");
        match reload_from(&path, &store).await {
            Ok(()) => info!(path = %path.display(), "Configuration reloaded"),
            Err(e) => error!(path = %path.display(), error = %e, "Configuration reload failed, keeping previous configuration"),
        }
    }
}

/// Load `path` and swap it into `store`
///
/// # Errors
/// Returns error if the file cannot be loaded or applied; the store is unchanged
pub async fn reload_from(path: &Path, store: &InMemoryConfigStore) -> Result<(), ConfigError> {
    let config = load_config(path).await?;
    store.reload(&config)
}
