//! Watch source: turns raw filesystem events for the monitored directory into
//! "candidate job arrived" signals.
//!
//! The directory is watched non-recursively. A path becomes a candidate when it
//! is a regular file sitting directly in the monitored directory, carries the
//! payload extension and is not itself a sidecar. Files created in place and
//! files renamed into the directory both count as arrivals.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use crate::config::PaygConfig;
use crate::error::WatchError;

/// Pure path/event filter, separated from the watcher for testing.
#[derive(Debug, Clone)]
pub struct WatchFilter {
    root: PathBuf,
    canonical_root: Option<PathBuf>,
    payload_suffix: String,
    sidecar_suffix: String,
}

impl WatchFilter {
    pub fn new(root: &Path, payload_extension: &str, sidecar_extension: &str) -> Self {
        Self {
            root: root.to_path_buf(),
            canonical_root: std::fs::canonicalize(root).ok(),
            payload_suffix: format!(".{}", payload_extension.to_ascii_lowercase()),
            sidecar_suffix: format!(".{}", sidecar_extension.to_ascii_lowercase()),
        }
    }

    pub fn from_config(config: &PaygConfig) -> Self {
        Self::new(
            &config.monitor_dir,
            &config.payload_extension,
            &config.sidecar_extension,
        )
    }

    fn is_top_level(&self, path: &Path) -> bool {
        match path.parent() {
            Some(parent) => {
                parent == self.root || self.canonical_root.as_deref() == Some(parent)
            }
            None => false,
        }
    }

    /// Name-based checks: top level, payload extension, not a sidecar.
    pub fn matches_name(&self, path: &Path) -> bool {
        if !self.is_top_level(path) {
            return false;
        }
        let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_ascii_lowercase()) else {
            return false;
        };
        name.ends_with(&self.payload_suffix)
            && name.len() > self.payload_suffix.len()
            && !name.ends_with(&self.sidecar_suffix)
    }

    /// Full check, including that the path is (still) a regular file.
    pub fn accepts(&self, path: &Path) -> bool {
        self.matches_name(path)
            && std::fs::symlink_metadata(path)
                .map(|meta| meta.file_type().is_file())
                .unwrap_or(false)
    }

    /// Candidate payload paths carried by one raw event.
    pub fn candidates(&self, event: &Event) -> Vec<PathBuf> {
        let arrived: Vec<&PathBuf> = match event.kind {
            EventKind::Create(_) => event.paths.iter().collect(),
            EventKind::Modify(ModifyKind::Name(RenameMode::To)) => event.paths.iter().collect(),
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)) => {
                event.paths.get(1).into_iter().collect()
            }
            _ => Vec::new(),
        };
        arrived
            .into_iter()
            .filter(|path| self.accepts(path))
            .cloned()
            .collect()
    }
}

/// Lazy, endless stream of candidate payload paths for one directory.
///
/// Not restartable: once the backend fails or the channel closes, every
/// further call returns an error.
pub struct WatchSource {
    _watcher: RecommendedWatcher,
    events: mpsc::UnboundedReceiver<notify::Result<Event>>,
    filter: WatchFilter,
    pending: VecDeque<PathBuf>,
}

impl WatchSource {
    /// Start watching `config.monitor_dir` (non-recursive).
    pub fn open(config: &PaygConfig) -> Result<Self, WatchError> {
        let (tx, events) = mpsc::unbounded_channel();
        let mut watcher = notify::recommended_watcher(move |event: notify::Result<Event>| {
            if tx.send(event).is_err() {
                trace!("watch event dropped because the listener is gone");
            }
        })?;
        watcher.watch(&config.monitor_dir, RecursiveMode::NonRecursive)?;

        Ok(Self {
            _watcher: watcher,
            events,
            filter: WatchFilter::from_config(config),
            pending: VecDeque::new(),
        })
    }

    /// Wait for the next candidate. Cancel-safe: a candidate is never lost if
    /// the returned future is dropped.
    pub async fn next_candidate(&mut self) -> Result<PathBuf, WatchError> {
        loop {
            if let Some(path) = self.pending.pop_front() {
                return Ok(path);
            }
            let event = self.events.recv().await.ok_or(WatchError::Closed)??;
            trace!(kind = ?event.kind, paths = ?event.paths, "raw watch event");
            for path in self.filter.candidates(&event) {
                debug!(payload = %path.display(), "candidate payload detected");
                self.pending.push_back(path);
            }
        }
    }
}
