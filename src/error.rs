use std::path::PathBuf;

use thiserror::Error;

use crate::state_machine::State;

#[derive(Debug, Error)]
pub enum PaygError {
    #[error("Monitored directory not found: {}", .0.display())]
    MonitorDirMissing(PathBuf),

    #[error("Watch error: {0}")]
    Watch(#[from] WatchError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Loss of the filesystem event source. Always fatal to the listener.
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("watch backend error: {0}")]
    Backend(#[from] notify::Error),

    #[error("watch event channel closed")]
    Closed,
}

/// Raised when a job is asked to move backwards or skip past a terminal state.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("illegal transition {from} -> {to}")]
pub struct TransitionError {
    pub from: State,
    pub to: State,
}
