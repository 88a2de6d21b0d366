//! Error types for PTY handles and the session registry.

use crate::tab::TabId;

/// Errors from PTY operations.
#[derive(Debug, thiserror::Error)]
pub enum PtyError {
    #[error("PTY spawn failed: {0}")]
    SpawnFailed(String),

    #[error("PTY I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("PTY resize failed: {0}")]
    ResizeFailed(String),

    /// The child process has exited or was killed; the handle no longer
    /// accepts input or size changes.
    #[error("PTY is closed")]
    Closed,
}

/// Errors surfaced by [`SessionRegistry`](crate::SessionRegistry) operations.
#[derive(Debug, thiserror::Error)]
pub enum MuxError {
    /// The shell process or its pseudo-terminal could not be created.
    #[error("failed to spawn shell: {0}")]
    Spawn(PtyError),

    /// Writing to or resizing a running pane failed.
    #[error("pane I/O failed: {0}")]
    Pty(#[from] PtyError),

    /// A tab already holds the maximum of two panes.
    #[error("tab {0} is already split")]
    SplitLimitExceeded(TabId),

    #[error("tab {tab} has no pane at index {index}")]
    InvalidPaneIndex { tab: TabId, index: usize },

    #[error("unknown tab: {0}")]
    InvalidTabId(TabId),
}

/// Convenience alias for registry results.
pub type MuxResult<T> = Result<T, MuxError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_post_spawn_failures_are_not_spawn_errors() {
        let err = MuxError::from(PtyError::ResizeFailed("EINVAL".to_string()));
        assert!(matches!(err, MuxError::Pty(PtyError::ResizeFailed(_))));
        assert_eq!(err.to_string(), "pane I/O failed: PTY resize failed: EINVAL");

        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "gone");
        let err = MuxError::from(PtyError::from(io));
        assert!(matches!(err, MuxError::Pty(PtyError::Io(_))));
        assert!(!err.to_string().contains("spawn"));
    }
}
