use notify::{Config, Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use std::path::{Path, PathBuf};
use std::sync::mpsc;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryEvent {
    /// The history file was written, created, or replaced.
    Changed,
}

/// Watch a shell history file for writes.
///
/// The parent directory is watched rather than the file itself, so the
/// watch survives the shell truncating or re-creating the file, and works
/// before the file exists. Returns a receiver plus a handle to keep the
/// watcher alive.
pub fn watch_history_file(
    path: PathBuf,
) -> Result<(mpsc::Receiver<HistoryEvent>, RecommendedWatcher), String> {
    let (tx, rx) = mpsc::channel();

    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| format!("not a file path: {}", path.display()))?
        .to_os_string();

    let mut watcher = RecommendedWatcher::new(
        move |res: Result<Event, notify::Error>| {
            let Ok(event) = res else {
                return;
            };
            if matches!(event.kind, EventKind::Access(_)) {
                return;
            }
            // Compare by name; notify may report canonicalized paths on macOS.
            if event
                .paths
                .iter()
                .any(|p| p.file_name() == Some(file_name.as_os_str()))
            {
                let _ = tx.send(HistoryEvent::Changed);
            }
        },
        Config::default(),
    )
    .map_err(|e| format!("failed to create watcher: {e}"))?;

    watcher
        .watch(&dir, RecursiveMode::NonRecursive)
        .map_err(|e| format!("failed to watch {}: {e}", dir.display()))?;

    Ok((rx, watcher))
}
