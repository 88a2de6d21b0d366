//! Shell history file reader.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Read the last `limit` unique commands of a bash history file, most
/// recent first.
///
/// Blank lines are skipped. When a command appears more than once only its
/// newest occurrence counts. Bytes that are not valid UTF-8 are replaced
/// rather than failing the whole read.
pub fn read_recent_commands(path: &Path, limit: usize) -> io::Result<Vec<String>> {
    let bytes = fs::read(path)?;
    Ok(recent_unique(&String::from_utf8_lossy(&bytes), limit))
}

fn recent_unique(content: &str, limit: usize) -> Vec<String> {
    let mut commands: Vec<String> = Vec::new();
    for line in content.lines().rev() {
        if commands.len() == limit {
            break;
        }
        let line = line.trim_end_matches('\r');
        if line.trim().is_empty() {
            continue;
        }
        if !commands.iter().any(|c| c == line) {
            commands.push(line.to_string());
        }
    }
    commands
}

/// Re-reads a history file only when its modification time advances.
#[derive(Debug)]
pub struct HistoryPoller {
    path: PathBuf,
    limit: usize,
    last_modified: Option<SystemTime>,
}

impl HistoryPoller {
    pub fn new(path: PathBuf, limit: usize) -> Self {
        Self {
            path,
            limit,
            last_modified: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Returns the fresh command list if the file changed since the last
    /// poll, `None` if it did not or does not exist yet.
    pub fn poll(&mut self) -> io::Result<Option<Vec<String>>> {
        let modified = match fs::metadata(&self.path) {
            Ok(meta) => meta.modified()?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e),
        };
        if self.last_modified.is_some_and(|last| modified <= last) {
            return Ok(None);
        }
        // A failed read leaves the old mtime so the next poll retries.
        let commands = read_recent_commands(&self.path, self.limit)?;
        self.last_modified = Some(modified);
        Ok(Some(commands))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::time::Duration;

    #[test]
    fn test_recent_unique_newest_first() {
        let content = "ls\npwd\n\nls\n  \ncargo build\n";
        assert_eq!(
            recent_unique(content, 50),
            vec!["cargo build", "ls", "pwd"]
        );
    }

    #[test]
    fn test_recent_unique_respects_limit() {
        let content: String = (0..100).map(|i| format!("echo {i}\n")).collect();
        let commands = recent_unique(&content, 50);
        assert_eq!(commands.len(), 50);
        assert_eq!(commands[0], "echo 99");
        assert_eq!(commands[49], "echo 50");
    }

    #[test]
    fn test_read_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = read_recent_commands(&dir.path().join("nope"), 50).unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::NotFound);
    }

    #[test]
    fn test_poller_only_rereads_on_change() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".bash_history");
        let mut poller = HistoryPoller::new(path.clone(), 50);

        assert_eq!(poller.poll().unwrap(), None);

        fs::write(&path, "ls\npwd\n").unwrap();
        let base = SystemTime::now() - Duration::from_secs(60);
        File::options()
            .write(true)
            .open(&path)
            .unwrap()
            .set_modified(base)
            .unwrap();
        assert_eq!(
            poller.poll().unwrap(),
            Some(vec!["pwd".to_string(), "ls".to_string()])
        );
        assert_eq!(poller.poll().unwrap(), None);

        let mut file = File::options().append(true).open(&path).unwrap();
        writeln!(file, "make").unwrap();
        file.set_modified(base + Duration::from_secs(5)).unwrap();
        assert_eq!(
            poller.poll().unwrap(),
            Some(vec!["make".to_string(), "pwd".to_string(), "ls".to_string()])
        );
    }

    #[test]
    fn test_invalid_utf8_line_is_replaced() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".bash_history");
        fs::write(&path, b"ls\necho caf\xe9\npwd\n").unwrap();

        let mut poller = HistoryPoller::new(path, 50);
        assert_eq!(
            poller.poll().unwrap(),
            Some(vec![
                "pwd".to_string(),
                "echo caf\u{FFFD}".to_string(),
                "ls".to_string()
            ])
        );
        assert_eq!(poller.poll().unwrap(), None);
    }

    #[test]
    fn test_failed_read_is_retried() {
        // A directory has an mtime but cannot be read as a file.
        let dir = tempfile::tempdir().unwrap();
        let mut poller = HistoryPoller::new(dir.path().to_path_buf(), 50);
        assert!(poller.poll().is_err());
        assert!(poller.poll().is_err());
    }
}
