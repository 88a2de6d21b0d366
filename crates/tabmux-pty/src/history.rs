//! Most-recent-first cache of executed shell commands.

use crate::config::DEFAULT_HISTORY_CAPACITY;

/// De-duplicated command history, newest first, bounded in size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandHistory {
    entries: Vec<String>,
    capacity: usize,
}

impl CommandHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::new(),
            capacity,
        }
    }

    /// Move `command` to the front, dropping any older copy of it.
    pub fn record(&mut self, command: &str) {
        self.entries.retain(|existing| existing != command);
        self.entries.insert(0, command.to_string());
        self.entries.truncate(self.capacity);
    }

    /// Replace the cache with a list read from the shell's history.
    ///
    /// `commands` must already be newest first. Duplicates keep their first
    /// (newest) position. Returns `true` if the contents changed.
    pub fn replace(&mut self, commands: impl IntoIterator<Item = String>) -> bool {
        let mut next: Vec<String> = Vec::new();
        for command in commands {
            if next.len() == self.capacity {
                break;
            }
            if !next.contains(&command) {
                next.push(command);
            }
        }
        if next == self.entries {
            return false;
        }
        self.entries = next;
        true
    }

    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl Default for CommandHistory {
    fn default() -> Self {
        Self::new(DEFAULT_HISTORY_CAPACITY)
    }
}
