//! Configuration threaded into the registry and every spawned shell.

use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::layout::PaneSize;

/// Default number of commands kept in the command-history cache.
pub const DEFAULT_HISTORY_CAPACITY: usize = 50;

/// Default cadence of the activity monitor.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_millis(250);

/// Default quiet period after which a burst of output counts as finished.
pub const DEFAULT_IDLE_THRESHOLD: Duration = Duration::from_secs(1);

/// Plain configuration for the multiplexer core.
///
/// Nothing in the core reads ambient settings mid-operation; the surrounding
/// layer builds one of these and hands it to
/// [`SessionRegistry::new`](crate::SessionRegistry::new).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MuxConfig {
    /// Shell binary. `None` uses `$SHELL`, falling back to `/bin/sh`.
    pub shell: Option<String>,
    /// Extra arguments passed to the shell.
    pub shell_args: Vec<String>,
    /// Environment variables overlaid on top of the inherited environment
    /// and the history write-through variables.
    pub env: Vec<(String, String)>,
    /// History file the shell should append to. `None` uses `~/.bash_history`.
    pub history_file: Option<PathBuf>,
    /// Size of a freshly opened tab before the UI reports its real size.
    pub default_size: PaneSize,
    pub history_capacity: usize,
    pub tick_interval: Duration,
    pub idle_threshold: Duration,
}

impl Default for MuxConfig {
    fn default() -> Self {
        Self {
            shell: None,
            shell_args: Vec::new(),
            env: Vec::new(),
            history_file: None,
            default_size: PaneSize::new(80, 24),
            history_capacity: DEFAULT_HISTORY_CAPACITY,
            tick_interval: DEFAULT_TICK_INTERVAL,
            idle_threshold: DEFAULT_IDLE_THRESHOLD,
        }
    }
}

impl MuxConfig {
    /// Resolve the shell binary to launch.
    pub fn resolved_shell(&self) -> String {
        match &self.shell {
            Some(shell) => shell.clone(),
            None => default_shell(),
        }
    }

    /// Resolve the history file the shell is told to write through to.
    pub fn resolved_history_file(&self) -> PathBuf {
        self.history_file
            .clone()
            .unwrap_or_else(|| home_dir().join(".bash_history"))
    }
}

/// Returns the user's default shell, falling back to `/bin/sh`.
pub fn default_shell() -> String {
    std::env::var("SHELL").unwrap_or_else(|_| "/bin/sh".to_string())
}

/// The user's home directory, or `/` when `HOME` is unset.
pub fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/"))
}
