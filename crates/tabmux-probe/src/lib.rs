//! tabmux-probe: read-only views of shell state that lives outside the PTY.
//!
//! The multiplexer core never reads files or `/proc` itself. The binary uses
//! these helpers to feed the registry's command-history cache and the panes'
//! working directories.

pub mod cwd;
pub mod history;
pub mod watcher;

pub use cwd::probe_cwd;
pub use history::{read_recent_commands, HistoryPoller};
pub use watcher::{watch_history_file, HistoryEvent};
