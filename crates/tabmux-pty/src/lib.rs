//! tabmux-pty: PTY sessions, tabs, and split panes for tabmux.
//!
//! This crate owns every shell process behind the terminal UI. It spawns
//! shells on pseudo-terminals, groups them into tabs of one or two panes,
//! routes keyboard input to the focused pane, and forwards each pane's raw
//! output to the render surface the UI bound to it.
//!
//! # Architecture
//!
//! - [`PtyHandle`]: low-level PTY process management (spawn, write, resize, kill).
//! - [`Pane`]: one shell on a PTY, with its reader thread, activity state and
//!   last known working directory.
//! - [`Tab`]: one or two panes plus the split direction and focus.
//! - [`SessionRegistry`]: owns all tabs and panes and is the single entry point
//!   for UI operations, output dispatch, and the activity monitor.
//!
//! Reader threads never touch the registry. They send [`PaneEvent`]s over a
//! channel and the control thread feeds them back through
//! [`SessionRegistry::dispatch`].

pub mod activity;
pub mod config;
pub mod error;
pub mod history;
pub mod layout;
pub mod pane;
pub mod pty;
pub mod reader;
pub mod registry;
pub mod surface;
pub mod tab;

pub use activity::{ActivityTracker, IdleDetector};
pub use config::MuxConfig;
pub use error::{MuxError, MuxResult, PtyError};
pub use history::CommandHistory;
pub use layout::{PaneSize, SplitDirection};
pub use pane::{Pane, PaneId, PaneState};
pub use pty::{PtyHandle, SpawnOptions};
pub use reader::PaneEvent;
pub use registry::{IdleEvent, PaneSummary, SessionRegistry, TabSummary};
pub use surface::{NullSurfaceHost, SurfaceHost, SurfaceId};
pub use tab::{Tab, TabId};
