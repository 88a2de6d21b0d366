use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::activity::ActivityTracker;
use crate::error::PtyError;
use crate::layout::PaneSize;
use crate::pty::{PtyHandle, SpawnOptions};
use crate::reader::{start_reader_thread, PaneEvent};
use crate::surface::SurfaceId;

/// Unique identifier for a pane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct PaneId(pub u64);

impl std::fmt::Display for PaneId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Lifecycle of a pane's process. Transitions only move forward.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaneState {
    /// The PTY exists but its output is not being read yet.
    Spawning,
    Running,
    /// Killed or exited on its own. Terminal.
    Closed,
}

/// One shell process on a PTY, bound to one render surface.
///
/// The pane owns its [`PtyHandle`]; the surface belongs to the UI and is
/// only referenced by id.
pub struct Pane {
    id: PaneId,
    pty: PtyHandle,
    surface: Option<SurfaceId>,
    state: PaneState,
    activity: ActivityTracker,
    working_directory: PathBuf,
}

impl Pane {
    /// Spawn the pane's shell. The pane starts out in [`PaneState::Spawning`].
    pub fn spawn(id: PaneId, options: &SpawnOptions) -> Result<Self, PtyError> {
        let pty = PtyHandle::spawn(options)?;
        let working_directory = pty.cwd().to_path_buf();

        Ok(Self {
            id,
            pty,
            surface: None,
            state: PaneState::Spawning,
            activity: ActivityTracker::default(),
            working_directory,
        })
    }

    /// Start forwarding output to `events` and move to [`PaneState::Running`].
    pub fn start(&mut self, events: mpsc::UnboundedSender<PaneEvent>) -> Result<(), PtyError> {
        if self.state != PaneState::Spawning {
            return Ok(());
        }
        let reader = self
            .pty
            .take_reader()
            .ok_or_else(|| PtyError::SpawnFailed("PTY reader already taken".to_string()))?;
        start_reader_thread(self.id, reader, events)?;
        self.state = PaneState::Running;
        Ok(())
    }

    pub fn id(&self) -> PaneId {
        self.id
    }

    pub fn state(&self) -> PaneState {
        self.state
    }

    pub fn surface(&self) -> Option<SurfaceId> {
        self.surface
    }

    pub fn bind_surface(&mut self, surface: SurfaceId) {
        self.surface = Some(surface);
    }

    pub fn size(&self) -> PaneSize {
        self.pty.size()
    }

    pub fn process_id(&self) -> Option<u32> {
        self.pty.process_id()
    }

    /// Write user input to the shell.
    ///
    /// Writing to a closed pane is logged and ignored.
    pub fn write_input(&mut self, data: &[u8]) -> Result<(), PtyError> {
        ignore_closed(self.id, "write", self.pty.write(data))
    }

    /// Resize this pane's PTY only.
    pub fn resize(&mut self, size: PaneSize) -> Result<(), PtyError> {
        ignore_closed(self.id, "resize", self.pty.resize(size))
    }

    /// Deliver Ctrl+C to the foreground job.
    pub fn interrupt(&mut self) -> Result<(), PtyError> {
        ignore_closed(self.id, "interrupt", self.pty.interrupt())
    }

    /// Terminate the process immediately.
    pub fn kill(&mut self) {
        self.pty.kill();
        self.state = PaneState::Closed;
    }

    /// Handle the reader's end-of-stream event.
    pub fn mark_exited(&mut self) {
        self.pty.mark_closed();
        self.state = PaneState::Closed;
    }

    /// Exit code of the shell, once it has exited.
    pub fn exit_code(&mut self) -> Option<u32> {
        self.pty.try_wait()
    }

    pub fn record_output(&mut self, now: Instant) {
        self.activity.record_output(now);
    }

    pub fn activity(&self) -> &ActivityTracker {
        &self.activity
    }

    pub fn activity_mut(&mut self) -> &mut ActivityTracker {
        &mut self.activity
    }

    /// Last observed working directory of the shell.
    pub fn working_directory(&self) -> &Path {
        &self.working_directory
    }

    pub fn set_working_directory(&mut self, dir: PathBuf) {
        self.working_directory = dir;
    }
}

fn ignore_closed(pane: PaneId, op: &str, result: Result<(), PtyError>) -> Result<(), PtyError> {
    match result {
        Err(PtyError::Closed) => {
            log::warn!("pane {pane}: ignoring {op} on closed PTY");
            Ok(())
        }
        other => other,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MuxConfig;
    use std::time::Duration;

    fn spawn_sh(id: u64) -> Pane {
        let config = MuxConfig {
            shell: Some("/bin/sh".to_string()),
            ..MuxConfig::default()
        };
        let options =
            SpawnOptions::from_config(&config, std::env::temp_dir(), PaneSize::new(80, 24));
        Pane::spawn(PaneId(id), &options).unwrap()
    }

    fn collect_output(rx: &mut mpsc::UnboundedReceiver<PaneEvent>, needle: &str) -> String {
        let mut output = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline {
            match rx.try_recv() {
                Ok(PaneEvent::Output { data, .. }) => {
                    output.extend_from_slice(&data);
                    if String::from_utf8_lossy(&output).contains(needle) {
                        break;
                    }
                }
                Ok(PaneEvent::Closed { .. }) => break,
                Err(_) => std::thread::sleep(Duration::from_millis(20)),
            }
        }
        String::from_utf8_lossy(&output).into_owned()
    }

    #[test]
    fn test_lifecycle_states() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let mut pane = spawn_sh(1);
        assert_eq!(pane.state(), PaneState::Spawning);

        pane.start(tx).unwrap();
        assert_eq!(pane.state(), PaneState::Running);

        pane.kill();
        assert_eq!(pane.state(), PaneState::Closed);
    }

    #[test]
    fn test_write_and_receive_output() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut pane = spawn_sh(1);
        pane.start(tx).unwrap();

        pane.write_input(b"echo PANE_TEST\n").unwrap();

        let text = collect_output(&mut rx, "PANE_TEST");
        assert!(text.contains("PANE_TEST"), "got: {text}");
    }

    #[test]
    fn test_io_on_closed_pane_is_a_noop() {
        let mut pane = spawn_sh(1);
        pane.kill();
        assert!(pane.write_input(b"ls\n").is_ok());
        assert!(pane.resize(PaneSize::new(100, 30)).is_ok());
        assert!(pane.interrupt().is_ok());
        assert_eq!(pane.size(), PaneSize::new(80, 24));
    }

    #[test]
    fn test_exit_is_reported() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut pane = spawn_sh(3);
        pane.start(tx).unwrap();
        pane.write_input(b"exit 0\n").unwrap();

        let deadline = Instant::now() + Duration::from_secs(3);
        let mut closed = false;
        while Instant::now() < deadline && !closed {
            match rx.try_recv() {
                Ok(PaneEvent::Closed { pane: id }) => {
                    assert_eq!(id, PaneId(3));
                    closed = true;
                }
                Ok(_) => {}
                Err(_) => std::thread::sleep(Duration::from_millis(20)),
            }
        }
        assert!(closed, "reader should report the closed stream");

        pane.mark_exited();
        assert_eq!(pane.state(), PaneState::Closed);

        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline && pane.exit_code().is_none() {
            std::thread::sleep(Duration::from_millis(20));
        }
        assert_eq!(pane.exit_code(), Some(0));
    }
}
