use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;

use serde::Serialize;
use tokio::sync::mpsc;

use crate::activity::IdleDetector;
use crate::config::{home_dir, MuxConfig};
use crate::error::{MuxError, MuxResult};
use crate::history::CommandHistory;
use crate::layout::{split_area, tab_layout, PaneSize, SplitDirection};
use crate::pane::{Pane, PaneId, PaneState};
use crate::pty::SpawnOptions;
use crate::reader::PaneEvent;
use crate::surface::SurfaceHost;
use crate::tab::{Tab, TabId};

/// Line terminator appended to executed commands (what Enter sends).
pub const COMMAND_TERMINATOR: &str = "\r";

/// ASCII NAK: readline's "kill line backwards".
pub const CLEAR_LINE: u8 = 0x15;

/// Receives every chunk of output of one pane.
pub type OutputCallback = Box<dyn FnMut(&[u8])>;

/// Receives the idle notification of one pane.
pub type IdleCallback = Box<dyn FnMut(&IdleEvent)>;

/// A pane went quiet after a burst of output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct IdleEvent {
    pub tab: TabId,
    pub pane_index: usize,
    pub pane: PaneId,
}

/// Serializable view of one tab, for the UI.
#[derive(Debug, Clone, Serialize)]
pub struct TabSummary {
    pub id: TabId,
    pub name: String,
    pub active: bool,
    pub split: Option<SplitDirection>,
    pub focused_pane: usize,
    pub panes: Vec<PaneSummary>,
}

#[derive(Debug, Clone, Serialize)]
pub struct PaneSummary {
    pub id: PaneId,
    pub state: PaneState,
    pub size: PaneSize,
    pub working_directory: PathBuf,
}

/// Owns every tab and pane and is the entry point for all UI operations.
///
/// The registry lives on a single control thread. Reader threads only send
/// [`PaneEvent`]s over the channel returned by [`SessionRegistry::new`]; the
/// control thread feeds them back through [`SessionRegistry::dispatch`].
///
/// Once the first tab is open there is always exactly one active tab, and
/// the last tab can never be closed.
pub struct SessionRegistry {
    config: MuxConfig,
    tabs: Vec<Tab>,
    active: Option<TabId>,
    next_tab_id: u64,
    next_pane_id: u64,
    host: Box<dyn SurfaceHost>,
    events: mpsc::UnboundedSender<PaneEvent>,
    output_listeners: HashMap<PaneId, Vec<OutputCallback>>,
    idle_listeners: HashMap<PaneId, Vec<IdleCallback>>,
    history: CommandHistory,
    idle: IdleDetector,
}

impl SessionRegistry {
    /// Create an empty registry and the channel its panes report on.
    ///
    /// Call [`open_tab`](Self::open_tab) once before anything else.
    pub fn new(
        config: MuxConfig,
        host: impl SurfaceHost + 'static,
    ) -> (Self, mpsc::UnboundedReceiver<PaneEvent>) {
        let (events, rx) = mpsc::unbounded_channel();
        let registry = Self {
            history: CommandHistory::new(config.history_capacity),
            idle: IdleDetector::new(config.idle_threshold),
            config,
            tabs: Vec::new(),
            active: None,
            next_tab_id: 1,
            next_pane_id: 1,
            host: Box::new(host),
            events,
            output_listeners: HashMap::new(),
            idle_listeners: HashMap::new(),
        };
        (registry, rx)
    }

    pub fn config(&self) -> &MuxConfig {
        &self.config
    }

    // --- tab lifecycle ---

    /// Open a new tab with one pane and make it active.
    ///
    /// Without `cwd` the shell starts where the last tab's shell was last
    /// seen, or in `$HOME` for the first tab. If the shell cannot be spawned
    /// no tab is created.
    pub fn open_tab(&mut self, cwd: Option<&Path>) -> MuxResult<TabId> {
        let cwd = match cwd {
            Some(dir) => dir.to_path_buf(),
            None => self
                .tabs
                .last()
                .map(|tab| tab.working_directory().to_path_buf())
                .unwrap_or_else(home_dir),
        };

        let pane = self.spawn_pane(cwd, self.config.default_size)?;
        let id = TabId(self.next_tab_id);
        self.next_tab_id += 1;

        self.tabs.push(Tab::new(id, pane));
        self.active = Some(id);
        log::debug!("opened tab {id}");
        Ok(id)
    }

    /// Close a tab, killing its processes.
    ///
    /// Closing the last remaining tab does nothing and returns `Ok(false)`.
    /// If the closed tab was active, the tab before it becomes active (or
    /// the first tab when it was first).
    pub fn close_tab(&mut self, id: TabId) -> MuxResult<bool> {
        let index = self.tab_index(id)?;
        if self.tabs.len() == 1 {
            log::debug!("refusing to close last tab {id}");
            return Ok(false);
        }

        let tab = self.tabs.remove(index);
        for mut pane in tab.into_panes() {
            pane.kill();
            self.forget_pane(&pane);
        }

        if self.active == Some(id) {
            let next = &self.tabs[index.saturating_sub(1)];
            self.active = Some(next.id());
        }
        log::debug!("closed tab {id}");
        Ok(true)
    }

    /// Make a tab active. Unknown ids are ignored; returns whether the
    /// active tab is now `id`.
    pub fn switch_tab(&mut self, id: TabId) -> bool {
        if self.tabs.iter().any(|tab| tab.id() == id) {
            self.active = Some(id);
            true
        } else {
            false
        }
    }

    // --- panes and splits ---

    /// Split a single-pane tab in two.
    ///
    /// The new pane starts in the primary pane's current directory and
    /// takes the second half of the primary pane's area; the primary pane
    /// shrinks to the first half. Focus does not move.
    pub fn split_tab(&mut self, id: TabId, direction: SplitDirection) -> MuxResult<PaneId> {
        let tab = self.tab_ref(id)?;
        if tab.is_split() {
            return Err(MuxError::SplitLimitExceeded(id));
        }
        let cwd = tab.working_directory().to_path_buf();
        let (first, second) = split_area(tab.primary().size(), direction);

        let pane = self.spawn_pane(cwd, second)?;
        let pane_id = pane.id();

        let tab = self.tab_mut(id)?;
        tab.attach_split(direction, pane)?;
        if let Err(e) = tab.pane_mut(0)?.resize(first) {
            log::warn!("tab {id}: failed to shrink primary pane: {e}");
        }
        log::debug!("split tab {id} {direction:?}, new pane {pane_id}");
        Ok(pane_id)
    }

    pub fn focus_pane(&mut self, id: TabId, index: usize) -> MuxResult<()> {
        self.tab_mut(id)?.focus(index)
    }

    /// Move focus to the other pane of a split tab. Returns the new index.
    pub fn focus_next_pane(&mut self, id: TabId) -> MuxResult<usize> {
        Ok(self.tab_mut(id)?.focus_next())
    }

    // --- input routing ---

    /// Send raw bytes to the focused pane of a tab.
    pub fn write_input(&mut self, id: TabId, data: &[u8]) -> MuxResult<()> {
        self.tab_mut(id)?.focused_pane_mut().write_input(data)?;
        Ok(())
    }

    /// A render surface changed size. Only that pane's PTY is resized.
    pub fn resize_pane(&mut self, id: TabId, index: usize, cols: u16, rows: u16) -> MuxResult<()> {
        self.tab_mut(id)?
            .pane_mut(index)?
            .resize(PaneSize::new(cols, rows))?;
        Ok(())
    }

    /// Lay a whole tab out in an area of `cols` x `rows`, resizing each of
    /// its panes to its share.
    pub fn layout_tab(&mut self, id: TabId, cols: u16, rows: u16) -> MuxResult<()> {
        let tab = self.tab_mut(id)?;
        let sizes = tab_layout(PaneSize::new(cols, rows), tab.split_direction());
        for (pane, size) in tab.panes_mut().iter_mut().zip(sizes) {
            pane.resize(size)?;
        }
        Ok(())
    }

    /// Run a command line in the focused pane of a tab and remember it.
    ///
    /// Surrounding whitespace is dropped; blank commands are ignored.
    pub fn execute_command(&mut self, id: TabId, command: &str) -> MuxResult<()> {
        let command = command.trim();
        if command.is_empty() {
            return Ok(());
        }
        let line = format!("{command}{COMMAND_TERMINATOR}");
        self.tab_mut(id)?
            .focused_pane_mut()
            .write_input(line.as_bytes())?;
        self.history.record(command);
        Ok(())
    }

    /// Type a command into the focused pane without running it.
    pub fn insert_command(&mut self, id: TabId, command: &str) -> MuxResult<()> {
        self.write_input(id, command.as_bytes())
    }

    /// Erase whatever is typed on the focused pane's command line.
    pub fn clear_input(&mut self, id: TabId) -> MuxResult<()> {
        self.write_input(id, &[CLEAR_LINE])
    }

    /// Interrupt the foreground job of one pane. The shell keeps running.
    pub fn kill_process(&mut self, id: TabId, index: usize) -> MuxResult<()> {
        self.tab_mut(id)?.pane_mut(index)?.interrupt()?;
        Ok(())
    }

    // --- subscriptions ---

    /// Subscribe to a pane's raw output.
    pub fn on_pane_output(
        &mut self,
        id: TabId,
        index: usize,
        callback: impl FnMut(&[u8]) + 'static,
    ) -> MuxResult<()> {
        let pane = self.tab_ref(id)?.pane(index)?.id();
        self.output_listeners
            .entry(pane)
            .or_default()
            .push(Box::new(callback));
        Ok(())
    }

    /// Subscribe to a pane's idle notifications.
    pub fn on_idle(
        &mut self,
        id: TabId,
        index: usize,
        callback: impl FnMut(&IdleEvent) + 'static,
    ) -> MuxResult<()> {
        let pane = self.tab_ref(id)?.pane(index)?.id();
        self.idle_listeners
            .entry(pane)
            .or_default()
            .push(Box::new(callback));
        Ok(())
    }

    // --- output routing ---

    /// Route one reader event to its pane, surface, and listeners.
    ///
    /// Events for panes that were already destroyed are dropped.
    pub fn dispatch(&mut self, event: PaneEvent) {
        match event {
            PaneEvent::Output { pane, data } => {
                let Some(target) = find_pane_mut(&mut self.tabs, pane) else {
                    log::trace!("dropping output for destroyed pane {pane}");
                    return;
                };
                target.record_output(Instant::now());
                if let Some(surface) = target.surface() {
                    self.host.write(surface, &data);
                }
                if let Some(listeners) = self.output_listeners.get_mut(&pane) {
                    for listener in listeners.iter_mut() {
                        listener(&data);
                    }
                }
            }
            PaneEvent::Closed { pane } => {
                let Some(target) = find_pane_mut(&mut self.tabs, pane) else {
                    return;
                };
                target.mark_exited();
                let code = target.exit_code();
                log::debug!("pane {pane} exited with {code:?}");
                if let Some(surface) = target.surface() {
                    self.host.pane_exited(surface, code);
                }
            }
        }
    }

    /// Dispatch every event already waiting on `events`. Returns how many
    /// were handled.
    pub fn drain(&mut self, events: &mut mpsc::UnboundedReceiver<PaneEvent>) -> usize {
        let mut handled = 0;
        while let Ok(event) = events.try_recv() {
            self.dispatch(event);
            handled += 1;
        }
        handled
    }

    // --- activity monitor ---

    /// One tick of the activity monitor.
    ///
    /// Fires each pane's idle listeners at most once per output burst and
    /// returns the notifications raised on this tick.
    pub fn tick_activity(&mut self, now: Instant) -> Vec<IdleEvent> {
        let mut fired = Vec::new();
        for tab in &mut self.tabs {
            let tab_id = tab.id();
            for (pane_index, pane) in tab.panes_mut().iter_mut().enumerate() {
                if self.idle.poll(pane.activity_mut(), now) {
                    fired.push(IdleEvent {
                        tab: tab_id,
                        pane_index,
                        pane: pane.id(),
                    });
                }
            }
        }

        for event in &fired {
            log::debug!("pane {} went idle", event.pane);
            if let Some(listeners) = self.idle_listeners.get_mut(&event.pane) {
                for listener in listeners.iter_mut() {
                    listener(event);
                }
            }
        }
        fired
    }

    // --- external state ---

    /// Ask `probe` for each running shell's directory and update panes and
    /// tab names. Panes the probe cannot see keep their last known value.
    pub fn refresh_working_directories(&mut self, mut probe: impl FnMut(u32) -> Option<PathBuf>) {
        for tab in &mut self.tabs {
            for pane in tab.panes_mut() {
                if pane.state() != PaneState::Running {
                    continue;
                }
                if let Some(dir) = pane.process_id().and_then(&mut probe) {
                    pane.set_working_directory(dir);
                }
            }
            tab.refresh_display_name();
        }
    }

    /// Replace the command-history cache with the shell's latest list.
    /// Returns `true` if it changed.
    pub fn replace_history(&mut self, commands: Vec<String>) -> bool {
        self.history.replace(commands)
    }

    /// Cached commands, most recent first.
    pub fn history(&self) -> &[String] {
        self.history.entries()
    }

    // --- queries ---

    pub fn tabs(&self) -> &[Tab] {
        &self.tabs
    }

    pub fn tab_count(&self) -> usize {
        self.tabs.len()
    }

    pub fn tab(&self, id: TabId) -> Option<&Tab> {
        self.tabs.iter().find(|tab| tab.id() == id)
    }

    pub fn active_tab_id(&self) -> Option<TabId> {
        self.active
    }

    pub fn active_tab(&self) -> Option<&Tab> {
        self.active.and_then(|id| self.tab(id))
    }

    /// Whether `pane` is the focused pane of the active tab.
    pub fn is_foreground(&self, pane: PaneId) -> bool {
        self.active_tab()
            .is_some_and(|tab| tab.focused_pane().id() == pane)
    }

    pub fn snapshot(&self) -> Vec<TabSummary> {
        self.tabs
            .iter()
            .map(|tab| TabSummary {
                id: tab.id(),
                name: tab.display_name().to_string(),
                active: self.active == Some(tab.id()),
                split: tab.split_direction(),
                focused_pane: tab.focused_index(),
                panes: tab
                    .panes()
                    .iter()
                    .map(|pane| PaneSummary {
                        id: pane.id(),
                        state: pane.state(),
                        size: pane.size(),
                        working_directory: pane.working_directory().to_path_buf(),
                    })
                    .collect(),
            })
            .collect()
    }

    // --- internals ---

    fn spawn_pane(&mut self, cwd: PathBuf, size: PaneSize) -> MuxResult<Pane> {
        let id = PaneId(self.next_pane_id);
        let options = SpawnOptions::from_config(&self.config, cwd, size);

        let mut pane = Pane::spawn(id, &options).map_err(MuxError::Spawn)?;
        pane.start(self.events.clone()).map_err(MuxError::Spawn)?;
        self.next_pane_id += 1;

        let surface = self.host.create_surface(id, size);
        pane.bind_surface(surface);
        Ok(pane)
    }

    fn forget_pane(&mut self, pane: &Pane) {
        self.output_listeners.remove(&pane.id());
        self.idle_listeners.remove(&pane.id());
        if let Some(surface) = pane.surface() {
            self.host.release_surface(surface);
        }
    }

    fn tab_index(&self, id: TabId) -> MuxResult<usize> {
        self.tabs
            .iter()
            .position(|tab| tab.id() == id)
            .ok_or(MuxError::InvalidTabId(id))
    }

    fn tab_ref(&self, id: TabId) -> MuxResult<&Tab> {
        self.tab(id).ok_or(MuxError::InvalidTabId(id))
    }

    fn tab_mut(&mut self, id: TabId) -> MuxResult<&mut Tab> {
        self.tabs
            .iter_mut()
            .find(|tab| tab.id() == id)
            .ok_or(MuxError::InvalidTabId(id))
    }
}

fn find_pane_mut(tabs: &mut [Tab], id: PaneId) -> Option<&mut Pane> {
    tabs.iter_mut()
        .flat_map(|tab| tab.panes_mut().iter_mut())
        .find(|pane| pane.id() == id)
}
