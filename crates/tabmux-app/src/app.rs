//! Control thread: owns the registry and reacts to input, pane output, and
//! the periodic monitors.

use std::cell::RefCell;
use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context};
use tokio::sync::mpsc;
use tokio::time::MissedTickBehavior;

use tabmux_probe::{probe_cwd, HistoryEvent, HistoryPoller};
use tabmux_pty::{IdleEvent, PaneEvent, PaneId, SessionRegistry, TabId};

use crate::command::{parse_line, Command, HELP};
use crate::surfaces::StreamSurfaces;

/// How often the history file is checked when no watcher event arrives.
pub const HISTORY_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// How often the shells' working directories are re-probed.
pub const CWD_REFRESH_INTERVAL: Duration = Duration::from_secs(2);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

pub struct App<W: Write> {
    registry: SessionRegistry,
    surfaces: Rc<RefCell<StreamSurfaces<W>>>,
    history: Option<HistoryPoller>,
    bell: bool,
    /// Panes the user has typed into. Only these ring the bell, so a fresh
    /// shell's first prompt stays quiet.
    engaged: HashSet<PaneId>,
}

impl<W: Write> App<W> {
    pub fn new(
        registry: SessionRegistry,
        surfaces: Rc<RefCell<StreamSurfaces<W>>>,
        history: Option<HistoryPoller>,
        bell: bool,
    ) -> Self {
        Self {
            registry,
            surfaces,
            history,
            bell,
            engaged: HashSet::new(),
        }
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    /// Open the first tab and show it.
    pub fn open_first_tab(&mut self, cwd: Option<&Path>) -> anyhow::Result<TabId> {
        let id = self
            .registry
            .open_tab(cwd)
            .context("failed to start the first shell")?;
        self.sync_view();
        self.poll_history();
        Ok(id)
    }

    /// Handle one line of user input.
    pub fn handle_line(&mut self, line: &str) -> Flow {
        let flow = match parse_line(line) {
            Ok(command) => match self.apply(command) {
                Ok(flow) => flow,
                Err(e) => {
                    self.surfaces.borrow_mut().notice(&format!("{e:#}"));
                    Flow::Continue
                }
            },
            Err(e) => {
                self.surfaces.borrow_mut().notice(&e);
                Flow::Continue
            }
        };
        self.sync_view();
        flow
    }

    fn apply(&mut self, command: Command) -> anyhow::Result<Flow> {
        match command {
            Command::Run(line) => {
                let tab = self.active()?;
                self.registry.execute_command(tab, &line)?;
                self.engage(tab, None);
            }
            Command::NewTab(dir) => {
                self.registry.open_tab(dir.as_deref())?;
            }
            Command::CloseTab(id) => {
                let tab = match id {
                    Some(id) => id,
                    None => self.active()?,
                };
                let panes: Vec<PaneId> = self
                    .registry
                    .tab(tab)
                    .map(|t| t.panes().iter().map(|pane| pane.id()).collect())
                    .unwrap_or_default();
                if self.registry.close_tab(tab)? {
                    for pane in panes {
                        self.engaged.remove(&pane);
                    }
                } else {
                    self.surfaces
                        .borrow_mut()
                        .notice("cannot close the last tab");
                }
            }
            Command::SwitchTab(id) => {
                if !self.registry.switch_tab(id) {
                    self.surfaces.borrow_mut().notice(&format!("no tab {id}"));
                }
            }
            Command::Split(direction) => {
                let tab = self.active()?;
                self.registry.split_tab(tab, direction)?;
            }
            Command::Focus(index) => {
                let tab = self.active()?;
                self.registry.focus_pane(tab, index)?;
            }
            Command::FocusNext => {
                let tab = self.active()?;
                self.registry.focus_next_pane(tab)?;
            }
            Command::Interrupt(index) => {
                let tab = self.active()?;
                let index = match index {
                    Some(index) => index,
                    None => self.focused_index(tab)?,
                };
                self.registry.kill_process(tab, index)?;
                self.engage(tab, Some(index));
            }
            Command::ClearInput => {
                let tab = self.active()?;
                self.registry.clear_input(tab)?;
                self.engage(tab, None);
            }
            Command::Insert(text) => {
                let tab = self.active()?;
                self.registry.insert_command(tab, &text)?;
                self.engage(tab, None);
            }
            Command::Recall(n) => {
                let tab = self.active()?;
                let line = self
                    .registry
                    .history()
                    .get(n)
                    .cloned()
                    .ok_or_else(|| anyhow!("no history entry {n}"))?;
                self.registry.execute_command(tab, &line)?;
                self.engage(tab, None);
            }
            Command::Resize { index, cols, rows } => {
                let tab = self.active()?;
                self.registry.resize_pane(tab, index, cols, rows)?;
            }
            Command::Layout { cols, rows } => {
                let tab = self.active()?;
                self.registry.layout_tab(tab, cols, rows)?;
            }
            Command::ListTabs => {
                let json = serde_json::to_string_pretty(&self.registry.snapshot())?;
                self.surfaces.borrow_mut().print(&json);
            }
            Command::History => {
                let listing: String = self
                    .registry
                    .history()
                    .iter()
                    .enumerate()
                    .map(|(i, cmd)| format!("{i:>3}  {cmd}\n"))
                    .collect();
                self.surfaces.borrow_mut().print(&listing);
            }
            Command::Help => self.surfaces.borrow_mut().print(HELP),
            Command::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    fn active(&self) -> anyhow::Result<TabId> {
        self.registry
            .active_tab_id()
            .ok_or_else(|| anyhow!("no tab is open"))
    }

    fn focused_index(&self, tab: TabId) -> anyhow::Result<usize> {
        self.registry
            .tab(tab)
            .map(|t| t.focused_index())
            .ok_or_else(|| anyhow!("no tab {tab}"))
    }

    /// Remember that a pane got input; `None` means the focused pane.
    fn engage(&mut self, tab: TabId, index: Option<usize>) {
        let Some(tab) = self.registry.tab(tab) else {
            return;
        };
        let pane = match index {
            Some(index) => tab.pane(index).ok(),
            None => Some(tab.focused_pane()),
        };
        if let Some(pane) = pane {
            self.engaged.insert(pane.id());
        }
    }

    /// Show the focused pane of the active tab.
    fn sync_view(&mut self) {
        let surface = self
            .registry
            .active_tab()
            .and_then(|tab| tab.focused_pane().surface());
        self.surfaces.borrow_mut().show(surface);
    }

    /// Route pane output, then everything else already queued.
    pub fn dispatch(&mut self, event: PaneEvent, events: &mut mpsc::UnboundedReceiver<PaneEvent>) {
        self.registry.dispatch(event);
        self.registry.drain(events);
    }

    /// One activity monitor tick. Rings the bell for background panes that
    /// went quiet after the user typed into them.
    pub fn tick(&mut self, now: Instant) -> Vec<IdleEvent> {
        let fired = self.registry.tick_activity(now);
        for event in &fired {
            if self.registry.is_foreground(event.pane) || !self.engaged.contains(&event.pane) {
                continue;
            }
            log::info!("tab {} pane {} is idle", event.tab, event.pane_index);
            if self.bell {
                self.surfaces.borrow_mut().bell();
            }
        }
        fired
    }

    /// Re-read the history file if it changed.
    pub fn poll_history(&mut self) {
        let Some(poller) = self.history.as_mut() else {
            return;
        };
        match poller.poll() {
            Ok(Some(commands)) => {
                if self.registry.replace_history(commands) {
                    log::debug!("history reloaded from {}", poller.path().display());
                }
            }
            Ok(None) => {}
            Err(e) => log::warn!("failed to read {}: {e}", poller.path().display()),
        }
    }

    pub fn refresh_working_directories(&mut self) {
        self.registry.refresh_working_directories(probe_cwd);
    }
}

/// Bridge the history file watcher onto the async loop. Returns a channel
/// that never yields if the watcher cannot be set up; polling still runs.
fn watch_history(path: PathBuf) -> mpsc::Receiver<HistoryEvent> {
    let (tx, rx) = mpsc::channel(8);
    let (events, watcher) = match tabmux_probe::watch_history_file(path) {
        Ok(pair) => pair,
        Err(e) => {
            log::warn!("history watcher unavailable, polling only: {e}");
            return rx;
        }
    };
    let spawned = std::thread::Builder::new()
        .name("history-watcher".to_string())
        .spawn(move || {
            let _keep_alive = watcher;
            while let Ok(event) = events.recv() {
                if tx.blocking_send(event).is_err() {
                    break;
                }
            }
        });
    if let Err(e) = spawned {
        log::warn!("failed to start history watcher thread: {e}");
    }
    rx
}

/// Run the control loop until `:quit` or end of input.
pub async fn run<W: Write>(
    mut app: App<W>,
    mut pane_events: mpsc::UnboundedReceiver<PaneEvent>,
    mut input: mpsc::Receiver<String>,
    history_file: Option<PathBuf>,
) -> anyhow::Result<()> {
    let mut history_events = match history_file {
        Some(path) => watch_history(path),
        None => mpsc::channel(1).1,
    };

    let mut activity = tokio::time::interval(app.registry().config().tick_interval);
    activity.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut history_poll = tokio::time::interval(HISTORY_POLL_INTERVAL);
    history_poll.set_missed_tick_behavior(MissedTickBehavior::Skip);
    let mut cwd_refresh = tokio::time::interval(CWD_REFRESH_INTERVAL);
    cwd_refresh.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        tokio::select! {
            Some(event) = pane_events.recv() => app.dispatch(event, &mut pane_events),
            line = input.recv() => match line {
                Some(line) => {
                    if app.handle_line(&line) == Flow::Quit {
                        break;
                    }
                }
                None => break,
            },
            _ = activity.tick() => {
                app.tick(Instant::now());
            }
            Some(_) = history_events.recv() => app.poll_history(),
            _ = history_poll.tick() => app.poll_history(),
            _ = cwd_refresh.tick() => app.refresh_working_directories(),
        }
    }

    log::debug!("shutting down {} tab(s)", app.registry().tab_count());
    Ok(())
}
