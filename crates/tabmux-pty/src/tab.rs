use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{MuxError, MuxResult};
use crate::layout::SplitDirection;
use crate::pane::{Pane, PaneId};

/// A tab may show at most this many panes.
pub const MAX_PANES: usize = 2;

/// Unique identifier for a tab. Never reused within a process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TabId(pub u64);

impl std::fmt::Display for TabId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// One or two panes shown together, plus the focus and split metadata.
pub struct Tab {
    id: TabId,
    panes: Vec<Pane>,
    split: Option<SplitDirection>,
    focused: usize,
    display_name: String,
}

impl Tab {
    /// Create a tab around its primary pane.
    pub fn new(id: TabId, primary: Pane) -> Self {
        let mut tab = Self {
            id,
            panes: vec![primary],
            split: None,
            focused: 0,
            display_name: String::new(),
        };
        tab.refresh_display_name();
        tab
    }

    pub fn id(&self) -> TabId {
        self.id
    }

    pub fn panes(&self) -> &[Pane] {
        &self.panes
    }

    pub fn panes_mut(&mut self) -> &mut [Pane] {
        &mut self.panes
    }

    pub fn pane_count(&self) -> usize {
        self.panes.len()
    }

    pub fn pane(&self, index: usize) -> MuxResult<&Pane> {
        self.panes.get(index).ok_or(MuxError::InvalidPaneIndex {
            tab: self.id,
            index,
        })
    }

    pub fn pane_mut(&mut self, index: usize) -> MuxResult<&mut Pane> {
        let tab = self.id;
        self.panes
            .get_mut(index)
            .ok_or(MuxError::InvalidPaneIndex { tab, index })
    }

    /// The pane created with the tab.
    pub fn primary(&self) -> &Pane {
        &self.panes[0]
    }

    pub fn index_of(&self, pane: PaneId) -> Option<usize> {
        self.panes.iter().position(|p| p.id() == pane)
    }

    pub fn focused_index(&self) -> usize {
        self.focused
    }

    pub fn focused_pane(&self) -> &Pane {
        &self.panes[self.focused]
    }

    pub fn focused_pane_mut(&mut self) -> &mut Pane {
        &mut self.panes[self.focused]
    }

    pub fn focus(&mut self, index: usize) -> MuxResult<()> {
        if index >= self.panes.len() {
            return Err(MuxError::InvalidPaneIndex {
                tab: self.id,
                index,
            });
        }
        self.focused = index;
        Ok(())
    }

    /// Move focus to the other pane of a split. Returns the new index.
    pub fn focus_next(&mut self) -> usize {
        self.focused = (self.focused + 1) % self.panes.len();
        self.focused
    }

    /// `None` until the tab is split.
    pub fn split_direction(&self) -> Option<SplitDirection> {
        self.split
    }

    pub fn is_split(&self) -> bool {
        self.panes.len() >= MAX_PANES
    }

    /// Append the second pane. Focus stays where it was.
    pub(crate) fn attach_split(&mut self, direction: SplitDirection, pane: Pane) -> MuxResult<()> {
        if self.is_split() {
            return Err(MuxError::SplitLimitExceeded(self.id));
        }
        self.split = Some(direction);
        self.panes.push(pane);
        Ok(())
    }

    /// Take every pane out of the tab, for teardown.
    pub(crate) fn into_panes(self) -> Vec<Pane> {
        self.panes
    }

    /// Last known directory of the primary pane.
    pub fn working_directory(&self) -> &Path {
        self.primary().working_directory()
    }

    /// Best-effort label derived from the primary pane's directory.
    pub fn display_name(&self) -> &str {
        &self.display_name
    }

    pub fn refresh_display_name(&mut self) {
        self.display_name = match self.working_directory().file_name() {
            Some(name) => name.to_string_lossy().into_owned(),
            None => format!("Terminal {}", self.id),
        };
    }
}
