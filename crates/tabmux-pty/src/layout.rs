//! Split-layout arithmetic for tabs holding one or two panes.

use serde::{Deserialize, Serialize};

/// Terminal dimensions in character cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaneSize {
    pub cols: u16,
    pub rows: u16,
}

impl PaneSize {
    pub fn new(cols: u16, rows: u16) -> Self {
        Self { cols, rows }
    }
}

/// Direction of the split between a tab's two panes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SplitDirection {
    /// Side-by-side (left | right).
    Horizontal,
    /// Stacked (top / bottom).
    Vertical,
}

impl std::str::FromStr for SplitDirection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "h" | "horizontal" => Ok(SplitDirection::Horizontal),
            "v" | "vertical" => Ok(SplitDirection::Vertical),
            other => Err(format!("unknown split direction: {other}")),
        }
    }
}

/// Divide `area` in half along the split axis.
///
/// Returns `(first, second)`: left/right for horizontal splits, top/bottom
/// for vertical ones. Both halves keep at least one cell along the split
/// axis. An extent of two or more cells is shared exactly; a 0 or 1 cell
/// extent gives each half one cell, so the pair overhangs the area.
pub fn split_area(area: PaneSize, direction: SplitDirection) -> (PaneSize, PaneSize) {
    match direction {
        SplitDirection::Horizontal => {
            let (left, right) = halve(area.cols);
            (
                PaneSize::new(left, area.rows),
                PaneSize::new(right, area.rows),
            )
        }
        SplitDirection::Vertical => {
            let (top, bottom) = halve(area.rows);
            (
                PaneSize::new(area.cols, top),
                PaneSize::new(area.cols, bottom),
            )
        }
    }
}

/// Sizes for every pane of a tab occupying `area`, in pane order.
pub fn tab_layout(area: PaneSize, split: Option<SplitDirection>) -> Vec<PaneSize> {
    match split {
        None => vec![area],
        Some(direction) => {
            let (first, second) = split_area(area, direction);
            vec![first, second]
        }
    }
}

fn halve(extent: u16) -> (u16, u16) {
    if extent < 2 {
        // Nothing sensible to share; both panes get the full single cell.
        return (extent.max(1), extent.max(1));
    }
    let first = extent - extent / 2;
    (first, extent - first)
}
