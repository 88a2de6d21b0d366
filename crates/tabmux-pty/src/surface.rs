//! Render surfaces, owned by the UI and addressed by id.

use std::cell::RefCell;
use std::rc::Rc;

use serde::{Deserialize, Serialize};

use crate::layout::PaneSize;
use crate::pane::PaneId;

/// Opaque handle to a UI-side terminal display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SurfaceId(pub u64);

/// The UI collaborator that owns every render surface.
///
/// The registry asks for one surface per pane when the pane is created and
/// releases it when the pane is destroyed. Output bytes are passed through
/// untouched; parsing them is the surface's job.
pub trait SurfaceHost {
    /// Create the display for a new pane and return its id.
    fn create_surface(&mut self, pane: PaneId, size: PaneSize) -> SurfaceId;

    /// Append process output to a surface, visible or not.
    fn write(&mut self, surface: SurfaceId, data: &[u8]);

    /// The process behind a surface exited.
    fn pane_exited(&mut self, _surface: SurfaceId, _exit_code: Option<u32>) {}

    /// The pane bound to a surface was destroyed.
    fn release_surface(&mut self, _surface: SurfaceId) {}
}

/// Lets the UI keep a handle on its host while the registry drives it.
impl<H: SurfaceHost> SurfaceHost for Rc<RefCell<H>> {
    fn create_surface(&mut self, pane: PaneId, size: PaneSize) -> SurfaceId {
        self.borrow_mut().create_surface(pane, size)
    }

    fn write(&mut self, surface: SurfaceId, data: &[u8]) {
        self.borrow_mut().write(surface, data)
    }

    fn pane_exited(&mut self, surface: SurfaceId, exit_code: Option<u32>) {
        self.borrow_mut().pane_exited(surface, exit_code)
    }

    fn release_surface(&mut self, surface: SurfaceId) {
        self.borrow_mut().release_surface(surface)
    }
}

/// A host that hands out ids and discards output.
///
/// Useful when output is consumed only through
/// [`SessionRegistry::on_pane_output`](crate::SessionRegistry::on_pane_output).
#[derive(Debug, Default)]
pub struct NullSurfaceHost {
    next_id: u64,
}

impl SurfaceHost for NullSurfaceHost {
    fn create_surface(&mut self, _pane: PaneId, _size: PaneSize) -> SurfaceId {
        self.next_id += 1;
        SurfaceId(self.next_id)
    }

    fn write(&mut self, _surface: SurfaceId, _data: &[u8]) {}
}
