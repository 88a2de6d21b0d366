//! Render surfaces for a plain terminal: one scrollback buffer per pane,
//! and only the visible pane is written through to the output stream.

use std::collections::HashMap;
use std::io::Write;

use tabmux_pty::{PaneId, PaneSize, SurfaceHost, SurfaceId};

/// Bytes of output kept per hidden surface for replay on switch.
pub const DEFAULT_SCROLLBACK: usize = 64 * 1024;

const CLEAR_SCREEN: &[u8] = b"\x1b[2J\x1b[H";

pub struct StreamSurfaces<W: Write> {
    out: W,
    next_id: u64,
    visible: Option<SurfaceId>,
    buffers: HashMap<SurfaceId, Vec<u8>>,
    scrollback: usize,
}

impl<W: Write> StreamSurfaces<W> {
    pub fn new(out: W, scrollback: usize) -> Self {
        Self {
            out,
            next_id: 1,
            visible: None,
            buffers: HashMap::new(),
            scrollback,
        }
    }

    /// Make `surface` the one written to the stream, replaying what it
    /// printed while hidden.
    pub fn show(&mut self, surface: Option<SurfaceId>) {
        if surface == self.visible {
            return;
        }
        self.visible = surface;
        let replay = surface
            .and_then(|id| self.buffers.get(&id))
            .cloned()
            .unwrap_or_default();
        self.emit(CLEAR_SCREEN);
        self.emit(&replay);
    }

    /// Write a bracketed status line straight to the stream.
    pub fn notice(&mut self, text: &str) {
        self.emit(format!("\r\n[{text}]\r\n").as_bytes());
    }

    /// Write plain text straight to the stream, one terminal line per line.
    pub fn print(&mut self, text: &str) {
        let mut bytes = Vec::with_capacity(text.len() + 2);
        for line in text.lines() {
            bytes.extend_from_slice(line.as_bytes());
            bytes.extend_from_slice(b"\r\n");
        }
        self.emit(&bytes);
    }

    /// Ring the terminal bell.
    pub fn bell(&mut self) {
        self.emit(b"\x07");
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }

    fn append(&mut self, surface: SurfaceId, data: &[u8]) {
        let Some(buffer) = self.buffers.get_mut(&surface) else {
            return;
        };
        buffer.extend_from_slice(data);
        if buffer.len() > self.scrollback {
            let excess = buffer.len() - self.scrollback;
            buffer.drain(..excess);
        }
        if self.visible == Some(surface) {
            self.emit(data);
        }
    }

    fn emit(&mut self, data: &[u8]) {
        if let Err(e) = self.out.write_all(data).and_then(|()| self.out.flush()) {
            log::warn!("failed to write terminal output: {e}");
        }
    }
}

impl<W: Write> SurfaceHost for StreamSurfaces<W> {
    fn create_surface(&mut self, pane: PaneId, size: PaneSize) -> SurfaceId {
        let id = SurfaceId(self.next_id);
        self.next_id += 1;
        self.buffers.insert(id, Vec::new());
        log::debug!("surface {} for pane {pane} ({}x{})", id.0, size.cols, size.rows);
        id
    }

    fn write(&mut self, surface: SurfaceId, data: &[u8]) {
        self.append(surface, data);
    }

    fn pane_exited(&mut self, surface: SurfaceId, exit_code: Option<u32>) {
        let text = match exit_code {
            Some(code) => format!("\r\n[process exited with code {code}]\r\n"),
            None => "\r\n[process exited]\r\n".to_string(),
        };
        self.append(surface, text.as_bytes());
    }

    fn release_surface(&mut self, surface: SurfaceId) {
        self.buffers.remove(&surface);
        if self.visible == Some(surface) {
            self.visible = None;
        }
    }
}
