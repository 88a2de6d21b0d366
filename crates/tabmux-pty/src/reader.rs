//! Per-pane reader thread that forwards PTY output to the control thread.
//!
//! PTY reads are blocking, so each pane gets its own OS thread. The thread
//! never touches pane or registry state: it only turns bytes into
//! [`PaneEvent`]s on a channel that the control thread drains.

use std::io::Read;
use std::thread::JoinHandle;

use tokio::sync::mpsc;

use crate::pane::PaneId;

/// Events delivered from reader threads to the control thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaneEvent {
    /// A chunk of process output, in emission order for this pane.
    Output { pane: PaneId, data: Vec<u8> },
    /// The output stream ended. Sent exactly once per pane.
    Closed { pane: PaneId },
}

/// Start the read loop for a pane on a dedicated OS thread.
pub fn start_reader_thread(
    pane: PaneId,
    reader: Box<dyn Read + Send>,
    events: mpsc::UnboundedSender<PaneEvent>,
) -> std::io::Result<JoinHandle<()>> {
    std::thread::Builder::new()
        .name(format!("pty-reader-{pane}"))
        .spawn(move || read_loop(pane, reader, events))
}

fn read_loop(
    pane: PaneId,
    mut reader: Box<dyn Read + Send>,
    events: mpsc::UnboundedSender<PaneEvent>,
) {
    let mut buf = [0u8; 65536];

    loop {
        let n = match reader.read(&mut buf) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
            // EIO is what Linux reports once the slave side is gone.
            Err(_) => break,
        };

        let event = PaneEvent::Output {
            pane,
            data: buf[..n].to_vec(),
        };
        if events.send(event).is_err() {
            // Registry dropped; nobody is listening any more.
            return;
        }
    }

    log::debug!("pane {pane}: output stream closed");
    let _ = events.send(PaneEvent::Closed { pane });
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forwards_chunks_then_closes_once() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let reader: Box<dyn Read + Send> = Box::new(std::io::Cursor::new(b"hello".to_vec()));

        let handle = start_reader_thread(PaneId(7), reader, tx).unwrap();
        handle.join().unwrap();

        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }

        assert_eq!(
            events,
            vec![
                PaneEvent::Output {
                    pane: PaneId(7),
                    data: b"hello".to_vec(),
                },
                PaneEvent::Closed { pane: PaneId(7) },
            ]
        );
    }

    #[test]
    fn test_stops_when_receiver_dropped() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let reader: Box<dyn Read + Send> = Box::new(std::io::repeat(b'x'));

        // Would spin forever if a failed send were ignored.
        let handle = start_reader_thread(PaneId(1), reader, tx).unwrap();
        handle.join().unwrap();
    }
}
