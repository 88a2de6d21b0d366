//! Blocking line reader bridged into the async event loop.
//!
//! Reading stdin blocks, so it gets a dedicated OS thread that forwards each
//! line over a tokio channel, the same way pane output reaches the loop.

use std::io::{self, BufRead};

use tokio::sync::mpsc;

/// Forward every line of `reader` to the returned channel until EOF or
/// until the receiver is dropped.
pub fn spawn_line_reader<R>(name: &str, reader: R) -> io::Result<mpsc::Receiver<String>>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(64);
    std::thread::Builder::new()
        .name(name.to_string())
        .spawn(move || {
            for line in reader.lines() {
                match line {
                    Ok(line) => {
                        if tx.blocking_send(line).is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        log::warn!("input read failed: {e}");
                        return;
                    }
                }
            }
        })?;
    Ok(rx)
}

pub fn spawn_stdin_reader() -> io::Result<mpsc::Receiver<String>> {
    spawn_line_reader("stdin-reader", io::BufReader::new(io::stdin()))
}
