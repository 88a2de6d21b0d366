use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::thread;

use portable_pty::{native_pty_system, Child, CommandBuilder, MasterPty, PtySize};

use crate::config::{home_dir, MuxConfig};
use crate::error::PtyError;
use crate::layout::PaneSize;

/// ASCII ETX, delivered as SIGINT by the PTY line discipline.
pub const INTERRUPT: u8 = 0x03;

/// Everything needed to launch one shell on a fresh pseudo-terminal.
#[derive(Debug, Clone)]
pub struct SpawnOptions {
    pub shell: String,
    pub args: Vec<String>,
    pub cwd: PathBuf,
    pub size: PaneSize,
    /// Applied on top of the inherited environment, in order.
    pub env: Vec<(String, String)>,
}

impl SpawnOptions {
    /// Build spawn options from the registry configuration.
    ///
    /// The environment overlay makes bash append each command to its
    /// history file as soon as the prompt returns, so history readers see
    /// new commands with low latency.
    pub fn from_config(config: &MuxConfig, cwd: PathBuf, size: PaneSize) -> Self {
        let history_file = config.resolved_history_file();
        let mut env = vec![
            ("TERM".to_string(), "xterm-256color".to_string()),
            ("PROMPT_COMMAND".to_string(), "history -a".to_string()),
            (
                "HISTFILE".to_string(),
                history_file.to_string_lossy().into_owned(),
            ),
            ("HISTFILESIZE".to_string(), "10000".to_string()),
            ("HISTSIZE".to_string(), "10000".to_string()),
        ];
        env.extend(config.env.iter().cloned());

        Self {
            shell: config.resolved_shell(),
            args: config.shell_args.clone(),
            cwd,
            size,
            env,
        }
    }
}

/// Owns a portable-pty child process, master side, reader, and writer.
///
/// Dropping the handle kills the child if it is still running.
pub struct PtyHandle {
    master: Box<dyn MasterPty + Send>,
    reader: Option<Box<dyn Read + Send>>,
    writer: Box<dyn Write + Send>,
    /// `None` only once handed to the reaper thread on drop.
    child: Option<Box<dyn Child + Send + Sync>>,
    size: PaneSize,
    cwd: PathBuf,
    closed: bool,
    exit_code: Option<u32>,
}

impl PtyHandle {
    /// Spawn a shell on a new PTY.
    pub fn spawn(options: &SpawnOptions) -> Result<Self, PtyError> {
        let pty_system = native_pty_system();

        let pair = pty_system
            .openpty(pty_size(options.size))
            .map_err(|e| PtyError::SpawnFailed(format!("failed to open PTY: {e}")))?;

        let cwd = resolve_cwd(&options.cwd);
        let mut cmd = CommandBuilder::new(&options.shell);
        cmd.args(&options.args);
        cmd.cwd(&cwd);
        for (key, value) in &options.env {
            cmd.env(key, value);
        }

        let child = pair.slave.spawn_command(cmd).map_err(|e| {
            PtyError::SpawnFailed(format!("failed to spawn {}: {e}", options.shell))
        })?;

        let reader = pair
            .master
            .try_clone_reader()
            .map_err(|e| PtyError::SpawnFailed(format!("failed to clone reader: {e}")))?;

        let writer = pair
            .master
            .take_writer()
            .map_err(|e| PtyError::SpawnFailed(format!("failed to take writer: {e}")))?;

        log::debug!(
            "spawned {} (pid {:?}) in {}",
            options.shell,
            child.process_id(),
            cwd.display()
        );

        Ok(Self {
            master: pair.master,
            reader: Some(reader),
            writer,
            child: Some(child),
            size: options.size,
            cwd,
            closed: false,
            exit_code: None,
        })
    }

    /// Hand the blocking output reader to a dedicated I/O thread.
    ///
    /// Returns `None` if the reader was already taken.
    pub fn take_reader(&mut self) -> Option<Box<dyn Read + Send>> {
        self.reader.take()
    }

    /// Write bytes to the PTY master (user input -> shell).
    pub fn write(&mut self, data: &[u8]) -> Result<(), PtyError> {
        if self.closed {
            return Err(PtyError::Closed);
        }
        self.writer.write_all(data)?;
        self.writer.flush()?;
        Ok(())
    }

    /// Resize the PTY so the running program receives SIGWINCH.
    ///
    /// Resizing to the current size does nothing.
    pub fn resize(&mut self, size: PaneSize) -> Result<(), PtyError> {
        if self.closed {
            return Err(PtyError::Closed);
        }
        if size == self.size {
            return Ok(());
        }
        self.master
            .resize(pty_size(size))
            .map_err(|e| PtyError::ResizeFailed(format!("{e}")))?;
        self.size = size;
        Ok(())
    }

    /// Send Ctrl+C to the foreground job.
    pub fn interrupt(&mut self) -> Result<(), PtyError> {
        self.write(&[INTERRUPT])
    }

    /// Terminate the child and stop accepting input. Calling this twice is
    /// a no-op.
    ///
    /// Never blocks: the child is sent SIGKILL and reaped if it is already
    /// gone. Otherwise a later [`try_wait`](Self::try_wait), or the drop of
    /// the handle, collects it.
    pub fn kill(&mut self) {
        self.closed = true;
        if self.try_wait().is_some() {
            return;
        }
        if let Err(e) = self.signal_kill() {
            log::debug!("kill child process: {e}");
        }
        self.try_wait();
    }

    #[cfg(unix)]
    fn signal_kill(&self) -> std::io::Result<()> {
        let Some(pid) = self.process_id() else {
            return Ok(());
        };
        // The child is not reaped yet, so its pid cannot have been reused.
        let result = unsafe { libc::kill(pid as libc::pid_t, libc::SIGKILL) };
        if result != 0 {
            return Err(std::io::Error::last_os_error());
        }
        Ok(())
    }

    #[cfg(not(unix))]
    fn signal_kill(&self) -> std::io::Result<()> {
        match &self.child {
            Some(child) => child.clone_killer().kill(),
            None => Ok(()),
        }
    }

    /// Record that the output stream hit EOF, i.e. the process went away.
    pub fn mark_closed(&mut self) {
        self.closed = true;
        self.try_wait();
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn size(&self) -> PaneSize {
        self.size
    }

    pub fn process_id(&self) -> Option<u32> {
        self.child.as_ref().and_then(|child| child.process_id())
    }

    /// Directory the shell was actually started in. Differs from the
    /// requested one when that did not exist.
    pub fn cwd(&self) -> &Path {
        &self.cwd
    }

    /// Get the child process exit status if it has exited.
    ///
    /// Returns `None` if the process is still running.
    pub fn try_wait(&mut self) -> Option<u32> {
        if self.exit_code.is_none() {
            if let Some(Ok(Some(status))) = self.child.as_mut().map(|child| child.try_wait()) {
                self.exit_code = Some(status.exit_code());
            }
        }
        self.exit_code
    }
}

impl Drop for PtyHandle {
    fn drop(&mut self) {
        self.kill();
        if self.exit_code.is_some() {
            return;
        }
        if let Some(mut child) = self.child.take() {
            let spawned = thread::Builder::new()
                .name("pty-reaper".to_string())
                .spawn(move || {
                    if let Err(e) = child.wait() {
                        log::debug!("reap child process: {e}");
                    }
                });
            if let Err(e) = spawned {
                log::warn!("failed to spawn reaper thread: {e}");
            }
        }
    }
}

fn pty_size(size: PaneSize) -> PtySize {
    PtySize {
        rows: size.rows,
        cols: size.cols,
        pixel_width: 0,
        pixel_height: 0,
    }
}

/// Fall back to the home directory when the requested one has vanished.
fn resolve_cwd(cwd: &Path) -> PathBuf {
    if cwd.is_dir() {
        cwd.to_path_buf()
    } else {
        log::warn!("{} is not a directory, starting in $HOME", cwd.display());
        home_dir()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    fn sh_options() -> SpawnOptions {
        let config = MuxConfig {
            shell: Some("/bin/sh".to_string()),
            ..MuxConfig::default()
        };
        SpawnOptions::from_config(&config, std::env::temp_dir(), PaneSize::new(80, 24))
    }

    /// Drain the reader on a helper thread until `needle` shows up or the
    /// deadline passes.
    fn read_until(reader: Box<dyn Read + Send>, needle: &'static str) -> String {
        let (tx, rx) = std::sync::mpsc::channel();
        thread::spawn(move || {
            let mut reader = reader;
            let mut buf = [0u8; 4096];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) | Err(_) => return,
                    Ok(n) => {
                        if tx.send(buf[..n].to_vec()).is_err() {
                            return;
                        }
                    }
                }
            }
        });

        let mut output = Vec::new();
        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline {
            if let Ok(chunk) = rx.recv_timeout(Duration::from_millis(100)) {
                output.extend_from_slice(&chunk);
                if String::from_utf8_lossy(&output).contains(needle) {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&output).into_owned()
    }

    #[test]
    fn test_spawn_pty() {
        let handle = PtyHandle::spawn(&sh_options());
        assert!(handle.is_ok(), "Failed to spawn PTY: {:?}", handle.err());
        let mut handle = handle.unwrap();
        assert!(handle.try_wait().is_none());
        assert!(handle.process_id().is_some());
    }

    #[test]
    fn test_spawn_missing_shell_fails() {
        let mut options = sh_options();
        options.shell = "/nonexistent/tabmux-shell".to_string();
        let result = PtyHandle::spawn(&options);
        assert!(matches!(result, Err(PtyError::SpawnFailed(_))));
    }

    #[test]
    fn test_write_read_echo() {
        let mut handle = PtyHandle::spawn(&sh_options()).unwrap();
        let reader = handle.take_reader().unwrap();
        assert!(handle.take_reader().is_none());

        handle.write(b"echo TABMUX_TEST_OK\n").unwrap();

        let text = read_until(reader, "TABMUX_TEST_OK");
        assert!(
            text.contains("TABMUX_TEST_OK"),
            "Expected output to contain TABMUX_TEST_OK, got: {text}"
        );
    }

    #[test]
    fn test_history_overlay_reaches_shell() {
        let mut handle = PtyHandle::spawn(&sh_options()).unwrap();
        let reader = handle.take_reader().unwrap();

        handle.write(b"echo \"HS=$HISTSIZE\"\n").unwrap();

        let text = read_until(reader, "HS=10000");
        assert!(text.contains("HS=10000"), "got: {text}");
    }

    #[test]
    fn test_resize() {
        let mut handle = PtyHandle::spawn(&sh_options()).unwrap();
        let result = handle.resize(PaneSize::new(120, 40));
        assert!(result.is_ok(), "Resize failed: {:?}", result.err());
        assert_eq!(handle.size(), PaneSize::new(120, 40));

        // Same size again is a no-op.
        assert!(handle.resize(PaneSize::new(120, 40)).is_ok());
    }

    #[test]
    fn test_kill_is_idempotent() {
        let mut handle = PtyHandle::spawn(&sh_options()).unwrap();
        handle.kill();
        assert!(handle.is_closed());
        handle.kill();
        assert!(handle.is_closed());
    }

    #[test]
    fn test_kill_skips_hangup_grace_period() {
        let mut handle = PtyHandle::spawn(&sh_options()).unwrap();
        let reader = handle.take_reader().unwrap();

        // The quotes keep the terminal echo of the command from matching.
        handle.write(b"trap '' HUP; echo IGNORING''HUP\n").unwrap();
        let text = read_until(reader, "IGNORINGHUP");
        assert!(text.contains("IGNORINGHUP"), "got: {text}");

        let started = Instant::now();
        handle.kill();
        assert!(
            started.elapsed() < Duration::from_millis(150),
            "kill blocked for {:?}",
            started.elapsed()
        );

        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline && handle.try_wait().is_none() {
            thread::sleep(Duration::from_millis(20));
        }
        assert!(handle.try_wait().is_some(), "shell survived kill");
    }

    #[test]
    fn test_missing_cwd_falls_back_to_home() {
        let mut options = sh_options();
        options.cwd = PathBuf::from("/nonexistent/tabmux-missing");
        let handle = PtyHandle::spawn(&options).unwrap();
        assert_eq!(handle.cwd(), home_dir().as_path());

        let handle = PtyHandle::spawn(&sh_options()).unwrap();
        assert_eq!(handle.cwd(), std::env::temp_dir().as_path());
    }

    #[test]
    fn test_io_after_close_is_rejected() {
        let mut handle = PtyHandle::spawn(&sh_options()).unwrap();
        handle.kill();
        assert!(matches!(handle.write(b"ls\n"), Err(PtyError::Closed)));
        assert!(matches!(
            handle.resize(PaneSize::new(10, 10)),
            Err(PtyError::Closed)
        ));
        assert!(matches!(handle.interrupt(), Err(PtyError::Closed)));
    }

    #[test]
    fn test_child_exit() {
        let mut handle = PtyHandle::spawn(&sh_options()).unwrap();
        let mut reader = handle.take_reader().unwrap();
        handle.write(b"exit 0\n").unwrap();

        // The reader returns EOF or an error once the child is gone.
        let drain = thread::spawn(move || {
            let mut buf = [0u8; 4096];
            loop {
                match reader.read(&mut buf) {
                    Ok(0) | Err(_) => return,
                    Ok(_) => {}
                }
            }
        });
        let _ = drain.join();

        let deadline = Instant::now() + Duration::from_secs(3);
        while Instant::now() < deadline && handle.try_wait().is_none() {
            thread::sleep(Duration::from_millis(50));
        }

        handle.mark_closed();
        assert!(handle.is_closed());
        assert_eq!(handle.try_wait(), Some(0));
    }
}
