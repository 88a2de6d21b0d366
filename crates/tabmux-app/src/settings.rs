//! Persisted settings and how they map onto [`MuxConfig`].

use std::path::PathBuf;
use std::time::Duration;

use rusqlite::Connection;
use tabmux_db::settings;
use tabmux_pty::config::{DEFAULT_HISTORY_CAPACITY, DEFAULT_IDLE_THRESHOLD, DEFAULT_TICK_INTERVAL};
use tabmux_pty::MuxConfig;

/// Settings key for the shell binary. Unset means `$SHELL`.
pub const SETTING_SHELL: &str = "shell";

/// Settings key for the history file the shells write through to.
pub const SETTING_HISTORY_FILE: &str = "history_file";

/// Settings key for the activity monitor cadence, in milliseconds.
pub const SETTING_TICK_INTERVAL_MS: &str = "tick_interval_ms";

/// Settings key for the quiet period that ends a burst, in milliseconds.
pub const SETTING_IDLE_THRESHOLD_MS: &str = "idle_threshold_ms";

/// Settings key for the size of the command-history cache.
pub const SETTING_HISTORY_CAPACITY: &str = "history_capacity";

/// Settings key for ringing the bell when a background pane goes idle.
pub const SETTING_BELL: &str = "bell";

/// Seed default settings. Values the user already changed are kept.
pub fn seed_defaults(conn: &Connection) -> rusqlite::Result<()> {
    settings::set_default(
        conn,
        SETTING_TICK_INTERVAL_MS,
        &DEFAULT_TICK_INTERVAL.as_millis().to_string(),
    )?;
    settings::set_default(
        conn,
        SETTING_IDLE_THRESHOLD_MS,
        &DEFAULT_IDLE_THRESHOLD.as_millis().to_string(),
    )?;
    settings::set_default(
        conn,
        SETTING_HISTORY_CAPACITY,
        &DEFAULT_HISTORY_CAPACITY.to_string(),
    )?;
    settings::set_default(conn, SETTING_BELL, "true")?;
    Ok(())
}

/// Build the core configuration from the settings table.
///
/// Missing or unparsable values fall back to the built-in defaults.
pub fn load_config(conn: &Connection) -> MuxConfig {
    let defaults = MuxConfig::default();
    MuxConfig {
        shell: read(conn, SETTING_SHELL),
        history_file: read(conn, SETTING_HISTORY_FILE).map(PathBuf::from),
        tick_interval: read_millis(conn, SETTING_TICK_INTERVAL_MS)
            .unwrap_or(defaults.tick_interval),
        idle_threshold: read_millis(conn, SETTING_IDLE_THRESHOLD_MS)
            .unwrap_or(defaults.idle_threshold),
        history_capacity: read(conn, SETTING_HISTORY_CAPACITY)
            .and_then(|v| v.parse().ok())
            .filter(|n| *n > 0)
            .unwrap_or(defaults.history_capacity),
        ..defaults
    }
}

/// Whether idle notifications ring the terminal bell.
pub fn read_bell(conn: &Connection) -> bool {
    read(conn, SETTING_BELL)
        .and_then(|v| v.parse().ok())
        .unwrap_or(true)
}

fn read(conn: &Connection, key: &str) -> Option<String> {
    match settings::get(conn, key) {
        Ok(value) => value.filter(|v| !v.is_empty()),
        Err(e) => {
            log::warn!("failed to read setting {key}: {e}");
            None
        }
    }
}

fn read_millis(conn: &Connection, key: &str) -> Option<Duration> {
    read(conn, key)
        .and_then(|v| v.parse().ok())
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}
