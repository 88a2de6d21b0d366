mod app;
mod command;
mod input;
mod settings;
mod surfaces;

use std::cell::RefCell;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use anyhow::Context;
use clap::Parser;
use rusqlite::Connection;

use tabmux_probe::HistoryPoller;
use tabmux_pty::SessionRegistry;

use crate::app::App;
use crate::surfaces::{StreamSurfaces, DEFAULT_SCROLLBACK};

/// Terminal tabs and split panes over plain stdin/stdout.
///
/// Lines typed on stdin run in the active tab; lines starting with `:` are
/// multiplexer commands (`:help` lists them).
#[derive(Debug, Parser)]
#[command(name = "tabmux", version)]
struct Args {
    /// Shell to launch in new panes (overrides the stored setting).
    #[arg(long)]
    shell: Option<String>,

    /// Working directory of the first tab.
    #[arg(long)]
    cwd: Option<PathBuf>,

    /// Settings database. Defaults to ~/.tabmux/tabmux.db; `:memory:`
    /// keeps nothing.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Never ring the bell when a background pane goes idle.
    #[arg(long)]
    no_bell: bool,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let db = open_db(args.db.as_deref())?;
    settings::seed_defaults(&db).context("failed to seed settings")?;

    let mut config = settings::load_config(&db);
    if let Some(shell) = args.shell {
        config.shell = Some(shell);
    }
    let bell = !args.no_bell && settings::read_bell(&db);
    let history_file = config.resolved_history_file();
    log::debug!("config: {config:?}");

    let surfaces = Rc::new(RefCell::new(StreamSurfaces::new(
        io::stdout(),
        DEFAULT_SCROLLBACK,
    )));
    let poller = HistoryPoller::new(history_file.clone(), config.history_capacity);
    let (registry, pane_events) = SessionRegistry::new(config, Rc::clone(&surfaces));

    let mut app = App::new(registry, surfaces, Some(poller), bell);
    app.open_first_tab(args.cwd.as_deref())?;

    let input = input::spawn_stdin_reader().context("failed to start stdin reader")?;
    app::run(app, pane_events, input, Some(history_file)).await
}

fn open_db(path: Option<&Path>) -> anyhow::Result<Connection> {
    let path = match path {
        Some(path) if path == Path::new(":memory:") => {
            return tabmux_db::open_in_memory().context("failed to open in-memory database");
        }
        Some(path) => path.to_path_buf(),
        None => {
            let home = std::env::var_os("HOME")
                .map(PathBuf::from)
                .context("could not determine home directory")?;
            let dir = home.join(".tabmux");
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("failed to create {}", dir.display()))?;
            dir.join("tabmux.db")
        }
    };
    tabmux_db::open(&path).with_context(|| format!("failed to open {}", path.display()))
}
