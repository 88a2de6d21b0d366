//! Line-oriented control protocol read from stdin.
//!
//! Lines starting with `:` are multiplexer commands; `::` escapes a leading
//! colon. Every other line is run as a shell command in the active tab.

use std::path::PathBuf;

use tabmux_pty::{SplitDirection, TabId};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Run a command line in the focused pane of the active tab.
    Run(String),
    NewTab(Option<PathBuf>),
    /// Close a tab, or the active one.
    CloseTab(Option<TabId>),
    SwitchTab(TabId),
    Split(SplitDirection),
    Focus(usize),
    FocusNext,
    /// Ctrl+C to a pane of the active tab, or its focused pane.
    Interrupt(Option<usize>),
    ClearInput,
    /// Type text into the focused pane without pressing Enter.
    Insert(String),
    /// Re-run the n-th most recent history entry.
    Recall(usize),
    Resize { index: usize, cols: u16, rows: u16 },
    Layout { cols: u16, rows: u16 },
    ListTabs,
    History,
    Help,
    Quit,
}

pub const HELP: &str = "\
:new [dir]                 open a tab
:close [tab]               close a tab (default: active)
:tab <tab>                 switch to a tab
:split h|v                 split the active tab
:focus <pane> | :next      focus a pane of the active tab
:int [pane]                send Ctrl+C
:clear                     clear the input line
:insert <text>             type text without running it
:recall <n>                run the n-th history entry (0 = newest)
:resize <pane> <cols> <rows>
:layout <cols> <rows>
:tabs | :history | :help | :quit
::text                     run ':text' as a shell command";

/// Parse one input line.
pub fn parse_line(line: &str) -> Result<Command, String> {
    let line = line.trim_end_matches(['\r', '\n']);
    if let Some(escaped) = line.strip_prefix("::") {
        return Ok(Command::Run(format!(":{escaped}")));
    }
    let Some(rest) = line.strip_prefix(':') else {
        return Ok(Command::Run(line.to_string()));
    };

    let rest = rest.trim();
    let (name, args) = rest
        .split_once(char::is_whitespace)
        .map(|(name, args)| (name, args.trim()))
        .unwrap_or((rest, ""));
    let words: Vec<&str> = args.split_whitespace().collect();

    match name {
        "new" => Ok(Command::NewTab(
            (!args.is_empty()).then(|| PathBuf::from(args)),
        )),
        "close" => Ok(Command::CloseTab(optional(&words, "tab")?.map(TabId))),
        "tab" => Ok(Command::SwitchTab(TabId(required(&words, 0, "tab")?))),
        "split" => {
            let dir = words.first().ok_or("usage: :split h|v")?;
            Ok(Command::Split(dir.parse()?))
        }
        "focus" => Ok(Command::Focus(required(&words, 0, "pane")?)),
        "next" => Ok(Command::FocusNext),
        "int" => Ok(Command::Interrupt(optional(&words, "pane")?)),
        "clear" => Ok(Command::ClearInput),
        "insert" => Ok(Command::Insert(args.to_string())),
        "recall" => Ok(Command::Recall(required(&words, 0, "history index")?)),
        "resize" => Ok(Command::Resize {
            index: required(&words, 0, "pane")?,
            cols: required(&words, 1, "cols")?,
            rows: required(&words, 2, "rows")?,
        }),
        "layout" => Ok(Command::Layout {
            cols: required(&words, 0, "cols")?,
            rows: required(&words, 1, "rows")?,
        }),
        "tabs" => Ok(Command::ListTabs),
        "history" => Ok(Command::History),
        "help" | "?" => Ok(Command::Help),
        "quit" | "q" => Ok(Command::Quit),
        other => Err(format!("unknown command :{other} (try :help)")),
    }
}

fn required<T: std::str::FromStr>(words: &[&str], index: usize, what: &str) -> Result<T, String> {
    let word = words.get(index).ok_or_else(|| format!("missing {what}"))?;
    word.parse().map_err(|_| format!("invalid {what}: {word}"))
}

fn optional<T: std::str::FromStr>(words: &[&str], what: &str) -> Result<Option<T>, String> {
    match words.first() {
        Some(_) => required(words, 0, what).map(Some),
        None => Ok(None),
    }
}
