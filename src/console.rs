use crate::log_entry::{LogEntry, LogLevel};
use crate::log_source::LogSnapshot;
use chrono::{DateTime, Local};
use std::collections::HashSet;
use std::fmt::Write;

const RESET: &str = "\x1b[0m";

pub const HELP: &str =
    "Commands: r = refresh, c = copy logs, e <n> = toggle details of entry n, q = quit";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Refresh,
    Copy,
    Toggle(usize),
    Help,
    Quit,
    Unknown(String),
}

pub fn parse_command(line: &str) -> Command {
    let mut parts = line.split_whitespace();
    match (parts.next(), parts.next()) {
        (Some("r"), None) => Command::Refresh,
        (Some("c"), None) => Command::Copy,
        (Some("q"), None) => Command::Quit,
        (Some("h") | Some("?"), None) => Command::Help,
        (Some("e"), Some(n)) => match n.parse::<usize>() {
            Ok(n) if n > 0 => Command::Toggle(n),
            _ => Command::Unknown(line.trim().to_string()),
        },
        _ => Command::Unknown(line.trim().to_string()),
    }
}

fn level_color(level: LogLevel) -> &'static str {
    match level {
        LogLevel::Info => "\x1b[34m",
        LogLevel::Warning => "\x1b[33m",
        LogLevel::Error => "\x1b[31m",
        LogLevel::Debug => "\x1b[90m",
    }
}

/// Shows the server's timestamp in local time, or verbatim if it does not parse.
fn display_time(timestamp: &str) -> String {
    match DateTime::parse_from_rfc3339(timestamp) {
        Ok(ts) => ts.with_timezone(&Local).format("%H:%M:%S %Y-%m-%d").to_string(),
        Err(_) => timestamp.to_string(),
    }
}

/// Terminal rendering of a snapshot plus which entries have their details open.
pub struct ConsoleView {
    color: bool,
    expanded: HashSet<String>,
}

impl ConsoleView {
    pub fn new(color: bool) -> Self {
        Self {
            color,
            expanded: HashSet::new(),
        }
    }

    /// Flips the details of the 1-based entry `n`. Returns false when there
    /// is nothing to expand.
    pub fn toggle(&mut self, n: usize, entries: &[LogEntry]) -> bool {
        let Some(entry) = n.checked_sub(1).and_then(|i| entries.get(i)) else {
            return false;
        };
        if !entry.has_details() {
            return false;
        }
        if !self.expanded.remove(&entry.id) {
            self.expanded.insert(entry.id.clone());
        }
        true
    }

    pub fn is_expanded(&self, entry: &LogEntry) -> bool {
        entry.has_details() && self.expanded.contains(&entry.id)
    }

    pub fn render(&self, snap: &LogSnapshot, now: DateTime<Local>) -> String {
        let mut out = String::from("Console Logs\n");

        if snap.is_loading && snap.entries.is_empty() {
            out.push_str("Loading logs...\n");
        } else if let Some(ref err) = snap.last_error {
            let _ = writeln!(out, "Failed to load logs\n{}\nType 'r' to try again.", err);
        } else if snap.entries.is_empty() {
            out.push_str("No logs available\n");
        } else {
            for (i, entry) in snap.entries.iter().enumerate() {
                self.render_entry(&mut out, i + 1, entry);
            }
        }

        let count = snap.entries.len();
        let noun = if count == 1 { "entry" } else { "entries" };
        let status = if snap.is_loading {
            "Updating...".to_string()
        } else {
            format!("Last updated: {}", now.format("%H:%M:%S"))
        };
        let _ = writeln!(out, "{} {} | {}", count, noun, status);

        out
    }

    fn render_entry(&self, out: &mut String, n: usize, entry: &LogEntry) {
        let expanded = self.is_expanded(entry);
        let marker = match (entry.has_details(), expanded) {
            (false, _) => ' ',
            (true, false) => '>',
            (true, true) => 'v',
        };
        let level = entry.level.as_str().to_uppercase();
        let level = if self.color {
            format!("{}{}{}", level_color(entry.level), level, RESET)
        } else {
            level
        };

        let _ = writeln!(
            out,
            "{:>3} {} {} {} {}",
            n,
            marker,
            level,
            display_time(&entry.timestamp),
            entry.message
        );

        if expanded {
            let details = serde_json::to_string_pretty(&entry.details).unwrap_or_default();
            for line in details.lines() {
                let _ = writeln!(out, "        {}", line);
            }
        }
    }
}
