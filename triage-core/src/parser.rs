use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::iter::{Enumerate, Peekable};
use std::str::Lines;
use std::sync::LazyLock;

// `[YYYY-MM-DD HH:MM:SS]` at the very start of a line opens a new entry.
pub(crate) static HEADER_REGEX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[(\d{4}-\d{2}-\d{2} \d{2}:\d{2}:\d{2})\]")
        .expect("Failed to compile timestamp header regex")
});

const HEADER_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One log event, possibly spanning several physical lines (stack traces).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub raw_text: String,
    pub timestamp: Option<DateTime<Utc>>,
    /// Zero-based index of the header line in the input.
    pub line_index: usize,
}

impl LogEntry {
    pub fn first_line(&self) -> &str {
        self.raw_text.lines().next().unwrap_or("")
    }
}

/// Returns the header timestamp of `line`, if the line opens an entry.
///
/// A header that matches the shape but not the calendar (`2024-13-45 ...`)
/// still opens an entry; it just carries no timestamp.
pub fn header_timestamp(line: &str) -> Option<Option<DateTime<Utc>>> {
    let caps = HEADER_REGEX.captures(line)?;
    let parsed = NaiveDateTime::parse_from_str(&caps[1], HEADER_FORMAT)
        .ok()
        .map(|naive| naive.and_utc());
    Some(parsed)
}

pub fn is_entry_header(line: &str) -> bool {
    HEADER_REGEX.is_match(line)
}

/// Lazy, single-pass iterator over the entries of a raw log text.
pub struct Entries<'a> {
    lines: Peekable<Enumerate<Lines<'a>>>,
}

impl<'a> Entries<'a> {
    pub fn new(text: &'a str) -> Self {
        Self {
            lines: text.lines().enumerate().peekable(),
        }
    }
}

impl Iterator for Entries<'_> {
    type Item = LogEntry;

    fn next(&mut self) -> Option<LogEntry> {
        // Skip preamble lines that precede any header.
        let (line_index, header_line, timestamp) = loop {
            let (idx, line) = self.lines.next()?;
            if let Some(ts) = header_timestamp(line) {
                break (idx, line, ts);
            }
        };

        let mut raw_text = header_line.to_string();
        while let Some((_, line)) = self.lines.next_if(|(_, l)| !is_entry_header(l)) {
            raw_text.push('\n');
            raw_text.push_str(line);
        }

        Some(LogEntry {
            raw_text,
            timestamp,
            line_index,
        })
    }
}

pub fn parse_entries(text: &str) -> Entries<'_> {
    Entries::new(text)
}
