//! Filtering of the JSON event log by day and file name.

use std::io::{self, BufRead, Write};
use std::path::Path;

use chrono::NaiveDate;
use glob::Pattern;
use serde_json::Value;

use crate::paths::basename;

/// Calendar day format accepted by the `logs` command.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// `pattern` is non-empty and `date` is a `YYYY-MM-DD` day.
pub fn is_valid_filters(date: &str, pattern: &str) -> bool {
    !pattern.is_empty() && NaiveDate::parse_from_str(date, DATE_FORMAT).is_ok()
}

/// Whether a log line was produced on `date` for a file whose basename
/// matches the glob `pattern`.
///
/// Any JSON object works as long as it has string `time` and `path` fields.
pub fn is_entry_match(line: &str, date: &str, pattern: &str) -> bool {
    let Ok(Value::Object(entry)) = serde_json::from_str::<Value>(line) else {
        return false;
    };
    let Some(time) = entry.get("time").and_then(Value::as_str) else {
        return false;
    };
    if !time.starts_with(date) {
        return false;
    }
    let Some(path) = entry.get("path").and_then(Value::as_str) else {
        return false;
    };
    match Pattern::new(pattern) {
        Ok(glob) => glob.matches(&basename(Path::new(path))),
        Err(_) => false,
    }
}

/// Copy every matching non-empty line of `reader` to `out`, trimmed.
/// Returns how many lines matched.
pub fn filter<R: BufRead, W: Write>(reader: R, out: &mut W, date: &str, pattern: &str) -> io::Result<usize> {
    let mut matched = 0;
    for line in reader.lines() {
        let line = line?;
        let entry = line.trim();
        if entry.is_empty() || !is_entry_match(entry, date, pattern) {
            continue;
        }
        writeln!(out, "{entry}")?;
        matched += 1;
    }
    Ok(matched)
}
