//! Common utilities and helper functions
//!
//! This module provides shared utilities used across the application.

pub mod retry;

use chrono::{DateTime, Local, LocalResult, NaiveDateTime, TimeZone};

/// Truncate text to a maximum number of characters, appending `...` when cut
pub fn truncate_text(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        text.to_string()
    } else {
        let truncated: String = text.chars().take(max_chars).collect();
        format!("{truncated}...")
    }
}

/// Interpret a naive wall-clock time in the local zone
///
/// Ambiguous times (DST fold) resolve to the earlier instant; times that do not
/// exist (DST gap) are read as UTC so the caller always gets an instant.
pub fn local_instant(naive: NaiveDateTime) -> DateTime<Local> {
    match Local.from_local_datetime(&naive) {
        LocalResult::Single(t) => t,
        LocalResult::Ambiguous(earliest, _) => earliest,
        LocalResult::None => Local.from_utc_datetime(&naive),
    }
}

/// Format a duration as `1h 02m 03s` for log lines
pub fn format_wait(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    let hours = secs / 3600;
    let mins = (secs % 3600) / 60;
    let secs = secs % 60;

    if hours > 0 {
        format!("{hours}h {mins:02}m {secs:02}s")
    } else if mins > 0 {
        format!("{mins}m {secs:02}s")
    } else {
        format!("{secs}s")
    }
}
