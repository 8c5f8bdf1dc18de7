//! # Utility Functions and Helper Module
//!
//! Small helpers used throughout flood: human-readable formatting of
//! latencies, wall-clock timestamps for reports, and the escape handling
//! shared by substitution files and configured extra headers.
//!
//! ## Usage Examples
//!
//! ```rust
//! use flood::utils::*;
//! use std::time::Duration;
//!
//! assert_eq!(format_duration(Duration::from_micros(1500)), "1.50ms");
//! assert_eq!(unescape(r"a\tb"), "a\tb");
//! assert_eq!(split_list(" x, y ,z"), vec!["x", "y", "z"]);
//! ```

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Get the current wall-clock time as microseconds since the Unix epoch
///
/// Reports print timestamps in microseconds, the resolution request timers
/// are kept at.
///
/// ## Error Handling
///
/// If the system time is before the Unix epoch, returns 0 rather than
/// panicking.
pub fn current_timestamp_us() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_micros() as i64
}

/// Convert nanoseconds to a human-readable duration string
///
/// Convenience wrapper around [`format_duration`] for histogram values.
///
/// ## Examples
///
/// ```rust
/// # use flood::utils::format_duration_ns;
/// assert_eq!(format_duration_ns(500), "500ns");
/// assert_eq!(format_duration_ns(1500), "1.50μs");
/// assert_eq!(format_duration_ns(1500000), "1.50ms");
/// ```
pub fn format_duration_ns(ns: u64) -> String {
    format_duration(Duration::from_nanos(ns))
}

/// Format a duration in a human-readable way
///
/// ## Unit Selection Logic
///
/// - **Nanoseconds**: < 1,000 ns (e.g., "500ns")
/// - **Microseconds**: < 1,000,000 ns (e.g., "1.50μs")
/// - **Milliseconds**: < 1,000,000,000 ns (e.g., "25.75ms")
/// - **Seconds**: < 60 seconds (e.g., "5.25s")
/// - **Minutes and Hours**: for longer durations (e.g., "5m 30s", "2h 15m 30s")
///
/// ## Examples
///
/// ```rust
/// # use flood::utils::format_duration;
/// # use std::time::Duration;
/// assert_eq!(format_duration(Duration::from_nanos(750)), "750ns");
/// assert_eq!(format_duration(Duration::from_micros(2500)), "2.50ms");
/// assert_eq!(format_duration(Duration::from_secs(90)), "1m 30s");
/// ```
pub fn format_duration(duration: Duration) -> String {
    let total_ns = duration.as_nanos();

    if total_ns < 1_000 {
        format!("{}ns", total_ns)
    } else if total_ns < 1_000_000 {
        format!("{:.2}μs", total_ns as f64 / 1_000.0)
    } else if total_ns < 1_000_000_000 {
        format!("{:.2}ms", total_ns as f64 / 1_000_000.0)
    } else if total_ns < 60_000_000_000 {
        format!("{:.2}s", total_ns as f64 / 1_000_000_000.0)
    } else {
        let seconds = duration.as_secs();
        let minutes = seconds / 60;
        let remaining_seconds = seconds % 60;

        if minutes < 60 {
            format!("{}m {}s", minutes, remaining_seconds)
        } else {
            let hours = minutes / 60;
            let remaining_minutes = minutes % 60;
            format!("{}h {}m {}s", hours, remaining_minutes, remaining_seconds)
        }
    }
}

/// Convert a configured number of seconds into whole microseconds
///
/// Delay attributes are written in (possibly fractional) seconds.
/// Negative and non-finite values are rejected by returning `None`.
///
/// ```rust
/// # use flood::utils::seconds_to_micros;
/// assert_eq!(seconds_to_micros("2"), Some(2_000_000));
/// assert_eq!(seconds_to_micros("0.25"), Some(250_000));
/// assert_eq!(seconds_to_micros("-1"), None);
/// assert_eq!(seconds_to_micros("soon"), None);
/// ```
pub fn seconds_to_micros(value: &str) -> Option<i64> {
    let seconds: f64 = value.trim().parse().ok()?;
    if !seconds.is_finite() || seconds < 0.0 {
        return None;
    }
    Some((seconds * 1_000_000.0).round() as i64)
}

/// Split a comma-separated list, trimming whitespace around each item
///
/// Empty input yields an empty list; interior empty items are preserved so
/// that `"a,,b"` still has three entries.
pub fn split_list(list: &str) -> Vec<String> {
    if list.trim().is_empty() {
        return Vec::new();
    }
    list.split(',').map(|item| item.trim().to_string()).collect()
}

/// Resolve backslash escapes in configured text
///
/// Substitution-file entries and extra headers are single lines in their
/// source, so multi-line content is written with escapes.
///
/// ## Supported Escapes
///
/// - `\n`, `\r`, `\t`: newline, carriage return, tab
/// - `\NNN`: up to three decimal digits giving a byte value; `\0` is kept
///   literally as a backslash followed by `0`
/// - any other escaped character stands for itself (`\\` is a backslash)
/// - a trailing lone backslash is dropped
///
/// ## Examples
///
/// ```rust
/// # use flood::utils::unescape;
/// assert_eq!(unescape(r"line1\nline2"), "line1\nline2");
/// assert_eq!(unescape(r"\065BC"), "ABC");
/// assert_eq!(unescape(r"keep\0"), "keep\\0");
/// ```
pub fn unescape(input: &str) -> String {
    let bytes = input.as_bytes();
    let mut out: Vec<u8> = Vec::with_capacity(bytes.len());
    let mut i = 0;

    while i < bytes.len() {
        if bytes[i] != b'\\' {
            out.push(bytes[i]);
            i += 1;
            continue;
        }

        i += 1;
        let Some(&escaped) = bytes.get(i) else {
            break;
        };

        if escaped.is_ascii_digit() {
            let mut value: u32 = 0;
            let mut digits = 0;
            while digits < 3 && i < bytes.len() && bytes[i].is_ascii_digit() {
                value = value * 10 + u32::from(bytes[i] - b'0');
                i += 1;
                digits += 1;
            }
            if value == 0 {
                out.extend_from_slice(b"\\0");
            } else {
                out.push((value & 0xFF) as u8);
            }
            continue;
        }

        out.push(match escaped {
            b'n' => b'\n',
            b'r' => b'\r',
            b't' => b'\t',
            other => other,
        });
        i += 1;
    }

    String::from_utf8_lossy(&out).into_owned()
}
