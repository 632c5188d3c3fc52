//! Human-readable byte counts and byte rates (base 1024).

const K: f64 = 1024.0;
const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Fractional digits used by [`format_rate`] and the default card labels.
pub const DEFAULT_DECIMALS: usize = 2;

/// Scale `bytes` to the largest unit in B..TB that keeps the value >= 1
/// and render it with exactly `decimals` fractional digits.
///
/// `0` renders as `"0 B"`. Values past 1024 TB stay in TB.
/// Precondition: `bytes >= 0`.
pub fn format_bytes(bytes: f64, decimals: usize) -> String {
    debug_assert!(bytes >= 0.0, "format_bytes called with negative input");
    if bytes == 0.0 {
        return "0 B".into();
    }
    let (value, unit) = scale(bytes);
    format!("{value:.decimals$} {unit}")
}

/// [`format_bytes`] with the default precision, suffixed with `/s`.
pub fn format_rate(bytes_per_sec: f64) -> String {
    format!("{}/s", format_bytes(bytes_per_sec, DEFAULT_DECIMALS))
}

/// Convenience for integer counters.
pub fn human(b: u64) -> String {
    format_bytes(b as f64, DEFAULT_DECIMALS)
}

// Repeated division instead of log() so the 1024 boundaries are exact.
fn scale(bytes: f64) -> (f64, &'static str) {
    let mut v = bytes;
    let mut i = 0;
    while v >= K && i < UNITS.len() - 1 {
        v /= K;
        i += 1;
    }
    (v, UNITS[i])
}
