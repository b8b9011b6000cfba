use chrono::{DateTime, Utc};

/// Current Unix time in milliseconds
pub fn get_current_timestamp_millis() -> u64 {
    // Clamp clocks set before the epoch to zero
    u64::try_from(Utc::now().timestamp_millis()).unwrap_or(0)
}

/// Format a millisecond timestamp as a readable UTC date
pub fn format_timestamp_millis(timestamp: u64) -> String {
    i64::try_from(timestamp)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .unwrap_or_default()
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}
