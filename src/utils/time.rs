use chrono::{DateTime, Utc};

/// Milliseconds since the Unix epoch for `instant`.
pub fn epoch_millis(instant: DateTime<Utc>) -> i64 {
    instant.timestamp_millis()
}

/// `mm:ss` rendering used by the shell for countdowns.
pub fn format_clock(seconds: u64) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

/// Compact human duration: `42s`, `12m 5s`, `2h 3m`.
pub fn format_duration(seconds: u64) -> String {
    if seconds < 60 {
        return format!("{seconds}s");
    }
    let minutes = seconds / 60;
    let secs = seconds % 60;
    if minutes < 60 {
        return if secs > 0 {
            format!("{minutes}m {secs}s")
        } else {
            format!("{minutes}m")
        };
    }
    format!("{}h {}m", minutes / 60, minutes % 60)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clock_pads_minutes_and_seconds() {
        assert_eq!(format_clock(0), "00:00");
        assert_eq!(format_clock(25 * 60), "25:00");
        assert_eq!(format_clock(61), "01:01");
    }

    #[test]
    fn duration_picks_largest_units() {
        assert_eq!(format_duration(42), "42s");
        assert_eq!(format_duration(600), "10m");
        assert_eq!(format_duration(725), "12m 5s");
        assert_eq!(format_duration(2 * 3600 + 3 * 60 + 9), "2h 3m");
    }
}
