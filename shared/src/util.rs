/// Current UTC timestamp in milliseconds.
///
/// All stored timestamps (pending queue, dead letter, sweep windows) use
/// this representation.
pub fn now_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

/// Format a millisecond timestamp as RFC 3339 for API query parameters.
///
/// Falls back to the Unix epoch for out-of-range values.
pub fn millis_to_rfc3339(millis: i64) -> String {
    chrono::DateTime::from_timestamp_millis(millis)
        .unwrap_or_else(|| chrono::DateTime::from_timestamp_millis(0).expect("epoch is valid"))
        .to_rfc3339()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_millis_to_rfc3339() {
        assert_eq!(millis_to_rfc3339(0), "1970-01-01T00:00:00+00:00");
        // Out-of-range values clamp to the epoch instead of panicking
        assert_eq!(millis_to_rfc3339(i64::MAX), "1970-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_now_millis_monotonic_enough() {
        let a = now_millis();
        let b = now_millis();
        assert!(b >= a);
    }
}
