//! Time and timestamp helpers.
//!
//! Timestamps are UTC instants internally; on the wire and in storage they
//! travel as epoch milliseconds.

use chrono::{DateTime, Utc};

/// UTC timestamp used for `last_update`, history entries, event times, etc.
pub type Timestamp = DateTime<Utc>;

/// Return the current UTC time.
#[must_use]
pub fn now() -> Timestamp {
    Utc::now()
}

/// Convert epoch milliseconds into a [`Timestamp`].
///
/// Returns `None` when the value is outside the representable range.
#[must_use]
pub fn from_millis(millis: i64) -> Option<Timestamp> {
    DateTime::from_timestamp_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn should_return_current_utc_time() {
        let before = Utc::now();
        let ts = now();
        let after = Utc::now();
        assert!(ts >= before);
        assert!(ts <= after);
    }

    #[test]
    fn should_roundtrip_through_millis() {
        let ts = from_millis(1_700_000_000_000).unwrap();
        assert_eq!(ts.timestamp_millis(), 1_700_000_000_000);
    }

    #[test]
    fn should_return_none_for_out_of_range_millis() {
        assert!(from_millis(i64::MAX).is_none());
    }
}
