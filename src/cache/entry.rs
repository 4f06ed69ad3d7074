//! Expiry Module
//!
//! Models per-entry lifetime as an explicit enum rather than a sentinel
//! timestamp, so "never expires" can never collide with a real deadline.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Sentinel written to the persistent metadata channel for entries without
/// an expiry.
const NEVER_TEXT: &str = "-1";

// == Expiry ==
/// Absolute expiry deadline of a cache entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Expiry {
    /// Lives until evicted for space or explicitly removed
    Never,
    /// Expires once the current time reaches this Unix millisecond timestamp
    At(u64),
}

impl Expiry {
    // == From TTL ==
    /// Resolves a relative TTL against the current time.
    ///
    /// `None` means the entry never expires.
    pub fn from_ttl(ttl: Option<Duration>) -> Self {
        match ttl {
            Some(ttl) => Expiry::At(current_timestamp_ms() + ttl.as_millis() as u64),
            None => Expiry::Never,
        }
    }

    // == Is Expired ==
    /// Checks whether the deadline has passed.
    ///
    /// Boundary condition: an entry is expired once the current time is
    /// greater than or equal to the deadline.
    pub fn is_expired(&self) -> bool {
        match self {
            Expiry::Never => false,
            Expiry::At(deadline) => current_timestamp_ms() >= *deadline,
        }
    }

    // == Channel Text ==
    /// Renders the deadline as the decimal text stored in the persistent
    /// record's metadata channel. `Never` becomes the `-1` sentinel.
    pub fn as_channel_text(&self) -> String {
        match self {
            Expiry::Never => NEVER_TEXT.to_string(),
            Expiry::At(deadline) => deadline.to_string(),
        }
    }

    /// Parses the metadata channel text back into an expiry.
    ///
    /// Returns `None` for anything that is neither the sentinel nor a
    /// non-negative decimal timestamp, so corrupt metadata reads as a miss.
    pub fn parse_channel_text(text: &str) -> Option<Expiry> {
        let text = text.trim();
        if text == NEVER_TEXT {
            return Some(Expiry::Never);
        }
        text.parse::<u64>().ok().map(Expiry::At)
    }
}

// == Utility Functions ==
/// Returns the current Unix timestamp in milliseconds.
pub fn current_timestamp_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or(Duration::ZERO)
        .as_millis() as u64
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use std::thread::sleep;

    #[test]
    fn test_never_does_not_expire() {
        let expiry = Expiry::from_ttl(None);
        assert_eq!(expiry, Expiry::Never);
        assert!(!expiry.is_expired());
    }

    #[test]
    fn test_ttl_resolves_to_future_deadline() {
        let expiry = Expiry::from_ttl(Some(Duration::from_secs(60)));
        match expiry {
            Expiry::At(deadline) => assert!(deadline > current_timestamp_ms()),
            Expiry::Never => panic!("finite ttl must resolve to a deadline"),
        }
        assert!(!expiry.is_expired());
    }

    #[test]
    fn test_short_ttl_expires() {
        let expiry = Expiry::from_ttl(Some(Duration::from_millis(50)));
        assert!(!expiry.is_expired());
        sleep(Duration::from_millis(80));
        assert!(expiry.is_expired());
    }

    #[test]
    fn test_expiry_boundary_condition() {
        let expiry = Expiry::At(current_timestamp_ms());
        assert!(expiry.is_expired(), "entry is expired exactly at the deadline");
    }

    #[test]
    fn test_channel_text_round_trip() {
        assert_eq!(Expiry::Never.as_channel_text(), "-1");
        assert_eq!(Expiry::parse_channel_text("-1"), Some(Expiry::Never));

        let at = Expiry::At(1_700_000_000_000);
        assert_eq!(at.as_channel_text(), "1700000000000");
        assert_eq!(Expiry::parse_channel_text("1700000000000"), Some(at));
    }

    #[test]
    fn test_channel_text_rejects_garbage() {
        assert_eq!(Expiry::parse_channel_text(""), None);
        assert_eq!(Expiry::parse_channel_text("not a number"), None);
        assert_eq!(Expiry::parse_channel_text("-2"), None);
    }
}
