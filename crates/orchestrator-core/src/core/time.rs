// crates/orchestrator-core/src/core/time.rs
// ============================================================================
// Module: Orchestrator Time Model
// Description: Fixed-width UTC timestamps and a strictly increasing clock.
// Purpose: Give persisted records timestamps whose text order is time order.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! Records store timestamps as text. Every [`UtcTimestamp`] produced here has
//! the same width (`YYYY-MM-DDTHH:MM:SS.ffffffZ`), so lexicographic order in
//! the database equals chronological order. [`MonotonicClock`] never issues
//! the same microsecond twice, which keeps insertion order observable even
//! for writes landing within one clock tick.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::AtomicI64;
use std::sync::atomic::Ordering;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::BorrowedFormatItem;
use time::macros::format_description;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Fixed-width layout shared by every issued timestamp.
const TIMESTAMP_FORMAT: &[BorrowedFormatItem<'static>] = format_description!(
    "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6]Z"
);
/// Text used when an instant cannot be rendered.
const EPOCH_TEXT: &str = "1970-01-01T00:00:00.000000Z";

// ============================================================================
// SECTION: Timestamps
// ============================================================================

/// UTC timestamp in fixed-width RFC 3339 form with microsecond precision.
///
/// # Invariants
/// - Values produced by this module are 27 bytes wide and end in `Z`.
/// - Values read back from storage are carried verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UtcTimestamp(String);

impl UtcTimestamp {
    /// Returns the current wall-clock time.
    #[must_use]
    pub fn now() -> Self {
        Self::from_unix_micros(current_unix_micros())
    }

    /// Formats a unix epoch microsecond count.
    #[must_use]
    pub fn from_unix_micros(micros: i64) -> Self {
        let nanos = i128::from(micros) * 1_000;
        let instant =
            OffsetDateTime::from_unix_timestamp_nanos(nanos).unwrap_or(OffsetDateTime::UNIX_EPOCH);
        Self(instant.format(TIMESTAMP_FORMAT).unwrap_or_else(|_| EPOCH_TEXT.to_string()))
    }

    /// Wraps a timestamp previously written to storage.
    #[must_use]
    pub fn from_stored(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Returns the timestamp text.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for UtcTimestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Clock issuing strictly increasing timestamps.
///
/// # Invariants
/// - Each call to [`MonotonicClock::now`] returns a value greater than every
///   value previously returned by the same clock, across threads.
#[derive(Debug, Default)]
pub struct MonotonicClock {
    /// Last issued unix epoch microsecond count.
    last_micros: AtomicI64,
}

impl MonotonicClock {
    /// Creates a clock that has not issued any timestamp yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            last_micros: AtomicI64::new(0),
        }
    }

    /// Returns the later of wall-clock time and one tick past the last value.
    pub fn now(&self) -> UtcTimestamp {
        UtcTimestamp::from_unix_micros(self.next_micros())
    }

    /// Advances the clock and returns the issued microsecond count.
    fn next_micros(&self) -> i64 {
        let wall = current_unix_micros();
        let advance = |last: i64| wall.max(last.saturating_add(1));
        let previous = match self.last_micros.fetch_update(
            Ordering::AcqRel,
            Ordering::Acquire,
            |last| Some(advance(last)),
        ) {
            Ok(value) | Err(value) => value,
        };
        advance(previous)
    }
}

/// Returns the current unix epoch in microseconds.
fn current_unix_micros() -> i64 {
    let micros = OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000;
    i64::try_from(micros).unwrap_or(i64::MAX)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::MonotonicClock;
    use super::UtcTimestamp;

    #[test]
    fn timestamps_are_fixed_width() {
        let epoch = UtcTimestamp::from_unix_micros(0);
        assert_eq!(epoch.as_str(), "1970-01-01T00:00:00.000000Z");
        let later = UtcTimestamp::from_unix_micros(1_700_000_000_123_456);
        assert_eq!(later.as_str(), "2023-11-14T22:13:20.123456Z");
        assert_eq!(epoch.as_str().len(), later.as_str().len());
    }

    #[test]
    fn subsecond_digits_are_zero_padded() {
        assert_eq!(UtcTimestamp::from_unix_micros(1).as_str(), "1970-01-01T00:00:00.000001Z");
        assert_eq!(
            UtcTimestamp::from_unix_micros(86_400_000_000 + 500_000).as_str(),
            "1970-01-02T00:00:00.500000Z"
        );
    }

    #[test]
    fn clock_never_repeats_a_value() {
        let clock = MonotonicClock::new();
        let mut previous = clock.now();
        for _ in 0 .. 1_000 {
            let next = clock.now();
            assert!(next > previous, "{next} should follow {previous}");
            previous = next;
        }
    }
}
