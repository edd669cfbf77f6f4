//! Time handling for the learning core
//!
//! The core never reads a clock. Every operation receives a `Timestamp`
//! (milliseconds since the Unix epoch) from its host, which keeps all
//! decisions deterministic and testable. Wall-clock interpretation (hour of
//! day for the learner buckets, quiet hours for the probe scheduler) goes
//! through `LocalClock`, a fixed UTC offset applied with `chrono`.

use chrono::{DateTime, FixedOffset, Timelike, Utc};

use crate::constants::time::{MS_PER_MINUTE, MS_PER_SECOND};

/// Timestamp in milliseconds since the Unix epoch
pub type Timestamp = u64;

/// Elapsed whole minutes between two timestamps, saturating at zero
pub fn minutes_between(earlier: Timestamp, later: Timestamp) -> f32 {
    later.saturating_sub(earlier) as f32 / MS_PER_MINUTE as f32
}

/// Elapsed seconds between two timestamps, saturating at zero
pub fn seconds_between(earlier: Timestamp, later: Timestamp) -> u64 {
    later.saturating_sub(earlier) / MS_PER_SECOND
}

/// Local wall-clock interpretation of timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct LocalClock {
    /// Offset from UTC in minutes (east positive)
    pub utc_offset_minutes: i32,
}

impl Default for LocalClock {
    fn default() -> Self {
        Self::utc()
    }
}

impl LocalClock {
    /// Clock at UTC
    pub const fn utc() -> Self {
        Self { utc_offset_minutes: 0 }
    }

    /// Clock at a fixed offset from UTC
    pub const fn with_offset_minutes(utc_offset_minutes: i32) -> Self {
        Self { utc_offset_minutes }
    }

    fn local(&self, timestamp: Timestamp) -> Option<DateTime<FixedOffset>> {
        let offset = FixedOffset::east_opt(self.utc_offset_minutes.saturating_mul(60))?;
        let millis = i64::try_from(timestamp).ok()?;
        let utc = DateTime::<Utc>::from_timestamp_millis(millis)?;
        Some(utc.with_timezone(&offset))
    }

    /// Local hour of day (0-23)
    ///
    /// Out-of-range timestamps or offsets fall back to hour 0.
    pub fn hour_of_day(&self, timestamp: Timestamp) -> u8 {
        self.local(timestamp).map(|dt| dt.hour() as u8).unwrap_or(0)
    }

    /// Minutes after local midnight (0-1439)
    pub fn minute_of_day(&self, timestamp: Timestamp) -> u16 {
        self.local(timestamp)
            .map(|dt| (dt.hour() * 60 + dt.minute()) as u16)
            .unwrap_or(0)
    }
}
