//! Probe Scheduling Constants

use super::time::MINUTES_PER_HOUR;

// ===== INTERVALS =====

/// Minimum hours between probes for the Comfort profile.
pub const COMFORT_MIN_INTERVAL_HOURS: u64 = 24;

/// Minimum hours between probes for the Balanced profile.
pub const BALANCED_MIN_INTERVAL_HOURS: u64 = 12;

/// Minimum hours between probes for the Aggressive profile.
pub const AGGRESSIVE_MIN_INTERVAL_HOURS: u64 = 6;

/// Days after which a probe is forced regardless of opportunity.
pub const MAX_PROBE_INTERVAL_DAYS: u64 = 7;

// ===== QUIET HOURS =====

/// Start of the default quiet-hours window (minutes after local midnight).
pub const QUIET_HOURS_START_MINUTE: u16 = 22 * MINUTES_PER_HOUR as u16;

/// End of the default quiet-hours window (minutes after local midnight).
pub const QUIET_HOURS_END_MINUTE: u16 = 7 * MINUTES_PER_HOUR as u16;

// ===== INFORMATION GAIN =====

/// Probes per outdoor bucket after which another probe adds little.
pub const INFO_GAIN_PROBES_PER_BUCKET: u16 = 3;

/// Upper edges of the outdoor temperature buckets (°C). The last bucket is open.
pub const OUTDOOR_BUCKET_EDGES_C: [f32; 5] = [-10.0, 0.0, 10.0, 20.0, 30.0];

/// Number of outdoor temperature buckets.
pub const OUTDOOR_BUCKET_COUNT: usize = OUTDOOR_BUCKET_EDGES_C.len() + 1;

// ===== ABORTS =====

/// Outdoor swing during a probe that invalidates it (°C).
pub const OUTDOOR_SWING_ABORT_C: f32 = 5.0;

/// Minimum probe length worth keeping after an abort (minutes).
pub const PARTIAL_PROBE_MIN_MINUTES: u64 = 15;

/// Confidence multiplier applied to partial probe data.
pub const PARTIAL_PROBE_CONFIDENCE_FACTOR: f32 = 0.5;

// ===== PERSISTENCE =====

/// Default cadence of state saves (minutes).
pub const DEFAULT_SAVE_INTERVAL_MINUTES: u64 = 30;
