//! Bounded History Capacities
//!
//! Every history in the core is a fixed-capacity ring. These sizes are the
//! whole memory budget of one device's learned state.

/// Sliding window per outlier channel.
///
/// 50 × 4 bytes per channel.
pub const OUTLIER_WINDOW_SIZE: usize = 50;

/// Room temperatures kept per transition direction.
pub const HYSTERESIS_MAX_SAMPLES: usize = 50;

/// Probe results kept for diagnostics and weighting.
pub const PROBE_HISTORY_SIZE: usize = 5;

/// Seasonal hysteresis patterns kept in addition to age pruning.
pub const SEASONAL_MAX_PATTERNS: usize = 256;

/// Offset samples kept in the engine history.
pub const SAMPLE_HISTORY_SIZE: usize = 200;

/// Pending feedback entries per device.
pub const FEEDBACK_QUEUE_CAPACITY: usize = 8;

/// Resolved forecast points held at once.
pub const MAX_FORECAST_POINTS: usize = 48;

/// Observations in the delay learner's stability window.
pub const DELAY_STABILITY_WINDOW: usize = 4;

/// Samples a single probe session records.
pub const PROBE_SESSION_SAMPLES: usize = 64;
