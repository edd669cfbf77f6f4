//! Learner Parameters
//!
//! Smoothing factors, sample minimums and the weights of the confidence
//! formula.

// ===== OUTLIER DETECTION =====

/// Modified Z-score threshold above which a sample is flagged.
pub const DEFAULT_OUTLIER_SENSITIVITY: f32 = 2.5;

/// Consistency constant of the modified Z-score (Iglewicz & Hoaglin).
pub const MODIFIED_Z_SCALE: f32 = 0.6745;

/// Samples needed before the statistical test is applied.
pub const MIN_OUTLIER_SAMPLES: usize = 3;

/// MAD floor for temperature channels (°C). Compressor cycling alone swings
/// a room by about half a degree.
pub const TEMP_MAD_FLOOR_C: f32 = 0.3;

/// MAD floor for power channels (W).
pub const POWER_MAD_FLOOR_W: f32 = 5.0;

/// Consecutive statistical rejections after which a channel window is
/// considered stale and cleared.
pub const OUTLIER_REGIME_RESET_STREAK: u32 = 10;

// ===== OFFSET LEARNER =====

/// Exponential smoothing factor of the per-hour buckets.
pub const HOURLY_SMOOTHING_ALPHA: f32 = 0.2;

/// Number of time-of-day buckets.
pub const HOUR_BUCKETS: usize = 24;

/// Samples at which a single bucket reaches full confidence.
pub const BUCKET_FULL_CONFIDENCE_SAMPLES: u32 = 10;

/// Samples needed before the outdoor correlation is used.
pub const OUTDOOR_MIN_SAMPLES: u32 = 5;

/// Samples at which the outdoor correlation reaches full confidence.
pub const OUTDOOR_FULL_CONFIDENCE_SAMPLES: u32 = 30;

/// Minimum outdoor temperature variance for a usable slope (°C²).
pub const OUTDOOR_MIN_VARIANCE_C2: f32 = 0.25;

/// Smoothing factor of the running absolute prediction error.
pub const ACCURACY_SMOOTHING_ALPHA: f32 = 0.1;

/// Absolute error that maps to zero accuracy (°C).
pub const ACCURACY_ZERO_ERROR_C: f32 = 2.0;

// ===== HYSTERESIS =====

/// Transitions needed per direction before thresholds are reliable.
pub const HYSTERESIS_MIN_SAMPLES: usize = 5;

/// Age after which seasonal patterns are pruned (days).
pub const SEASONAL_RETENTION_DAYS: u64 = 45;

/// Width of one outdoor temperature bucket for seasonal patterns (°C).
pub const SEASONAL_BUCKET_WIDTH_C: f32 = 5.0;

/// Patterns a bucket needs before its own median is used.
pub const SEASONAL_MIN_BUCKET_PATTERNS: usize = 3;

// ===== CONFIDENCE =====

/// Ceiling of the sample-count term.
pub const CONFIDENCE_BASE_CAP: f32 = 0.5;

/// Divisor applied to `ln(samples + 1)`.
pub const CONFIDENCE_LOG_DIVISOR: f32 = 10.0;

/// Weight of data diversity.
pub const CONFIDENCE_DIVERSITY_WEIGHT: f32 = 0.2;

/// Weight of time-of-day coverage.
pub const CONFIDENCE_TIME_COVERAGE_WEIGHT: f32 = 0.15;

/// Weight of measured accuracy around its neutral 0.5 point.
pub const CONFIDENCE_ACCURACY_WEIGHT: f32 = 0.3;

// ===== FEEDBACK DELAY =====

/// Delay used before anything has been learned (seconds).
pub const DEFAULT_FEEDBACK_DELAY_S: u32 = 45;

/// Smoothing factor for newly measured delays.
pub const DELAY_SMOOTHING_ALPHA: f32 = 0.3;

/// Shortest delay the learner will settle on (seconds).
pub const MIN_FEEDBACK_DELAY_S: u32 = 30;

/// Longest delay the learner will settle on (seconds).
pub const MAX_FEEDBACK_DELAY_S: u32 = 900;

/// Cadence of stabilization observations (seconds).
pub const DELAY_OBSERVATION_INTERVAL_S: u32 = 15;

/// Spread across the stability window that counts as settled (°C).
pub const DELAY_STABILITY_SPREAD_C: f32 = 0.1;

/// Safety margin added to a measured stabilization time (seconds).
pub const DELAY_MARGIN_S: u32 = 30;

/// Give-up time for a learning cycle (seconds).
pub const DELAY_TIMEOUT_S: u32 = 600;

/// Give-up time in heat mode, where heat pumps settle slowly (seconds).
pub const DELAY_HEAT_TIMEOUT_S: u32 = 900;

// ===== SAMPLE HISTORY =====

/// Age after which offset samples are dropped from history (days).
pub const SAMPLE_RETENTION_DAYS: u64 = 30;
