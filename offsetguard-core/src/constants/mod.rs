//! Constants for OffsetGuard Core
//!
//! Every numeric default used by the learners, the thermal state machine and
//! the probe scheduler is defined here, with units in the name.
//!
//! ## Organization
//!
//! - **Limits**: Offset clamps and hard physical bounds of each input channel
//! - **Learning**: Smoothing factors, sample minimums, confidence weights
//! - **Thermal**: Tau defaults and state durations
//! - **Scheduling**: Probe intervals, quiet hours, abort thresholds
//! - **Forecast**: Predictive strategy triggers and adjustments
//! - **Buffers**: Capacities of every bounded history
//! - **Time**: Unit conversions
//!
//! Component configs take their `Default` values from these constants, so a
//! deployment overrides behaviour through configuration, never by editing code.

/// Offset clamps and hard bounds of input channels.
pub mod limits;

/// Learner smoothing factors, minimum sample counts and confidence weights.
pub mod learning;

/// Thermal model defaults and state machine durations.
pub mod thermal;

/// Probe scheduling intervals and abort thresholds.
pub mod scheduling;

/// Forecast strategy thresholds.
pub mod forecast;

/// Capacities of bounded histories.
pub mod buffers;

/// Time unit conversions.
pub mod time;

pub use limits::{
    DEFAULT_MAX_OFFSET_C, DEFAULT_GRADUAL_ADJUSTMENT_RATE_C,
    ROOM_TEMP_MIN_C, ROOM_TEMP_MAX_C, POWER_MIN_W, POWER_MAX_W,
};

pub use buffers::{
    OUTLIER_WINDOW_SIZE, HYSTERESIS_MAX_SAMPLES, PROBE_HISTORY_SIZE,
    SEASONAL_MAX_PATTERNS, SAMPLE_HISTORY_SIZE,
};

pub use time::{MS_PER_SECOND, MS_PER_MINUTE, MS_PER_HOUR, MS_PER_DAY};
