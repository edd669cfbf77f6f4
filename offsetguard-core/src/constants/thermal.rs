//! Thermal Model and State Machine Constants
//!
//! Time constants are in minutes. A typical bedroom split unit pulls the room
//! 63% of the way to its target in about an hour and a half; the same room
//! drifts back more slowly once the unit stops.

// ===== TAU =====

/// Default cooling time constant (minutes).
pub const DEFAULT_TAU_COOLING_MIN: f32 = 90.0;

/// Default warming (passive drift) time constant (minutes).
pub const DEFAULT_TAU_WARMING_MIN: f32 = 150.0;

/// Lower clamp for any tau estimate (minutes).
pub const TAU_MIN_MIN: f32 = 5.0;

/// Upper clamp for any tau estimate (minutes).
pub const TAU_MAX_MIN: f32 = 1440.0;

/// Smoothing factor of passive tau refinements.
pub const PASSIVE_TAU_ALPHA: f32 = 0.1;

/// Shortest observation gap used for a passive estimate (minutes).
pub const MIN_PASSIVE_INTERVAL_MIN: f32 = 5.0;

/// Smallest room/environment gap that gives a usable passive estimate (°C).
pub const MIN_PASSIVE_GAP_C: f32 = 0.5;

/// Cap on the accumulated weight of the probe-folded tau estimate.
pub const TAU_WEIGHT_CAP: f32 = 5.0;

/// Weight the default tau starts with before any probe.
pub const TAU_PRIOR_WEIGHT: f32 = 0.5;

// ===== STATE DURATIONS =====

/// Warm-up period after first start (hours).
pub const DEFAULT_PRIMING_HOURS: u64 = 24;

/// Settling period after an HVAC mode change (minutes).
pub const DEFAULT_RECOVERY_MINUTES: u64 = 20;

/// Full length of one probe (minutes).
pub const DEFAULT_PROBE_DURATION_MINUTES: u64 = 120;

/// Samples a probe needs before a tau fit is attempted.
pub const PROBE_MIN_SAMPLES: usize = 4;

// ===== DECISIONS =====

/// Half-width of the comfort band at the Balanced preference (°C).
pub const COMFORT_BAND_HALF_WIDTH_C: f32 = 0.5;

/// How far ahead momentum is projected (minutes).
pub const MOMENTUM_LOOKAHEAD_MIN: f32 = 5.0;
