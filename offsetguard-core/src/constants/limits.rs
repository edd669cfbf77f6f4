//! Offset Clamps and Hard Input Bounds
//!
//! The hard bounds double as the `OutOfRange` contract: any reading outside
//! them is treated as an outlier and never reaches a learner.

// ===== OFFSET LIMITS =====

/// Default maximum magnitude of the setpoint offset (°C).
///
/// Offsets beyond ±5 °C usually mean a broken sensor rather than a badly
/// placed one.
pub const DEFAULT_MAX_OFFSET_C: f32 = 5.0;

/// Default maximum change of the applied offset per control cycle (°C).
pub const DEFAULT_GRADUAL_ADJUSTMENT_RATE_C: f32 = 0.5;

/// Maximum share of the final offset that may come from the learned model.
///
/// Even a fully confident learner leaves 20% to the rule-based baseline.
pub const MAX_LEARNED_WEIGHT: f32 = 0.8;

// ===== CHANNEL BOUNDS =====

/// Lowest plausible indoor temperature reading (°C).
pub const ROOM_TEMP_MIN_C: f32 = -10.0;

/// Highest plausible indoor temperature reading (°C).
pub const ROOM_TEMP_MAX_C: f32 = 50.0;

/// Lowest plausible power reading (W).
pub const POWER_MIN_W: f32 = 0.0;

/// Highest plausible power reading for a residential unit (W).
pub const POWER_MAX_W: f32 = 5000.0;

/// Largest offset magnitude a learner accepts (°C).
///
/// The widest gap two in-bounds temperature readings can have.
pub const LEARNED_OFFSET_LIMIT_C: f32 = ROOM_TEMP_MAX_C - ROOM_TEMP_MIN_C;

// ===== POWER CLASSIFICATION =====

/// Draw below which the device is considered idle (W).
pub const DEFAULT_POWER_IDLE_THRESHOLD_W: f32 = 50.0;

/// Margin around the idle threshold to avoid flapping classifications (W).
pub const DEFAULT_POWER_CLASSIFIER_MARGIN_W: f32 = 10.0;

// ===== MODE ADJUSTMENTS =====

/// Setpoint relaxation applied in sleep mode (°C, signed by HVAC direction).
pub const DEFAULT_SLEEP_ADJUSTMENT_C: f32 = 1.0;

/// Setpoint relaxation applied in away mode (°C, signed by HVAC direction).
pub const DEFAULT_AWAY_ADJUSTMENT_C: f32 = 2.0;

/// Extra push applied in boost mode (°C, signed by HVAC direction).
pub const DEFAULT_BOOST_ADJUSTMENT_C: f32 = 2.0;
