//! Forecast Strategy Constants

/// Forecast data older than this is ignored (hours).
pub const FORECAST_STALE_HOURS: u64 = 6;

/// Outdoor temperature that triggers heat-wave pre-cooling (°C).
pub const HEAT_WAVE_TRIGGER_C: f32 = 30.0;

/// How far ahead heat waves are looked for (hours).
pub const HEAT_WAVE_LOOKAHEAD_HOURS: u64 = 6;

/// Pre-cooling offset for an upcoming heat wave (°C).
pub const HEAT_WAVE_ADJUSTMENT_C: f32 = -1.0;

/// Outdoor temperature that triggers clear-sky pre-cooling (°C).
pub const CLEAR_SKY_TRIGGER_C: f32 = 26.0;

/// How far ahead clear skies are looked for (hours).
pub const CLEAR_SKY_LOOKAHEAD_HOURS: u64 = 3;

/// Pre-cooling offset for strong solar gain (°C).
pub const CLEAR_SKY_ADJUSTMENT_C: f32 = -0.5;

/// Outdoor temperature that triggers cold-snap pre-heating (°C).
pub const COLD_SNAP_TRIGGER_C: f32 = 0.0;

/// How far ahead cold snaps are looked for (hours).
pub const COLD_SNAP_LOOKAHEAD_HOURS: u64 = 6;

/// Pre-heating offset for an upcoming cold snap (°C).
pub const COLD_SNAP_ADJUSTMENT_C: f32 = 1.0;
