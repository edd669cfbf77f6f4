//! Read-only diagnostic snapshot
//!
//! Exported for dashboards and support; nothing in the core reads it back.

use crate::{
    hysteresis::HysteresisState,
    outlier::OutlierStats,
    thermal::ThermalState,
    time::Timestamp,
};

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct DiagnosticSnapshot {
    pub timestamp: Timestamp,

    // Thermal state machine
    pub thermal_state: ThermalState,
    pub shadow_mode: bool,
    pub tau_cooling_min: f32,
    pub tau_warming_min: f32,
    pub tau_confidence: f32,
    pub probe_count: usize,
    pub last_probe_at: Option<Timestamp>,
    pub probe_active: bool,
    pub next_probe_eligible_at: Timestamp,

    // Offset learner
    pub confidence: f32,
    pub learner_samples: u32,
    pub history_samples: usize,
    pub time_coverage: f32,
    pub diversity: f32,
    pub mean_abs_error_c: Option<f32>,

    // Hysteresis
    pub thresholds: Option<(f32, f32)>,
    pub hysteresis_state: HysteresisState,
    pub thresholds_inverted: bool,
    pub start_samples: usize,
    pub stop_samples: usize,
    pub seasonal_patterns: usize,

    // Feedback
    pub feedback_delay_s: u32,
    pub feedback_cycles_learned: u32,
    pub pending_feedback: usize,

    pub temperature_outliers: OutlierStats,
    pub power_outliers: OutlierStats,

    pub last_offset: Option<f32>,
}

impl DiagnosticSnapshot {
    /// Whether both hysteresis directions and the offset learner have
    /// enough data to drive predictions
    pub fn is_trained(&self) -> bool {
        self.thresholds.is_some() && self.confidence > 0.0
    }
}
