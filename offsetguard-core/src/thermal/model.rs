//! RC thermal model
//!
//! ```text
//! T(t) = T_env + (T_0 − T_env) · e^(−t / tau)
//!
//! passive estimate from two observations Δt apart:
//! tau = −Δt / ln((T_1 − T_env) / (T_0 − T_env))
//! ```
//!
//! Passive estimates are noisy, so they nudge tau with a small smoothing
//! factor. Probe results are folded as a confidence-weighted running mean
//! whose weight is capped; a capped weight keeps later probes meaningful.

use alloc::vec::Vec;

use crate::{
    buffer::RingBuffer,
    constants::{
        buffers::PROBE_HISTORY_SIZE,
        thermal::{
            DEFAULT_TAU_COOLING_MIN, DEFAULT_TAU_WARMING_MIN, MIN_PASSIVE_GAP_C,
            MIN_PASSIVE_INTERVAL_MIN, PASSIVE_TAU_ALPHA, TAU_MAX_MIN, TAU_MIN_MIN,
            TAU_PRIOR_WEIGHT, TAU_WEIGHT_CAP,
        },
    },
    errors::{LearningError, LearningResult},
    stats,
    time::Timestamp,
};

/// Outcome of one probe, full or partial
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ProbeResult {
    /// Measured tau (minutes)
    pub tau_value: f32,
    /// Weight of this result, [0, 1]
    pub confidence: f32,
    /// Probe length (minutes)
    pub duration_minutes: f32,
    /// R² of the log-linear fit
    pub fit_quality: f32,
    pub aborted: bool,
    pub timestamp: Timestamp,
}

impl ProbeResult {
    fn is_valid(&self) -> bool {
        self.tau_value.is_finite()
            && self.tau_value > 0.0
            && self.confidence.is_finite()
            && self.fit_quality.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ThermalModelConfig {
    pub default_tau_cooling_min: f32,
    pub default_tau_warming_min: f32,
    pub tau_min_min: f32,
    pub tau_max_min: f32,
    /// Smoothing factor of passive refinements
    pub passive_alpha: f32,
    /// Cap on the accumulated probe weight
    pub weight_cap: f32,
}

impl Default for ThermalModelConfig {
    fn default() -> Self {
        Self {
            default_tau_cooling_min: DEFAULT_TAU_COOLING_MIN,
            default_tau_warming_min: DEFAULT_TAU_WARMING_MIN,
            tau_min_min: TAU_MIN_MIN,
            tau_max_min: TAU_MAX_MIN,
            passive_alpha: PASSIVE_TAU_ALPHA,
            weight_cap: TAU_WEIGHT_CAP,
        }
    }
}

impl ThermalModelConfig {
    pub fn validate(&self) -> LearningResult<()> {
        if !(self.tau_min_min > 0.0 && self.tau_min_min < self.tau_max_min) {
            return Err(LearningError::InvalidConfig {
                field: "thermal.model.tau_bounds",
                reason: "need 0 < tau_min < tau_max",
            });
        }
        if !(self.passive_alpha > 0.0 && self.passive_alpha <= 1.0) || !(self.weight_cap > 0.0) {
            return Err(LearningError::InvalidConfig {
                field: "thermal.model",
                reason: "alpha must be in (0, 1] and weight cap positive",
            });
        }
        Ok(())
    }

    fn clamp_tau(&self, tau: f32) -> f32 {
        tau.clamp(self.tau_min_min, self.tau_max_min)
    }
}

/// Tau with the weight of evidence behind it
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TauEstimate {
    /// Minutes
    pub value: f32,
    pub weight: f32,
}

impl TauEstimate {
    fn prior(value: f32) -> Self {
        Self {
            value,
            weight: TAU_PRIOR_WEIGHT,
        }
    }

    fn fold(&mut self, value: f32, weight: f32, cap: f32) {
        let total = self.weight + weight;
        if total <= 0.0 {
            return;
        }
        self.value = (self.value * self.weight + value * weight) / total;
        self.weight = total.min(cap);
    }

    /// Share of the weight cap reached, [0, 1]
    pub fn confidence(&self, cap: f32) -> f32 {
        stats::unit_clamp(self.weight / cap)
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ThermalModelSnapshot {
    pub tau_cooling: Option<TauEstimate>,
    pub tau_warming: Option<TauEstimate>,
    pub probe_history: Vec<ProbeResult>,
    pub passive_updates: u32,
}

/// Learned RC time constants of one room
#[derive(Debug, Clone)]
pub struct ThermalModel {
    config: ThermalModelConfig,
    cooling: TauEstimate,
    warming: TauEstimate,
    probe_history: RingBuffer<ProbeResult, PROBE_HISTORY_SIZE>,
    passive_updates: u32,
}

impl Default for ThermalModel {
    fn default() -> Self {
        Self::new(ThermalModelConfig::default())
    }
}

impl ThermalModel {
    pub fn new(config: ThermalModelConfig) -> Self {
        Self {
            cooling: TauEstimate::prior(config.clamp_tau(config.default_tau_cooling_min)),
            warming: TauEstimate::prior(config.clamp_tau(config.default_tau_warming_min)),
            config,
            probe_history: RingBuffer::new(),
            passive_updates: 0,
        }
    }

    /// Tau while conditioning (minutes)
    pub fn tau_cooling(&self) -> f32 {
        self.cooling.value
    }

    /// Tau while drifting (minutes)
    pub fn tau_warming(&self) -> f32 {
        self.warming.value
    }

    /// Confidence of the probe-measured estimate
    pub fn tau_confidence(&self) -> f32 {
        self.warming.confidence(self.config.weight_cap)
    }

    /// Projected room temperature `minutes` from now
    pub fn predict_temperature(
        &self,
        current: f32,
        environment: f32,
        minutes: f32,
        conditioning: bool,
    ) -> f32 {
        let tau = if conditioning { self.cooling.value } else { self.warming.value };
        environment + (current - environment) * libm::expf(-minutes.max(0.0) / tau)
    }

    /// Tau from two observations, or `None` when they carry no usable signal
    pub fn estimate_tau(&self, t0: f32, t1: f32, environment: f32, minutes: f32) -> Option<f32> {
        if minutes < MIN_PASSIVE_INTERVAL_MIN || libm::fabsf(t0 - environment) < MIN_PASSIVE_GAP_C {
            return None;
        }

        let ratio = (t1 - environment) / (t0 - environment);
        if !(ratio > 0.0 && ratio < 1.0) {
            return None;
        }

        Some(self.config.clamp_tau(-minutes / libm::logf(ratio)))
    }

    /// Nudge tau with a passive observation pair
    ///
    /// Returns the refined tau, or `OutOfRange` (carrying the decay ratio)
    /// when the pair is unusable.
    pub fn update_passive(
        &mut self,
        t0: f32,
        t1: f32,
        environment: f32,
        minutes: f32,
        conditioning: bool,
    ) -> LearningResult<f32> {
        let estimate = self.estimate_tau(t0, t1, environment, minutes).ok_or(
            LearningError::OutOfRange {
                value: (t1 - environment) / (t0 - environment),
                min: 0.0,
                max: 1.0,
            },
        )?;

        let alpha = self.config.passive_alpha;
        let target = if conditioning { &mut self.cooling } else { &mut self.warming };
        target.value = self.config.clamp_tau(stats::smooth(target.value, estimate, alpha));
        self.passive_updates = self.passive_updates.saturating_add(1);

        Ok(target.value)
    }

    /// Fold a probe result into tau_warming and keep it in history
    pub fn apply_probe(&mut self, result: &ProbeResult) -> LearningResult<()> {
        if !result.is_valid() {
            return Err(LearningError::OutOfRange {
                value: result.tau_value,
                min: self.config.tau_min_min,
                max: self.config.tau_max_min,
            });
        }

        let tau = self.config.clamp_tau(result.tau_value);
        let weight = stats::unit_clamp(result.confidence);
        self.warming.fold(tau, weight, self.config.weight_cap);
        self.probe_history.push(*result);

        log_info!(
            "probe folded: tau {} min (confidence {}), estimate now {} min",
            tau,
            weight,
            self.warming.value
        );
        Ok(())
    }

    pub fn probe_history(&self) -> impl Iterator<Item = &ProbeResult> {
        self.probe_history.iter()
    }

    pub fn last_probe(&self) -> Option<&ProbeResult> {
        self.probe_history.last()
    }

    pub fn passive_updates(&self) -> u32 {
        self.passive_updates
    }

    pub fn snapshot(&self) -> ThermalModelSnapshot {
        ThermalModelSnapshot {
            tau_cooling: Some(self.cooling),
            tau_warming: Some(self.warming),
            probe_history: self.probe_history.to_vec(),
            passive_updates: self.passive_updates,
        }
    }

    /// Restore learned tau, falling back to defaults for missing or corrupt values
    pub fn restore(&mut self, snapshot: &ThermalModelSnapshot) {
        let valid = |e: &TauEstimate| e.value.is_finite() && e.value > 0.0 && e.weight.is_finite() && e.weight >= 0.0;
        let cap = self.config.weight_cap;
        let config = self.config;
        let sanitize = |e: TauEstimate| TauEstimate {
            value: config.clamp_tau(e.value),
            weight: e.weight.min(cap),
        };

        if let Some(cooling) = snapshot.tau_cooling.filter(valid) {
            self.cooling = sanitize(cooling);
        }
        if let Some(warming) = snapshot.tau_warming.filter(valid) {
            self.warming = sanitize(warming);
        }

        let history: Vec<ProbeResult> = snapshot.probe_history.iter().copied().filter(ProbeResult::is_valid).collect();
        self.probe_history = RingBuffer::from_slice(&history);
        self.passive_updates = snapshot.passive_updates;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn probe(tau: f32, confidence: f32) -> ProbeResult {
        ProbeResult {
            tau_value: tau,
            confidence,
            duration_minutes: 120.0,
            fit_quality: 0.95,
            aborted: false,
            timestamp: 0,
        }
    }

    #[test]
    fn defaults() {
        let model = ThermalModel::default();
        assert_eq!(model.tau_cooling(), 90.0);
        assert_eq!(model.tau_warming(), 150.0);
        assert!(model.tau_confidence() < 0.2);
    }

    #[test]
    fn rc_prediction() {
        let model = ThermalModel::default();
        // One tau of drift closes 63% of the gap
        let t = model.predict_temperature(22.0, 32.0, 150.0, false);
        assert!((t - (32.0 - 10.0 * libm::expf(-1.0))).abs() < 1e-4);
        assert_eq!(model.predict_temperature(22.0, 32.0, 0.0, false), 22.0);
    }

    #[test]
    fn passive_estimate_inverts_rc() {
        let model = ThermalModel::default();
        // 30 minutes with tau 100: ratio e^(-0.3)
        let t1 = 32.0 - 10.0 * libm::expf(-0.3);
        let tau = model.estimate_tau(22.0, t1, 32.0, 30.0).unwrap();
        assert!((tau - 100.0).abs() < 0.5);
    }

    #[test]
    fn passive_estimate_refuses_bad_pairs() {
        let model = ThermalModel::default();
        // Moving away from the environment
        assert!(model.estimate_tau(22.0, 21.0, 32.0, 30.0).is_none());
        // Too close to the environment
        assert!(model.estimate_tau(31.8, 31.9, 32.0, 30.0).is_none());
        // Too short an interval
        assert!(model.estimate_tau(22.0, 22.1, 32.0, 1.0).is_none());
    }

    #[test]
    fn passive_update_smooths() {
        let mut model = ThermalModel::default();
        let t1 = 32.0 - 10.0 * libm::expf(-0.3);
        let tau = model.update_passive(22.0, t1, 32.0, 30.0, false).unwrap();
        // 0.1 × 100 + 0.9 × 150
        assert!((tau - 145.0).abs() < 0.1);
        assert_eq!(model.passive_updates(), 1);
        assert_eq!(model.tau_cooling(), 90.0);

        assert!(model.update_passive(22.0, 21.0, 32.0, 30.0, false).is_err());
    }

    #[test]
    fn probes_average_never_overwrite() {
        let mut model = ThermalModel::default();
        model.apply_probe(&probe(100.0, 1.0)).unwrap();
        // (150 × 0.5 + 100 × 1.0) / 1.5
        assert!((model.tau_warming() - 116.67).abs() < 0.01);
        assert!(model.tau_confidence() > 0.2);
    }

    #[test]
    fn weight_cap_keeps_model_adaptive() {
        let mut model = ThermalModel::default();
        for _ in 0..20 {
            model.apply_probe(&probe(100.0, 1.0)).unwrap();
        }
        assert!((model.tau_warming() - 100.0).abs() < 0.5);
        assert_eq!(model.tau_confidence(), 1.0);

        model.apply_probe(&probe(200.0, 1.0)).unwrap();
        // A single new probe still moves the estimate by about a sixth
        assert!(model.tau_warming() > 110.0);
    }

    #[test]
    fn history_bounded() {
        let mut model = ThermalModel::default();
        for i in 0..9 {
            model.apply_probe(&probe(100.0 + i as f32, 0.8)).unwrap();
        }
        assert_eq!(model.probe_history().count(), PROBE_HISTORY_SIZE);
        assert_eq!(model.last_probe().unwrap().tau_value, 108.0);
    }

    #[test]
    fn rejects_invalid_probe() {
        let mut model = ThermalModel::default();
        assert!(model.apply_probe(&probe(f32::NAN, 1.0)).is_err());
        assert!(model.apply_probe(&probe(-5.0, 1.0)).is_err());
        assert_eq!(model.tau_warming(), 150.0);
    }

    #[test]
    fn snapshot_restore() {
        let mut model = ThermalModel::default();
        model.apply_probe(&probe(120.0, 0.9)).unwrap();

        let mut restored = ThermalModel::default();
        restored.restore(&model.snapshot());
        assert_eq!(restored.tau_warming(), model.tau_warming());
        assert_eq!(restored.probe_history().count(), 1);

        let mut fresh = ThermalModel::default();
        fresh.restore(&ThermalModelSnapshot::default());
        assert_eq!(fresh.tau_warming(), 150.0);
    }
}
