//! Power-transition threshold learner
//!
//! Records the room temperature at every externally classified power
//! transition into one bounded FIFO per direction. Thresholds are the medians
//! of those FIFOs once each holds the minimum sample count.

use alloc::vec::Vec;

use crate::{
    buffer::RingBuffer,
    constants::{buffers::HYSTERESIS_MAX_SAMPLES, learning::HYSTERESIS_MIN_SAMPLES},
    errors::{LearningError, LearningResult},
    stats,
    types::{PowerState, TransitionDirection},
};

/// Context label derived from power state and learned thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum HysteresisState {
    /// Thresholds not yet reliable, or no power classification available
    #[default]
    LearningHysteresis,
    /// Device is actively conditioning
    ActivePhase,
    /// Idle with the room past the start threshold - a start is imminent
    IdleAboveStartThreshold,
    /// Idle with the room below the stop threshold - just finished a cycle
    IdleBelowStopThreshold,
    /// Idle between the thresholds
    IdleStableZone,
}

impl HysteresisState {
    /// Every label, in partition order
    pub const ALL: [HysteresisState; 5] = [
        Self::LearningHysteresis,
        Self::ActivePhase,
        Self::IdleAboveStartThreshold,
        Self::IdleBelowStopThreshold,
        Self::IdleStableZone,
    ];

    /// Number of labels
    pub const COUNT: usize = Self::ALL.len();

    /// Partition index used by the offset learner
    pub fn index(&self) -> usize {
        match self {
            Self::LearningHysteresis => 0,
            Self::ActivePhase => 1,
            Self::IdleAboveStartThreshold => 2,
            Self::IdleBelowStopThreshold => 3,
            Self::IdleStableZone => 4,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::LearningHysteresis => "learning_hysteresis",
            Self::ActivePhase => "active_phase",
            Self::IdleAboveStartThreshold => "idle_above_start_threshold",
            Self::IdleBelowStopThreshold => "idle_below_stop_threshold",
            Self::IdleStableZone => "idle_stable_zone",
        }
    }
}

/// Learned thresholds with their backing sample count
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HysteresisThresholds {
    /// Median room temperature at idle→active transitions (°C)
    pub start_temp_median: f32,
    /// Median room temperature at active→idle transitions (°C)
    pub stop_temp_median: f32,
    /// Transitions backing the medians (both directions)
    pub sample_count: usize,
}

impl HysteresisThresholds {
    /// Gap between start and stop thresholds
    pub fn delta(&self) -> f32 {
        self.start_temp_median - self.stop_temp_median
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HysteresisConfig {
    /// Samples per direction before thresholds are reported
    pub min_samples: usize,
}

impl Default for HysteresisConfig {
    fn default() -> Self {
        Self {
            min_samples: HYSTERESIS_MIN_SAMPLES,
        }
    }
}

impl HysteresisConfig {
    pub fn validate(&self) -> LearningResult<()> {
        if self.min_samples == 0 || self.min_samples > HYSTERESIS_MAX_SAMPLES {
            return Err(LearningError::InvalidConfig {
                field: "hysteresis.min_samples",
                reason: "must be between 1 and the history capacity",
            });
        }
        Ok(())
    }
}

/// Persisted transition temperatures
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct HysteresisSnapshot {
    pub start_temps: Vec<f32>,
    pub stop_temps: Vec<f32>,
}

/// Learns on/off thresholds from power transitions
#[derive(Debug, Clone)]
pub struct HysteresisLearner {
    config: HysteresisConfig,
    start_temps: RingBuffer<f32, HYSTERESIS_MAX_SAMPLES>,
    stop_temps: RingBuffer<f32, HYSTERESIS_MAX_SAMPLES>,
    last_power: Option<PowerState>,
    last_room_temp: Option<f32>,
}

impl Default for HysteresisLearner {
    fn default() -> Self {
        Self::new(HysteresisConfig::default())
    }
}

impl HysteresisLearner {
    pub fn new(config: HysteresisConfig) -> Self {
        Self {
            config,
            start_temps: RingBuffer::new(),
            stop_temps: RingBuffer::new(),
            last_power: None,
            last_room_temp: None,
        }
    }

    /// Record the room temperature at a power transition
    pub fn record_transition(
        &mut self,
        direction: TransitionDirection,
        room_temp: f32,
    ) -> LearningResult<()> {
        if !room_temp.is_finite() {
            return Err(LearningError::OutOfRange {
                value: room_temp,
                min: f32::MIN,
                max: f32::MAX,
            });
        }

        match direction {
            TransitionDirection::Start => self.start_temps.push(room_temp),
            TransitionDirection::Stop => self.stop_temps.push(room_temp),
        }

        if self.is_inverted() {
            log_warn!(
                "hysteresis thresholds inverted after {:?} at {}°C",
                direction,
                room_temp
            );
        }

        Ok(())
    }

    /// Record the latest power classification and room temperature
    pub fn observe(&mut self, power: Option<PowerState>, room_temp: Option<f32>) {
        self.last_power = power;
        if let Some(temp) = room_temp.filter(|t| t.is_finite()) {
            self.last_room_temp = Some(temp);
        }
    }

    /// Whether both directions hold enough samples
    pub fn has_sufficient_data(&self) -> bool {
        self.start_temps.len() >= self.config.min_samples
            && self.stop_temps.len() >= self.config.min_samples
    }

    /// `(start, stop)` medians once both directions are reliable
    pub fn get_thresholds(&self) -> Option<(f32, f32)> {
        self.thresholds()
            .map(|t| (t.start_temp_median, t.stop_temp_median))
    }

    /// Thresholds with sample count once both directions are reliable
    pub fn thresholds(&self) -> Option<HysteresisThresholds> {
        if !self.has_sufficient_data() {
            return None;
        }

        Some(HysteresisThresholds {
            start_temp_median: stats::median(self.start_temps.iter().copied())?,
            stop_temp_median: stats::median(self.stop_temps.iter().copied())?,
            sample_count: self.start_temps.len() + self.stop_temps.len(),
        })
    }

    /// Thresholds widened or narrowed to a seasonal delta
    ///
    /// Keeps the learned midpoint; the seasonal delta replaces the band width.
    pub fn effective_thresholds(&self, seasonal_delta: Option<f32>) -> Option<(f32, f32)> {
        let (start, stop) = self.get_thresholds()?;
        match seasonal_delta {
            Some(delta) if delta.is_finite() && delta > 0.0 => {
                let mid = (start + stop) / 2.0;
                Some((mid + delta / 2.0, mid - delta / 2.0))
            }
            _ => Some((start, stop)),
        }
    }

    /// Data-quality flag: start threshold not above stop threshold
    pub fn is_inverted(&self) -> bool {
        self.get_thresholds()
            .map(|(start, stop)| start <= stop)
            .unwrap_or(false)
    }

    /// Context label from the latest observation
    pub fn current_state(&self) -> HysteresisState {
        Self::state_for(self.last_power, self.last_room_temp, self.get_thresholds())
    }

    /// Pure derivation of the context label
    pub fn state_for(
        power: Option<PowerState>,
        room_temp: Option<f32>,
        thresholds: Option<(f32, f32)>,
    ) -> HysteresisState {
        let (Some(power), Some((start, stop))) = (power, thresholds) else {
            return HysteresisState::LearningHysteresis;
        };

        if power == PowerState::Active {
            return HysteresisState::ActivePhase;
        }

        match room_temp {
            Some(temp) if temp > start => HysteresisState::IdleAboveStartThreshold,
            Some(temp) if temp < stop => HysteresisState::IdleBelowStopThreshold,
            _ => HysteresisState::IdleStableZone,
        }
    }

    /// Samples recorded per direction `(starts, stops)`
    pub fn sample_counts(&self) -> (usize, usize) {
        (self.start_temps.len(), self.stop_temps.len())
    }

    pub fn snapshot(&self) -> HysteresisSnapshot {
        HysteresisSnapshot {
            start_temps: self.start_temps.to_vec(),
            stop_temps: self.stop_temps.to_vec(),
        }
    }

    pub fn restore(&mut self, snapshot: &HysteresisSnapshot) {
        let starts: Vec<f32> = snapshot.start_temps.iter().copied().filter(|t| t.is_finite()).collect();
        let stops: Vec<f32> = snapshot.stop_temps.iter().copied().filter(|t| t.is_finite()).collect();
        self.start_temps = RingBuffer::from_slice(&starts);
        self.stop_temps = RingBuffer::from_slice(&stops);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn learned() -> HysteresisLearner {
        let mut learner = HysteresisLearner::default();
        for t in [24.0, 24.2, 24.4, 24.1, 24.3] {
            learner.record_transition(TransitionDirection::Start, t).unwrap();
        }
        for t in [23.5, 23.7, 23.6, 23.4, 23.8] {
            learner.record_transition(TransitionDirection::Stop, t).unwrap();
        }
        learner
    }

    #[test]
    fn thresholds_need_five_per_direction() {
        let mut learner = HysteresisLearner::default();
        for t in [24.0, 24.2, 24.4, 24.1, 24.3] {
            learner.record_transition(TransitionDirection::Start, t).unwrap();
        }
        for t in [23.5, 23.7, 23.6, 23.4] {
            learner.record_transition(TransitionDirection::Stop, t).unwrap();
        }
        assert!(learner.get_thresholds().is_none());

        learner.record_transition(TransitionDirection::Stop, 23.8).unwrap();
        assert!(learner.get_thresholds().is_some());
    }

    #[test]
    fn medians_of_transitions() {
        let learner = learned();
        let (start, stop) = learner.get_thresholds().unwrap();
        assert!((start - 24.2).abs() < 1e-4);
        assert!((stop - 23.6).abs() < 1e-4);
        assert!(!learner.is_inverted());

        let thresholds = learner.thresholds().unwrap();
        assert_eq!(thresholds.sample_count, 10);
        assert!((thresholds.delta() - 0.6).abs() < 1e-4);
    }

    #[test]
    fn fifo_caps_at_fifty() {
        let mut learner = HysteresisLearner::default();
        for i in 0..120 {
            learner.record_transition(TransitionDirection::Start, 20.0 + i as f32 * 0.01).unwrap();
        }
        assert_eq!(learner.sample_counts().0, HYSTERESIS_MAX_SAMPLES);
    }

    #[test]
    fn rejects_non_finite() {
        let mut learner = HysteresisLearner::default();
        assert!(learner.record_transition(TransitionDirection::Stop, f32::NAN).is_err());
        assert_eq!(learner.sample_counts(), (0, 0));
    }

    #[test]
    fn state_labels() {
        let mut learner = learned();
        assert_eq!(learner.current_state(), HysteresisState::LearningHysteresis);

        learner.observe(Some(PowerState::Active), Some(23.9));
        assert_eq!(learner.current_state(), HysteresisState::ActivePhase);

        learner.observe(Some(PowerState::Idle), Some(24.5));
        assert_eq!(learner.current_state(), HysteresisState::IdleAboveStartThreshold);

        learner.observe(Some(PowerState::Idle), Some(23.2));
        assert_eq!(learner.current_state(), HysteresisState::IdleBelowStopThreshold);

        learner.observe(Some(PowerState::Idle), Some(23.9));
        assert_eq!(learner.current_state(), HysteresisState::IdleStableZone);

        // Losing the power sensor degrades to learning
        learner.observe(None, Some(23.9));
        assert_eq!(learner.current_state(), HysteresisState::LearningHysteresis);
    }

    #[test]
    fn unreliable_thresholds_mean_learning() {
        let mut learner = HysteresisLearner::default();
        learner.observe(Some(PowerState::Active), Some(25.0));
        assert_eq!(learner.current_state(), HysteresisState::LearningHysteresis);
    }

    #[test]
    fn inverted_thresholds_flagged() {
        let mut learner = HysteresisLearner::default();
        for _ in 0..5 {
            learner.record_transition(TransitionDirection::Start, 22.0).unwrap();
            learner.record_transition(TransitionDirection::Stop, 23.0).unwrap();
        }
        assert!(learner.is_inverted());
    }

    #[test]
    fn seasonal_delta_keeps_midpoint() {
        let learner = learned();
        let (start, stop) = learner.effective_thresholds(Some(1.0)).unwrap();
        assert!((start - 24.4).abs() < 1e-4);
        assert!((stop - 23.4).abs() < 1e-4);

        assert_eq!(learner.effective_thresholds(None), learner.get_thresholds());
        assert_eq!(learner.effective_thresholds(Some(-1.0)), learner.get_thresholds());
    }

    #[test]
    fn snapshot_restore() {
        let learner = learned();
        let mut restored = HysteresisLearner::default();
        restored.restore(&learner.snapshot());
        assert_eq!(restored.get_thresholds(), learner.get_thresholds());
    }
}
