//! Offset Engine
//!
//! ## Overview
//!
//! The engine turns one set of readings into the setpoint offset to apply
//! and, once the device has had time to respond, folds the observed outcome
//! back into every learner. Calculation is pure over the current learned
//! state; only feedback mutates it.
//!
//! ## Calculation
//!
//! ```text
//! baseline  = device_internal − room
//! learned   = LightweightOffsetLearner::predict(hour, outdoor, hysteresis)
//! w         = learner_confidence × 0.8
//! offset    = baseline + w × (learned − baseline)
//!           + forecast adjustment
//!           + operating mode adjustment
//! offset    = clamp(offset, ±max_offset)
//! offset    = previous ± gradual_adjustment_rate   (when it moved further)
//! ```
//!
//! Missing room or device temperature, or a reading outside the hard
//! bounds, returns the previous offset with zero confidence.
//!
//! ## Feedback
//!
//! Each learner is updated independently. A failure in one (for example an
//! inverted seasonal cycle) is recorded in the [`FeedbackReport`] and never
//! blocks the others.

mod feedback;

pub use feedback::{FeedbackContext, FeedbackQueue, FeedbackReport, LearnerOutcome, PendingFeedback};

use alloc::{string::String, vec::Vec};
use core::fmt::Write as _;

use crate::{
    buffer::RingBuffer,
    constants::{
        buffers::SAMPLE_HISTORY_SIZE,
        learning::SAMPLE_RETENTION_DAYS,
        limits::{
            DEFAULT_AWAY_ADJUSTMENT_C, DEFAULT_BOOST_ADJUSTMENT_C, DEFAULT_GRADUAL_ADJUSTMENT_RATE_C,
            DEFAULT_MAX_OFFSET_C, DEFAULT_SLEEP_ADJUSTMENT_C, MAX_LEARNED_WEIGHT,
        },
        time::MS_PER_DAY,
    },
    errors::{LearningError, LearningResult},
    forecast::{ForecastEngine, ForecastPoint},
    hysteresis::{HysteresisLearner, HysteresisSnapshot, HysteresisState, SeasonalHysteresisLearner, SeasonalSnapshot},
    learning::{LearningContext, LightweightOffsetLearner, OffsetLearnerSnapshot},
    outlier::{Channel, OutlierDetector, OutlierSnapshot},
    stats,
    time::{LocalClock, Timestamp},
    types::{HvacMode, OffsetSample, OperatingMode, PowerClassifier, PowerState, TransitionDirection},
};

/// Offset calculation limits and mode adjustments
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineConfig {
    /// Symmetric clamp of the final offset (°C)
    pub max_offset_c: f32,
    /// Largest change from the previous offset per calculation (°C)
    pub gradual_adjustment_rate_c: f32,
    /// Share of the learned term at full learner confidence, [0, 1]
    pub max_learned_weight: f32,
    /// Relaxation applied in sleep mode (°C, away from conditioning)
    pub sleep_adjustment_c: f32,
    /// Relaxation applied in away mode (°C, away from conditioning)
    pub away_adjustment_c: f32,
    /// Extra push applied in boost mode (°C, toward conditioning)
    pub boost_adjustment_c: f32,
    /// Age after which offset samples leave the history (days)
    pub sample_retention_days: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_offset_c: DEFAULT_MAX_OFFSET_C,
            gradual_adjustment_rate_c: DEFAULT_GRADUAL_ADJUSTMENT_RATE_C,
            max_learned_weight: MAX_LEARNED_WEIGHT,
            sleep_adjustment_c: DEFAULT_SLEEP_ADJUSTMENT_C,
            away_adjustment_c: DEFAULT_AWAY_ADJUSTMENT_C,
            boost_adjustment_c: DEFAULT_BOOST_ADJUSTMENT_C,
            sample_retention_days: SAMPLE_RETENTION_DAYS,
        }
    }
}

impl EngineConfig {
    pub fn validate(&self) -> LearningResult<()> {
        if !(self.max_offset_c > 0.0) || !self.max_offset_c.is_finite() {
            return Err(LearningError::InvalidConfig {
                field: "engine.max_offset_c",
                reason: "must be positive",
            });
        }
        if !(self.gradual_adjustment_rate_c > 0.0) || self.gradual_adjustment_rate_c > self.max_offset_c {
            return Err(LearningError::InvalidConfig {
                field: "engine.gradual_adjustment_rate_c",
                reason: "must be in (0, max_offset_c]",
            });
        }
        if !(0.0..=1.0).contains(&self.max_learned_weight) {
            return Err(LearningError::InvalidConfig {
                field: "engine.max_learned_weight",
                reason: "must be in [0, 1]",
            });
        }
        let adjustments = [self.sleep_adjustment_c, self.away_adjustment_c, self.boost_adjustment_c];
        if adjustments.iter().any(|a| !a.is_finite() || *a < 0.0) {
            return Err(LearningError::InvalidConfig {
                field: "engine.mode_adjustments",
                reason: "must be finite and non-negative",
            });
        }
        Ok(())
    }
}

/// Readings for one offset calculation
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OffsetInput {
    pub timestamp: Timestamp,
    /// Trusted room sensor (°C)
    pub room_temp: Option<f32>,
    /// Device's own sensor (°C)
    pub device_internal_temp: Option<f32>,
    pub outdoor_temp: Option<f32>,
    /// Device power draw (W)
    pub power_reading: Option<f32>,
    pub hvac_mode: HvacMode,
    pub operating_mode: OperatingMode,
    /// Offset currently applied to the device
    pub last_applied_offset: Option<f32>,
}

/// Offset to apply with its provenance
#[derive(Debug, Clone, PartialEq)]
pub struct OffsetResult {
    /// Offset in °C, always within ±max_offset
    pub offset: f32,
    /// Whether the bound clamp or the rate limit changed the raw value
    pub clamped: bool,
    /// Learner confidence behind the learned share, [0, 1]
    pub confidence: f32,
    /// Contributions, e.g. `baseline+learned(0.42)+mode:away`
    pub reason: String,
}

/// Persisted engine state
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct EngineSnapshot {
    pub learner: OffsetLearnerSnapshot,
    pub hysteresis: HysteresisSnapshot,
    pub seasonal: SeasonalSnapshot,
    pub outlier: OutlierSnapshot,
    pub samples: Vec<OffsetSample>,
    pub last_power_state: Option<PowerState>,
    pub pending_start_temp: Option<f32>,
}

/// Offset calculation and learning for one device
#[derive(Debug, Clone)]
pub struct OffsetEngine {
    config: EngineConfig,
    clock: LocalClock,
    classifier: PowerClassifier,
    learner: LightweightOffsetLearner,
    hysteresis: HysteresisLearner,
    seasonal: SeasonalHysteresisLearner,
    outlier: OutlierDetector,
    forecast: ForecastEngine,
    samples: RingBuffer<OffsetSample, SAMPLE_HISTORY_SIZE>,
    last_power_state: Option<PowerState>,
    pending_start_temp: Option<f32>,
}

impl Default for OffsetEngine {
    fn default() -> Self {
        Self::new(EngineConfig::default())
    }
}

impl OffsetEngine {
    /// Engine with default learners
    pub fn new(config: EngineConfig) -> Self {
        Self {
            config,
            clock: LocalClock::default(),
            classifier: PowerClassifier::default(),
            learner: LightweightOffsetLearner::default(),
            hysteresis: HysteresisLearner::default(),
            seasonal: SeasonalHysteresisLearner::default(),
            outlier: OutlierDetector::default(),
            forecast: ForecastEngine::default(),
            samples: RingBuffer::new(),
            last_power_state: None,
            pending_start_temp: None,
        }
    }

    pub fn with_clock(mut self, clock: LocalClock) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_classifier(mut self, classifier: PowerClassifier) -> Self {
        self.classifier = classifier;
        self
    }

    pub fn with_learner(mut self, learner: LightweightOffsetLearner) -> Self {
        self.learner = learner;
        self
    }

    pub fn with_hysteresis(mut self, hysteresis: HysteresisLearner, seasonal: SeasonalHysteresisLearner) -> Self {
        self.hysteresis = hysteresis;
        self.seasonal = seasonal;
        self
    }

    pub fn with_outlier_detector(mut self, outlier: OutlierDetector) -> Self {
        self.outlier = outlier;
        self
    }

    pub fn with_forecast(mut self, forecast: ForecastEngine) -> Self {
        self.forecast = forecast;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn learner(&self) -> &LightweightOffsetLearner {
        &self.learner
    }

    pub fn hysteresis(&self) -> &HysteresisLearner {
        &self.hysteresis
    }

    pub fn seasonal(&self) -> &SeasonalHysteresisLearner {
        &self.seasonal
    }

    pub fn outlier(&self) -> &OutlierDetector {
        &self.outlier
    }

    pub fn forecast(&self) -> &ForecastEngine {
        &self.forecast
    }

    pub fn samples(&self) -> impl Iterator<Item = &OffsetSample> {
        self.samples.iter()
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    pub fn last_power_state(&self) -> Option<PowerState> {
        self.last_power_state
    }

    /// Replace the forecast; returns how many points were kept
    pub fn update_forecast(&mut self, points: &[ForecastPoint], now: Timestamp) -> usize {
        self.forecast.update(points, now)
    }

    /// Classify a power reading against the last known state
    ///
    /// Readings outside the hard power bounds classify as nothing.
    pub fn classify_power(&self, power_w: Option<f32>) -> Option<PowerState> {
        let power = power_w?;
        if self.outlier.check_bounds(power, Channel::Power).is_err() {
            return None;
        }
        self.classifier.classify(power, self.last_power_state)
    }

    /// Seasonal-aware hysteresis label for a reading
    pub fn hysteresis_state(
        &self,
        power: Option<PowerState>,
        room_temp: Option<f32>,
        outdoor_temp: Option<f32>,
        now: Timestamp,
    ) -> HysteresisState {
        let delta = outdoor_temp
            .filter(|t| t.is_finite())
            .and_then(|t| self.seasonal.predict_delta(t, now));
        HysteresisLearner::state_for(power, room_temp, self.hysteresis.effective_thresholds(delta))
    }

    /// Learner context for a reading
    pub fn learning_context(
        &self,
        timestamp: Timestamp,
        room_temp: Option<f32>,
        outdoor_temp: Option<f32>,
        power: Option<PowerState>,
    ) -> LearningContext {
        LearningContext {
            hour: self.clock.hour_of_day(timestamp),
            outdoor_temp: outdoor_temp.filter(|t| t.is_finite()),
            hysteresis: self.hysteresis_state(power, room_temp, outdoor_temp, timestamp),
        }
    }

    /// Additive offset for the operating mode
    ///
    /// Away and sleep relax against the conditioning direction, boost pushes
    /// with it. Non-conditioning modes get nothing.
    pub fn mode_adjustment(&self, operating_mode: OperatingMode, hvac_mode: HvacMode) -> f32 {
        let direction = hvac_mode.direction();
        if direction == 0.0 {
            return 0.0;
        }
        match operating_mode {
            OperatingMode::Normal => 0.0,
            OperatingMode::Away => -direction * self.config.away_adjustment_c,
            OperatingMode::Sleep => -direction * self.config.sleep_adjustment_c,
            OperatingMode::Boost => direction * self.config.boost_adjustment_c,
        }
    }

    fn fallback(&self, previous: Option<f32>, reason: &str) -> OffsetResult {
        let max = self.config.max_offset_c;
        let previous = previous.unwrap_or(0.0);
        let offset = previous.clamp(-max, max);
        OffsetResult {
            offset,
            clamped: offset != previous,
            confidence: 0.0,
            reason: String::from(reason),
        }
    }

    /// Offset to apply for `input`
    ///
    /// Never mutates learned state, so the same input and state always give
    /// the same result.
    pub fn calculate_offset(&self, input: &OffsetInput) -> OffsetResult {
        let previous = input.last_applied_offset.filter(|o| o.is_finite());

        let (Some(room), Some(internal)) = (input.room_temp, input.device_internal_temp) else {
            return self.fallback(previous, "missing_data");
        };
        if self.outlier.check_bounds(room, Channel::Temperature).is_err()
            || self.outlier.check_bounds(internal, Channel::Temperature).is_err()
        {
            return self.fallback(previous, "outlier_input");
        }

        let mut reason = String::from("baseline");
        let baseline = internal - room;

        let power = self.classify_power(input.power_reading);
        let context = self.learning_context(input.timestamp, Some(room), input.outdoor_temp, power);
        let (learned, confidence) = self.learner.predict(&context);
        let weight = stats::unit_clamp(confidence * self.config.max_learned_weight);

        let mut raw = baseline;
        if weight > 0.0 {
            raw += weight * (learned - baseline);
            let _ = write!(reason, "+learned({:.2})", weight);
        }

        if let Some(adjustment) = self.forecast.predictive_offset(input.timestamp, input.hvac_mode) {
            raw += adjustment.offset;
            let _ = write!(reason, "+forecast:{}", adjustment.strategy.as_str());
        }

        let mode = self.mode_adjustment(input.operating_mode, input.hvac_mode);
        if mode != 0.0 {
            raw += mode;
            let _ = write!(reason, "+mode:{}", input.operating_mode.as_str());
        }

        if !raw.is_finite() {
            return self.fallback(previous, "invalid_prediction");
        }

        let max = self.config.max_offset_c;
        let mut offset = raw.clamp(-max, max);
        let mut clamped = offset != raw;
        if clamped {
            reason.push_str("+clamped");
        }

        // A restored offset may lie outside the current bounds
        if let Some(previous) = previous.map(|p| p.clamp(-max, max)) {
            let step = offset - previous;
            let rate = self.config.gradual_adjustment_rate_c;
            if libm::fabsf(step) > rate {
                offset = previous + libm::copysignf(rate, step);
                clamped = true;
                reason.push_str("+rate_limited");
            }
        }

        OffsetResult {
            offset,
            clamped,
            confidence,
            reason,
        }
    }

    /// Fold the observed outcome of an applied offset into every learner
    ///
    /// `predicted` is the offset that was applied, `actual` the offset the
    /// device turned out to need.
    pub fn record_feedback(&mut self, predicted: f32, actual: f32, context: &FeedbackContext) -> FeedbackReport {
        let mut report = FeedbackReport::default();

        let room = context.room_temp.filter(|t| t.is_finite());
        let room_accepted = match room {
            Some(temp) => {
                report.room_outlier = self.outlier.ingest(temp, Channel::Temperature);
                !report.room_outlier
            }
            None => false,
        };

        // Power draw is bimodal, so only the hard bounds gate classification
        if let Some(power) = context.power_reading {
            report.power_outlier = self.outlier.ingest(power, Channel::Power);
        }
        let power = self.classify_power(context.power_reading);

        let learning_context = self.learning_context(context.timestamp, room, context.outdoor_temp, power);
        report.offset_learner = if !room_accepted {
            LearnerOutcome::Skipped
        } else {
            LearnerOutcome::from_result(self.learner.update(&learning_context, predicted, actual))
        };

        let transition = match (self.last_power_state, power) {
            (Some(previous), Some(current)) => TransitionDirection::between(previous, current),
            _ => None,
        };

        if let (Some(direction), Some(temp), true) = (transition, room, room_accepted) {
            report.hysteresis = LearnerOutcome::from_result(self.hysteresis.record_transition(direction, temp));
            report.seasonal = self.record_cycle(direction, temp, context);
        }

        if power.is_some() {
            self.last_power_state = power;
        }
        self.hysteresis.observe(power, room);

        if report.offset_learner.is_accepted() {
            if let Some(temp) = room {
                self.record_sample(predicted, actual, temp, context);
            }
        }

        for (learner, error) in report.errors() {
            log_warn!("{} rejected feedback: {}", learner, error);
        }

        report
    }

    fn record_cycle(&mut self, direction: TransitionDirection, room_temp: f32, context: &FeedbackContext) -> LearnerOutcome {
        match direction {
            TransitionDirection::Start => {
                self.pending_start_temp = Some(room_temp);
                LearnerOutcome::Skipped
            }
            TransitionDirection::Stop => {
                let start = self.pending_start_temp.take();
                // Cycle deltas are defined for cooling, where the start sits above the stop
                if !context.hvac_mode.is_cooling() {
                    return LearnerOutcome::Skipped;
                }
                match (start, context.outdoor_temp.filter(|t| t.is_finite())) {
                    (Some(start), Some(outdoor)) => LearnerOutcome::from_result(
                        self.seasonal.learn_pattern(start, room_temp, outdoor, context.timestamp),
                    ),
                    _ => LearnerOutcome::Skipped,
                }
            }
        }
    }

    fn record_sample(&mut self, predicted: f32, actual: f32, room_temp: f32, context: &FeedbackContext) {
        let retention = self.config.sample_retention_days.saturating_mul(MS_PER_DAY);
        let cutoff = context.timestamp.saturating_sub(retention);
        self.samples.retain(|s| s.timestamp >= cutoff);

        self.samples.push(OffsetSample {
            timestamp: context.timestamp,
            room_temp,
            device_internal_temp: context.device_internal_temp.unwrap_or(room_temp + actual),
            outdoor_temp: context.outdoor_temp,
            power_reading: context.power_reading,
            mode: context.hvac_mode,
            applied_offset: predicted,
            observed_offset: actual,
        });
    }

    pub fn snapshot(&self) -> EngineSnapshot {
        EngineSnapshot {
            learner: self.learner.snapshot(),
            hysteresis: self.hysteresis.snapshot(),
            seasonal: self.seasonal.snapshot(),
            outlier: self.outlier.snapshot(),
            samples: self.samples.to_vec(),
            last_power_state: self.last_power_state,
            pending_start_temp: self.pending_start_temp,
        }
    }

    /// Restore learned state; corrupt entries fall back to defaults
    pub fn restore(&mut self, snapshot: &EngineSnapshot) {
        self.learner.restore(&snapshot.learner);
        self.hysteresis.restore(&snapshot.hysteresis);
        self.seasonal.restore(&snapshot.seasonal);
        self.outlier.restore(&snapshot.outlier);

        let samples: Vec<OffsetSample> = snapshot
            .samples
            .iter()
            .copied()
            .filter(|s| s.room_temp.is_finite() && s.observed_offset.is_finite())
            .collect();
        self.samples = RingBuffer::from_slice(&samples);
        self.last_power_state = snapshot.last_power_state;
        self.pending_start_temp = snapshot.pending_start_temp.filter(|t| t.is_finite());
    }
}
