//! Lightweight offset learner
//!
//! ## Model
//!
//! Three independent terms, each with its own sample-backed confidence:
//!
//! ```text
//! hour term     24 buckets, avg = α·new + (1 − α)·avg        conf = n / 10
//! outdoor term  streaming linear fit offset ~ outdoor       conf = n / 30 × R²
//! context term  one bucket per hysteresis phase             conf = n / 10
//!
//! offset     = Σ value·conf / Σ conf
//! confidence = ConfidenceCalculator(samples, diversity, coverage, accuracy)
//!              × max(conf)
//! ```
//!
//! The first sample of a bucket sets its average directly. Memory is fixed:
//! 29 buckets, one covariance accumulator and a running error.

use alloc::vec::Vec;

use crate::{
    confidence::{ConfidenceCalculator, ConfidenceFactors},
    constants::learning::{
        ACCURACY_SMOOTHING_ALPHA, ACCURACY_ZERO_ERROR_C, BUCKET_FULL_CONFIDENCE_SAMPLES,
        HOURLY_SMOOTHING_ALPHA, HOUR_BUCKETS, OUTDOOR_FULL_CONFIDENCE_SAMPLES,
        OUTDOOR_MIN_SAMPLES, OUTDOOR_MIN_VARIANCE_C2,
    },
    constants::limits::LEARNED_OFFSET_LIMIT_C,
    errors::{LearningError, LearningResult},
    hysteresis::HysteresisState,
    stats::{self, RunningCovariance},
};

/// Where and when a prediction is made
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct LearningContext {
    /// Local hour of day (0-23)
    pub hour: u8,
    pub outdoor_temp: Option<f32>,
    /// Current label from the hysteresis learner
    pub hysteresis: HysteresisState,
}

/// Exponentially smoothed average with its sample count
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SmoothedBucket {
    pub average: f32,
    pub samples: u32,
}

impl SmoothedBucket {
    fn update(&mut self, value: f32, alpha: f32) {
        self.average = if self.samples == 0 {
            value
        } else {
            stats::smooth(self.average, value, alpha)
        };
        self.samples = self.samples.saturating_add(1);
    }

    fn confidence(&self, full_at: u32) -> f32 {
        stats::unit_clamp(self.samples as f32 / full_at.max(1) as f32)
    }

    fn is_valid(&self) -> bool {
        self.average.is_finite()
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct OffsetLearnerConfig {
    /// Smoothing factor of hour and context buckets, (0, 1]
    pub alpha: f32,
    /// Samples at which a bucket is fully trusted
    pub bucket_full_confidence_samples: u32,
    /// Pairs needed before the outdoor fit is used
    pub outdoor_min_samples: u32,
    /// Pairs at which the outdoor fit is fully trusted
    pub outdoor_full_confidence_samples: u32,
    /// Outdoor variance below which the slope is meaningless (°C²)
    pub outdoor_min_variance_c2: f32,
    /// Smoothing factor of the running absolute error
    pub accuracy_alpha: f32,
    /// Absolute error that maps to zero accuracy (°C)
    pub accuracy_zero_error_c: f32,
}

impl Default for OffsetLearnerConfig {
    fn default() -> Self {
        Self {
            alpha: HOURLY_SMOOTHING_ALPHA,
            bucket_full_confidence_samples: BUCKET_FULL_CONFIDENCE_SAMPLES,
            outdoor_min_samples: OUTDOOR_MIN_SAMPLES,
            outdoor_full_confidence_samples: OUTDOOR_FULL_CONFIDENCE_SAMPLES,
            outdoor_min_variance_c2: OUTDOOR_MIN_VARIANCE_C2,
            accuracy_alpha: ACCURACY_SMOOTHING_ALPHA,
            accuracy_zero_error_c: ACCURACY_ZERO_ERROR_C,
        }
    }
}

impl OffsetLearnerConfig {
    pub fn validate(&self) -> LearningResult<()> {
        let unit = |a: f32| a > 0.0 && a <= 1.0;
        if !unit(self.alpha) || !unit(self.accuracy_alpha) {
            return Err(LearningError::InvalidConfig {
                field: "learner.alpha",
                reason: "smoothing factors must be in (0, 1]",
            });
        }
        if !(self.accuracy_zero_error_c > 0.0) {
            return Err(LearningError::InvalidConfig {
                field: "learner.accuracy_zero_error_c",
                reason: "must be positive",
            });
        }
        Ok(())
    }
}

/// Persisted learner aggregates
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct OffsetLearnerSnapshot {
    pub hourly: Vec<SmoothedBucket>,
    pub contexts: Vec<SmoothedBucket>,
    pub outdoor: RunningCovariance,
    pub mean_abs_error: Option<f32>,
    pub samples: u32,
}

/// Streaming offset predictor with bounded memory
#[derive(Debug, Clone)]
pub struct LightweightOffsetLearner {
    config: OffsetLearnerConfig,
    calculator: ConfidenceCalculator,
    hourly: [SmoothedBucket; HOUR_BUCKETS],
    contexts: [SmoothedBucket; HysteresisState::COUNT],
    outdoor: RunningCovariance,
    mean_abs_error: Option<f32>,
    samples: u32,
}

impl Default for LightweightOffsetLearner {
    fn default() -> Self {
        Self::new(OffsetLearnerConfig::default())
    }
}

impl LightweightOffsetLearner {
    pub fn new(config: OffsetLearnerConfig) -> Self {
        Self::with_calculator(config, ConfidenceCalculator::default())
    }

    pub fn with_calculator(config: OffsetLearnerConfig, calculator: ConfidenceCalculator) -> Self {
        Self {
            config,
            calculator,
            hourly: [SmoothedBucket::default(); HOUR_BUCKETS],
            contexts: [SmoothedBucket::default(); HysteresisState::COUNT],
            outdoor: RunningCovariance::default(),
            mean_abs_error: None,
            samples: 0,
        }
    }

    fn hour_bucket(&self, hour: u8) -> &SmoothedBucket {
        &self.hourly[hour as usize % HOUR_BUCKETS]
    }

    /// Outdoor-term value and confidence, when usable
    fn outdoor_term(&self, outdoor_temp: Option<f32>) -> Option<(f32, f32)> {
        let temp = outdoor_temp.filter(|t| t.is_finite())?;
        if self.outdoor.count < self.config.outdoor_min_samples {
            return None;
        }

        let value = self.outdoor.predict(temp, self.config.outdoor_min_variance_c2)?;
        let volume = self.outdoor.count as f32 / self.config.outdoor_full_confidence_samples.max(1) as f32;
        Some((value, stats::unit_clamp(volume) * self.outdoor.r_squared()))
    }

    /// Predicted offset and its confidence for a context
    ///
    /// Returns `(0.0, 0.0)` until any term has data.
    pub fn predict(&self, context: &LearningContext) -> (f32, f32) {
        let full = self.config.bucket_full_confidence_samples;
        let hour = self.hour_bucket(context.hour);
        let phase = &self.contexts[context.hysteresis.index()];

        let mut terms: [Option<(f32, f32)>; 3] = [None; 3];
        if hour.samples > 0 {
            terms[0] = Some((hour.average, hour.confidence(full)));
        }
        terms[1] = self.outdoor_term(context.outdoor_temp);
        if phase.samples > 0 {
            terms[2] = Some((phase.average, phase.confidence(full)));
        }

        let mut weighted = 0.0;
        let mut total = 0.0;
        let mut support: f32 = 0.0;
        for (value, conf) in terms.iter().flatten() {
            weighted += value * conf;
            total += conf;
            support = support.max(*conf);
        }

        if total <= 0.0 {
            return (0.0, 0.0);
        }

        let confidence = self.calculator.score(&self.factors()) * support;
        (weighted / total, stats::unit_clamp(confidence))
    }

    /// Fold one observed offset into the model
    ///
    /// `predicted` is the offset that was applied, `actual` the offset the
    /// device turned out to need. Their difference drives the accuracy term.
    ///
    /// `actual` beyond ±[`LEARNED_OFFSET_LIMIT_C`] is rejected; `predicted` is
    /// clamped to that range before scoring.
    pub fn update(&mut self, context: &LearningContext, predicted: f32, actual: f32) -> LearningResult<()> {
        if !(libm::fabsf(actual) <= LEARNED_OFFSET_LIMIT_C) {
            return Err(LearningError::OutOfRange {
                value: actual,
                min: -LEARNED_OFFSET_LIMIT_C,
                max: LEARNED_OFFSET_LIMIT_C,
            });
        }

        let alpha = self.config.alpha;
        self.hourly[context.hour as usize % HOUR_BUCKETS].update(actual, alpha);
        self.contexts[context.hysteresis.index()].update(actual, alpha);

        if let Some(outdoor) = context.outdoor_temp {
            self.outdoor.push(outdoor, actual);
        }

        if predicted.is_finite() {
            let predicted = predicted.clamp(-LEARNED_OFFSET_LIMIT_C, LEARNED_OFFSET_LIMIT_C);
            let error = libm::fabsf(actual - predicted);
            self.mean_abs_error = Some(match self.mean_abs_error {
                Some(mae) => stats::smooth(mae, error, self.config.accuracy_alpha),
                None => error,
            });
        }

        self.samples = self.samples.saturating_add(1);
        Ok(())
    }

    /// Inputs of the confidence formula derived from current aggregates
    pub fn factors(&self) -> ConfidenceFactors {
        ConfidenceFactors {
            samples: self.samples,
            diversity: self.diversity(),
            time_coverage: self.time_coverage(),
            accuracy: self.accuracy(),
        }
    }

    /// Overall learning progress, independent of any context
    pub fn confidence(&self) -> f32 {
        self.calculator.score(&self.factors())
    }

    /// Share of hysteresis phases that have been seen
    pub fn diversity(&self) -> f32 {
        let seen = self.contexts.iter().filter(|b| b.samples > 0).count();
        seen as f32 / self.contexts.len() as f32
    }

    /// Share of hour buckets that hold samples
    pub fn time_coverage(&self) -> f32 {
        let covered = self.hourly.iter().filter(|b| b.samples > 0).count();
        covered as f32 / HOUR_BUCKETS as f32
    }

    /// `1 − mae / zero_error`, once any prediction has been scored
    pub fn accuracy(&self) -> Option<f32> {
        self.mean_abs_error
            .map(|mae| 1.0 - stats::unit_clamp(mae / self.config.accuracy_zero_error_c))
    }

    pub fn mean_abs_error(&self) -> Option<f32> {
        self.mean_abs_error
    }

    pub fn sample_count(&self) -> u32 {
        self.samples
    }

    /// Smoothed offset of one hour bucket, if it holds samples
    pub fn hourly_average(&self, hour: u8) -> Option<f32> {
        let bucket = self.hour_bucket(hour);
        (bucket.samples > 0).then_some(bucket.average)
    }

    pub fn snapshot(&self) -> OffsetLearnerSnapshot {
        OffsetLearnerSnapshot {
            hourly: self.hourly.to_vec(),
            contexts: self.contexts.to_vec(),
            outdoor: self.outdoor,
            mean_abs_error: self.mean_abs_error,
            samples: self.samples,
        }
    }

    /// Restore aggregates, keeping defaults for anything missing or corrupt
    pub fn restore(&mut self, snapshot: &OffsetLearnerSnapshot) {
        for (slot, bucket) in self.hourly.iter_mut().zip(snapshot.hourly.iter()) {
            if bucket.is_valid() {
                *slot = *bucket;
            }
        }
        for (slot, bucket) in self.contexts.iter_mut().zip(snapshot.contexts.iter()) {
            if bucket.is_valid() {
                *slot = *bucket;
            }
        }

        let outdoor = snapshot.outdoor;
        if outdoor.mean_x.is_finite() && outdoor.m2_x.is_finite() && outdoor.c_xy.is_finite() {
            self.outdoor = outdoor;
        }

        self.mean_abs_error = snapshot.mean_abs_error.filter(|e| e.is_finite() && *e >= 0.0);
        self.samples = snapshot.samples;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx(hour: u8) -> LearningContext {
        LearningContext {
            hour,
            outdoor_temp: None,
            hysteresis: HysteresisState::IdleStableZone,
        }
    }

    #[test]
    fn untrained_predicts_nothing() {
        let learner = LightweightOffsetLearner::default();
        assert_eq!(learner.predict(&ctx(12)), (0.0, 0.0));
        assert_eq!(learner.accuracy(), None);
    }

    #[test]
    fn first_sample_sets_bucket() {
        let mut learner = LightweightOffsetLearner::default();
        learner.update(&ctx(14), 0.0, -2.0).unwrap();
        assert_eq!(learner.hourly_average(14), Some(-2.0));
        assert_eq!(learner.hourly_average(15), None);

        learner.update(&ctx(14), -2.0, -1.0).unwrap();
        // 0.2 × -1.0 + 0.8 × -2.0
        assert!((learner.hourly_average(14).unwrap() + 1.8).abs() < 1e-5);
    }

    #[test]
    fn converges_to_repeated_offset() {
        let mut learner = LightweightOffsetLearner::default();
        for i in 0..60 {
            let context = ctx((i % 24) as u8);
            let (predicted, _) = learner.predict(&context);
            learner.update(&context, predicted, -1.5).unwrap();
        }

        let (offset, confidence) = learner.predict(&ctx(9));
        assert!((offset + 1.5).abs() < 1e-3);
        assert!(confidence > 0.0 && confidence <= 1.0);
        assert!(learner.accuracy().unwrap() > 0.5);
    }

    #[test]
    fn confidence_grows_with_samples() {
        let mut learner = LightweightOffsetLearner::default();
        let mut previous = 0.0;
        for _ in 0..30 {
            learner.update(&ctx(8), -1.0, -1.0).unwrap();
            let (_, confidence) = learner.predict(&ctx(8));
            assert!(confidence >= previous);
            previous = confidence;
        }
        assert!(previous > 0.0);
    }

    #[test]
    fn outdoor_correlation_used() {
        let mut learner = LightweightOffsetLearner::default();
        // Offset grows 0.1 °C per outdoor degree
        for i in 0..40 {
            let outdoor = 20.0 + (i % 15) as f32;
            let context = LearningContext {
                hour: 3,
                outdoor_temp: Some(outdoor),
                hysteresis: HysteresisState::ActivePhase,
            };
            learner.update(&context, 0.0, -0.1 * outdoor).unwrap();
        }

        // Unseen hour and phase leave only the outdoor term
        let context = LearningContext {
            hour: 20,
            outdoor_temp: Some(30.0),
            hysteresis: HysteresisState::IdleBelowStopThreshold,
        };
        let (offset, confidence) = learner.predict(&context);
        assert!((offset + 3.0).abs() < 0.01);
        assert!(confidence > 0.0);
    }

    #[test]
    fn rejects_non_finite_actual() {
        let mut learner = LightweightOffsetLearner::default();
        assert!(learner.update(&ctx(1), 0.0, f32::INFINITY).is_err());
        assert_eq!(learner.sample_count(), 0);
    }

    #[test]
    fn extreme_pairs_keep_error_finite() {
        let mut learner = LightweightOffsetLearner::default();
        assert!(learner.update(&ctx(1), 0.0, 3.0e38).is_err());
        assert!(learner.update(&ctx(1), 0.0, -61.0).is_err());
        assert_eq!(learner.sample_count(), 0);

        learner.update(&ctx(1), f32::MAX, -3.0).unwrap();
        learner.update(&ctx(1), -3.0e38, 3.0).unwrap();
        let mae = learner.mean_abs_error().unwrap();
        assert!(mae.is_finite());
        assert!(mae <= 2.0 * LEARNED_OFFSET_LIMIT_C);
        assert_eq!(learner.accuracy(), Some(0.0));
    }

    #[test]
    fn snapshot_restore() {
        let mut learner = LightweightOffsetLearner::default();
        for i in 0..10 {
            learner.update(&ctx(i), -1.0, -1.2).unwrap();
        }

        let mut restored = LightweightOffsetLearner::default();
        restored.restore(&learner.snapshot());
        assert_eq!(restored.predict(&ctx(3)), learner.predict(&ctx(3)));
        assert_eq!(restored.sample_count(), 10);
    }

    #[test]
    fn restore_tolerates_short_snapshot() {
        let snapshot = OffsetLearnerSnapshot {
            hourly: alloc::vec![SmoothedBucket { average: -1.0, samples: 3 }],
            ..Default::default()
        };
        let mut learner = LightweightOffsetLearner::default();
        learner.restore(&snapshot);
        assert_eq!(learner.hourly_average(0), Some(-1.0));
        assert_eq!(learner.hourly_average(1), None);
    }
}
