//! Seasonal hysteresis patterns
//!
//! Each completed cycle (a start paired with the stop that ended it) becomes
//! a [`LearnedPattern`] tagged with the outdoor temperature at the time.
//! Deltas are grouped into 5 °C outdoor buckets:
//!
//! ```text
//! bucket = floor(outdoor / 5)      28.4 °C → 5, −3.0 °C → −1
//! ```
//!
//! `predict_delta` prefers the median of the matching bucket, falls back to
//! the median of every retained pattern, and returns `None` below three
//! patterns either way. Patterns past the retention period are ignored even
//! before `prune` removes them.

use alloc::vec::Vec;

use crate::{
    buffer::RingBuffer,
    constants::{
        buffers::SEASONAL_MAX_PATTERNS,
        learning::{SEASONAL_BUCKET_WIDTH_C, SEASONAL_MIN_BUCKET_PATTERNS, SEASONAL_RETENTION_DAYS},
        time::MS_PER_DAY,
    },
    errors::{LearningError, LearningResult},
    stats,
    time::Timestamp,
};

/// One completed on/off cycle
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct LearnedPattern {
    pub timestamp: Timestamp,
    /// Room temperature when conditioning started (°C)
    pub start_temp: f32,
    /// Room temperature when conditioning stopped (°C)
    pub stop_temp: f32,
    /// Outdoor temperature at the stop (°C)
    pub outdoor_temp: f32,
}

impl LearnedPattern {
    pub fn hysteresis_delta(&self) -> f32 {
        self.start_temp - self.stop_temp
    }

    fn is_valid(&self) -> bool {
        self.start_temp.is_finite()
            && self.stop_temp.is_finite()
            && self.outdoor_temp.is_finite()
            && self.hysteresis_delta() > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SeasonalConfig {
    /// Age after which patterns are dropped (days)
    pub retention_days: u64,
    /// Outdoor bucket width (°C)
    pub bucket_width_c: f32,
    /// Patterns needed before a bucket (or the whole set) is trusted
    pub min_bucket_patterns: usize,
}

impl Default for SeasonalConfig {
    fn default() -> Self {
        Self {
            retention_days: SEASONAL_RETENTION_DAYS,
            bucket_width_c: SEASONAL_BUCKET_WIDTH_C,
            min_bucket_patterns: SEASONAL_MIN_BUCKET_PATTERNS,
        }
    }
}

impl SeasonalConfig {
    pub fn validate(&self) -> LearningResult<()> {
        if !(self.bucket_width_c > 0.0) {
            return Err(LearningError::InvalidConfig {
                field: "seasonal.bucket_width_c",
                reason: "must be positive",
            });
        }
        if self.retention_days == 0 || self.min_bucket_patterns == 0 {
            return Err(LearningError::InvalidConfig {
                field: "seasonal",
                reason: "retention and minimum patterns must be non-zero",
            });
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SeasonalSnapshot {
    pub patterns: Vec<LearnedPattern>,
}

/// Hysteresis deltas bucketed by outdoor temperature
#[derive(Debug, Clone)]
pub struct SeasonalHysteresisLearner {
    config: SeasonalConfig,
    patterns: RingBuffer<LearnedPattern, SEASONAL_MAX_PATTERNS>,
}

impl Default for SeasonalHysteresisLearner {
    fn default() -> Self {
        Self::new(SeasonalConfig::default())
    }
}

impl SeasonalHysteresisLearner {
    pub fn new(config: SeasonalConfig) -> Self {
        Self {
            config,
            patterns: RingBuffer::new(),
        }
    }

    /// Record a completed cycle, pruning aged patterns first
    ///
    /// Cycles whose stop temperature is not below the start are rejected
    /// with `OutOfRange`; they indicate a misclassified transition.
    pub fn learn_pattern(
        &mut self,
        start_temp: f32,
        stop_temp: f32,
        outdoor_temp: f32,
        now: Timestamp,
    ) -> LearningResult<()> {
        let pattern = LearnedPattern {
            timestamp: now,
            start_temp,
            stop_temp,
            outdoor_temp,
        };

        if !pattern.is_valid() {
            return Err(LearningError::OutOfRange {
                value: pattern.hysteresis_delta(),
                min: 0.0,
                max: f32::MAX,
            });
        }

        self.prune(now);
        self.patterns.push(pattern);
        Ok(())
    }

    fn is_retained(&self, pattern: &LearnedPattern, now: Timestamp) -> bool {
        let max_age_ms = self.config.retention_days.saturating_mul(MS_PER_DAY);
        now.saturating_sub(pattern.timestamp) <= max_age_ms
    }

    /// Drop patterns older than the retention period
    pub fn prune(&mut self, now: Timestamp) {
        let max_age_ms = self.config.retention_days.saturating_mul(MS_PER_DAY);
        self.patterns
            .retain(|p| now.saturating_sub(p.timestamp) <= max_age_ms);
    }

    /// Bucket index of an outdoor temperature
    pub fn bucket_of(&self, outdoor_temp: f32) -> i32 {
        libm::floorf(outdoor_temp / self.config.bucket_width_c) as i32
    }

    /// Expected hysteresis delta at `outdoor_temp`, from patterns retained at `now`
    pub fn predict_delta(&self, outdoor_temp: f32, now: Timestamp) -> Option<f32> {
        let min = self.config.min_bucket_patterns;
        let retained: Vec<&LearnedPattern> = self.patterns.iter().filter(|p| self.is_retained(p, now)).collect();

        if outdoor_temp.is_finite() {
            let bucket = self.bucket_of(outdoor_temp);
            let same_bucket: Vec<f32> = retained
                .iter()
                .filter(|p| self.bucket_of(p.outdoor_temp) == bucket)
                .map(|p| p.hysteresis_delta())
                .collect();

            if same_bucket.len() >= min {
                return stats::median(same_bucket);
            }
        }

        if retained.len() >= min {
            return stats::median(retained.iter().map(|p| p.hysteresis_delta()));
        }

        None
    }

    pub fn pattern_count(&self) -> usize {
        self.patterns.len()
    }

    /// Number of distinct outdoor buckets with at least one pattern
    pub fn bucket_count(&self) -> usize {
        let mut buckets: Vec<i32> = self.patterns.iter().map(|p| self.bucket_of(p.outdoor_temp)).collect();
        buckets.sort_unstable();
        buckets.dedup();
        buckets.len()
    }

    pub fn snapshot(&self) -> SeasonalSnapshot {
        SeasonalSnapshot {
            patterns: self.patterns.to_vec(),
        }
    }

    pub fn restore(&mut self, snapshot: &SeasonalSnapshot) {
        let valid: Vec<LearnedPattern> = snapshot.patterns.iter().copied().filter(LearnedPattern::is_valid).collect();
        self.patterns = RingBuffer::from_slice(&valid);
    }
}
