//! Multi-Factor Confidence Scoring
//!
//! ## Overview
//!
//! Confidence tells the engine how much of the final offset to take from the
//! learned model and tells the user how far learning has progressed. A score
//! has to be earned with data that is plentiful, varied and accurate; merely
//! having sensors attached never raises it.
//!
//! ## Formula
//!
//! ```text
//! base     = min(0.5, ln(samples + 1) / 10)
//! score    = base
//!          + diversity     × 0.20
//!          + time_coverage × 0.15
//!          + (accuracy − 0.5) × 0.30     (only when accuracy is known)
//! result   = clamp(score, 0, 1)
//! ```
//!
//! - `diversity`: share of operating contexts seen (hysteresis phases,
//!   outdoor buckets), in [0, 1]
//! - `time_coverage`: share of the 24 hour buckets holding samples
//! - `accuracy`: 1 − normalized running prediction error
//!
//! The base term is monotone in sample count, so with the other factors
//! held constant confidence never drops as samples accumulate.
//!
//! ## Example
//!
//! ```rust
//! use offsetguard_core::confidence::{ConfidenceCalculator, ConfidenceFactors};
//!
//! let calculator = ConfidenceCalculator::default();
//! let fresh = calculator.score(&ConfidenceFactors::default());
//! assert_eq!(fresh, 0.0);
//!
//! let trained = calculator.score(&ConfidenceFactors {
//!     samples: 500,
//!     diversity: 0.8,
//!     time_coverage: 1.0,
//!     accuracy: Some(0.9),
//! });
//! assert!(trained > 0.9);
//! ```

use crate::constants::learning::{
    CONFIDENCE_ACCURACY_WEIGHT, CONFIDENCE_BASE_CAP, CONFIDENCE_DIVERSITY_WEIGHT,
    CONFIDENCE_LOG_DIVISOR, CONFIDENCE_TIME_COVERAGE_WEIGHT,
};
use crate::stats::unit_clamp;

/// Inputs of one confidence evaluation
///
/// Derived on demand from learner aggregates and never stored.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ConfidenceFactors {
    /// Accepted training samples
    pub samples: u32,
    /// Share of operating contexts covered, [0, 1]
    pub diversity: f32,
    /// Share of time-of-day buckets covered, [0, 1]
    pub time_coverage: f32,
    /// Prediction accuracy, [0, 1], when enough feedback exists
    pub accuracy: Option<f32>,
}

/// Weights of the confidence formula
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConfidenceCalculator {
    pub base_cap: f32,
    pub log_divisor: f32,
    pub diversity_weight: f32,
    pub time_coverage_weight: f32,
    pub accuracy_weight: f32,
}

impl Default for ConfidenceCalculator {
    fn default() -> Self {
        Self {
            base_cap: CONFIDENCE_BASE_CAP,
            log_divisor: CONFIDENCE_LOG_DIVISOR,
            diversity_weight: CONFIDENCE_DIVERSITY_WEIGHT,
            time_coverage_weight: CONFIDENCE_TIME_COVERAGE_WEIGHT,
            accuracy_weight: CONFIDENCE_ACCURACY_WEIGHT,
        }
    }
}

impl ConfidenceCalculator {
    /// Sample-volume term alone
    pub fn base(&self, samples: u32) -> f32 {
        let base = libm::logf(samples as f32 + 1.0) / self.log_divisor;
        base.min(self.base_cap)
    }

    /// Combined score in [0, 1]
    pub fn score(&self, factors: &ConfidenceFactors) -> f32 {
        let mut score = self.base(factors.samples);
        score += unit_clamp(factors.diversity) * self.diversity_weight;
        score += unit_clamp(factors.time_coverage) * self.time_coverage_weight;

        if let Some(accuracy) = factors.accuracy {
            score += (unit_clamp(accuracy) - 0.5) * self.accuracy_weight;
        }

        unit_clamp(score)
    }

    /// Positional form of [`score`](Self::score)
    pub fn confidence(
        &self,
        samples: u32,
        diversity: f32,
        time_coverage: f32,
        accuracy: Option<f32>,
    ) -> f32 {
        self.score(&ConfidenceFactors {
            samples,
            diversity,
            time_coverage,
            accuracy,
        })
    }
}
