//! Robust Statistics Shared by the Learners
//!
//! ## Overview
//!
//! Pure helper functions used by the outlier detector, the hysteresis
//! learners and the thermal fit. All functions:
//!
//! - Have no side effects
//! - Ignore non-finite inputs instead of propagating NaN
//! - Return `None` when the statistic is undefined (empty input)
//!
//! ## Median and MAD
//!
//! Thresholds are medians rather than means because a single missed power
//! transition (a door left open, a manual power cycle) would otherwise skew
//! the learned value for weeks:
//!
//! ```text
//! values: 24.0 24.1 24.2 24.3 31.0
//! mean   = 25.52   ← dragged by one bad sample
//! median = 24.2    ← unaffected
//! ```
//!
//! The median absolute deviation (MAD) is the robust analogue of the standard
//! deviation and drives the modified Z-score.
//!
//! ## Streaming Covariance
//!
//! `RunningCovariance` uses Welford's update so the outdoor correlation never
//! accumulates large sums of squares.

use alloc::vec::Vec;

/// Median of the finite values in `values`
pub fn median<I: IntoIterator<Item = f32>>(values: I) -> Option<f32> {
    let mut sorted: Vec<f32> = values.into_iter().filter(|v| v.is_finite()).collect();
    median_in_place(&mut sorted)
}

/// Median of a scratch slice, sorting it in place
pub fn median_in_place(values: &mut [f32]) -> Option<f32> {
    if values.is_empty() {
        return None;
    }

    values.sort_unstable_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;

    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}

/// Median and median absolute deviation of the finite values
pub fn median_and_mad<I: IntoIterator<Item = f32>>(values: I) -> Option<(f32, f32)> {
    let mut sorted: Vec<f32> = values.into_iter().filter(|v| v.is_finite()).collect();
    let center = median_in_place(&mut sorted)?;

    let mut deviations: Vec<f32> = sorted.iter().map(|v| libm::fabsf(v - center)).collect();
    let mad = median_in_place(&mut deviations)?;

    Some((center, mad))
}

/// Clamp to [0, 1], mapping NaN to 0
pub fn unit_clamp(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// Exponential smoothing step: `alpha * new + (1 - alpha) * avg`
pub fn smooth(avg: f32, new: f32, alpha: f32) -> f32 {
    alpha * new + (1.0 - alpha) * avg
}

/// Streaming covariance of two variables (Welford)
#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct RunningCovariance {
    /// Number of pairs seen
    pub count: u32,
    /// Running mean of x
    pub mean_x: f32,
    /// Running mean of y
    pub mean_y: f32,
    /// Sum of squared deviations of x
    pub m2_x: f32,
    /// Sum of squared deviations of y
    pub m2_y: f32,
    /// Co-moment of x and y
    pub c_xy: f32,
}

impl RunningCovariance {
    /// Fold in one (x, y) pair
    pub fn push(&mut self, x: f32, y: f32) {
        if !x.is_finite() || !y.is_finite() {
            return;
        }

        self.count = self.count.saturating_add(1);
        let n = self.count as f32;

        let dx = x - self.mean_x;
        self.mean_x += dx / n;
        let dy = y - self.mean_y;
        self.mean_y += dy / n;

        // Second factor uses the updated means
        self.m2_x += dx * (x - self.mean_x);
        self.m2_y += dy * (y - self.mean_y);
        self.c_xy += dx * (y - self.mean_y);
    }

    /// Population variance of x
    pub fn variance_x(&self) -> f32 {
        if self.count < 2 {
            return 0.0;
        }
        self.m2_x / self.count as f32
    }

    /// Least-squares slope of y on x, if x varies enough
    pub fn slope(&self, min_variance: f32) -> Option<f32> {
        if self.count < 2 || self.variance_x() < min_variance {
            return None;
        }
        Some(self.c_xy / self.m2_x)
    }

    /// Prediction of y at x from the fitted line
    pub fn predict(&self, x: f32, min_variance: f32) -> Option<f32> {
        let slope = self.slope(min_variance)?;
        Some(self.mean_y + slope * (x - self.mean_x))
    }

    /// Coefficient of determination of the linear fit
    pub fn r_squared(&self) -> f32 {
        if self.m2_x <= 0.0 || self.m2_y <= 0.0 {
            return 0.0;
        }
        unit_clamp((self.c_xy * self.c_xy) / (self.m2_x * self.m2_y))
    }
}
