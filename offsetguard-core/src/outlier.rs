//! Outlier Detection Ahead of Learning
//!
//! ## Overview
//!
//! A single bad sample (a sensor reporting 85 °C after a brown-out, a power
//! meter spiking while the compressor starts) can poison a streaming learner
//! for days. The detector sits in front of every learner and decides whether
//! an event may be learned from.
//!
//! ## Algorithm
//!
//! Each channel keeps a sliding window (default 50) of accepted values. A new
//! value is an outlier when either:
//!
//! 1. It lies outside the channel's hard bounds (temperature −10..50 °C,
//!    power 0..5000 W) or is not a finite number, or
//! 2. The window holds at least 3 samples and the modified Z-score exceeds
//!    the sensitivity (default 2.5):
//!
//! ```text
//! z = 0.6745 × (x − median) / MAD
//! ```
//!
//! The MAD has a per-channel floor so a perfectly flat window (every reading
//! identical) does not turn any tiny change into an infinite score.
//!
//! Outliers never enter the window, so one spike cannot drag the median.
//! They are still reported so callers skip learning for that event.
//!
//! A run of statistical rejections (default 10 in a row) means the room moved
//! to a new regime rather than a sensor misbehaving. The channel window is
//! then cleared and rebuilds from the next readings. Hard-bound failures
//! never count toward the run.

use crate::{
    buffer::RingBuffer,
    constants::{
        buffers::OUTLIER_WINDOW_SIZE,
        learning::{
            DEFAULT_OUTLIER_SENSITIVITY, MIN_OUTLIER_SAMPLES, MODIFIED_Z_SCALE,
            OUTLIER_REGIME_RESET_STREAK, POWER_MAD_FLOOR_W, TEMP_MAD_FLOOR_C,
        },
        limits::{POWER_MAX_W, POWER_MIN_W, ROOM_TEMP_MAX_C, ROOM_TEMP_MIN_C},
    },
    errors::{LearningError, LearningResult},
    stats,
};
use alloc::vec::Vec;

/// Input channel of the detector
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Channel {
    /// Room or device temperature (°C)
    Temperature,
    /// Electrical power draw (W)
    Power,
}

impl Channel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Temperature => "temperature",
            Self::Power => "power",
        }
    }
}

/// Detector configuration
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct OutlierConfig {
    /// Modified Z-score threshold
    pub sensitivity: f32,
    /// Samples needed before the statistical test applies
    pub min_samples: usize,
    /// Hard temperature bounds (°C)
    pub temp_min_c: f32,
    pub temp_max_c: f32,
    /// Hard power bounds (W)
    pub power_min_w: f32,
    pub power_max_w: f32,
    /// Consecutive statistical rejections that clear a window, 0 disables
    pub regime_reset_streak: u32,
}

impl Default for OutlierConfig {
    fn default() -> Self {
        Self {
            sensitivity: DEFAULT_OUTLIER_SENSITIVITY,
            min_samples: MIN_OUTLIER_SAMPLES,
            temp_min_c: ROOM_TEMP_MIN_C,
            temp_max_c: ROOM_TEMP_MAX_C,
            power_min_w: POWER_MIN_W,
            power_max_w: POWER_MAX_W,
            regime_reset_streak: OUTLIER_REGIME_RESET_STREAK,
        }
    }
}

impl OutlierConfig {
    /// Tighter detector for indoor sensors away from windows and vents
    pub fn indoor() -> Self {
        Self {
            sensitivity: 2.0,
            ..Self::default()
        }
    }

    pub fn validate(&self) -> LearningResult<()> {
        if !(self.sensitivity > 0.0) {
            return Err(LearningError::InvalidConfig {
                field: "outlier.sensitivity",
                reason: "must be positive",
            });
        }
        if self.temp_min_c >= self.temp_max_c || self.power_min_w >= self.power_max_w {
            return Err(LearningError::InvalidConfig {
                field: "outlier.bounds",
                reason: "min must be below max",
            });
        }
        Ok(())
    }

    fn bounds(&self, channel: Channel) -> (f32, f32) {
        match channel {
            Channel::Temperature => (self.temp_min_c, self.temp_max_c),
            Channel::Power => (self.power_min_w, self.power_max_w),
        }
    }
}

/// Counters exposed in diagnostics
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OutlierStats {
    /// Values passed to `ingest`
    pub checked: u32,
    /// Values rejected as outliers
    pub flagged: u32,
    /// Windows cleared after a run of rejections
    pub resets: u32,
}

/// Persisted detector windows
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct OutlierSnapshot {
    pub temperature: Vec<f32>,
    pub power: Vec<f32>,
}

/// Per-channel sliding-window outlier detector
#[derive(Debug, Clone)]
pub struct OutlierDetector {
    config: OutlierConfig,
    temperature: RingBuffer<f32, OUTLIER_WINDOW_SIZE>,
    power: RingBuffer<f32, OUTLIER_WINDOW_SIZE>,
    temperature_stats: OutlierStats,
    power_stats: OutlierStats,
    streaks: [u32; 2],
}

impl Default for OutlierDetector {
    fn default() -> Self {
        Self::new(OutlierConfig::default())
    }
}

impl OutlierDetector {
    pub fn new(config: OutlierConfig) -> Self {
        Self {
            config,
            temperature: RingBuffer::new(),
            power: RingBuffer::new(),
            temperature_stats: OutlierStats::default(),
            power_stats: OutlierStats::default(),
            streaks: [0; 2],
        }
    }

    fn window(&self, channel: Channel) -> &RingBuffer<f32, OUTLIER_WINDOW_SIZE> {
        match channel {
            Channel::Temperature => &self.temperature,
            Channel::Power => &self.power,
        }
    }

    fn mad_floor(channel: Channel) -> f32 {
        match channel {
            Channel::Temperature => TEMP_MAD_FLOOR_C,
            Channel::Power => POWER_MAD_FLOOR_W,
        }
    }

    /// Hard-bound check for a single value
    pub fn check_bounds(&self, value: f32, channel: Channel) -> LearningResult<()> {
        let (min, max) = self.config.bounds(channel);
        if !value.is_finite() || value < min || value > max {
            return Err(LearningError::OutOfRange { value, min, max });
        }
        Ok(())
    }

    /// Modified Z-score of `value` against the channel window
    ///
    /// `None` while the window holds fewer than `min_samples` values.
    pub fn modified_z_score(&self, value: f32, channel: Channel) -> Option<f32> {
        let window = self.window(channel);
        if window.len() < self.config.min_samples {
            return None;
        }

        let (center, mad) = stats::median_and_mad(window.iter().copied())?;
        let mad = mad.max(Self::mad_floor(channel));
        Some(MODIFIED_Z_SCALE * (value - center) / mad)
    }

    /// Whether `value` would be rejected, without touching the window
    pub fn is_outlier(&self, value: f32, channel: Channel) -> bool {
        if self.check_bounds(value, channel).is_err() {
            return true;
        }

        match self.modified_z_score(value, channel) {
            Some(z) => libm::fabsf(z) > self.config.sensitivity,
            None => false,
        }
    }

    /// Check `value` and add it to the window if it is not an outlier
    ///
    /// Returns `true` when the value was rejected.
    pub fn ingest(&mut self, value: f32, channel: Channel) -> bool {
        let out_of_bounds = self.check_bounds(value, channel).is_err();
        let outlier = self.is_outlier(value, channel);
        let reset_at = self.config.regime_reset_streak;

        let slot = channel as usize;
        let (window, stats) = match channel {
            Channel::Temperature => (&mut self.temperature, &mut self.temperature_stats),
            Channel::Power => (&mut self.power, &mut self.power_stats),
        };

        stats.checked = stats.checked.saturating_add(1);
        if !outlier {
            self.streaks[slot] = 0;
            window.push(value);
            return false;
        }

        stats.flagged = stats.flagged.saturating_add(1);
        log_debug!("{} outlier rejected: {}", channel.as_str(), value);

        if !out_of_bounds && reset_at > 0 {
            self.streaks[slot] = self.streaks[slot].saturating_add(1);
            if self.streaks[slot] >= reset_at {
                log_info!("{} window cleared after {} consecutive rejections", channel.as_str(), reset_at);
                window.clear();
                stats.resets = stats.resets.saturating_add(1);
                self.streaks[slot] = 0;
            }
        }

        true
    }

    /// Median of the accepted window
    pub fn median(&self, channel: Channel) -> Option<f32> {
        stats::median(self.window(channel).iter().copied())
    }

    /// Number of accepted values in the window
    pub fn window_len(&self, channel: Channel) -> usize {
        self.window(channel).len()
    }

    pub fn stats(&self, channel: Channel) -> OutlierStats {
        match channel {
            Channel::Temperature => self.temperature_stats,
            Channel::Power => self.power_stats,
        }
    }

    pub fn snapshot(&self) -> OutlierSnapshot {
        OutlierSnapshot {
            temperature: self.temperature.to_vec(),
            power: self.power.to_vec(),
        }
    }

    /// Restore windows, dropping any persisted value that fails the hard bounds
    pub fn restore(&mut self, snapshot: &OutlierSnapshot) {
        let temps: Vec<f32> = snapshot.temperature.iter().copied()
            .filter(|v| self.check_bounds(*v, Channel::Temperature).is_ok())
            .collect();
        let powers: Vec<f32> = snapshot.power.iter().copied()
            .filter(|v| self.check_bounds(*v, Channel::Power).is_ok())
            .collect();

        self.temperature = RingBuffer::from_slice(&temps);
        self.power = RingBuffer::from_slice(&powers);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn warmed_detector() -> OutlierDetector {
        let mut detector = OutlierDetector::default();
        for i in 0..20 {
            // 22.0 .. 22.38 °C
            detector.ingest(22.0 + (i % 20) as f32 * 0.02, Channel::Temperature);
        }
        detector
    }

    #[test]
    fn insufficient_samples_never_flag_statistically() {
        let mut detector = OutlierDetector::default();
        detector.ingest(22.0, Channel::Temperature);
        detector.ingest(22.1, Channel::Temperature);

        // Far from the two samples but inside hard bounds
        assert!(!detector.is_outlier(40.0, Channel::Temperature));
    }

    #[test]
    fn hard_bounds_always_apply() {
        let detector = OutlierDetector::default();
        assert!(detector.is_outlier(55.0, Channel::Temperature));
        assert!(detector.is_outlier(-20.0, Channel::Temperature));
        assert!(detector.is_outlier(6000.0, Channel::Power));
        assert!(detector.is_outlier(f32::NAN, Channel::Power));
        assert!(!detector.is_outlier(1200.0, Channel::Power));
    }

    #[test]
    fn spike_flagged_and_window_untouched() {
        let mut detector = warmed_detector();
        let before = detector.median(Channel::Temperature).unwrap();
        let len_before = detector.window_len(Channel::Temperature);

        assert!(detector.ingest(30.0, Channel::Temperature));
        assert_eq!(detector.window_len(Channel::Temperature), len_before);
        assert_eq!(detector.median(Channel::Temperature).unwrap(), before);

        let stats = detector.stats(Channel::Temperature);
        assert_eq!(stats.flagged, 1);
        assert_eq!(stats.checked, 21);
    }

    #[test]
    fn normal_values_accepted() {
        let mut detector = warmed_detector();
        assert!(!detector.ingest(22.2, Channel::Temperature));
        assert_eq!(detector.window_len(Channel::Temperature), 21);
    }

    #[test]
    fn flat_window_uses_mad_floor() {
        let mut detector = OutlierDetector::default();
        for _ in 0..10 {
            detector.ingest(21.0, Channel::Temperature);
        }

        // 0.6745 * 0.5 / 0.3 = 1.12 - inside sensitivity
        assert!(!detector.is_outlier(21.5, Channel::Temperature));
        // 0.6745 * 1.5 / 0.3 = 3.37 - outlier
        assert!(detector.is_outlier(22.5, Channel::Temperature));
    }

    #[test]
    fn channels_are_independent() {
        let mut detector = warmed_detector();
        for _ in 0..10 {
            detector.ingest(900.0, Channel::Power);
        }
        assert!(!detector.is_outlier(905.0, Channel::Power));
        assert_eq!(detector.window_len(Channel::Temperature), 20);
    }

    #[test]
    fn sustained_shift_clears_window() {
        let mut detector = warmed_detector();
        for _ in 0..9 {
            assert!(detector.ingest(26.0, Channel::Temperature));
        }
        assert_eq!(detector.window_len(Channel::Temperature), 20);

        assert!(detector.ingest(26.0, Channel::Temperature));
        assert_eq!(detector.window_len(Channel::Temperature), 0);
        assert_eq!(detector.stats(Channel::Temperature).resets, 1);

        // New regime is learned from scratch
        assert!(!detector.ingest(26.0, Channel::Temperature));
        assert_eq!(detector.window_len(Channel::Temperature), 1);
    }

    #[test]
    fn hard_bound_failures_do_not_reset() {
        let mut detector = warmed_detector();
        for _ in 0..30 {
            assert!(detector.ingest(80.0, Channel::Temperature));
        }
        assert_eq!(detector.window_len(Channel::Temperature), 20);
        assert_eq!(detector.stats(Channel::Temperature).resets, 0);
    }

    #[test]
    fn disabled_reset_never_clears_or_counts() {
        let mut detector = OutlierDetector::new(OutlierConfig {
            regime_reset_streak: 0,
            ..OutlierConfig::default()
        });
        for i in 0..20 {
            detector.ingest(22.0 + i as f32 * 0.02, Channel::Temperature);
        }

        for _ in 0..50 {
            assert!(detector.ingest(26.0, Channel::Temperature));
        }
        assert_eq!(detector.window_len(Channel::Temperature), 20);
        assert_eq!(detector.stats(Channel::Temperature).resets, 0);
        assert_eq!(detector.streaks, [0, 0]);
    }

    #[test]
    fn streak_limit_at_top_of_range() {
        let mut detector = OutlierDetector::new(OutlierConfig {
            regime_reset_streak: u32::MAX,
            ..OutlierConfig::default()
        });
        for i in 0..20 {
            detector.ingest(22.0 + i as f32 * 0.02, Channel::Temperature);
        }
        detector.streaks[Channel::Temperature as usize] = u32::MAX - 1;

        // Reaching the limit resets, then counting starts over
        assert!(detector.ingest(26.0, Channel::Temperature));
        assert_eq!(detector.stats(Channel::Temperature).resets, 1);
        assert_eq!(detector.streaks[Channel::Temperature as usize], 0);
    }

    #[test]
    fn snapshot_roundtrip_filters_bad_values() {
        let detector = warmed_detector();
        let mut snapshot = detector.snapshot();
        snapshot.temperature.push(99.0);

        let mut restored = OutlierDetector::default();
        restored.restore(&snapshot);
        assert_eq!(restored.window_len(Channel::Temperature), 20);
    }
}
