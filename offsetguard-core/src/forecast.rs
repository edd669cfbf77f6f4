//! Predictive offsets from a resolved weather forecast
//!
//! The host fetches and parses the forecast; this module only evaluates it.
//! Three strategies look ahead from `now`:
//!
//! | Strategy            | Trigger                           | Modes   | Offset  |
//! |---------------------|-----------------------------------|---------|---------|
//! | Heat wave pre-cool  | ≥ 30 °C within 6 h                | cooling | −1.0 °C |
//! | Clear-sky pre-cool  | clear and ≥ 26 °C within 3 h      | cooling | −0.5 °C |
//! | Cold snap pre-heat  | ≤ 0 °C within 6 h                 | heating | +1.0 °C |
//!
//! The strongest applicable strategy wins. A forecast older than six hours
//! is ignored.

use heapless::Vec as BoundedVec;

use crate::{
    constants::{
        buffers::MAX_FORECAST_POINTS,
        forecast::{
            CLEAR_SKY_ADJUSTMENT_C, CLEAR_SKY_LOOKAHEAD_HOURS, CLEAR_SKY_TRIGGER_C,
            COLD_SNAP_ADJUSTMENT_C, COLD_SNAP_LOOKAHEAD_HOURS, COLD_SNAP_TRIGGER_C,
            FORECAST_STALE_HOURS, HEAT_WAVE_ADJUSTMENT_C, HEAT_WAVE_LOOKAHEAD_HOURS,
            HEAT_WAVE_TRIGGER_C,
        },
        time::MS_PER_HOUR,
    },
    errors::{LearningError, LearningResult},
    time::Timestamp,
    types::HvacMode,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum SkyCondition {
    Clear,
    PartlyCloudy,
    Cloudy,
    Rain,
    Snow,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ForecastPoint {
    pub timestamp: Timestamp,
    /// Outdoor temperature (°C)
    pub temperature: f32,
    pub condition: SkyCondition,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForecastStrategy {
    HeatWavePreCool,
    ClearSkyPreCool,
    ColdSnapPreHeat,
}

impl ForecastStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::HeatWavePreCool => "heat_wave_pre_cool",
            Self::ClearSkyPreCool => "clear_sky_pre_cool",
            Self::ColdSnapPreHeat => "cold_snap_pre_heat",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForecastAdjustment {
    pub strategy: ForecastStrategy,
    /// Additive offset (°C)
    pub offset: f32,
    /// Time of the forecast point that triggered it
    pub trigger_at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ForecastConfig {
    pub enabled: bool,
    pub stale_hours: u64,
    pub heat_wave_trigger_c: f32,
    pub heat_wave_lookahead_hours: u64,
    pub heat_wave_adjustment_c: f32,
    pub clear_sky_trigger_c: f32,
    pub clear_sky_lookahead_hours: u64,
    pub clear_sky_adjustment_c: f32,
    pub cold_snap_trigger_c: f32,
    pub cold_snap_lookahead_hours: u64,
    pub cold_snap_adjustment_c: f32,
}

impl Default for ForecastConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            stale_hours: FORECAST_STALE_HOURS,
            heat_wave_trigger_c: HEAT_WAVE_TRIGGER_C,
            heat_wave_lookahead_hours: HEAT_WAVE_LOOKAHEAD_HOURS,
            heat_wave_adjustment_c: HEAT_WAVE_ADJUSTMENT_C,
            clear_sky_trigger_c: CLEAR_SKY_TRIGGER_C,
            clear_sky_lookahead_hours: CLEAR_SKY_LOOKAHEAD_HOURS,
            clear_sky_adjustment_c: CLEAR_SKY_ADJUSTMENT_C,
            cold_snap_trigger_c: COLD_SNAP_TRIGGER_C,
            cold_snap_lookahead_hours: COLD_SNAP_LOOKAHEAD_HOURS,
            cold_snap_adjustment_c: COLD_SNAP_ADJUSTMENT_C,
        }
    }
}

impl ForecastConfig {
    pub fn validate(&self) -> LearningResult<()> {
        let adjustments = [
            self.heat_wave_adjustment_c,
            self.clear_sky_adjustment_c,
            self.cold_snap_adjustment_c,
        ];
        if adjustments.iter().any(|a| !a.is_finite()) {
            return Err(LearningError::InvalidConfig {
                field: "forecast.adjustments",
                reason: "must be finite",
            });
        }
        if self.stale_hours == 0 {
            return Err(LearningError::InvalidConfig {
                field: "forecast.stale_hours",
                reason: "must be non-zero",
            });
        }
        Ok(())
    }
}

/// Evaluates the latest resolved forecast
#[derive(Debug, Clone)]
pub struct ForecastEngine {
    config: ForecastConfig,
    points: BoundedVec<ForecastPoint, MAX_FORECAST_POINTS>,
    updated_at: Option<Timestamp>,
}

impl Default for ForecastEngine {
    fn default() -> Self {
        Self::new(ForecastConfig::default())
    }
}

impl ForecastEngine {
    pub fn new(config: ForecastConfig) -> Self {
        Self {
            config,
            points: BoundedVec::new(),
            updated_at: None,
        }
    }

    /// Replace the forecast with the earliest future points
    ///
    /// Returns how many points were kept.
    pub fn update(&mut self, points: &[ForecastPoint], now: Timestamp) -> usize {
        self.points.clear();
        for point in points.iter().filter(|p| p.temperature.is_finite() && p.timestamp >= now) {
            if self.points.push(*point).is_err() {
                // Keep the nearest points when the host sends more than fit
                let Some(latest) = self
                    .points
                    .iter()
                    .enumerate()
                    .max_by_key(|(_, p)| p.timestamp)
                    .map(|(i, p)| (i, p.timestamp))
                else {
                    continue;
                };
                if point.timestamp < latest.1 {
                    self.points[latest.0] = *point;
                }
            }
        }
        self.points.sort_unstable_by_key(|p| p.timestamp);
        self.updated_at = Some(now);
        self.points.len()
    }

    pub fn points(&self) -> &[ForecastPoint] {
        &self.points
    }

    pub fn is_stale(&self, now: Timestamp) -> bool {
        match self.updated_at {
            Some(at) => now.saturating_sub(at) > self.config.stale_hours.saturating_mul(MS_PER_HOUR),
            None => true,
        }
    }

    fn first_within<F>(&self, now: Timestamp, hours: u64, trigger: F) -> Option<Timestamp>
    where
        F: Fn(&ForecastPoint) -> bool,
    {
        let horizon = now.saturating_add(hours.saturating_mul(MS_PER_HOUR));
        self.points
            .iter()
            .filter(|p| p.timestamp >= now && p.timestamp <= horizon)
            .find(|p| trigger(*p))
            .map(|p| p.timestamp)
    }

    /// Strongest applicable predictive adjustment
    pub fn predictive_offset(&self, now: Timestamp, mode: HvacMode) -> Option<ForecastAdjustment> {
        if !self.config.enabled || self.is_stale(now) {
            return None;
        }

        let c = &self.config;
        let mut candidates: BoundedVec<ForecastAdjustment, 3> = BoundedVec::new();

        if mode.is_cooling() {
            if let Some(at) = self.first_within(now, c.heat_wave_lookahead_hours, |p| {
                p.temperature >= c.heat_wave_trigger_c
            }) {
                let _ = candidates.push(ForecastAdjustment {
                    strategy: ForecastStrategy::HeatWavePreCool,
                    offset: c.heat_wave_adjustment_c,
                    trigger_at: at,
                });
            }
            if let Some(at) = self.first_within(now, c.clear_sky_lookahead_hours, |p| {
                p.condition == SkyCondition::Clear && p.temperature >= c.clear_sky_trigger_c
            }) {
                let _ = candidates.push(ForecastAdjustment {
                    strategy: ForecastStrategy::ClearSkyPreCool,
                    offset: c.clear_sky_adjustment_c,
                    trigger_at: at,
                });
            }
        } else if mode == HvacMode::Heat {
            if let Some(at) = self.first_within(now, c.cold_snap_lookahead_hours, |p| {
                p.temperature <= c.cold_snap_trigger_c
            }) {
                let _ = candidates.push(ForecastAdjustment {
                    strategy: ForecastStrategy::ColdSnapPreHeat,
                    offset: c.cold_snap_adjustment_c,
                    trigger_at: at,
                });
            }
        }

        candidates.into_iter().fold(None, |best: Option<ForecastAdjustment>, a| match best {
            Some(b) if libm::fabsf(b.offset) >= libm::fabsf(a.offset) => Some(b),
            _ => Some(a),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const HOUR: u64 = MS_PER_HOUR;

    fn point(hours: u64, temperature: f32, condition: SkyCondition) -> ForecastPoint {
        ForecastPoint {
            timestamp: hours * HOUR,
            temperature,
            condition,
        }
    }

    #[test]
    fn no_forecast_no_adjustment() {
        let engine = ForecastEngine::default();
        assert!(engine.predictive_offset(0, HvacMode::Cool).is_none());
    }

    #[test]
    fn heat_wave_beats_clear_sky() {
        let mut engine = ForecastEngine::default();
        engine.update(
            &[
                point(1, 27.0, SkyCondition::Clear),
                point(4, 31.0, SkyCondition::Clear),
            ],
            0,
        );

        let adjustment = engine.predictive_offset(0, HvacMode::Cool).unwrap();
        assert_eq!(adjustment.strategy, ForecastStrategy::HeatWavePreCool);
        assert_eq!(adjustment.offset, -1.0);
        assert_eq!(adjustment.trigger_at, 4 * HOUR);
    }

    #[test]
    fn clear_sky_alone() {
        let mut engine = ForecastEngine::default();
        engine.update(&[point(2, 27.0, SkyCondition::Clear), point(2, 27.0, SkyCondition::Cloudy)], 0);
        let adjustment = engine.predictive_offset(0, HvacMode::Cool).unwrap();
        assert_eq!(adjustment.strategy, ForecastStrategy::ClearSkyPreCool);
        assert_eq!(adjustment.offset, -0.5);
    }

    #[test]
    fn cold_snap_only_when_heating() {
        let mut engine = ForecastEngine::default();
        engine.update(&[point(5, -2.0, SkyCondition::Snow)], 0);
        assert_eq!(engine.predictive_offset(0, HvacMode::Heat).unwrap().offset, 1.0);
        assert!(engine.predictive_offset(0, HvacMode::Cool).is_none());
    }

    #[test]
    fn beyond_lookahead_ignored() {
        let mut engine = ForecastEngine::default();
        engine.update(&[point(8, 35.0, SkyCondition::Clear)], 0);
        assert!(engine.predictive_offset(0, HvacMode::Cool).is_none());
    }

    #[test]
    fn stale_forecast_ignored() {
        let mut engine = ForecastEngine::default();
        engine.update(&[point(10, 35.0, SkyCondition::Clear)], 0);
        assert!(engine.predictive_offset(5 * HOUR, HvacMode::Cool).is_some());
        assert!(engine.is_stale(7 * HOUR));
        assert!(engine.predictive_offset(7 * HOUR, HvacMode::Cool).is_none());
    }

    #[test]
    fn keeps_nearest_points_when_overfull() {
        let mut engine = ForecastEngine::default();
        let points: alloc::vec::Vec<ForecastPoint> = (0..60u64)
            .rev()
            .map(|h| point(h, 20.0, SkyCondition::Cloudy))
            .collect();
        assert_eq!(engine.update(&points, 0), MAX_FORECAST_POINTS);
        assert_eq!(engine.points().first().unwrap().timestamp, 0);
        assert_eq!(engine.points().last().unwrap().timestamp, 47 * HOUR);
    }

    #[test]
    fn past_and_invalid_points_dropped() {
        let mut engine = ForecastEngine::default();
        let kept = engine.update(
            &[point(1, 20.0, SkyCondition::Clear), point(3, f32::NAN, SkyCondition::Clear)],
            2 * HOUR,
        );
        assert_eq!(kept, 0);
    }
}
