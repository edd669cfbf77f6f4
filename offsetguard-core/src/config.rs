//! Controller configuration
//!
//! [`ControllerConfig`] gathers the config of every component owned by one
//! [`DeviceController`](crate::controller::DeviceController). With the
//! `serde` feature every field defaults, so a partial document such as
//!
//! ```json
//! { "engine": { "max_offset_c": 3.0 }, "scheduler": { "profile": "comfort" } }
//! ```
//!
//! is a complete configuration.

use crate::{
    constants::scheduling::DEFAULT_SAVE_INTERVAL_MINUTES,
    engine::EngineConfig,
    errors::{LearningError, LearningResult},
    forecast::ForecastConfig,
    hysteresis::{HysteresisConfig, SeasonalConfig},
    learning::{DelayConfig, OffsetLearnerConfig},
    outlier::OutlierConfig,
    thermal::{SchedulerConfig, ThermalConfig},
    time::LocalClock,
    types::PowerClassifier,
};

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ControllerConfig {
    pub engine: EngineConfig,
    pub learner: OffsetLearnerConfig,
    pub hysteresis: HysteresisConfig,
    pub seasonal: SeasonalConfig,
    pub outlier: OutlierConfig,
    pub power: PowerClassifier,
    pub thermal: ThermalConfig,
    pub scheduler: SchedulerConfig,
    pub delay: DelayConfig,
    pub forecast: ForecastConfig,
    /// Local time used for hour buckets and quiet hours
    pub clock: LocalClock,
    /// Minutes between persistence saves
    pub save_interval_minutes: u64,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            learner: OffsetLearnerConfig::default(),
            hysteresis: HysteresisConfig::default(),
            seasonal: SeasonalConfig::default(),
            outlier: OutlierConfig::default(),
            power: PowerClassifier::default(),
            thermal: ThermalConfig::default(),
            scheduler: SchedulerConfig::default(),
            delay: DelayConfig::default(),
            forecast: ForecastConfig::default(),
            clock: LocalClock::default(),
            save_interval_minutes: DEFAULT_SAVE_INTERVAL_MINUTES,
        }
    }
}

impl ControllerConfig {
    /// Validate every component config, reporting the first failure
    pub fn validate(&self) -> LearningResult<()> {
        self.engine.validate()?;
        self.learner.validate()?;
        self.hysteresis.validate()?;
        self.seasonal.validate()?;
        self.outlier.validate()?;
        self.thermal.validate()?;
        self.scheduler.validate()?;
        self.delay.validate()?;
        self.forecast.validate()?;

        if !(self.power.idle_threshold_w > 0.0) || !(self.power.margin_w >= 0.0)
            || self.power.margin_w >= self.power.idle_threshold_w
        {
            return Err(LearningError::InvalidConfig {
                field: "power",
                reason: "need 0 <= margin_w < idle_threshold_w",
            });
        }
        if !(-14 * 60..=14 * 60).contains(&self.clock.utc_offset_minutes) {
            return Err(LearningError::InvalidConfig {
                field: "clock.utc_offset_minutes",
                reason: "must be within ±14 h",
            });
        }
        if self.save_interval_minutes == 0 {
            return Err(LearningError::InvalidConfig {
                field: "save_interval_minutes",
                reason: "must be non-zero",
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::thermal::LearningProfile;

    #[test]
    fn defaults_are_valid() {
        assert!(ControllerConfig::default().validate().is_ok());
    }

    #[test]
    fn component_errors_surface() {
        let mut config = ControllerConfig::default();
        config.scheduler.profile = LearningProfile::Custom { min_interval_hours: 24 * 8 };

        assert!(matches!(
            config.validate(),
            Err(LearningError::InvalidConfig { field: "scheduler.intervals", .. })
        ));
    }

    #[test]
    fn power_margin_must_fit_threshold() {
        let mut config = ControllerConfig::default();
        config.power.margin_w = 80.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn clock_offset_bounds() {
        let mut config = ControllerConfig::default();
        config.clock = LocalClock::with_offset_minutes(-5 * 60);
        assert!(config.validate().is_ok());
        config.clock = LocalClock::with_offset_minutes(20 * 60);
        assert!(config.validate().is_err());
    }
}
