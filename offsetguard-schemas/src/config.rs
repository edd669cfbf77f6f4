//! Controller configuration from JSON
//!
//! Every section and field is optional; omitted values take their defaults.
//! The parsed configuration is validated before it is returned.
//!
//! ```json
//! {
//!   "engine": { "max_offset_c": 4.0 },
//!   "scheduler": { "profile": "comfort", "quiet_hours_start_minute": 120 },
//!   "clock": { "utc_offset_minutes": 60 },
//!   "save_interval_minutes": 15
//! }
//! ```

use std::{fs, path::Path};

use offsetguard_core::ControllerConfig;

use crate::SchemaError;

/// Parse and validate a configuration document
pub fn load_config(json: &str) -> Result<ControllerConfig, SchemaError> {
    let config: ControllerConfig = if json.trim().is_empty() {
        ControllerConfig::default()
    } else {
        serde_json::from_str(json)?
    };

    config
        .validate()
        .map_err(|err| SchemaError::Validation(err.to_string()))?;
    Ok(config)
}

/// [`load_config`] from a file
pub fn load_config_file(path: impl AsRef<Path>) -> Result<ControllerConfig, SchemaError> {
    let json = fs::read_to_string(path)?;
    load_config(&json)
}

/// Pretty-printed configuration with every field spelled out
pub fn config_to_json(config: &ControllerConfig) -> Result<String, SchemaError> {
    Ok(serde_json::to_string_pretty(config)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use offsetguard_core::thermal::LearningProfile;

    #[test]
    fn empty_document_is_default() {
        assert_eq!(load_config("").unwrap(), ControllerConfig::default());
        assert_eq!(load_config("{}").unwrap(), ControllerConfig::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config = load_config(
            r#"{
                "engine": { "max_offset_c": 4.0 },
                "scheduler": { "profile": "comfort" },
                "save_interval_minutes": 15
            }"#,
        )
        .unwrap();

        let defaults = ControllerConfig::default();
        assert_eq!(config.engine.max_offset_c, 4.0);
        assert_eq!(config.engine.gradual_adjustment_rate_c, defaults.engine.gradual_adjustment_rate_c);
        assert_eq!(config.scheduler.profile, LearningProfile::Comfort);
        assert_eq!(config.save_interval_minutes, 15);
        assert_eq!(config.thermal, defaults.thermal);
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = load_config(r#"{ "engine": { "max_offset_c": -1.0 } }"#).unwrap_err();
        assert!(matches!(err, SchemaError::Validation(ref msg) if msg.contains("max_offset_c")));

        assert!(matches!(load_config("[1, 2"), Err(SchemaError::Serialization(_))));
    }

    #[test]
    fn written_config_reads_back() {
        let mut config = ControllerConfig::default();
        config.scheduler.profile = LearningProfile::Custom { min_interval_hours: 8 };
        config.clock.utc_offset_minutes = -300;

        let json = config_to_json(&config).unwrap();
        assert_eq!(load_config(&json).unwrap(), config);
    }
}
