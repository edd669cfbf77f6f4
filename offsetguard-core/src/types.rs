//! Shared domain types
//!
//! Modes, power classification and the offset sample record that flows
//! between the engine and its learners.

use crate::constants::limits::{DEFAULT_POWER_CLASSIFIER_MARGIN_W, DEFAULT_POWER_IDLE_THRESHOLD_W};
use crate::time::Timestamp;

/// HVAC operating mode reported by the device
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum HvacMode {
    #[default]
    Cool,
    Heat,
    Dry,
    FanOnly,
    Auto,
    Off,
}

impl HvacMode {
    /// Direction the device moves room temperature
    ///
    /// -1 for cooling modes, +1 for heating, 0 when it does not condition.
    pub fn direction(&self) -> f32 {
        match self {
            Self::Cool | Self::Dry | Self::Auto => -1.0,
            Self::Heat => 1.0,
            Self::FanOnly | Self::Off => 0.0,
        }
    }

    /// Whether the mode actively conditions the room
    pub fn is_conditioning(&self) -> bool {
        self.direction() != 0.0
    }

    /// Whether the mode cools
    pub fn is_cooling(&self) -> bool {
        self.direction() < 0.0
    }

    /// Stable label for logs and diagnostics
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Cool => "cool",
            Self::Heat => "heat",
            Self::Dry => "dry",
            Self::FanOnly => "fan_only",
            Self::Auto => "auto",
            Self::Off => "off",
        }
    }
}

/// User-selected operating mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum OperatingMode {
    #[default]
    Normal,
    Away,
    Sleep,
    Boost,
}

impl OperatingMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Away => "away",
            Self::Sleep => "sleep",
            Self::Boost => "boost",
        }
    }
}

/// Power draw classification
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum PowerState {
    /// Compressor or heater off
    Idle,
    /// Actively conditioning
    Active,
}

/// Direction of a power transition
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransitionDirection {
    /// Idle → active: the device started conditioning
    Start,
    /// Active → idle: the device reached its internal target
    Stop,
}

impl TransitionDirection {
    /// Transition implied by moving from `previous` to `current`
    pub fn between(previous: PowerState, current: PowerState) -> Option<Self> {
        match (previous, current) {
            (PowerState::Idle, PowerState::Active) => Some(Self::Start),
            (PowerState::Active, PowerState::Idle) => Some(Self::Stop),
            _ => None,
        }
    }
}

/// Classifies wattage into idle/active with a margin against flapping
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PowerClassifier {
    /// Draw below which the device is idle (W)
    pub idle_threshold_w: f32,
    /// Band around the threshold where the previous state is kept (W)
    pub margin_w: f32,
}

impl Default for PowerClassifier {
    fn default() -> Self {
        Self {
            idle_threshold_w: DEFAULT_POWER_IDLE_THRESHOLD_W,
            margin_w: DEFAULT_POWER_CLASSIFIER_MARGIN_W,
        }
    }
}

impl PowerClassifier {
    /// Classify a reading, keeping `previous` while inside the margin band
    pub fn classify(&self, power_w: f32, previous: Option<PowerState>) -> Option<PowerState> {
        if !power_w.is_finite() {
            return None;
        }

        let upper = self.idle_threshold_w + self.margin_w;
        let lower = self.idle_threshold_w - self.margin_w;

        if power_w >= upper {
            Some(PowerState::Active)
        } else if power_w <= lower {
            Some(PowerState::Idle)
        } else {
            Some(previous.unwrap_or(if power_w >= self.idle_threshold_w {
                PowerState::Active
            } else {
                PowerState::Idle
            }))
        }
    }
}

/// One observed operating point, appended on every accepted feedback event
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OffsetSample {
    pub timestamp: Timestamp,
    pub room_temp: f32,
    pub device_internal_temp: f32,
    pub outdoor_temp: Option<f32>,
    pub power_reading: Option<f32>,
    pub mode: HvacMode,
    /// Offset that was applied when the sample was taken
    pub applied_offset: f32,
    /// Offset the device actually needed (internal − room)
    pub observed_offset: f32,
}
