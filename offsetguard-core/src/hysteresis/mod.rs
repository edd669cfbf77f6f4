//! Hysteresis Learning
//!
//! ## Overview
//!
//! An HVAC unit does not hold a room at one temperature. It starts
//! conditioning when the room drifts past an upper threshold and stops once
//! it has pulled the room below a lower one. The gap between the two is the
//! device's hysteresis, and it tells the offset learner what phase of the
//! cycle the room is in.
//!
//! ```text
//!   °C
//! 24.2 ┤─────╮start           ╭──── start threshold (median of starts)
//!      │      ╲              ╱
//!      │       ╲  cooling   ╱ drifting
//! 23.6 ┤────────╰──stop────╯─────── stop threshold (median of stops)
//!      └──────────────────────────▶ time
//! ```
//!
//! Two learners live here:
//!
//! - [`HysteresisLearner`]: medians of room temperature at each power
//!   transition, plus the five-way context label
//! - [`SeasonalHysteresisLearner`]: completed cycles bucketed by outdoor
//!   temperature, because the gap widens on hot days

mod learner;
mod seasonal;

pub use learner::{
    HysteresisConfig, HysteresisLearner, HysteresisSnapshot, HysteresisState, HysteresisThresholds,
};
pub use seasonal::{LearnedPattern, SeasonalConfig, SeasonalHysteresisLearner, SeasonalSnapshot};
