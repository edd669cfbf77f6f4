//! Core learning engine for OffsetGuard
//!
//! Predicts the setpoint offset an HVAC device needs when its own sensor
//! disagrees with the room, and learns from how the room actually responds.
//! One [`DeviceController`] per device owns every learner for it.
//!
//! Key constraints:
//! - Bounded memory everywhere (ring buffers, fixed bucket counts)
//! - No I/O, no clock reads: every call receives its timestamp
//! - Sub-millisecond offset calculation
//!
//! ```rust
//! use offsetguard_core::{OffsetEngine, OffsetInput};
//!
//! let engine = OffsetEngine::default();
//! let result = engine.calculate_offset(&OffsetInput {
//!     room_temp: Some(24.0),
//!     device_internal_temp: Some(20.8),
//!     ..OffsetInput::default()
//! });
//!
//! // No learned data yet: the rule-based baseline
//! assert!((result.offset + 3.2).abs() < 1e-4);
//! assert_eq!(result.confidence, 0.0);
//! ```

#![cfg_attr(not(feature = "std"), no_std)]
#![deny(unsafe_code)]

extern crate alloc;

#[macro_use]
mod macros;

pub mod buffer;
pub mod confidence;
pub mod config;
pub mod constants;
pub mod controller;
pub mod diagnostics;
pub mod engine;
pub mod errors;
pub mod forecast;
pub mod hysteresis;
pub mod learning;
pub mod outlier;
pub mod state;
pub mod stats;
pub mod thermal;
pub mod time;
pub mod types;

// Public API
pub use config::ControllerConfig;
pub use controller::{DeviceController, DeviceReadings, ProbeEvent, TickOutput};
pub use diagnostics::DiagnosticSnapshot;
pub use engine::{EngineConfig, FeedbackContext, FeedbackReport, OffsetEngine, OffsetInput, OffsetResult};
pub use errors::{LearningError, LearningResult};
pub use state::{load_or_default, ControllerSnapshot, PersistedState, StateStore, CURRENT_SCHEMA_VERSION};
pub use thermal::{OpportunitySignals, ThermalState};
pub use time::{LocalClock, Timestamp};
pub use types::{HvacMode, OperatingMode, PowerState};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
