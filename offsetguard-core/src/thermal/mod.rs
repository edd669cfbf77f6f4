//! Thermal Response Model and State Machine
//!
//! ## Overview
//!
//! A room behaves like an RC circuit: it moves toward an asymptote (the
//! outdoor temperature when the unit is off, the unit's target when it is
//! conditioning) with time constant tau. Knowing tau lets the controller
//! predict overshoot and pre-condition ahead of a forecast.
//!
//! ```text
//!                 ┌──────────┐ period elapsed  ┌──────────┐
//!                 │ PRIMING  │────────────────▶│ DRIFTING │◀───────────┐
//!                 └──────────┘                 └──────────┘            │
//!                                start ▲  │ stop     │ approved        │
//!                                      │  ▼          ▼                 │
//!  ┌──────────┐   mode change   ┌────────────┐   ┌─────────┐  done  ┌─────────────┐
//!  │ RECOVERY │◀────────────────│ CORRECTING │──▶│ PROBING │───────▶│ CALIBRATING │
//!  └──────────┘                 └────────────┘   └─────────┘ abort  └─────────────┘
//!       │ elapsed                      ▲                                   │
//!       └────────▶ DRIFTING / CORRECTING ◀─────────────────────────────────┘
//! ```
//!
//! - [`state`]: the tagged enum and the (state × event) transition table
//! - [`ThermalModel`]: tau estimates, passive refinement, probe folding
//! - [`ProbeSession`]: log-linear tau fit over one probe
//! - [`ThermalManager`]: owns state and model, produces control decisions
//! - [`ProbeScheduler`]: decides when a probe may start and when it must stop

mod manager;
mod model;
mod probe;
mod scheduler;
pub mod state;

pub use manager::{
    ComfortPreference, ControlAction, ControlDecision, ThermalConfig, ThermalManager,
    ThermalObservation, ThermalSnapshot,
};
pub use model::{ProbeResult, TauEstimate, ThermalModel, ThermalModelConfig, ThermalModelSnapshot};
pub use probe::{ProbeFit, ProbeOutcome, ProbeSession};
pub use scheduler::{
    AbortCheck, AbortReason, CalendarProvider, LearningProfile, ManualOverrideProvider,
    OpportunityProvider, OpportunitySignals, PresenceProvider, ProbeScheduler, QuietHoursProvider,
    SchedulerConfig, SchedulerSnapshot,
};
pub use state::{ThermalEvent, ThermalState};
