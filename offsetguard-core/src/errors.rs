//! Error Types for the Learning and Control Core
//!
//! ## Design Philosophy
//!
//! OffsetGuard runs one learning core per controlled device, often on a small
//! gateway next to the HVAC unit. The error system follows the same rules as
//! the rest of the core:
//!
//! 1. **Small Size**: Variants carry only inline numbers and `&'static str`
//!    reasons, so errors are `Copy` and can be stored in feedback reports.
//!
//! 2. **No Heap Allocation**: Nothing here allocates.
//!
//! 3. **Recovered Locally**: An error never stops the device. Every caller in
//!    the core maps an error onto a fallback (last-known-good offset, default
//!    tau, fresh learned state) and reflects it in confidence or state.
//!
//! ## Error Categories
//!
//! ### Data Problems
//! - `MissingData`: A required value is absent (sensor unavailable)
//! - `OutOfRange`: A value outside the physical bounds, handled as an outlier
//! - `InsufficientSamples`: Not enough history yet, reported via confidence
//!
//! ### Lifecycle Problems
//! - `PersistenceFailure`: The store rejected a save or a load was corrupt
//! - `InvalidTransition`: The thermal state machine refused an event
//! - `InvalidConfig`: A configuration value violates its contract
//!
//! ## Handling Strategy
//!
//! ```rust
//! use offsetguard_core::LearningError;
//!
//! fn fallback_offset(result: Result<f32, LearningError>, last_good: f32) -> f32 {
//!     match result {
//!         Ok(offset) => offset,
//!         // Sensor dropped out - keep what we had
//!         Err(LearningError::MissingData { .. }) => last_good,
//!         // Reading rejected as an outlier - prediction continues unchanged
//!         Err(LearningError::OutOfRange { .. }) => last_good,
//!         Err(_) => last_good,
//!     }
//! }
//!
//! assert_eq!(fallback_offset(Err(LearningError::MissingData { field: "room_temp" }), -1.5), -1.5);
//! ```

use thiserror_no_std::Error;

/// Result type for learning and control operations
pub type LearningResult<T> = Result<T, LearningError>;

/// Learning-core errors - kept small and `Copy`
#[derive(Error, Debug, Clone, Copy, PartialEq)]
pub enum LearningError {
    /// A required input was not available
    #[error("Missing data: {field}")]
    MissingData {
        /// Name of the absent input
        field: &'static str,
    },

    /// Value outside the hard physical bounds of its channel
    #[error("Value {value} outside range [{min}, {max}]")]
    OutOfRange {
        /// The rejected value
        value: f32,
        /// Lower hard bound
        min: f32,
        /// Upper hard bound
        max: f32,
    },

    /// Not enough history to produce the requested estimate
    #[error("Insufficient samples: need {required}, have {available}")]
    InsufficientSamples {
        /// Samples needed before the estimate is defined
        required: usize,
        /// Samples currently held
        available: usize,
    },

    /// The persistence store failed or returned unusable data
    #[error("Persistence failure: {reason}")]
    PersistenceFailure {
        reason: &'static str,
    },

    /// The thermal state machine rejected an event for the current state
    #[error("Invalid transition: {event} not allowed from {from}")]
    InvalidTransition {
        /// Label of the state the machine stayed in
        from: &'static str,
        /// Label of the rejected event
        event: &'static str,
    },

    /// A configuration value violates its documented contract
    #[error("Invalid config {field}: {reason}")]
    InvalidConfig {
        field: &'static str,
        reason: &'static str,
    },
}

impl LearningError {
    /// Whether the error only means "not learned yet"
    ///
    /// These are reported through confidence and state, never surfaced to users.
    pub fn is_insufficient_data(&self) -> bool {
        matches!(self, Self::InsufficientSamples { .. } | Self::MissingData { .. })
    }
}

#[cfg(feature = "defmt")]
impl defmt::Format for LearningError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::MissingData { field } =>
                defmt::write!(fmt, "Missing {}", field),
            Self::OutOfRange { value, min, max } =>
                defmt::write!(fmt, "Value {} outside [{}, {}]", value, min, max),
            Self::InsufficientSamples { required, available } =>
                defmt::write!(fmt, "Need {} samples, have {}", required, available),
            Self::PersistenceFailure { reason } =>
                defmt::write!(fmt, "Persistence: {}", reason),
            Self::InvalidTransition { from, event } =>
                defmt::write!(fmt, "{} rejected in {}", event, from),
            Self::InvalidConfig { field, reason } =>
                defmt::write!(fmt, "Config {}: {}", field, reason),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errors_are_small_and_copy() {
        let err = LearningError::OutOfRange { value: 60.0, min: -10.0, max: 50.0 };
        let copy = err;
        assert_eq!(err, copy);
        assert!(core::mem::size_of::<LearningError>() <= 40);
    }

    #[test]
    fn insufficient_data_classification() {
        assert!(LearningError::InsufficientSamples { required: 5, available: 2 }.is_insufficient_data());
        assert!(LearningError::MissingData { field: "power" }.is_insufficient_data());
        assert!(!LearningError::PersistenceFailure { reason: "disk full" }.is_insufficient_data());
    }

    #[test]
    fn display_messages() {
        let err = LearningError::InvalidTransition { from: "priming", event: "probe_approved" };
        assert_eq!(
            alloc::format!("{}", err),
            "Invalid transition: probe_approved not allowed from priming"
        );
    }
}
