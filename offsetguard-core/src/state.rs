//! Persisted state and the store seam
//!
//! The core never performs I/O. A host hands a [`StateStore`] to the
//! controller on its save cadence; encoding, versioning and atomic writes
//! live behind that trait (see the `offsetguard-schemas` crate).
//!
//! Every field defaults to "not yet learned", so a document written by an
//! older version, or one missing whole sections, still loads.

use crate::{
    engine::EngineSnapshot,
    errors::LearningResult,
    learning::DelaySnapshot,
    thermal::{SchedulerSnapshot, ThermalSnapshot},
    time::Timestamp,
};

/// Schema version written by this build
pub const CURRENT_SCHEMA_VERSION: u32 = 2;

/// Everything one device controller has learned
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ControllerSnapshot {
    pub engine: EngineSnapshot,
    pub thermal: ThermalSnapshot,
    pub scheduler: SchedulerSnapshot,
    pub delay: DelaySnapshot,
    pub last_offset: Option<f32>,
}

/// Versioned unit of persistence
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct PersistedState {
    pub schema_version: u32,
    pub saved_at: Timestamp,
    pub controller: ControllerSnapshot,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            saved_at: 0,
            controller: ControllerSnapshot::default(),
        }
    }
}

impl PersistedState {
    pub fn new(saved_at: Timestamp, controller: ControllerSnapshot) -> Self {
        Self {
            schema_version: CURRENT_SCHEMA_VERSION,
            saved_at,
            controller,
        }
    }
}

/// Durable storage for [`PersistedState`]
///
/// Failures come back as `LearningError::PersistenceFailure`; the caller
/// keeps running in memory and retries on the next cadence.
pub trait StateStore {
    fn save(&mut self, state: &PersistedState) -> LearningResult<()>;

    /// `Ok(None)` when nothing has been saved yet
    fn load(&self) -> LearningResult<Option<PersistedState>>;
}

/// Load saved state, falling back to fresh defaults on any failure
pub fn load_or_default<S: StateStore + ?Sized>(store: &S) -> PersistedState {
    match store.load() {
        Ok(Some(state)) => state,
        Ok(None) => PersistedState::default(),
        Err(err) => {
            log_warn!("state load failed, starting fresh: {}", err);
            PersistedState::default()
        }
    }
}
