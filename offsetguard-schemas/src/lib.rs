//! Versioned Persistence for OffsetGuard
//!
//! ## Overview
//!
//! The learning core never touches disk. This crate supplies the concrete
//! side of its `StateStore` seam: a JSON envelope around
//! [`PersistedState`], forward migrations between schema versions, and two
//! stores (in-memory and file-backed with atomic replace).
//!
//! ## Envelope
//!
//! ```json
//! {
//!   "format": "offsetguard.state",
//!   "schema_version": 2,
//!   "saved_at": 1704110400000,
//!   "controller": { "engine": { ... }, "thermal": { ... }, ... }
//! }
//! ```
//!
//! ### Evolution Rules
//!
//! 1. **Always Append**: fields are added, never renamed or removed
//! 2. **Default Values**: every field defaults to "not yet learned"
//! 3. **Forward Migration**: older documents are upgraded step by step
//! 4. **Newer Documents**: known fields load, unknown fields are ignored
//!
//! ## Usage Example
//!
//! ```rust
//! use offsetguard_core::{ControllerConfig, DeviceController, StateStore};
//! use offsetguard_schemas::MemoryStore;
//!
//! let config = ControllerConfig::default();
//! let mut store = MemoryStore::new();
//! let mut controller = DeviceController::load(&config, &store, 0)?;
//!
//! controller.save(&mut store, 1_000)?;
//! assert!(store.document().unwrap().contains("\"schema_version\":2"));
//!
//! let restored = DeviceController::load(&config, &store, 2_000)?;
//! assert_eq!(restored.snapshot(), controller.snapshot());
//! # Ok::<(), offsetguard_core::LearningError>(())
//! ```

pub mod config;
pub mod envelope;
pub mod store;

pub use config::{config_to_json, load_config, load_config_file};
pub use envelope::{decode_state, encode_state, migrate, StateEnvelope, STATE_FORMAT};
pub use store::{JsonFileStore, MemoryStore};

pub use offsetguard_core::{PersistedState, CURRENT_SCHEMA_VERSION};

use offsetguard_core::LearningError;

/// Persistence and configuration errors
#[derive(Debug, thiserror_no_std::Error)]
pub enum SchemaError {
    #[error("Serialization failed: {0}")]
    Serialization(String),

    #[error("I/O failed: {0}")]
    Io(String),

    #[error("Unsupported schema version {found} (format {format})")]
    UnsupportedVersion { format: String, found: u32 },

    #[error("Validation failed: {0}")]
    Validation(String),
}

impl SchemaError {
    /// Static reason for the core's `PersistenceFailure`
    pub fn reason(&self) -> &'static str {
        match self {
            Self::Serialization(_) => "state document could not be encoded or decoded",
            Self::Io(_) => "state file could not be read or written",
            Self::UnsupportedVersion { .. } => "state document has an unsupported version",
            Self::Validation(_) => "state document failed validation",
        }
    }
}

impl From<serde_json::Error> for SchemaError {
    fn from(err: serde_json::Error) -> Self {
        Self::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for SchemaError {
    fn from(err: std::io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<SchemaError> for LearningError {
    fn from(err: SchemaError) -> Self {
        log::warn!("{}", err);
        LearningError::PersistenceFailure { reason: err.reason() }
    }
}
