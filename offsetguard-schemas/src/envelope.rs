//! State envelope and schema migrations
//!
//! Documents are decoded in three steps: parse the envelope, migrate the
//! controller section forward one version at a time, then deserialize it
//! into the current [`ControllerSnapshot`]. Missing fields take their
//! defaults and unknown fields are ignored, so a document written by a newer
//! build still yields everything this build understands.

use offsetguard_core::{ControllerSnapshot, PersistedState, Timestamp, CURRENT_SCHEMA_VERSION};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::SchemaError;

/// Format tag written into every state document
pub const STATE_FORMAT: &str = "offsetguard.state";

/// Oldest schema version that can still be migrated
pub const OLDEST_SUPPORTED_VERSION: u32 = 1;

/// Serialized form of [`PersistedState`]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateEnvelope {
    #[serde(default = "default_format")]
    pub format: String,
    pub schema_version: u32,
    #[serde(default)]
    pub saved_at: Timestamp,
    #[serde(default)]
    pub controller: Value,
}

fn default_format() -> String {
    STATE_FORMAT.to_string()
}

type Migration = fn(&mut Map<String, Value>);

/// Forward steps, each upgrading from the listed version to the next
const MIGRATIONS: &[(u32, Migration)] = &[(1, v1_to_v2)];

/// Version 1 had no seasonal patterns and no scheduler bucket counts
fn v1_to_v2(controller: &mut Map<String, Value>) {
    if let Some(Value::Object(engine)) = controller.get_mut("engine") {
        if !matches!(engine.get("seasonal"), Some(Value::Object(_))) {
            engine.insert("seasonal".into(), serde_json::json!({ "patterns": [] }));
        }
    }

    let scheduler = controller
        .entry("scheduler")
        .or_insert_with(|| Value::Object(Map::new()));
    if let Value::Object(scheduler) = scheduler {
        scheduler
            .entry("bucket_counts")
            .or_insert_with(|| Value::Array(Vec::new()));
    }
}

/// Upgrade a controller section in place; returns the version reached
///
/// Sections newer than this build are left untouched.
pub fn migrate(controller: &mut Value, from_version: u32) -> Result<u32, SchemaError> {
    if from_version < OLDEST_SUPPORTED_VERSION {
        return Err(SchemaError::UnsupportedVersion {
            format: STATE_FORMAT.to_string(),
            found: from_version,
        });
    }

    if controller.is_null() {
        *controller = Value::Object(Map::new());
    }
    let Value::Object(section) = controller else {
        return Err(SchemaError::Validation("controller section is not an object".into()));
    };

    let mut version = from_version;
    for (from, step) in MIGRATIONS {
        if *from == version && version < CURRENT_SCHEMA_VERSION {
            step(section);
            log::info!("migrated state schema v{} -> v{}", version, version + 1);
            version += 1;
        }
    }

    Ok(version)
}

/// Encode `state` as a JSON document
pub fn encode_state(state: &PersistedState) -> Result<String, SchemaError> {
    let envelope = StateEnvelope {
        format: default_format(),
        schema_version: CURRENT_SCHEMA_VERSION,
        saved_at: state.saved_at,
        controller: serde_json::to_value(&state.controller)?,
    };
    Ok(serde_json::to_string(&envelope)?)
}

/// Decode a JSON document written by any supported version
pub fn decode_state(document: &str) -> Result<PersistedState, SchemaError> {
    let mut envelope: StateEnvelope = serde_json::from_str(document)?;

    if envelope.format != STATE_FORMAT {
        return Err(SchemaError::Validation(format!("unexpected format {:?}", envelope.format)));
    }

    let version = migrate(&mut envelope.controller, envelope.schema_version)?;
    if version > CURRENT_SCHEMA_VERSION {
        log::warn!(
            "state schema v{} is newer than v{}, loading known fields only",
            version,
            CURRENT_SCHEMA_VERSION
        );
    }

    let controller: ControllerSnapshot = serde_json::from_value(envelope.controller)?;
    Ok(PersistedState {
        schema_version: CURRENT_SCHEMA_VERSION,
        saved_at: envelope.saved_at,
        controller,
    })
}
