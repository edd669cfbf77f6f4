//! Concrete state stores
//!
//! Both stores hold exactly one document. A document that fails to decode is
//! reported as a persistence failure; `load_or_default` in the core turns
//! that into fresh state.

use std::{
    fs,
    io::{ErrorKind, Write},
    path::{Path, PathBuf},
};

use offsetguard_core::{LearningResult, PersistedState, StateStore};

use crate::{
    envelope::{decode_state, encode_state},
    SchemaError,
};

/// Store keeping the encoded document in memory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    document: Option<String>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-loaded with a raw document
    pub fn from_document(document: impl Into<String>) -> Self {
        Self {
            document: Some(document.into()),
        }
    }

    /// Raw JSON of the last save
    pub fn document(&self) -> Option<&str> {
        self.document.as_deref()
    }
}

impl StateStore for MemoryStore {
    fn save(&mut self, state: &PersistedState) -> LearningResult<()> {
        self.document = Some(encode_state(state)?);
        Ok(())
    }

    fn load(&self) -> LearningResult<Option<PersistedState>> {
        match self.document.as_deref() {
            None => Ok(None),
            Some(document) if document.trim().is_empty() => Ok(None),
            Some(document) => Ok(Some(decode_state(document)?)),
        }
    }
}

/// File-backed store with atomic replace
///
/// Saves write a sibling temporary file, sync it, then rename it over the
/// target, so a crash mid-save leaves the previous document intact.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "state".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }

    fn write_atomic(&self, document: &str) -> Result<(), SchemaError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }

        let temp = self.temp_path();
        {
            let mut file = fs::File::create(&temp)?;
            file.write_all(document.as_bytes())?;
            file.sync_all()?;
        }
        fs::rename(&temp, &self.path)?;
        Ok(())
    }

    fn read(&self) -> Result<Option<String>, SchemaError> {
        match fs::read_to_string(&self.path) {
            Ok(document) => Ok(Some(document)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }
}

impl StateStore for JsonFileStore {
    fn save(&mut self, state: &PersistedState) -> LearningResult<()> {
        let document = encode_state(state)?;
        self.write_atomic(&document)?;
        log::debug!("saved state to {}", self.path.display());
        Ok(())
    }

    fn load(&self) -> LearningResult<Option<PersistedState>> {
        match self.read()? {
            None => Ok(None),
            Some(document) if document.trim().is_empty() => Ok(None),
            Some(document) => Ok(Some(decode_state(&document)?)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use offsetguard_core::{load_or_default, ControllerSnapshot, LearningError};

    fn state() -> PersistedState {
        let mut controller = ControllerSnapshot::default();
        controller.last_offset = Some(-3.25);
        PersistedState::new(42, controller)
    }

    #[test]
    fn memory_store_roundtrip() {
        let mut store = MemoryStore::new();
        assert_eq!(store.load().unwrap(), None);

        store.save(&state()).unwrap();
        assert_eq!(store.load().unwrap(), Some(state()));
    }

    #[test]
    fn corrupt_memory_document_is_a_persistence_failure() {
        let store = MemoryStore::from_document("{\"format\": ");
        assert!(matches!(store.load(), Err(LearningError::PersistenceFailure { .. })));
        assert_eq!(load_or_default(&store), PersistedState::default());
    }

    #[test]
    fn blank_memory_document_is_empty() {
        assert_eq!(MemoryStore::from_document("  \n").load().unwrap(), None);
    }

    #[test]
    fn temp_file_sits_next_to_target() {
        let store = JsonFileStore::new("/var/lib/offsetguard/living_room.json");
        assert_eq!(
            store.temp_path(),
            PathBuf::from("/var/lib/offsetguard/living_room.json.tmp")
        );
    }
}
