//! File store behavior against a real filesystem

use std::fs;

use offsetguard_core::{
    load_or_default, ControllerConfig, DeviceController, DeviceReadings, HvacMode, OpportunitySignals,
    PersistedState, StateStore, Timestamp,
};
use offsetguard_schemas::{load_config_file, JsonFileStore};
use proptest::prelude::*;
use tempfile::tempdir;

const NOON: Timestamp = 1_704_110_400_000;
const MINUTE: u64 = 60_000;

fn readings(room: f32, internal: f32) -> DeviceReadings {
    DeviceReadings {
        room_temp: Some(room),
        device_internal_temp: Some(internal),
        outdoor_temp: Some(30.0),
        power_reading: Some(900.0),
        target_temp: 24.0,
        hvac_mode: HvacMode::Cool,
        ..DeviceReadings::default()
    }
}

/// Controller with a few rounds of judged feedback
fn trained_controller() -> DeviceController {
    let mut controller = DeviceController::new(&ControllerConfig::default(), NOON).unwrap();
    let signals = OpportunitySignals::default();
    let mut now = NOON;
    for round in 0..5 {
        let out = controller.tick(now, &readings(24.0, 21.0), &signals);
        now = controller.offset_applied(&out.offset, now, HvacMode::Cool);
        let internal = 21.0 + round as f32 * 0.1;
        controller.tick(now, &readings(24.0, internal), &signals);
        now += 5 * MINUTE;
    }
    controller
}

#[test]
fn missing_file_loads_as_empty() {
    let dir = tempdir().unwrap();
    let store = JsonFileStore::new(dir.path().join("absent.json"));

    assert_eq!(store.load().unwrap(), None);
    assert_eq!(load_or_default(&store), PersistedState::default());
}

#[test]
fn controller_state_survives_restart() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("devices").join("living_room.json");
    let mut store = JsonFileStore::new(&path);

    let mut controller = trained_controller();
    let now = NOON + 2 * 60 * MINUTE;
    controller.save(&mut store, now).unwrap();
    assert!(path.exists());
    assert!(!dir.path().join("devices").join("living_room.json.tmp").exists());

    let reopened = JsonFileStore::new(&path);
    let restored = DeviceController::load(&ControllerConfig::default(), &reopened, now).unwrap();
    assert_eq!(restored.snapshot(), controller.snapshot());
    assert!(restored.engine().learner().sample_count() > 0);
}

#[test]
fn second_save_replaces_first() {
    let dir = tempdir().unwrap();
    let mut store = JsonFileStore::new(dir.path().join("state.json"));

    let mut first = PersistedState::default();
    first.controller.last_offset = Some(-1.0);
    store.save(&first).unwrap();

    let mut second = PersistedState::new(99, first.controller.clone());
    second.controller.last_offset = Some(-2.0);
    store.save(&second).unwrap();

    assert_eq!(store.load().unwrap(), Some(second));
}

#[test]
fn corrupt_file_falls_back_to_defaults() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");
    fs::write(&path, "{\"format\":\"offsetguard.state\",\"schema_version\":2,\"controller\":{\"engine\":").unwrap();

    let store = JsonFileStore::new(&path);
    assert!(store.load().is_err());

    let controller = DeviceController::load(&ControllerConfig::default(), &store, NOON).unwrap();
    assert_eq!(controller.engine().learner().sample_count(), 0);
}

#[test]
fn empty_file_is_empty_store() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("state.json");
    fs::write(&path, "").unwrap();

    assert_eq!(JsonFileStore::new(&path).load().unwrap(), None);
}

#[test]
fn unwritable_target_reports_failure() {
    let dir = tempdir().unwrap();
    // A directory where the file should be makes the rename fail
    let path = dir.path().join("state.json");
    fs::create_dir(&path).unwrap();

    let mut controller = trained_controller();
    let mut store = JsonFileStore::new(&path);
    assert!(controller.save(&mut store, NOON).is_err());
    assert_eq!(controller.last_saved_at(), None);
}

#[test]
fn config_file_is_parsed_and_validated() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("config.json");
    fs::write(&path, r#"{ "engine": { "max_offset_c": 3.5 }, "save_interval_minutes": 10 }"#).unwrap();

    let config = load_config_file(&path).unwrap();
    assert_eq!(config.engine.max_offset_c, 3.5);
    assert_eq!(config.save_interval_minutes, 10);

    fs::write(&path, r#"{ "save_interval_minutes": 0 }"#).unwrap();
    assert!(load_config_file(&path).is_err());
    assert!(load_config_file(dir.path().join("missing.json")).is_err());
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn any_saved_offset_reads_back(offset in -5.0f32..=5.0, saved_at in 0u64..4_000_000_000_000) {
        let dir = tempdir().unwrap();
        let mut store = JsonFileStore::new(dir.path().join("state.json"));

        let mut state = PersistedState::new(saved_at, Default::default());
        state.controller.last_offset = Some(offset);
        store.save(&state).unwrap();

        prop_assert_eq!(store.load().unwrap(), Some(state));
    }
}
