//! Common fixtures for integration tests
//!
//! - Fixed reference timestamps
//! - Reading and feedback builders
//! - A deterministic cooling-cycle room simulator
//! - An in-memory [`StateStore`]

#![allow(dead_code)]

use offsetguard_core::{
    engine::FeedbackContext,
    errors::LearningResult,
    state::{PersistedState, StateStore},
    thermal::OpportunitySignals,
    time::Timestamp,
    DeviceReadings, HvacMode,
};

pub const MS_PER_SECOND: u64 = 1_000;
pub const MS_PER_MINUTE: u64 = 60 * MS_PER_SECOND;
pub const MS_PER_HOUR: u64 = 60 * MS_PER_MINUTE;
pub const MS_PER_DAY: u64 = 24 * MS_PER_HOUR;

/// 2024-01-01 12:00 UTC
pub const NOON: Timestamp = 1_704_110_400_000;

pub const IDLE_W: f32 = 5.0;
pub const ACTIVE_W: f32 = 900.0;

/// Cooling readings with the room and device sensors given
pub fn cooling_readings(room: f32, internal: f32, power: f32) -> DeviceReadings {
    DeviceReadings {
        room_temp: Some(room),
        device_internal_temp: Some(internal),
        outdoor_temp: Some(30.0),
        power_reading: Some(power),
        target_temp: 24.0,
        hvac_mode: HvacMode::Cool,
        ..DeviceReadings::default()
    }
}

pub fn feedback_at(timestamp: Timestamp, room: f32, power: f32, outdoor: Option<f32>) -> FeedbackContext {
    FeedbackContext {
        timestamp,
        room_temp: Some(room),
        device_internal_temp: None,
        outdoor_temp: outdoor,
        power_reading: Some(power),
        hvac_mode: HvacMode::Cool,
    }
}

pub fn nobody_home() -> OpportunitySignals {
    OpportunitySignals {
        presence: Some(false),
        ..OpportunitySignals::default()
    }
}

pub fn someone_home() -> OpportunitySignals {
    OpportunitySignals {
        presence: Some(true),
        ..OpportunitySignals::default()
    }
}

/// Small deterministic generator (xorshift32)
pub struct Lcg(u32);

impl Lcg {
    pub fn new(seed: u32) -> Self {
        Self(seed.max(1))
    }

    pub fn next_u32(&mut self) -> u32 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 17;
        x ^= x << 5;
        self.0 = x;
        x
    }

    /// Uniform in [-amplitude, amplitude]
    pub fn jitter(&mut self, amplitude: f32) -> f32 {
        let unit = (self.next_u32() % 10_001) as f32 / 10_000.0;
        (unit * 2.0 - 1.0) * amplitude
    }
}

/// Room cycling between a start and a stop threshold under cooling
///
/// Each step is one sample: `(room_temp, power_w)`. The compressor starts
/// when the room reaches `start`, stops at `stop`, with small jitter on the
/// transition temperatures.
pub struct CoolingCycle {
    pub start: f32,
    pub stop: f32,
    pub step_c: f32,
    room: f32,
    active: bool,
    rng: Lcg,
}

impl CoolingCycle {
    pub fn new(start: f32, stop: f32, seed: u32) -> Self {
        Self {
            start,
            stop,
            step_c: 0.1,
            room: (start + stop) / 2.0,
            active: false,
            rng: Lcg::new(seed),
        }
    }

    pub fn step(&mut self) -> (f32, f32) {
        if self.active {
            self.room -= self.step_c;
            if self.room <= self.stop + self.rng.jitter(0.05) {
                self.active = false;
            }
        } else {
            self.room += self.step_c;
            if self.room >= self.start + self.rng.jitter(0.05) {
                self.active = true;
            }
        }
        (self.room, if self.active { ACTIVE_W } else { IDLE_W })
    }
}

/// State store holding one document
#[derive(Default)]
pub struct SlotStore {
    pub slot: Option<PersistedState>,
    pub saves: usize,
}

impl StateStore for SlotStore {
    fn save(&mut self, state: &PersistedState) -> LearningResult<()> {
        self.slot = Some(state.clone());
        self.saves += 1;
        Ok(())
    }

    fn load(&self) -> LearningResult<Option<PersistedState>> {
        Ok(self.slot.clone())
    }
}
