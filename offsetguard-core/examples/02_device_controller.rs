//! Device Controller Example
//!
//! This example drives a [`DeviceController`] the way a host integration
//! does: periodic ticks, applying offsets, judging feedback after the
//! learned delay, and saving state on the persistence cadence.
//!
//! ## What You'll Learn
//!
//! - Ticking the controller and reading [`TickOutput`]
//! - Scheduling feedback with `offset_applied`
//! - Sleeping until `next_wake_at` instead of polling
//! - Persisting through a [`StateStore`]
//! - Reading the diagnostic snapshot
//!
//! ## Running the Example
//!
//! ```bash
//! cargo run --example 02_device_controller
//! ```

use offsetguard_core::{
    ControllerConfig, DeviceController, DeviceReadings, HvacMode, LearningResult, OpportunitySignals,
    PersistedState, StateStore, Timestamp,
};

const START: Timestamp = 1_704_110_400_000;
const MINUTE: u64 = 60_000;

/// Store that keeps the last saved state in memory
#[derive(Default)]
struct InMemoryStore {
    state: Option<PersistedState>,
}

impl StateStore for InMemoryStore {
    fn save(&mut self, state: &PersistedState) -> LearningResult<()> {
        self.state = Some(state.clone());
        Ok(())
    }

    fn load(&self) -> LearningResult<Option<PersistedState>> {
        Ok(self.state.clone())
    }
}

/// Simple room: cools toward the setpoint while the compressor runs
struct Room {
    temp: f32,
    compressor_on: bool,
}

impl Room {
    fn advance(&mut self, minutes: f32) {
        if self.compressor_on {
            self.temp -= 0.05 * minutes;
            if self.temp < 23.6 {
                self.compressor_on = false;
            }
        } else {
            self.temp += 0.03 * minutes;
            if self.temp > 24.3 {
                self.compressor_on = true;
            }
        }
    }

    fn readings(&self) -> DeviceReadings {
        DeviceReadings {
            room_temp: Some(self.temp),
            // The device sensor sits near the warm coil
            device_internal_temp: Some(self.temp - 2.8),
            outdoor_temp: Some(32.0),
            power_reading: Some(if self.compressor_on { 920.0 } else { 6.0 }),
            target_temp: 24.0,
            hvac_mode: HvacMode::Cool,
            ..DeviceReadings::default()
        }
    }
}

fn main() -> LearningResult<()> {
    println!("OffsetGuard Device Controller Example");
    println!("=====================================\n");

    let config = ControllerConfig::default();
    let mut store = InMemoryStore::default();
    let mut controller = DeviceController::load(&config, &store, START)?;
    let signals = OpportunitySignals::default();

    let mut room = Room {
        temp: 24.0,
        compressor_on: true,
    };
    let mut now = START;
    let end = START + 6 * 60 * MINUTE;
    let mut ticks = 0;

    while now < end {
        let out = controller.tick(now, &room.readings(), &signals);
        ticks += 1;

        for report in &out.feedback {
            if let Some((learner, err)) = report.errors().next() {
                println!("  {} rejected feedback: {}", learner, err);
            }
        }

        if out.feedback.is_empty() && controller.pending_feedback() == 0 {
            let due = controller.offset_applied(&out.offset, now, HvacMode::Cool);
            if ticks % 20 == 0 {
                println!(
                    "[{:>4} min] {:<11} offset {:+.2}°C conf {:.2}, feedback in {} s",
                    (now - START) / MINUTE,
                    out.thermal_state.as_str(),
                    out.offset.offset,
                    out.offset.confidence,
                    (due - now) / 1_000,
                );
            }
        }

        if out.save_due {
            match controller.save(&mut store, now) {
                Ok(()) => println!("[{:>4} min] state saved", (now - START) / MINUTE),
                Err(err) => println!("[{:>4} min] save failed: {}", (now - START) / MINUTE, err),
            }
        }

        // Sleep until the controller next needs us, at most five minutes
        let wake = out.next_wake_at.unwrap_or(now + 5 * MINUTE).clamp(now + 1_000, now + 5 * MINUTE);
        room.advance((wake - now) as f32 / MINUTE as f32);
        now = wake;
    }

    let diagnostics = controller.diagnostics(now);
    println!("\nAfter {} ticks:", ticks);
    println!("  thermal state:      {}", diagnostics.thermal_state.as_str());
    println!("  learner samples:    {}", diagnostics.learner_samples);
    println!("  confidence:         {:.2}", diagnostics.confidence);
    println!("  thresholds:         {:?}", diagnostics.thresholds);
    println!("  hysteresis state:   {}", diagnostics.hysteresis_state.as_str());
    println!("  feedback delay:     {} s", diagnostics.feedback_delay_s);
    println!("  temp outliers:      {}", diagnostics.temperature_outliers.flagged);

    // A restart picks up where the controller left off
    controller.save(&mut store, now)?;
    let restored = DeviceController::load(&config, &store, now)?;
    println!(
        "\nRestored controller has {} learner samples",
        restored.engine().learner().sample_count()
    );

    Ok(())
}
