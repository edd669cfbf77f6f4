//! Basic Offset Calculation Example
//!
//! This example shows the engine on its own: a cold-start prediction, a
//! few hours of feedback, and how the result and its reason change as the
//! learner gains confidence.
//!
//! ## What You'll Learn
//!
//! - Building an [`OffsetInput`] from sensor readings
//! - Reading the offset, confidence and reason of a result
//! - Feeding observed outcomes back with `record_feedback`
//! - How missing or impossible readings fall back safely
//!
//! ## Running the Example
//!
//! ```bash
//! cargo run --example 01_basic_offset
//! ```

use offsetguard_core::{
    FeedbackContext, HvacMode, OffsetEngine, OffsetInput, OperatingMode, Timestamp,
};

const START: Timestamp = 1_704_110_400_000;
const HOUR: u64 = 3_600_000;

fn main() {
    println!("OffsetGuard Basic Offset Example");
    println!("================================\n");

    let mut engine = OffsetEngine::default();

    // The device thinks the room is 20.8°C; the room sensor says 24.0°C
    let input = OffsetInput {
        timestamp: START,
        room_temp: Some(24.0),
        device_internal_temp: Some(20.8),
        outdoor_temp: Some(31.0),
        power_reading: Some(850.0),
        hvac_mode: HvacMode::Cool,
        ..OffsetInput::default()
    };

    let cold = engine.calculate_offset(&input);
    println!("Cold start:");
    println!("  offset:     {:+.2}°C", cold.offset);
    println!("  confidence: {:.2}", cold.confidence);
    println!("  reason:     {}\n", cold.reason);

    // The room settles best with roughly -2.4°C applied
    println!("Recording 48 hours of feedback...");
    for hour in 0..48u64 {
        let context = FeedbackContext {
            timestamp: START + hour * HOUR,
            room_temp: Some(24.0),
            device_internal_temp: Some(21.6),
            outdoor_temp: Some(28.0 + (hour % 6) as f32),
            power_reading: Some(850.0),
            hvac_mode: HvacMode::Cool,
        };
        let report = engine.record_feedback(cold.offset, -2.4, &context);
        if hour % 12 == 0 {
            println!("  hour {:2}: {} learner(s) accepted", hour, report.accepted_count());
        }
    }

    let trained = engine.calculate_offset(&input);
    println!("\nAfter learning:");
    println!("  offset:     {:+.2}°C", trained.offset);
    println!("  confidence: {:.2}", trained.confidence);
    println!("  reason:     {}\n", trained.reason);

    // Operating modes shift the result
    for mode in [OperatingMode::Sleep, OperatingMode::Away, OperatingMode::Boost] {
        let result = engine.calculate_offset(&OffsetInput {
            operating_mode: mode,
            ..input
        });
        println!("  {:6} → {:+.2}°C ({})", mode.as_str(), result.offset, result.reason);
    }

    // Safe fallbacks keep the previous offset
    println!("\nFallbacks:");
    let missing = engine.calculate_offset(&OffsetInput {
        room_temp: None,
        last_applied_offset: Some(trained.offset),
        ..input
    });
    println!("  missing room sensor → {:+.2}°C ({})", missing.offset, missing.reason);

    let impossible = engine.calculate_offset(&OffsetInput {
        room_temp: Some(85.0),
        last_applied_offset: Some(trained.offset),
        ..input
    });
    println!("  85°C room reading   → {:+.2}°C ({})", impossible.offset, impossible.reason);
}
