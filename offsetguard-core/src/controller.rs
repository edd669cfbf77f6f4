//! Device Controller
//!
//! ## Overview
//!
//! One [`DeviceController`] owns everything learned about one HVAC device.
//! It is the single mutator for that device; hosts drive it with periodic
//! ticks and never share it across devices.
//!
//! ## Tick
//!
//! ```text
//! tick(now, readings, signals)
//!   1. thermal.observe        state machine + passive tau refinement
//!   2. probe                  abort / complete / start via the scheduler
//!   3. delay learner          observe while a cycle is running
//!   4. feedback queue         drain due entries, oldest first
//!   5. engine.calculate       offset for the current readings
//!   6. thermal.decide         (decision, should_actuate)
//!   → TickOutput { ..., next_wake_at, save_due }
//! ```
//!
//! Waits are never slept on. `next_wake_at` is the earliest of: feedback
//! due, delay observation, thermal timer, probe eligibility and save cadence.
//!
//! ## Feedback
//!
//! When the host applies an offset it calls [`DeviceController::offset_applied`].
//! Feedback is scheduled at `now + learned delay` and judged on the tick
//! that finds it due. Entries due while probing or calibrating are dropped,
//! since the device was not following the offset.

use alloc::{boxed::Box, vec::Vec};

use crate::{
    config::ControllerConfig,
    constants::time::{MS_PER_MINUTE, MS_PER_SECOND},
    diagnostics::DiagnosticSnapshot,
    engine::{FeedbackContext, FeedbackQueue, FeedbackReport, OffsetEngine, OffsetInput, OffsetResult, PendingFeedback},
    errors::LearningResult,
    forecast::{ForecastEngine, ForecastPoint},
    hysteresis::{HysteresisLearner, SeasonalHysteresisLearner},
    learning::{DelayLearner, DelayOutcome, LightweightOffsetLearner},
    outlier::{Channel, OutlierDetector},
    state::{self, ControllerSnapshot, PersistedState, StateStore},
    thermal::{
        AbortCheck, AbortReason, ControlDecision, OpportunityProvider, OpportunitySignals, ProbeResult,
        ProbeScheduler, ThermalManager, ThermalObservation, ThermalState,
    },
    time::Timestamp,
    types::{HvacMode, OperatingMode, PowerState},
};

/// Smallest offset change treated as a new setpoint (°C)
const SETPOINT_CHANGE_EPSILON_C: f32 = 0.05;

/// Sensor and device readings for one tick
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct DeviceReadings {
    pub room_temp: Option<f32>,
    pub device_internal_temp: Option<f32>,
    pub outdoor_temp: Option<f32>,
    pub power_reading: Option<f32>,
    /// Temperature the user wants (°C)
    pub target_temp: f32,
    pub hvac_mode: HvacMode,
    pub operating_mode: OperatingMode,
    /// The user changed the setpoint by hand since the last tick
    pub manual_setpoint_change: bool,
    /// An upstream sensor or integration reported a fault
    pub upstream_fault: bool,
}

/// Probe lifecycle change during a tick
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProbeEvent {
    Started {
        at: Timestamp,
        environment_temp: f32,
    },
    Completed {
        result: Option<ProbeResult>,
    },
    Aborted {
        reason: AbortReason,
        /// Partial result kept with reduced confidence
        result: Option<ProbeResult>,
    },
}

/// Everything a tick produced
#[derive(Debug, Clone, PartialEq)]
pub struct TickOutput {
    pub offset: OffsetResult,
    pub decision: ControlDecision,
    pub should_actuate: bool,
    pub thermal_state: ThermalState,
    pub probe: Option<ProbeEvent>,
    pub delay: Option<DelayOutcome>,
    /// Reports of feedback judged this tick, oldest first
    pub feedback: Vec<FeedbackReport>,
    pub next_wake_at: Option<Timestamp>,
    pub save_due: bool,
}

/// Periodic save schedule
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PersistenceCadence {
    interval_ms: u64,
    last_attempt_at: Timestamp,
    last_success_at: Option<Timestamp>,
}

impl PersistenceCadence {
    pub fn new(interval_minutes: u64, now: Timestamp) -> Self {
        Self {
            interval_ms: interval_minutes.saturating_mul(MS_PER_MINUTE),
            last_attempt_at: now,
            last_success_at: None,
        }
    }

    pub fn next_due_at(&self) -> Timestamp {
        self.last_attempt_at.saturating_add(self.interval_ms)
    }

    pub fn is_due(&self, now: Timestamp) -> bool {
        now >= self.next_due_at()
    }

    /// Record a save attempt; failures retry on the next interval
    pub fn record_attempt(&mut self, now: Timestamp, succeeded: bool) {
        self.last_attempt_at = now;
        if succeeded {
            self.last_success_at = Some(now);
        }
    }

    pub fn last_success_at(&self) -> Option<Timestamp> {
        self.last_success_at
    }
}

/// Owner of all learned state for one device
#[derive(Debug)]
pub struct DeviceController {
    engine: OffsetEngine,
    thermal: ThermalManager,
    scheduler: ProbeScheduler,
    delay: DelayLearner,
    queue: FeedbackQueue,
    cadence: PersistenceCadence,
    last_offset: Option<f32>,
}

impl DeviceController {
    /// Controller with the default opportunity chain
    pub fn new(config: &ControllerConfig, now: Timestamp) -> LearningResult<Self> {
        let scheduler = ProbeScheduler::new(config.scheduler, config.clock, now);
        Self::build(config, scheduler, now)
    }

    /// Controller with a custom opportunity chain
    pub fn with_providers(
        config: &ControllerConfig,
        providers: Vec<Box<dyn OpportunityProvider + Send + Sync>>,
        now: Timestamp,
    ) -> LearningResult<Self> {
        let scheduler = ProbeScheduler::with_providers(config.scheduler, providers, now);
        Self::build(config, scheduler, now)
    }

    fn build(config: &ControllerConfig, scheduler: ProbeScheduler, now: Timestamp) -> LearningResult<Self> {
        config.validate()?;

        let engine = OffsetEngine::new(config.engine)
            .with_clock(config.clock)
            .with_classifier(config.power)
            .with_learner(LightweightOffsetLearner::new(config.learner))
            .with_hysteresis(
                HysteresisLearner::new(config.hysteresis),
                SeasonalHysteresisLearner::new(config.seasonal),
            )
            .with_outlier_detector(OutlierDetector::new(config.outlier))
            .with_forecast(ForecastEngine::new(config.forecast));

        Ok(Self {
            engine,
            thermal: ThermalManager::new(config.thermal, now),
            scheduler,
            delay: DelayLearner::new(config.delay),
            queue: FeedbackQueue::new(),
            cadence: PersistenceCadence::new(config.save_interval_minutes, now),
            last_offset: None,
        })
    }

    /// Controller restored from `store`, or fresh when nothing usable is saved
    pub fn load<S: StateStore + ?Sized>(config: &ControllerConfig, store: &S, now: Timestamp) -> LearningResult<Self> {
        let mut controller = Self::new(config, now)?;
        let persisted = state::load_or_default(store);
        controller.restore(&persisted.controller, now);
        Ok(controller)
    }

    pub fn engine(&self) -> &OffsetEngine {
        &self.engine
    }

    pub fn thermal(&self) -> &ThermalManager {
        &self.thermal
    }

    pub fn scheduler(&self) -> &ProbeScheduler {
        &self.scheduler
    }

    pub fn delay_learner(&self) -> &DelayLearner {
        &self.delay
    }

    pub fn pending_feedback(&self) -> usize {
        self.queue.len()
    }

    pub fn last_offset(&self) -> Option<f32> {
        self.last_offset
    }

    pub fn set_shadow_mode(&mut self, shadow: bool) {
        self.thermal.set_shadow_mode(shadow);
    }

    /// Replace the forecast; returns how many points were kept
    pub fn update_forecast(&mut self, points: &[ForecastPoint], now: Timestamp) -> usize {
        self.engine.update_forecast(points, now)
    }

    fn is_conditioning(&self, power: Option<f32>) -> bool {
        self.engine.classify_power(power) == Some(PowerState::Active)
    }

    /// Advance every component by one tick
    pub fn tick(&mut self, now: Timestamp, readings: &DeviceReadings, signals: &OpportunitySignals) -> TickOutput {
        let conditioning = self.is_conditioning(readings.power_reading);
        let observation = ThermalObservation {
            timestamp: now,
            room_temp: readings.room_temp,
            outdoor_temp: readings.outdoor_temp,
            target_temp: readings.target_temp,
            hvac_mode: readings.hvac_mode,
            conditioning,
        };

        self.thermal.observe(&observation);
        let probe = self.advance_probe(now, readings, signals, conditioning);

        let delay = match (self.delay.next_observation_at(), readings.room_temp) {
            (Some(due), Some(room)) if due <= now => self.delay.observe(now, room),
            _ => None,
        };

        let feedback = self.drain_feedback(now, readings);

        let offset = self.engine.calculate_offset(&OffsetInput {
            timestamp: now,
            room_temp: readings.room_temp,
            device_internal_temp: readings.device_internal_temp,
            outdoor_temp: readings.outdoor_temp,
            power_reading: readings.power_reading,
            hvac_mode: readings.hvac_mode,
            operating_mode: readings.operating_mode,
            last_applied_offset: self.last_offset,
        });
        let (decision, should_actuate) = self.thermal.decide(&observation);

        TickOutput {
            offset,
            decision,
            should_actuate,
            thermal_state: self.thermal.state(),
            probe,
            delay,
            feedback,
            next_wake_at: self.next_wake_at(now),
            save_due: self.cadence.is_due(now),
        }
    }

    fn advance_probe(
        &mut self,
        now: Timestamp,
        readings: &DeviceReadings,
        signals: &OpportunitySignals,
        conditioning: bool,
    ) -> Option<ProbeEvent> {
        if self.thermal.state() == ThermalState::Probing {
            let check = AbortCheck {
                presence: signals.presence,
                manual_setpoint_change: readings.manual_setpoint_change,
                outdoor_temp: readings.outdoor_temp,
                upstream_fault: readings.upstream_fault || readings.room_temp.is_none(),
            };
            let (abort, reason) = self.scheduler.check_abort_conditions(&check);
            if abort {
                return self.finish_probe(now, reason, conditioning);
            }
            if self.thermal.probe_due(now) {
                return self.finish_probe(now, None, conditioning);
            }
            return None;
        }

        if !matches!(self.thermal.state(), ThermalState::Drifting | ThermalState::Correcting) {
            return None;
        }
        if !self.scheduler.should_probe_now(now, signals, readings.outdoor_temp) {
            return None;
        }

        let (Some(room), Some(outdoor)) = (readings.room_temp, readings.outdoor_temp) else {
            return None;
        };
        match self.thermal.start_probe(now, room, outdoor) {
            Ok(()) => {
                self.scheduler.begin_probe(now, Some(outdoor));
                Some(ProbeEvent::Started {
                    at: now,
                    environment_temp: outdoor,
                })
            }
            Err(err) => {
                log_warn!("probe not started: {}", err);
                None
            }
        }
    }

    /// Close the running probe, folding any usable result into the model
    fn finish_probe(&mut self, now: Timestamp, reason: Option<AbortReason>, conditioning: bool) -> Option<ProbeEvent> {
        let result = match self.thermal.end_probe(now, reason.is_some()) {
            Ok(outcome) => match reason {
                Some(reason) => self.scheduler.handle_partial_probe_data(&outcome, reason),
                None => outcome.to_result(),
            },
            Err(err) => {
                log_warn!("probe end rejected: {}", err);
                None
            }
        };

        self.scheduler.end_probe(now, result.as_ref());
        if self.thermal.state() == ThermalState::Calibrating {
            if let Err(err) = self.thermal.calibrate(result.as_ref(), now, conditioning) {
                log_warn!("calibration failed: {}", err);
            }
        }

        Some(match reason {
            Some(reason) => ProbeEvent::Aborted { reason, result },
            None => ProbeEvent::Completed { result },
        })
    }

    fn drain_feedback(&mut self, now: Timestamp, readings: &DeviceReadings) -> Vec<FeedbackReport> {
        let mut reports = Vec::new();
        while let Some(pending) = self.queue.pop_due(now) {
            if matches!(self.thermal.state(), ThermalState::Probing | ThermalState::Calibrating) {
                log_debug!("dropping feedback issued at {} during probe", pending.issued_at);
                continue;
            }

            let (Some(room), Some(internal)) = (readings.room_temp, readings.device_internal_temp) else {
                log_debug!("feedback issued at {} has no readings to judge", pending.issued_at);
                continue;
            };

            let context = FeedbackContext {
                timestamp: now,
                room_temp: Some(room),
                device_internal_temp: Some(internal),
                outdoor_temp: readings.outdoor_temp,
                power_reading: readings.power_reading,
                hvac_mode: pending.hvac_mode,
            };
            reports.push(self.engine.record_feedback(pending.predicted_offset, internal - room, &context));
        }
        reports
    }

    /// Record that the host applied `result`; returns when feedback is due
    ///
    /// A changed offset is a setpoint change and starts a delay learning
    /// cycle.
    pub fn offset_applied(&mut self, result: &OffsetResult, now: Timestamp, mode: HvacMode) -> Timestamp {
        let changed = self
            .last_offset
            .map_or(true, |previous| libm::fabsf(result.offset - previous) >= SETPOINT_CHANGE_EPSILON_C);
        if changed {
            self.delay.start_cycle(now, mode);
        }
        self.last_offset = Some(result.offset);

        let due_at = now.saturating_add(self.delay.current_delay_s() as u64 * MS_PER_SECOND);
        let evicted = self.queue.push(PendingFeedback {
            issued_at: now,
            due_at,
            predicted_offset: result.offset,
            hvac_mode: mode,
        });
        if let Some(old) = evicted {
            log_debug!("feedback queue full, dropped entry issued at {}", old.issued_at);
        }

        due_at
    }

    /// User took over: cancel pending feedback and stop any probe
    ///
    /// A running probe ends through the partial-data path.
    pub fn manual_override(&mut self, now: Timestamp) -> Option<ProbeEvent> {
        self.queue.clear();
        self.delay.cancel();

        if self.thermal.state() != ThermalState::Probing {
            return None;
        }
        let conditioning = self.engine.last_power_state() == Some(PowerState::Active);
        self.finish_probe(now, Some(AbortReason::ManualOverride), conditioning)
    }

    fn next_wake_at(&self, now: Timestamp) -> Option<Timestamp> {
        let probe_eligible = (!self.scheduler.is_probe_active())
            .then(|| self.scheduler.next_eligible_at())
            .filter(|at| *at > now);

        [
            self.thermal.next_wake_at(),
            self.queue.next_due_at(),
            self.delay.next_observation_at(),
            probe_eligible,
            Some(self.cadence.next_due_at()),
        ]
        .into_iter()
        .flatten()
        .min()
    }

    pub fn snapshot(&self) -> ControllerSnapshot {
        ControllerSnapshot {
            engine: self.engine.snapshot(),
            thermal: self.thermal.snapshot(),
            scheduler: self.scheduler.snapshot(),
            delay: self.delay.snapshot(),
            last_offset: self.last_offset,
        }
    }

    /// Restore learned state; pending feedback and running probes are not resumed
    pub fn restore(&mut self, snapshot: &ControllerSnapshot, now: Timestamp) {
        self.engine.restore(&snapshot.engine);
        self.thermal.restore(&snapshot.thermal, now);
        self.scheduler.restore(&snapshot.scheduler);
        self.delay.restore(&snapshot.delay);
        self.last_offset = snapshot.last_offset.filter(|o| o.is_finite());
        self.queue.clear();
    }

    /// Save through `store`; a failure is logged and retried next cadence
    pub fn save<S: StateStore + ?Sized>(&mut self, store: &mut S, now: Timestamp) -> LearningResult<()> {
        let persisted = PersistedState::new(now, self.snapshot());
        let result = store.save(&persisted);
        if let Err(err) = &result {
            log_warn!("state save failed, keeping state in memory: {}", err);
        }
        self.cadence.record_attempt(now, result.is_ok());
        result
    }

    pub fn last_saved_at(&self) -> Option<Timestamp> {
        self.cadence.last_success_at()
    }

    /// Read-only view of learning progress
    pub fn diagnostics(&self, now: Timestamp) -> DiagnosticSnapshot {
        let learner = self.engine.learner();
        let hysteresis = self.engine.hysteresis();
        let model = self.thermal.model();
        let (start_samples, stop_samples) = hysteresis.sample_counts();

        DiagnosticSnapshot {
            timestamp: now,
            thermal_state: self.thermal.state(),
            shadow_mode: self.thermal.is_shadow_mode(),
            tau_cooling_min: model.tau_cooling(),
            tau_warming_min: model.tau_warming(),
            tau_confidence: model.tau_confidence(),
            probe_count: model.probe_history().count(),
            last_probe_at: self.scheduler.last_probe_at(),
            probe_active: self.scheduler.is_probe_active(),
            next_probe_eligible_at: self.scheduler.next_eligible_at(),
            confidence: learner.confidence(),
            learner_samples: learner.sample_count(),
            history_samples: self.engine.sample_count(),
            time_coverage: learner.time_coverage(),
            diversity: learner.diversity(),
            mean_abs_error_c: learner.mean_abs_error(),
            thresholds: hysteresis.get_thresholds(),
            hysteresis_state: hysteresis.current_state(),
            thresholds_inverted: hysteresis.is_inverted(),
            start_samples,
            stop_samples,
            seasonal_patterns: self.engine.seasonal().pattern_count(),
            feedback_delay_s: self.delay.current_delay_s(),
            feedback_cycles_learned: self.delay.cycles_completed(),
            pending_feedback: self.queue.len(),
            temperature_outliers: self.engine.outlier().stats(Channel::Temperature),
            power_outliers: self.engine.outlier().stats(Channel::Power),
            last_offset: self.last_offset,
        }
    }
}
