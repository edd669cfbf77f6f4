//! Thermal manager
//!
//! Owns the current [`ThermalState`], the [`ThermalModel`] and the running
//! probe. Two entry points are kept apart:
//!
//! - `observe` advances the state machine and refines tau. It is the only
//!   mutator besides the explicit probe calls.
//! - `decide` is pure. It returns `(decision, should_actuate)`: the decision
//!   is always computed, `should_actuate` is false in shadow mode and while
//!   priming.
//!
//! The manager never sleeps. `next_wake_at` reports when the next
//! time-driven transition (priming end, recovery end, probe end) is due.

use crate::{
    constants::{
        thermal::{
            COMFORT_BAND_HALF_WIDTH_C, DEFAULT_PRIMING_HOURS, DEFAULT_PROBE_DURATION_MINUTES,
            DEFAULT_RECOVERY_MINUTES, MIN_PASSIVE_INTERVAL_MIN, MOMENTUM_LOOKAHEAD_MIN,
        },
        time::{MS_PER_HOUR, MS_PER_MINUTE},
    },
    errors::{LearningError, LearningResult},
    thermal::{
        model::{ProbeResult, ThermalModel, ThermalModelConfig, ThermalModelSnapshot},
        probe::{ProbeOutcome, ProbeSession},
        state::{self, ThermalEvent, ThermalState},
    },
    time::{self, Timestamp},
    types::HvacMode,
};

/// How much temperature swing the user tolerates for savings
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ComfortPreference {
    MaxComfort,
    Comfort,
    #[default]
    Balanced,
    Savings,
    MaxSavings,
}

impl ComfortPreference {
    /// Multiplier applied to the comfort band half-width
    pub fn band_scale(&self) -> f32 {
        match self {
            Self::MaxComfort => 0.5,
            Self::Comfort => 0.75,
            Self::Balanced => 1.0,
            Self::Savings => 1.5,
            Self::MaxSavings => 2.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ThermalConfig {
    pub priming_hours: u64,
    pub recovery_minutes: u64,
    pub probe_duration_minutes: u64,
    pub comfort_band_half_width_c: f32,
    pub momentum_lookahead_min: f32,
    pub preference: ComfortPreference,
    /// Compute decisions without actuating
    pub shadow_mode: bool,
    pub model: ThermalModelConfig,
}

impl Default for ThermalConfig {
    fn default() -> Self {
        Self {
            priming_hours: DEFAULT_PRIMING_HOURS,
            recovery_minutes: DEFAULT_RECOVERY_MINUTES,
            probe_duration_minutes: DEFAULT_PROBE_DURATION_MINUTES,
            comfort_band_half_width_c: COMFORT_BAND_HALF_WIDTH_C,
            momentum_lookahead_min: MOMENTUM_LOOKAHEAD_MIN,
            preference: ComfortPreference::default(),
            shadow_mode: false,
            model: ThermalModelConfig::default(),
        }
    }
}

impl ThermalConfig {
    pub fn validate(&self) -> LearningResult<()> {
        if self.probe_duration_minutes == 0 || self.recovery_minutes == 0 {
            return Err(LearningError::InvalidConfig {
                field: "thermal.durations",
                reason: "probe and recovery durations must be non-zero",
            });
        }
        if !(self.comfort_band_half_width_c > 0.0) {
            return Err(LearningError::InvalidConfig {
                field: "thermal.comfort_band_half_width_c",
                reason: "must be positive",
            });
        }
        self.model.validate()
    }
}

/// One reading as the manager sees it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ThermalObservation {
    pub timestamp: Timestamp,
    pub room_temp: Option<f32>,
    pub outdoor_temp: Option<f32>,
    /// Temperature the user wants in the room
    pub target_temp: f32,
    pub hvac_mode: HvacMode,
    /// Whether the device is drawing conditioning power
    pub conditioning: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlAction {
    /// Keep the device doing what it does
    Hold,
    /// Drive toward the target
    Condition,
    /// Back off: overshoot risk, room past target, or probing
    Relax,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ControlDecision {
    pub action: ControlAction,
    pub state: ThermalState,
    /// Comfort band `(low, high)` around the target (°C)
    pub band: (f32, f32),
    /// Room temperature trend (°C/min)
    pub trend_c_per_min: f32,
    /// Room projected past the far side of the band
    pub overshoot_risk: bool,
    pub reason: &'static str,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ThermalSnapshot {
    pub state: ThermalState,
    pub priming_complete: bool,
    pub priming_started_at: Option<Timestamp>,
    pub model: ThermalModelSnapshot,
}

/// Per-device thermal state machine
#[derive(Debug, Clone)]
pub struct ThermalManager {
    config: ThermalConfig,
    state: ThermalState,
    entered_at: Timestamp,
    priming_started_at: Timestamp,
    priming_complete: bool,
    model: ThermalModel,
    shadow_mode: bool,
    last_reading: Option<(Timestamp, f32)>,
    passive_anchor: Option<(Timestamp, f32)>,
    last_mode: Option<HvacMode>,
    trend_c_per_min: f32,
    probe: Option<ProbeSession>,
}

impl ThermalManager {
    pub fn new(config: ThermalConfig, now: Timestamp) -> Self {
        Self {
            model: ThermalModel::new(config.model),
            shadow_mode: config.shadow_mode,
            config,
            state: ThermalState::Priming,
            entered_at: now,
            priming_started_at: now,
            priming_complete: false,
            last_reading: None,
            passive_anchor: None,
            last_mode: None,
            trend_c_per_min: 0.0,
            probe: None,
        }
    }

    pub fn state(&self) -> ThermalState {
        self.state
    }

    pub fn model(&self) -> &ThermalModel {
        &self.model
    }

    pub fn is_shadow_mode(&self) -> bool {
        self.shadow_mode
    }

    pub fn set_shadow_mode(&mut self, shadow: bool) {
        self.shadow_mode = shadow;
    }

    pub fn trend_c_per_min(&self) -> f32 {
        self.trend_c_per_min
    }

    /// Apply an event through the transition table
    ///
    /// Rejected events are logged and leave the state unchanged.
    pub fn handle_event(&mut self, event: ThermalEvent, now: Timestamp) -> LearningResult<ThermalState> {
        match state::transition(self.state, event) {
            Ok(next) => {
                log_debug!("thermal {} -> {} on {}", self.state.as_str(), next.as_str(), event.as_str());
                if self.state == ThermalState::Priming {
                    self.priming_complete = true;
                }
                self.state = next;
                self.entered_at = now;
                self.passive_anchor = None;
                Ok(next)
            }
            Err(err) => {
                log_warn!("{}", err);
                Err(err)
            }
        }
    }

    fn elapsed_in_state_ms(&self, now: Timestamp) -> u64 {
        now.saturating_sub(self.entered_at)
    }

    /// Advance the state machine with a new reading
    pub fn observe(&mut self, obs: &ThermalObservation) {
        let now = obs.timestamp;
        let room = obs.room_temp.filter(|t| t.is_finite());

        if let (Some(temp), Some((at, previous))) = (room, self.last_reading) {
            let minutes = time::minutes_between(at, now);
            if minutes > 0.0 {
                self.trend_c_per_min = (temp - previous) / minutes;
            }
        }

        let mode_changed = self.last_mode.is_some_and(|m| m != obs.hvac_mode);

        // Events raised here are legal for the state they are raised in
        let _ = match self.state {
            ThermalState::Priming => {
                let priming_ms = self.config.priming_hours.saturating_mul(MS_PER_HOUR);
                if now.saturating_sub(self.priming_started_at) >= priming_ms {
                    self.handle_event(ThermalEvent::PrimingElapsed, now).map(|_| ())
                } else {
                    Ok(())
                }
            }
            ThermalState::Drifting => {
                if obs.conditioning {
                    self.handle_event(ThermalEvent::ConditioningStarted, now).map(|_| ())
                } else {
                    self.refine_passive(now, room, obs.outdoor_temp, false);
                    Ok(())
                }
            }
            ThermalState::Correcting => {
                if mode_changed {
                    self.handle_event(ThermalEvent::ModeChanged, now).map(|_| ())
                } else if !obs.conditioning {
                    self.handle_event(ThermalEvent::ConditioningStopped, now).map(|_| ())
                } else {
                    self.refine_passive(now, room, Some(obs.target_temp), true);
                    Ok(())
                }
            }
            ThermalState::Recovery => {
                let recovery_ms = self.config.recovery_minutes.saturating_mul(MS_PER_MINUTE);
                if self.elapsed_in_state_ms(now) >= recovery_ms {
                    self.handle_event(
                        ThermalEvent::RecoveryElapsed { conditioning: obs.conditioning },
                        now,
                    )
                    .map(|_| ())
                } else {
                    Ok(())
                }
            }
            ThermalState::Probing => {
                if let (Some(session), Some(temp)) = (self.probe.as_mut(), room) {
                    session.record(now, temp);
                }
                Ok(())
            }
            ThermalState::Calibrating => Ok(()),
        };

        if let Some(temp) = room {
            self.last_reading = Some((now, temp));
        }
        self.last_mode = Some(obs.hvac_mode);
    }

    fn refine_passive(&mut self, now: Timestamp, room: Option<f32>, environment: Option<f32>, conditioning: bool) {
        let (Some(temp), Some(env)) = (room, environment.filter(|e| e.is_finite())) else {
            return;
        };

        let Some((at, anchor_temp)) = self.passive_anchor else {
            self.passive_anchor = Some((now, temp));
            return;
        };

        let minutes = time::minutes_between(at, now);
        if minutes < MIN_PASSIVE_INTERVAL_MIN {
            return;
        }

        // Unusable pairs are expected; the anchor moves on either way
        let _ = self.model.update_passive(anchor_temp, temp, env, minutes, conditioning);
        self.passive_anchor = Some((now, temp));
    }

    /// Enter PROBING after scheduler approval
    pub fn start_probe(&mut self, now: Timestamp, room_temp: f32, environment_temp: f32) -> LearningResult<()> {
        if !room_temp.is_finite() || !environment_temp.is_finite() {
            return Err(LearningError::MissingData { field: "probe_temperatures" });
        }

        self.handle_event(ThermalEvent::ProbeApproved, now)?;
        let mut session = ProbeSession::new(
            now,
            room_temp,
            environment_temp,
            self.config.probe_duration_minutes as f32,
        );
        session.record(now, room_temp);
        self.probe = Some(session);

        log_info!("probe started at {}°C, environment {}°C", room_temp, environment_temp);
        Ok(())
    }

    /// Whether a running probe has reached its planned duration
    pub fn probe_due(&self, now: Timestamp) -> bool {
        self.state == ThermalState::Probing
            && self.probe.as_ref().is_some_and(|p| p.is_complete(now))
    }

    pub fn probe_session(&self) -> Option<&ProbeSession> {
        self.probe.as_ref()
    }

    /// Leave PROBING for CALIBRATING, returning what the probe measured
    pub fn end_probe(&mut self, now: Timestamp, aborted: bool) -> LearningResult<ProbeOutcome> {
        let event = if aborted { ThermalEvent::ProbeAborted } else { ThermalEvent::ProbeCompleted };
        let session = self.probe.take().ok_or(LearningError::InvalidTransition {
            from: self.state.as_str(),
            event: event.as_str(),
        })?;

        if let Err(err) = self.handle_event(event, now) {
            self.probe = Some(session);
            return Err(err);
        }

        let outcome = session.finish(now, aborted);
        log_info!(
            "probe {} after {} min",
            if aborted { "aborted" } else { "completed" },
            outcome.duration_minutes
        );
        Ok(outcome)
    }

    /// Fold a probe result (if any) and leave CALIBRATING
    pub fn calibrate(
        &mut self,
        result: Option<&ProbeResult>,
        now: Timestamp,
        conditioning: bool,
    ) -> LearningResult<ThermalState> {
        if self.state != ThermalState::Calibrating {
            return Err(LearningError::InvalidTransition {
                from: self.state.as_str(),
                event: "calibration_done",
            });
        }

        if let Some(result) = result {
            if let Err(err) = self.model.apply_probe(result) {
                log_warn!("probe result rejected: {}", err);
            }
        }

        self.handle_event(ThermalEvent::CalibrationDone { conditioning }, now)
    }

    /// Comfort band for a target at the configured preference
    pub fn comfort_band(&self, target: f32) -> (f32, f32) {
        let half = self.config.comfort_band_half_width_c * self.config.preference.band_scale();
        (target - half, target + half)
    }

    /// Pure control decision plus the actuation gate
    pub fn decide(&self, obs: &ThermalObservation) -> (ControlDecision, bool) {
        let band = self.comfort_band(obs.target_temp);
        let mut decision = ControlDecision {
            action: ControlAction::Hold,
            state: self.state,
            band,
            trend_c_per_min: self.trend_c_per_min,
            overshoot_risk: false,
            reason: "in_band",
        };

        let should_actuate = !self.shadow_mode && self.state != ThermalState::Priming;

        if self.state == ThermalState::Probing {
            decision.action = ControlAction::Relax;
            decision.reason = "probing";
            return (decision, should_actuate);
        }

        let Some(room) = obs.room_temp.filter(|t| t.is_finite()) else {
            decision.reason = "missing_room_temp";
            return (decision, should_actuate);
        };

        let direction = obs.hvac_mode.direction();
        if direction == 0.0 {
            decision.reason = "not_conditioning_mode";
            return (decision, should_actuate);
        }

        let (low, high) = band;
        let projected = room + self.trend_c_per_min * self.config.momentum_lookahead_min;

        // Cooling pushes temperature down, heating up
        let (needs_work, past_target, overshoot) = if direction < 0.0 {
            (room > high, room < low, obs.conditioning && projected < low)
        } else {
            (room < low, room > high, obs.conditioning && projected > high)
        };

        decision.overshoot_risk = overshoot;
        if overshoot {
            decision.action = ControlAction::Relax;
            decision.reason = "overshoot_risk";
        } else if needs_work {
            decision.action = ControlAction::Condition;
            decision.reason = "outside_band";
        } else if past_target {
            decision.action = ControlAction::Relax;
            decision.reason = "past_target";
        }

        (decision, should_actuate)
    }

    /// When the next time-driven transition is due
    pub fn next_wake_at(&self) -> Option<Timestamp> {
        match self.state {
            ThermalState::Priming => Some(
                self.priming_started_at
                    .saturating_add(self.config.priming_hours.saturating_mul(MS_PER_HOUR)),
            ),
            ThermalState::Recovery => Some(
                self.entered_at
                    .saturating_add(self.config.recovery_minutes.saturating_mul(MS_PER_MINUTE)),
            ),
            ThermalState::Probing => self.probe.as_ref().map(|p| {
                p.started_at()
                    .saturating_add(self.config.probe_duration_minutes.saturating_mul(MS_PER_MINUTE))
            }),
            _ => None,
        }
    }

    pub fn snapshot(&self) -> ThermalSnapshot {
        ThermalSnapshot {
            state: self.state,
            priming_complete: self.priming_complete,
            priming_started_at: Some(self.priming_started_at),
            model: self.model.snapshot(),
        }
    }

    /// Restore learned state
    ///
    /// Transient states resume as DRIFTING. Priming continues from its
    /// original start unless it already completed.
    pub fn restore(&mut self, snapshot: &ThermalSnapshot, now: Timestamp) {
        self.model.restore(&snapshot.model);
        self.priming_complete = snapshot.priming_complete;
        self.priming_started_at = snapshot.priming_started_at.unwrap_or(now).min(now);

        self.state = match snapshot.state {
            ThermalState::Priming if !snapshot.priming_complete => ThermalState::Priming,
            ThermalState::Priming => ThermalState::Drifting,
            s if s.is_transient() => ThermalState::Drifting,
            s => s,
        };
        self.entered_at = now;
        self.probe = None;
        self.passive_anchor = None;
        self.last_reading = None;
        self.last_mode = None;
        self.trend_c_per_min = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MIN: u64 = MS_PER_MINUTE;
    const HOUR: u64 = MS_PER_HOUR;

    fn obs(at: Timestamp, room: f32, conditioning: bool) -> ThermalObservation {
        ThermalObservation {
            timestamp: at,
            room_temp: Some(room),
            outdoor_temp: Some(32.0),
            target_temp: 24.0,
            hvac_mode: HvacMode::Cool,
            conditioning,
        }
    }

    fn primed() -> ThermalManager {
        let mut manager = ThermalManager::new(ThermalConfig::default(), 0);
        manager.observe(&obs(24 * HOUR, 24.0, false));
        assert_eq!(manager.state(), ThermalState::Drifting);
        manager
    }

    #[test]
    fn priming_is_shadow_only() {
        let manager = ThermalManager::new(ThermalConfig::default(), 0);
        let (decision, actuate) = manager.decide(&obs(0, 26.0, false));
        assert_eq!(decision.action, ControlAction::Condition);
        assert!(!actuate);
        assert_eq!(manager.next_wake_at(), Some(24 * HOUR));
    }

    #[test]
    fn drifting_correcting_cycle() {
        let mut manager = primed();
        manager.observe(&obs(24 * HOUR + MIN, 24.6, true));
        assert_eq!(manager.state(), ThermalState::Correcting);
        manager.observe(&obs(24 * HOUR + 30 * MIN, 23.8, false));
        assert_eq!(manager.state(), ThermalState::Drifting);
    }

    #[test]
    fn mode_change_enters_recovery() {
        let mut manager = primed();
        manager.observe(&obs(24 * HOUR + MIN, 24.6, true));
        let mut heat = obs(24 * HOUR + 2 * MIN, 24.5, true);
        heat.hvac_mode = HvacMode::Heat;
        manager.observe(&heat);
        assert_eq!(manager.state(), ThermalState::Recovery);
        assert_eq!(manager.next_wake_at(), Some(24 * HOUR + 22 * MIN));

        let mut later = heat;
        later.timestamp = 24 * HOUR + 22 * MIN;
        manager.observe(&later);
        assert_eq!(manager.state(), ThermalState::Correcting);
    }

    #[test]
    fn probing_rejected_while_priming() {
        let mut manager = ThermalManager::new(ThermalConfig::default(), 0);
        assert!(manager.start_probe(0, 24.0, 32.0).is_err());
        assert_eq!(manager.state(), ThermalState::Priming);
    }

    #[test]
    fn full_probe_cycle_folds_result() {
        let mut manager = primed();
        let start = 25 * HOUR;
        manager.start_probe(start, 22.0, 32.0).unwrap();
        assert_eq!(manager.state(), ThermalState::Probing);
        assert_eq!(manager.decide(&obs(start, 22.0, false)).0.action, ControlAction::Relax);

        for m in (10..=120u64).step_by(10) {
            let temp = 32.0 - 10.0 * libm::expf(-(m as f32) / 100.0);
            manager.observe(&obs(start + m * MIN, temp, false));
        }
        assert!(manager.probe_due(start + 120 * MIN));

        let outcome = manager.end_probe(start + 120 * MIN, false).unwrap();
        assert_eq!(manager.state(), ThermalState::Calibrating);
        let result = outcome.to_result().unwrap();

        manager.calibrate(Some(&result), start + 121 * MIN, false).unwrap();
        assert_eq!(manager.state(), ThermalState::Drifting);
        assert!(manager.model().tau_warming() < 150.0);
        assert_eq!(manager.model().probe_history().count(), 1);
    }

    #[test]
    fn end_probe_without_probe_is_rejected() {
        let mut manager = primed();
        assert!(manager.end_probe(0, true).is_err());
        assert_eq!(manager.state(), ThermalState::Drifting);
    }

    #[test]
    fn shadow_mode_gates_actuation_only() {
        let mut manager = primed();
        manager.set_shadow_mode(true);
        let (decision, actuate) = manager.decide(&obs(25 * HOUR, 25.5, false));
        assert_eq!(decision.action, ControlAction::Condition);
        assert!(!actuate);

        manager.set_shadow_mode(false);
        assert!(manager.decide(&obs(25 * HOUR, 25.5, false)).1);
    }

    #[test]
    fn overshoot_risk_relaxes() {
        let mut manager = primed();
        manager.observe(&obs(24 * HOUR + MIN, 24.0, true));
        // Falling 0.2 °C/min toward the low edge of the band
        manager.observe(&obs(24 * HOUR + 2 * MIN, 23.8, true));
        let (decision, _) = manager.decide(&obs(24 * HOUR + 2 * MIN, 23.8, true));
        assert!(decision.overshoot_risk);
        assert_eq!(decision.action, ControlAction::Relax);
    }

    #[test]
    fn preference_scales_band() {
        let mut config = ThermalConfig::default();
        config.preference = ComfortPreference::MaxSavings;
        let manager = ThermalManager::new(config, 0);
        assert_eq!(manager.comfort_band(24.0), (23.0, 25.0));
    }

    #[test]
    fn passive_drift_refines_warming() {
        let mut manager = primed();
        // Drift toward 32 °C with tau 100
        for m in (0..=60u64).step_by(10) {
            let temp = 32.0 - 8.0 * libm::expf(-(m as f32) / 100.0);
            manager.observe(&obs(25 * HOUR + m * MIN, temp, false));
        }
        assert!(manager.model().passive_updates() > 0);
        assert!(manager.model().tau_warming() < 150.0);
    }

    #[test]
    fn restore_resumes_transient_as_drifting() {
        let mut manager = primed();
        manager.start_probe(25 * HOUR, 22.0, 32.0).unwrap();
        let snapshot = manager.snapshot();

        let mut restored = ThermalManager::new(ThermalConfig::default(), 30 * HOUR);
        restored.restore(&snapshot, 30 * HOUR);
        assert_eq!(restored.state(), ThermalState::Drifting);
        assert!(restored.probe_session().is_none());
    }

    #[test]
    fn restore_continues_priming() {
        let manager = ThermalManager::new(ThermalConfig::default(), 0);
        let snapshot = manager.snapshot();

        let mut restored = ThermalManager::new(ThermalConfig::default(), 10 * HOUR);
        restored.restore(&snapshot, 10 * HOUR);
        assert_eq!(restored.state(), ThermalState::Priming);
        assert_eq!(restored.next_wake_at(), Some(24 * HOUR));
    }
}
