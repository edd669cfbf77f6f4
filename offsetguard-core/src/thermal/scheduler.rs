//! Probe scheduling
//!
//! ## Decision
//!
//! ```text
//! since = now − (last probe | scheduler creation)
//!
//! since <  min_interval            → no
//! since >= max_interval            → yes (starvation override)
//! otherwise                        → opportunity ∧ information gain
//! ```
//!
//! Opportunity comes from an ordered chain of providers, each answering
//! yes, no or "don't know". The first provider with an answer wins:
//!
//! 1. presence: nobody home
//! 2. calendar: the user is busy elsewhere
//! 3. manual override flag
//! 4. quiet hours (always answers)
//!
//! Information gain is positive while the current outdoor bucket holds
//! fewer than three completed probes.
//!
//! ## Aborts
//!
//! A running probe stops when someone comes home, the setpoint is changed
//! by hand, the outdoor temperature swings more than 5 °C from its value at
//! probe start, or an upstream sensor fails. Data from aborted probes longer
//! than 15 minutes is kept with reduced confidence.

use alloc::{boxed::Box, vec::Vec};
use core::fmt;

use crate::{
    constants::{
        scheduling::{
            AGGRESSIVE_MIN_INTERVAL_HOURS, BALANCED_MIN_INTERVAL_HOURS, COMFORT_MIN_INTERVAL_HOURS,
            INFO_GAIN_PROBES_PER_BUCKET, MAX_PROBE_INTERVAL_DAYS, OUTDOOR_BUCKET_COUNT,
            OUTDOOR_BUCKET_EDGES_C, OUTDOOR_SWING_ABORT_C, PARTIAL_PROBE_CONFIDENCE_FACTOR,
            PARTIAL_PROBE_MIN_MINUTES, QUIET_HOURS_END_MINUTE, QUIET_HOURS_START_MINUTE,
        },
        time::{MS_PER_DAY, MS_PER_HOUR, MINUTES_PER_DAY},
    },
    errors::{LearningError, LearningResult},
    stats,
    thermal::{model::ProbeResult, probe::ProbeOutcome},
    time::{LocalClock, Timestamp},
};

/// How often the user accepts a probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum LearningProfile {
    /// At most one probe a day
    Comfort,
    #[default]
    Balanced,
    /// Learn fast: every six hours
    Aggressive,
    Custom { min_interval_hours: u64 },
}

impl LearningProfile {
    pub fn min_interval_hours(&self) -> u64 {
        match self {
            Self::Comfort => COMFORT_MIN_INTERVAL_HOURS,
            Self::Balanced => BALANCED_MIN_INTERVAL_HOURS,
            Self::Aggressive => AGGRESSIVE_MIN_INTERVAL_HOURS,
            Self::Custom { min_interval_hours } => *min_interval_hours,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SchedulerConfig {
    pub profile: LearningProfile,
    pub max_interval_days: u64,
    /// Minutes after local midnight
    pub quiet_hours_start_minute: u16,
    pub quiet_hours_end_minute: u16,
    pub probes_per_bucket: u16,
    pub outdoor_swing_abort_c: f32,
    pub partial_min_minutes: u64,
    pub partial_confidence_factor: f32,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            profile: LearningProfile::default(),
            max_interval_days: MAX_PROBE_INTERVAL_DAYS,
            quiet_hours_start_minute: QUIET_HOURS_START_MINUTE,
            quiet_hours_end_minute: QUIET_HOURS_END_MINUTE,
            probes_per_bucket: INFO_GAIN_PROBES_PER_BUCKET,
            outdoor_swing_abort_c: OUTDOOR_SWING_ABORT_C,
            partial_min_minutes: PARTIAL_PROBE_MIN_MINUTES,
            partial_confidence_factor: PARTIAL_PROBE_CONFIDENCE_FACTOR,
        }
    }
}

impl SchedulerConfig {
    pub fn min_interval_ms(&self) -> u64 {
        self.profile.min_interval_hours().saturating_mul(MS_PER_HOUR)
    }

    pub fn max_interval_ms(&self) -> u64 {
        self.max_interval_days.saturating_mul(MS_PER_DAY)
    }

    pub fn validate(&self) -> LearningResult<()> {
        if self.min_interval_ms() == 0 || self.min_interval_ms() >= self.max_interval_ms() {
            return Err(LearningError::InvalidConfig {
                field: "scheduler.intervals",
                reason: "need 0 < min_interval < max_interval",
            });
        }
        let day = MINUTES_PER_DAY as u16;
        if self.quiet_hours_start_minute >= day || self.quiet_hours_end_minute >= day {
            return Err(LearningError::InvalidConfig {
                field: "scheduler.quiet_hours",
                reason: "must be minutes within a day",
            });
        }
        if !(self.outdoor_swing_abort_c > 0.0) {
            return Err(LearningError::InvalidConfig {
                field: "scheduler.outdoor_swing_abort_c",
                reason: "must be positive",
            });
        }
        Ok(())
    }
}

/// Externally resolved signals; `None` means unknown
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct OpportunitySignals {
    /// Someone is home
    pub presence: Option<bool>,
    /// Calendar shows the user busy away from home
    pub calendar_busy: Option<bool>,
    /// User explicitly allows probing now
    pub manual_override: Option<bool>,
}

/// One link in the opportunity chain
pub trait OpportunityProvider {
    fn name(&self) -> &'static str;

    /// `Some(allowed)` when this provider has an answer
    fn opportunity(&self, signals: &OpportunitySignals, now: Timestamp) -> Option<bool>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct PresenceProvider;

impl OpportunityProvider for PresenceProvider {
    fn name(&self) -> &'static str {
        "presence"
    }

    fn opportunity(&self, signals: &OpportunitySignals, _now: Timestamp) -> Option<bool> {
        signals.presence.map(|home| !home)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CalendarProvider;

impl OpportunityProvider for CalendarProvider {
    fn name(&self) -> &'static str {
        "calendar"
    }

    fn opportunity(&self, signals: &OpportunitySignals, _now: Timestamp) -> Option<bool> {
        signals.calendar_busy
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ManualOverrideProvider;

impl OpportunityProvider for ManualOverrideProvider {
    fn name(&self) -> &'static str {
        "manual_override"
    }

    fn opportunity(&self, signals: &OpportunitySignals, _now: Timestamp) -> Option<bool> {
        signals.manual_override
    }
}

/// Quiet-hours window, wrap-around aware
#[derive(Debug, Clone, Copy)]
pub struct QuietHoursProvider {
    pub clock: LocalClock,
    pub start_minute: u16,
    pub end_minute: u16,
}

impl QuietHoursProvider {
    pub fn contains(&self, minute_of_day: u16) -> bool {
        if self.start_minute <= self.end_minute {
            minute_of_day >= self.start_minute && minute_of_day < self.end_minute
        } else {
            minute_of_day >= self.start_minute || minute_of_day < self.end_minute
        }
    }
}

impl OpportunityProvider for QuietHoursProvider {
    fn name(&self) -> &'static str {
        "quiet_hours"
    }

    fn opportunity(&self, _signals: &OpportunitySignals, now: Timestamp) -> Option<bool> {
        Some(self.contains(self.clock.minute_of_day(now)))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AbortReason {
    PresenceDetected,
    ManualOverride,
    OutdoorSwing,
    UpstreamFault,
}

impl AbortReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PresenceDetected => "presence_detected",
            Self::ManualOverride => "manual_override",
            Self::OutdoorSwing => "outdoor_swing",
            Self::UpstreamFault => "upstream_fault",
        }
    }
}

/// Conditions sampled while a probe runs
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct AbortCheck {
    pub presence: Option<bool>,
    pub manual_setpoint_change: bool,
    pub outdoor_temp: Option<f32>,
    pub upstream_fault: bool,
}

#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SchedulerSnapshot {
    pub created_at: Option<Timestamp>,
    pub last_probe_at: Option<Timestamp>,
    /// Completed probes per outdoor bucket
    pub bucket_counts: Vec<u16>,
}

#[derive(Debug, Clone, Copy)]
struct ActiveProbe {
    started_at: Timestamp,
    start_outdoor: Option<f32>,
}

/// Decides when a probe may run and when it must stop
pub struct ProbeScheduler {
    config: SchedulerConfig,
    providers: Vec<Box<dyn OpportunityProvider + Send + Sync>>,
    created_at: Timestamp,
    last_probe_at: Option<Timestamp>,
    bucket_counts: [u16; OUTDOOR_BUCKET_COUNT],
    active: Option<ActiveProbe>,
}

impl fmt::Debug for ProbeScheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let providers: Vec<&'static str> = self.providers.iter().map(|p| p.name()).collect();
        f.debug_struct("ProbeScheduler")
            .field("config", &self.config)
            .field("providers", &providers)
            .field("created_at", &self.created_at)
            .field("last_probe_at", &self.last_probe_at)
            .field("bucket_counts", &self.bucket_counts)
            .field("active", &self.active)
            .finish()
    }
}

impl ProbeScheduler {
    /// Scheduler with the default presence → calendar → override → quiet-hours chain
    pub fn new(config: SchedulerConfig, clock: LocalClock, now: Timestamp) -> Self {
        let providers: Vec<Box<dyn OpportunityProvider + Send + Sync>> = alloc::vec![
            Box::new(PresenceProvider),
            Box::new(CalendarProvider),
            Box::new(ManualOverrideProvider),
            Box::new(QuietHoursProvider {
                clock,
                start_minute: config.quiet_hours_start_minute,
                end_minute: config.quiet_hours_end_minute,
            }),
        ];
        Self::with_providers(config, providers, now)
    }

    pub fn with_providers(
        config: SchedulerConfig,
        providers: Vec<Box<dyn OpportunityProvider + Send + Sync>>,
        now: Timestamp,
    ) -> Self {
        Self {
            config,
            providers,
            created_at: now,
            last_probe_at: None,
            bucket_counts: [0; OUTDOOR_BUCKET_COUNT],
            active: None,
        }
    }

    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    fn anchor(&self) -> Timestamp {
        self.last_probe_at.unwrap_or(self.created_at)
    }

    pub fn last_probe_at(&self) -> Option<Timestamp> {
        self.last_probe_at
    }

    /// Earliest time the minimum interval allows a probe
    pub fn next_eligible_at(&self) -> Timestamp {
        self.anchor().saturating_add(self.config.min_interval_ms())
    }

    /// First answer from the provider chain; no answer means no
    pub fn opportunity(&self, signals: &OpportunitySignals, now: Timestamp) -> bool {
        self.providers
            .iter()
            .find_map(|p| p.opportunity(signals, now))
            .unwrap_or(false)
    }

    /// Index of the outdoor bucket containing `temp`
    pub fn outdoor_bucket(temp: f32) -> usize {
        OUTDOOR_BUCKET_EDGES_C
            .iter()
            .position(|edge| temp < *edge)
            .unwrap_or(OUTDOOR_BUCKET_EDGES_C.len())
    }

    /// Remaining value of probing at this outdoor temperature, [0, 1]
    pub fn information_gain(&self, outdoor_temp: Option<f32>) -> f32 {
        let Some(temp) = outdoor_temp.filter(|t| t.is_finite()) else {
            return 0.0;
        };
        let done = self.bucket_counts[Self::outdoor_bucket(temp)] as f32;
        let wanted = self.config.probes_per_bucket.max(1) as f32;
        stats::unit_clamp(1.0 - done / wanted)
    }

    pub fn has_information_gain(&self, outdoor_temp: Option<f32>) -> bool {
        self.information_gain(outdoor_temp) > 0.0
    }

    /// Whether a probe should start now
    pub fn should_probe_now(
        &self,
        now: Timestamp,
        signals: &OpportunitySignals,
        outdoor_temp: Option<f32>,
    ) -> bool {
        if self.active.is_some() {
            return false;
        }

        let since = now.saturating_sub(self.anchor());
        if since < self.config.min_interval_ms() {
            return false;
        }
        if since >= self.config.max_interval_ms() {
            return true;
        }

        self.opportunity(signals, now) && self.has_information_gain(outdoor_temp)
    }

    pub fn begin_probe(&mut self, now: Timestamp, outdoor_temp: Option<f32>) {
        self.active = Some(ActiveProbe {
            started_at: now,
            start_outdoor: outdoor_temp.filter(|t| t.is_finite()),
        });
    }

    pub fn is_probe_active(&self) -> bool {
        self.active.is_some()
    }

    pub fn probe_started_at(&self) -> Option<Timestamp> {
        self.active.map(|a| a.started_at)
    }

    /// Whether the running probe must stop, and why
    pub fn check_abort_conditions(&self, check: &AbortCheck) -> (bool, Option<AbortReason>) {
        let Some(active) = self.active else {
            return (false, None);
        };

        let reason = if check.presence == Some(true) {
            Some(AbortReason::PresenceDetected)
        } else if check.manual_setpoint_change {
            Some(AbortReason::ManualOverride)
        } else if check.upstream_fault {
            Some(AbortReason::UpstreamFault)
        } else {
            match (active.start_outdoor, check.outdoor_temp) {
                (Some(start), Some(current))
                    if libm::fabsf(current - start) > self.config.outdoor_swing_abort_c =>
                {
                    Some(AbortReason::OutdoorSwing)
                }
                _ => None,
            }
        };

        (reason.is_some(), reason)
    }

    /// Turn an aborted probe into a reduced-confidence result
    ///
    /// Probes shorter than the partial minimum, or without a usable fit, are
    /// discarded.
    pub fn handle_partial_probe_data(
        &self,
        outcome: &ProbeOutcome,
        reason: AbortReason,
    ) -> Option<ProbeResult> {
        if outcome.duration_minutes < self.config.partial_min_minutes as f32 {
            log_info!(
                "discarding {} min probe aborted by {}",
                outcome.duration_minutes,
                reason.as_str()
            );
            return None;
        }

        let fit = outcome.fit?;
        let confidence = stats::unit_clamp(fit.r_squared)
            * outcome.completed_fraction()
            * self.config.partial_confidence_factor;

        log_info!(
            "keeping partial probe ({}): tau {} min, confidence {}",
            reason.as_str(),
            fit.tau,
            confidence
        );

        Some(ProbeResult {
            tau_value: fit.tau,
            confidence: stats::unit_clamp(confidence),
            duration_minutes: outcome.duration_minutes,
            fit_quality: fit.r_squared,
            aborted: true,
            timestamp: outcome.ended_at,
        })
    }

    /// Close the running probe and restart the interval
    ///
    /// Only probes that produced a result count toward their outdoor bucket.
    pub fn end_probe(&mut self, now: Timestamp, result: Option<&ProbeResult>) {
        let active = self.active.take();
        self.last_probe_at = Some(now);

        if result.is_some() {
            if let Some(temp) = active.and_then(|a| a.start_outdoor) {
                let bucket = &mut self.bucket_counts[Self::outdoor_bucket(temp)];
                *bucket = bucket.saturating_add(1);
            }
        }
    }

    pub fn bucket_counts(&self) -> &[u16; OUTDOOR_BUCKET_COUNT] {
        &self.bucket_counts
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        SchedulerSnapshot {
            created_at: Some(self.created_at),
            last_probe_at: self.last_probe_at,
            bucket_counts: self.bucket_counts.to_vec(),
        }
    }

    /// Restore counters; a probe running at save time is not resumed
    pub fn restore(&mut self, snapshot: &SchedulerSnapshot) {
        if let Some(created_at) = snapshot.created_at {
            self.created_at = created_at;
        }
        self.last_probe_at = snapshot.last_probe_at;
        self.bucket_counts = [0; OUTDOOR_BUCKET_COUNT];
        for (slot, count) in self.bucket_counts.iter_mut().zip(snapshot.bucket_counts.iter()) {
            *slot = *count;
        }
        self.active = None;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::time::MS_PER_MINUTE;
    use crate::thermal::probe::ProbeFit;

    const HOUR: u64 = MS_PER_HOUR;
    // 2024-01-01T12:00:00Z, midday so quiet hours are closed
    const NOON: u64 = 1_704_110_400_000;

    fn scheduler() -> ProbeScheduler {
        ProbeScheduler::new(SchedulerConfig::default(), LocalClock::utc(), NOON)
    }

    fn away() -> OpportunitySignals {
        OpportunitySignals {
            presence: Some(false),
            ..Default::default()
        }
    }

    fn outcome(minutes: f32, fit: Option<ProbeFit>) -> ProbeOutcome {
        ProbeOutcome {
            started_at: 0,
            ended_at: (minutes as u64) * MS_PER_MINUTE,
            duration_minutes: minutes,
            planned_minutes: 120.0,
            aborted: true,
            fit,
        }
    }

    #[test]
    fn min_interval_blocks_everything() {
        let s = scheduler();
        assert!(!s.should_probe_now(NOON + 11 * HOUR, &away(), Some(25.0)));
        assert!(s.should_probe_now(NOON + 12 * HOUR, &away(), Some(25.0)));
    }

    #[test]
    fn presence_dominates() {
        let s = scheduler();
        let home = OpportunitySignals {
            presence: Some(true),
            calendar_busy: Some(true),
            manual_override: Some(true),
        };
        assert!(!s.should_probe_now(NOON + 24 * HOUR, &home, Some(25.0)));
    }

    #[test]
    fn max_interval_overrides_opportunity() {
        let s = scheduler();
        let home = OpportunitySignals {
            presence: Some(true),
            ..Default::default()
        };
        assert!(s.should_probe_now(NOON + 7 * 24 * HOUR, &home, None));
    }

    #[test]
    fn chain_falls_through_unknowns() {
        let s = scheduler();
        let calendar = OpportunitySignals {
            calendar_busy: Some(true),
            ..Default::default()
        };
        assert!(s.opportunity(&calendar, NOON));

        // Nothing known at noon: quiet hours closed
        assert!(!s.opportunity(&OpportunitySignals::default(), NOON));
        // 23:00 local: quiet hours open
        assert!(s.opportunity(&OpportunitySignals::default(), NOON + 11 * HOUR));
    }

    #[test]
    fn quiet_hours_wrap_midnight() {
        let provider = QuietHoursProvider {
            clock: LocalClock::utc(),
            start_minute: 22 * 60,
            end_minute: 7 * 60,
        };
        assert!(provider.contains(23 * 60));
        assert!(provider.contains(3 * 60));
        assert!(!provider.contains(7 * 60));
        assert!(!provider.contains(12 * 60));
    }

    #[test]
    fn information_gain_saturates_per_bucket() {
        let mut s = scheduler();
        let result = ProbeResult {
            tau_value: 100.0,
            confidence: 0.9,
            duration_minutes: 120.0,
            fit_quality: 0.9,
            aborted: false,
            timestamp: 0,
        };

        for i in 0..3 {
            assert!(s.has_information_gain(Some(24.0)));
            s.begin_probe(NOON + i, Some(24.0));
            s.end_probe(NOON + i, Some(&result));
        }
        assert!(!s.has_information_gain(Some(24.0)));
        assert!(s.has_information_gain(Some(35.0)));
        assert!(!s.has_information_gain(None));
    }

    #[test]
    fn outdoor_buckets() {
        assert_eq!(ProbeScheduler::outdoor_bucket(-15.0), 0);
        assert_eq!(ProbeScheduler::outdoor_bucket(-10.0), 1);
        assert_eq!(ProbeScheduler::outdoor_bucket(15.0), 3);
        assert_eq!(ProbeScheduler::outdoor_bucket(30.0), 5);
    }

    #[test]
    fn abort_conditions() {
        let mut s = scheduler();
        assert_eq!(s.check_abort_conditions(&AbortCheck::default()), (false, None));

        s.begin_probe(NOON, Some(25.0));
        assert_eq!(s.check_abort_conditions(&AbortCheck::default()), (false, None));
        assert_eq!(
            s.check_abort_conditions(&AbortCheck { presence: Some(true), ..Default::default() }),
            (true, Some(AbortReason::PresenceDetected))
        );
        assert_eq!(
            s.check_abort_conditions(&AbortCheck { outdoor_temp: Some(31.0), ..Default::default() }),
            (true, Some(AbortReason::OutdoorSwing))
        );
        assert_eq!(
            s.check_abort_conditions(&AbortCheck { outdoor_temp: Some(29.0), ..Default::default() }),
            (false, None)
        );
        assert_eq!(
            s.check_abort_conditions(&AbortCheck { upstream_fault: true, ..Default::default() }),
            (true, Some(AbortReason::UpstreamFault))
        );
    }

    #[test]
    fn active_probe_blocks_new_probe() {
        let mut s = scheduler();
        s.begin_probe(NOON, None);
        assert!(!s.should_probe_now(NOON + 8 * 24 * HOUR, &away(), Some(25.0)));
    }

    #[test]
    fn partial_data_kept_with_reduced_confidence() {
        let s = scheduler();
        let fit = ProbeFit { tau: 110.0, r_squared: 0.9, samples: 6 };

        assert!(s.handle_partial_probe_data(&outcome(10.0, Some(fit)), AbortReason::PresenceDetected).is_none());
        assert!(s.handle_partial_probe_data(&outcome(60.0, None), AbortReason::PresenceDetected).is_none());

        let result = s
            .handle_partial_probe_data(&outcome(60.0, Some(fit)), AbortReason::PresenceDetected)
            .unwrap();
        assert!(result.aborted);
        // 0.9 × 0.5 × 0.5
        assert!((result.confidence - 0.225).abs() < 1e-5);
    }

    #[test]
    fn end_probe_restarts_interval() {
        let mut s = scheduler();
        s.begin_probe(NOON + 12 * HOUR, Some(20.0));
        s.end_probe(NOON + 13 * HOUR, None);
        assert_eq!(s.next_eligible_at(), NOON + 25 * HOUR);
        assert_eq!(s.bucket_counts().iter().sum::<u16>(), 0);
    }

    #[test]
    fn snapshot_restore() {
        let mut s = scheduler();
        s.begin_probe(NOON, Some(5.0));
        let result = ProbeResult {
            tau_value: 100.0,
            confidence: 0.9,
            duration_minutes: 120.0,
            fit_quality: 0.9,
            aborted: false,
            timestamp: 0,
        };
        s.end_probe(NOON + HOUR, Some(&result));

        let mut restored = ProbeScheduler::new(SchedulerConfig::default(), LocalClock::utc(), 0);
        restored.restore(&s.snapshot());
        assert_eq!(restored.last_probe_at(), Some(NOON + HOUR));
        assert_eq!(restored.bucket_counts(), s.bucket_counts());
    }
}
