//! Feedback delay learning
//!
//! After a setpoint change the room needs time before its reading reflects
//! the new offset. Sampling too early teaches the learner a transient.
//!
//! A learning cycle starts on a setpoint change. The host calls `observe`
//! at every `next_observation_at`; the room counts as stable once the last
//! four readings span less than 0.1 °C. The measured delay is the elapsed
//! time plus a 30 s margin, smoothed into the running estimate:
//!
//! ```text
//! delay = clamp(0.3 × measured + 0.7 × delay, 30 s, 900 s)
//! ```
//!
//! Cycles that never stabilize time out (10 min, 15 min in heat mode) and
//! leave the estimate untouched.

use crate::{
    buffer::RingBuffer,
    constants::{
        buffers::DELAY_STABILITY_WINDOW,
        learning::{
            DEFAULT_FEEDBACK_DELAY_S, DELAY_HEAT_TIMEOUT_S, DELAY_MARGIN_S,
            DELAY_OBSERVATION_INTERVAL_S, DELAY_SMOOTHING_ALPHA, DELAY_STABILITY_SPREAD_C,
            DELAY_TIMEOUT_S, MAX_FEEDBACK_DELAY_S, MIN_FEEDBACK_DELAY_S,
        },
        time::MS_PER_SECOND,
    },
    errors::{LearningError, LearningResult},
    stats,
    time::{self, Timestamp},
    types::HvacMode,
};

#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DelayConfig {
    pub default_delay_s: u32,
    pub alpha: f32,
    pub min_delay_s: u32,
    pub max_delay_s: u32,
    pub observation_interval_s: u32,
    pub stability_spread_c: f32,
    pub margin_s: u32,
    pub timeout_s: u32,
    pub heat_timeout_s: u32,
}

impl Default for DelayConfig {
    fn default() -> Self {
        Self {
            default_delay_s: DEFAULT_FEEDBACK_DELAY_S,
            alpha: DELAY_SMOOTHING_ALPHA,
            min_delay_s: MIN_FEEDBACK_DELAY_S,
            max_delay_s: MAX_FEEDBACK_DELAY_S,
            observation_interval_s: DELAY_OBSERVATION_INTERVAL_S,
            stability_spread_c: DELAY_STABILITY_SPREAD_C,
            margin_s: DELAY_MARGIN_S,
            timeout_s: DELAY_TIMEOUT_S,
            heat_timeout_s: DELAY_HEAT_TIMEOUT_S,
        }
    }
}

impl DelayConfig {
    pub fn validate(&self) -> LearningResult<()> {
        if !(self.alpha > 0.0 && self.alpha <= 1.0) {
            return Err(LearningError::InvalidConfig {
                field: "delay.alpha",
                reason: "must be in (0, 1]",
            });
        }
        if self.min_delay_s > self.max_delay_s || self.observation_interval_s == 0 {
            return Err(LearningError::InvalidConfig {
                field: "delay",
                reason: "min delay above max or zero observation interval",
            });
        }
        Ok(())
    }
}

/// Result of one observation
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DelayOutcome {
    /// Still settling; observe again at the given time
    Pending { next_observation_at: Timestamp },
    /// Room settled; the smoothed delay in seconds
    Learned { delay_s: u32 },
    /// Gave up without changing the estimate
    TimedOut,
}

#[derive(Debug, Clone)]
struct ActiveCycle {
    started_at: Timestamp,
    timeout_s: u32,
    readings: RingBuffer<f32, DELAY_STABILITY_WINDOW>,
    next_observation_at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct DelaySnapshot {
    pub learned_delay_s: Option<f32>,
    pub cycles_completed: u32,
}

/// Per-device feedback delay learner
#[derive(Debug, Clone)]
pub struct DelayLearner {
    config: DelayConfig,
    learned_delay_s: Option<f32>,
    cycle: Option<ActiveCycle>,
    cycles_completed: u32,
}

impl Default for DelayLearner {
    fn default() -> Self {
        Self::new(DelayConfig::default())
    }
}

impl DelayLearner {
    pub fn new(config: DelayConfig) -> Self {
        Self {
            config,
            learned_delay_s: None,
            cycle: None,
            cycles_completed: 0,
        }
    }

    fn interval_ms(&self) -> u64 {
        self.config.observation_interval_s as u64 * MS_PER_SECOND
    }

    /// Begin a cycle after a setpoint change, replacing any running cycle
    ///
    /// Returns when the first observation is due.
    pub fn start_cycle(&mut self, now: Timestamp, mode: HvacMode) -> Timestamp {
        let timeout_s = match mode {
            HvacMode::Heat => self.config.heat_timeout_s,
            _ => self.config.timeout_s,
        };
        let next_observation_at = now.saturating_add(self.interval_ms());

        self.cycle = Some(ActiveCycle {
            started_at: now,
            timeout_s,
            readings: RingBuffer::new(),
            next_observation_at,
        });

        next_observation_at
    }

    /// Record a room reading for the running cycle
    ///
    /// `None` when no cycle is running.
    pub fn observe(&mut self, now: Timestamp, room_temp: f32) -> Option<DelayOutcome> {
        let interval_ms = self.interval_ms();
        let spread_limit = self.config.stability_spread_c;
        let cycle = self.cycle.as_mut()?;

        let elapsed_s = time::seconds_between(cycle.started_at, now);
        if elapsed_s >= cycle.timeout_s as u64 {
            self.cycle = None;
            log_debug!("feedback delay cycle timed out after {}s", elapsed_s);
            return Some(DelayOutcome::TimedOut);
        }

        if room_temp.is_finite() {
            cycle.readings.push(room_temp);
        }

        if cycle.readings.is_full() {
            let (min, max) = cycle
                .readings
                .iter()
                .fold((f32::MAX, f32::MIN), |(lo, hi), t| (lo.min(*t), hi.max(*t)));

            if max - min < spread_limit {
                self.cycle = None;
                let delay_s = self.fold_measurement(elapsed_s as f32);
                return Some(DelayOutcome::Learned { delay_s });
            }
        }

        cycle.next_observation_at = now.saturating_add(interval_ms);
        Some(DelayOutcome::Pending {
            next_observation_at: cycle.next_observation_at,
        })
    }

    fn fold_measurement(&mut self, stabilization_s: f32) -> u32 {
        let measured = stabilization_s + self.config.margin_s as f32;
        let smoothed = match self.learned_delay_s {
            Some(current) => stats::smooth(current, measured, self.config.alpha),
            None => measured,
        };
        let clamped = smoothed.clamp(self.config.min_delay_s as f32, self.config.max_delay_s as f32);

        self.learned_delay_s = Some(clamped);
        self.cycles_completed = self.cycles_completed.saturating_add(1);
        log_debug!("feedback delay learned: {}s", clamped);

        libm::roundf(clamped) as u32
    }

    /// Abort the running cycle, e.g. on manual override
    pub fn cancel(&mut self) {
        self.cycle = None;
    }

    /// Delay to wait before sampling feedback (seconds)
    pub fn current_delay_s(&self) -> u32 {
        self.learned_delay_s
            .map(|d| libm::roundf(d) as u32)
            .unwrap_or(self.config.default_delay_s)
    }

    pub fn is_learning(&self) -> bool {
        self.cycle.is_some()
    }

    pub fn next_observation_at(&self) -> Option<Timestamp> {
        self.cycle.as_ref().map(|c| c.next_observation_at)
    }

    pub fn cycles_completed(&self) -> u32 {
        self.cycles_completed
    }

    pub fn snapshot(&self) -> DelaySnapshot {
        DelaySnapshot {
            learned_delay_s: self.learned_delay_s,
            cycles_completed: self.cycles_completed,
        }
    }

    pub fn restore(&mut self, snapshot: &DelaySnapshot) {
        let (min, max) = (self.config.min_delay_s as f32, self.config.max_delay_s as f32);
        self.learned_delay_s = snapshot
            .learned_delay_s
            .filter(|d| d.is_finite())
            .map(|d| d.clamp(min, max));
        self.cycles_completed = snapshot.cycles_completed;
        self.cycle = None;
    }
}
