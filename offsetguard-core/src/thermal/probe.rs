//! Probe sessions
//!
//! During a probe conditioning is paused and the room drifts toward the
//! outdoor temperature. Each sample `(t, T)` linearizes the RC curve:
//!
//! ```text
//! y = ln((T − T_env) / (T_0 − T_env)) = −t / tau
//! ```
//!
//! A least-squares line through the origin gives `slope = Σty / Σt²` and
//! `tau = −1 / slope`. R² of that line is the fit quality.
//!
//! The sample buffer is fixed. When it fills, every other sample is dropped
//! and the minimum spacing between stored samples doubles, so the stored
//! points always span the whole session.

use heapless::Vec as BoundedVec;

use crate::{
    constants::{
        buffers::PROBE_SESSION_SAMPLES,
        thermal::{MIN_PASSIVE_GAP_C, PROBE_MIN_SAMPLES},
    },
    stats,
    thermal::model::ProbeResult,
    time::{self, Timestamp},
};

/// Least-squares fit of one session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeFit {
    /// Minutes
    pub tau: f32,
    pub r_squared: f32,
    pub samples: usize,
}

/// Summary handed back when a probe ends
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProbeOutcome {
    pub started_at: Timestamp,
    pub ended_at: Timestamp,
    pub duration_minutes: f32,
    pub planned_minutes: f32,
    pub aborted: bool,
    pub fit: Option<ProbeFit>,
}

impl ProbeOutcome {
    /// Share of the planned duration that ran, [0, 1]
    pub fn completed_fraction(&self) -> f32 {
        if self.planned_minutes <= 0.0 {
            return 0.0;
        }
        stats::unit_clamp(self.duration_minutes / self.planned_minutes)
    }

    /// Result of a probe that ran to completion
    ///
    /// Confidence is the fit quality. `None` without a usable fit.
    pub fn to_result(&self) -> Option<ProbeResult> {
        let fit = self.fit?;
        Some(ProbeResult {
            tau_value: fit.tau,
            confidence: stats::unit_clamp(fit.r_squared),
            duration_minutes: self.duration_minutes,
            fit_quality: fit.r_squared,
            aborted: self.aborted,
            timestamp: self.ended_at,
        })
    }
}

/// Samples of one running probe
#[derive(Debug, Clone)]
pub struct ProbeSession {
    started_at: Timestamp,
    initial_temp: f32,
    environment_temp: f32,
    planned_minutes: f32,
    samples: BoundedVec<(f32, f32), PROBE_SESSION_SAMPLES>,
    /// Minimum minutes between stored samples
    spacing_minutes: f32,
}

impl ProbeSession {
    pub fn new(started_at: Timestamp, initial_temp: f32, environment_temp: f32, planned_minutes: f32) -> Self {
        Self {
            started_at,
            initial_temp,
            environment_temp,
            planned_minutes,
            samples: BoundedVec::new(),
            spacing_minutes: 0.0,
        }
    }

    pub fn started_at(&self) -> Timestamp {
        self.started_at
    }

    pub fn environment_temp(&self) -> f32 {
        self.environment_temp
    }

    pub fn elapsed_minutes(&self, now: Timestamp) -> f32 {
        time::minutes_between(self.started_at, now)
    }

    pub fn is_complete(&self, now: Timestamp) -> bool {
        self.elapsed_minutes(now) >= self.planned_minutes
    }

    pub fn sample_count(&self) -> usize {
        self.samples.len()
    }

    /// Minutes since start of the newest stored sample
    pub fn last_sample_minutes(&self) -> Option<f32> {
        self.samples.last().map(|(t, _)| *t)
    }

    /// Record a room reading; `false` when the reading is rejected
    ///
    /// Accepted readings closer than the current spacing to the previous
    /// stored sample are skipped.
    pub fn record(&mut self, now: Timestamp, room_temp: f32) -> bool {
        if !room_temp.is_finite() || now <= self.started_at {
            return false;
        }

        let t = self.elapsed_minutes(now);
        if let Some(last) = self.last_sample_minutes() {
            if t - last < self.spacing_minutes {
                return true;
            }
        }

        if self.samples.is_full() {
            self.thin();
            if let Some(last) = self.last_sample_minutes() {
                if t - last < self.spacing_minutes {
                    return true;
                }
            }
        }

        // Room was made above when full
        let _ = self.samples.push((t, room_temp));
        true
    }

    /// Drop every other sample, keeping the newest, and widen the spacing
    fn thin(&mut self) {
        let mut index = 0usize;
        self.samples.retain(|_| {
            index += 1;
            index % 2 == 0
        });

        let span = match (self.samples.first(), self.samples.last()) {
            (Some((first, _)), Some((last, _))) => last - first,
            _ => 0.0,
        };
        let gaps = self.samples.len().saturating_sub(1).max(1) as f32;
        let average_gap = span / gaps;
        self.spacing_minutes = if average_gap > self.spacing_minutes * 2.0 {
            average_gap
        } else {
            self.spacing_minutes * 2.0
        };
        log_debug!(
            "probe buffer thinned to {} samples, spacing {} min",
            self.samples.len(),
            self.spacing_minutes
        );
    }

    /// Fit tau over the recorded samples
    pub fn fit(&self) -> Option<ProbeFit> {
        let gap = self.initial_temp - self.environment_temp;
        if libm::fabsf(gap) < MIN_PASSIVE_GAP_C {
            return None;
        }

        let mut points: BoundedVec<(f32, f32), PROBE_SESSION_SAMPLES> = BoundedVec::new();
        for &(t, temp) in self.samples.iter() {
            let ratio = (temp - self.environment_temp) / gap;
            if ratio > 0.0 && t > 0.0 {
                // Capacity matches the sample buffer
                let _ = points.push((t, libm::logf(ratio)));
            }
        }

        if points.len() < PROBE_MIN_SAMPLES {
            return None;
        }

        let sum_ty: f32 = points.iter().map(|(t, y)| t * y).sum();
        let sum_tt: f32 = points.iter().map(|(t, _)| t * t).sum();
        if sum_tt <= 0.0 {
            return None;
        }

        let slope = sum_ty / sum_tt;
        if !(slope < 0.0) {
            return None;
        }

        let n = points.len() as f32;
        let mean_y = points.iter().map(|(_, y)| *y).sum::<f32>() / n;
        let ss_res: f32 = points.iter().map(|(t, y)| (y - slope * t) * (y - slope * t)).sum();
        let ss_tot: f32 = points.iter().map(|(_, y)| (y - mean_y) * (y - mean_y)).sum();
        let r_squared = if ss_tot > 0.0 {
            stats::unit_clamp(1.0 - ss_res / ss_tot)
        } else {
            0.0
        };

        Some(ProbeFit {
            tau: -1.0 / slope,
            r_squared,
            samples: points.len(),
        })
    }

    /// Close the session
    pub fn finish(&self, now: Timestamp, aborted: bool) -> ProbeOutcome {
        ProbeOutcome {
            started_at: self.started_at,
            ended_at: now,
            duration_minutes: self.elapsed_minutes(now),
            planned_minutes: self.planned_minutes,
            aborted,
            fit: self.fit(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::time::MS_PER_MINUTE;

    fn drifting_session(tau: f32, minutes: u64) -> ProbeSession {
        let mut session = ProbeSession::new(0, 22.0, 32.0, 120.0);
        for m in (10..=minutes).step_by(10) {
            let temp = 32.0 - 10.0 * libm::expf(-(m as f32) / tau);
            assert!(session.record(m * MS_PER_MINUTE, temp));
        }
        session
    }

    #[test]
    fn recovers_tau_from_clean_drift() {
        let fit = drifting_session(100.0, 120).fit().unwrap();
        assert!((fit.tau - 100.0).abs() < 0.5);
        assert!(fit.r_squared > 0.99);
        assert_eq!(fit.samples, 12);
    }

    #[test]
    fn too_few_samples() {
        assert!(drifting_session(100.0, 30).fit().is_none());
    }

    #[test]
    fn no_gap_no_fit() {
        let mut session = ProbeSession::new(0, 31.9, 32.0, 120.0);
        for m in 1..10u64 {
            session.record(m * 10 * MS_PER_MINUTE, 31.95);
        }
        assert!(session.fit().is_none());
    }

    #[test]
    fn flat_room_gives_no_fit() {
        let mut session = ProbeSession::new(0, 22.0, 32.0, 120.0);
        for m in 1..10u64 {
            session.record(m * 10 * MS_PER_MINUTE, 22.0);
        }
        assert!(session.fit().is_none());
    }

    #[test]
    fn outcome_fraction_and_result() {
        let session = drifting_session(100.0, 60);
        let outcome = session.finish(60 * MS_PER_MINUTE, true);
        assert!((outcome.completed_fraction() - 0.5).abs() < 1e-6);

        let result = outcome.to_result().unwrap();
        assert!(result.aborted);
        assert_eq!(result.timestamp, 60 * MS_PER_MINUTE);
        assert!((result.tau_value - 100.0).abs() < 0.5);
    }

    #[test]
    fn minute_ticks_cover_whole_session() {
        let mut session = ProbeSession::new(0, 22.0, 32.0, 120.0);
        let mut accepted = 0;
        for m in 1..=120u64 {
            let temp = 32.0 - 10.0 * libm::expf(-(m as f32) / 100.0);
            if session.record(m * MS_PER_MINUTE, temp) {
                accepted += 1;
            }
        }

        assert_eq!(accepted, 120);
        assert!(session.sample_count() <= PROBE_SESSION_SAMPLES);
        assert!(session.last_sample_minutes().unwrap() >= 120.0);

        let outcome = session.finish(120 * MS_PER_MINUTE, false);
        let fit = outcome.fit.unwrap();
        assert_eq!(fit.samples, session.sample_count());
        assert!((fit.tau - 100.0).abs() < 0.5);
        assert_eq!(outcome.duration_minutes, 120.0);
    }

    #[test]
    fn overrun_keeps_thinning() {
        let mut session = ProbeSession::new(0, 22.0, 32.0, 60.0);
        for s in 1..=2_000u64 {
            let minutes = s as f32 / 4.0;
            let temp = 32.0 - 10.0 * libm::expf(-minutes / 100.0);
            assert!(session.record(s * 15_000, temp));
        }

        assert!(session.sample_count() <= PROBE_SESSION_SAMPLES);
        assert!(session.sample_count() >= PROBE_SESSION_SAMPLES / 4);
        assert!(session.last_sample_minutes().unwrap() >= 480.0);
    }

    #[test]
    fn rejects_bad_samples() {
        let mut session = ProbeSession::new(1000, 22.0, 32.0, 120.0);
        assert!(!session.record(500, 22.5));
        assert!(!session.record(2000, f32::NAN));
        assert_eq!(session.sample_count(), 0);
    }
}
