//! Thermal states, events and the transition table
//!
//! The table is the only place transitions are defined. Anything not listed
//! is rejected with `InvalidTransition` and leaves the state unchanged.
//!
//! | From        | Event                           | To          |
//! |-------------|---------------------------------|-------------|
//! | Priming     | PrimingElapsed                  | Drifting    |
//! | Drifting    | ConditioningStarted             | Correcting  |
//! | Drifting    | ProbeApproved                   | Probing     |
//! | Correcting  | ConditioningStopped             | Drifting    |
//! | Correcting  | ModeChanged                     | Recovery    |
//! | Correcting  | ProbeApproved                   | Probing     |
//! | Recovery    | RecoveryElapsed { conditioning } | Correcting / Drifting |
//! | Probing     | ProbeCompleted, ProbeAborted    | Calibrating |
//! | Calibrating | CalibrationDone { conditioning } | Correcting / Drifting |

use crate::errors::{LearningError, LearningResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum ThermalState {
    /// Warm-up with default tau; decisions are shadow-only
    #[default]
    Priming,
    /// Device off; passive drift refines tau_warming
    Drifting,
    /// Device conditioning; correction rate refines tau_cooling
    Correcting,
    /// Settling after a mode change; no tau updates
    Recovery,
    /// Controlled pulse measuring tau directly
    Probing,
    /// Folding a probe result into the model
    Calibrating,
}

impl ThermalState {
    pub const ALL: [ThermalState; 6] = [
        Self::Priming,
        Self::Drifting,
        Self::Correcting,
        Self::Recovery,
        Self::Probing,
        Self::Calibrating,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Priming => "priming",
            Self::Drifting => "drifting",
            Self::Correcting => "correcting",
            Self::Recovery => "recovery",
            Self::Probing => "probing",
            Self::Calibrating => "calibrating",
        }
    }

    /// States that do not survive a restart
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Recovery | Self::Probing | Self::Calibrating)
    }

    /// Whether passive observations may refine tau
    pub fn allows_passive_learning(&self) -> bool {
        matches!(self, Self::Drifting | Self::Correcting)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThermalEvent {
    PrimingElapsed,
    ConditioningStarted,
    ConditioningStopped,
    ModeChanged,
    RecoveryElapsed { conditioning: bool },
    ProbeApproved,
    ProbeCompleted,
    ProbeAborted,
    CalibrationDone { conditioning: bool },
}

impl ThermalEvent {
    /// Every event, with both activity flags for the data-carrying ones
    pub const ALL: [ThermalEvent; 11] = [
        Self::PrimingElapsed,
        Self::ConditioningStarted,
        Self::ConditioningStopped,
        Self::ModeChanged,
        Self::RecoveryElapsed { conditioning: false },
        Self::RecoveryElapsed { conditioning: true },
        Self::ProbeApproved,
        Self::ProbeCompleted,
        Self::ProbeAborted,
        Self::CalibrationDone { conditioning: false },
        Self::CalibrationDone { conditioning: true },
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::PrimingElapsed => "priming_elapsed",
            Self::ConditioningStarted => "conditioning_started",
            Self::ConditioningStopped => "conditioning_stopped",
            Self::ModeChanged => "mode_changed",
            Self::RecoveryElapsed { .. } => "recovery_elapsed",
            Self::ProbeApproved => "probe_approved",
            Self::ProbeCompleted => "probe_completed",
            Self::ProbeAborted => "probe_aborted",
            Self::CalibrationDone { .. } => "calibration_done",
        }
    }
}

fn activity(conditioning: bool) -> ThermalState {
    if conditioning {
        ThermalState::Correcting
    } else {
        ThermalState::Drifting
    }
}

/// Table lookup: the next state, or `None` when the pair is not allowed
pub fn next_state(state: ThermalState, event: ThermalEvent) -> Option<ThermalState> {
    use ThermalEvent as E;
    use ThermalState as S;

    match (state, event) {
        (S::Priming, E::PrimingElapsed) => Some(S::Drifting),
        (S::Drifting, E::ConditioningStarted) => Some(S::Correcting),
        (S::Drifting | S::Correcting, E::ProbeApproved) => Some(S::Probing),
        (S::Correcting, E::ConditioningStopped) => Some(S::Drifting),
        (S::Correcting, E::ModeChanged) => Some(S::Recovery),
        (S::Recovery, E::RecoveryElapsed { conditioning }) => Some(activity(conditioning)),
        (S::Probing, E::ProbeCompleted | E::ProbeAborted) => Some(S::Calibrating),
        (S::Calibrating, E::CalibrationDone { conditioning }) => Some(activity(conditioning)),
        _ => None,
    }
}

/// Checked transition
pub fn transition(state: ThermalState, event: ThermalEvent) -> LearningResult<ThermalState> {
    next_state(state, event).ok_or(LearningError::InvalidTransition {
        from: state.as_str(),
        event: event.as_str(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn probing_only_from_drifting_or_correcting() {
        for state in ThermalState::ALL {
            let allowed = matches!(state, ThermalState::Drifting | ThermalState::Correcting);
            assert_eq!(next_state(state, ThermalEvent::ProbeApproved).is_some(), allowed, "{state:?}");
        }
    }

    #[test]
    fn activity_selects_target() {
        assert_eq!(
            next_state(ThermalState::Recovery, ThermalEvent::RecoveryElapsed { conditioning: true }),
            Some(ThermalState::Correcting)
        );
        assert_eq!(
            next_state(ThermalState::Calibrating, ThermalEvent::CalibrationDone { conditioning: false }),
            Some(ThermalState::Drifting)
        );
    }

    #[test]
    fn rejected_transition_names_state_and_event() {
        let err = transition(ThermalState::Priming, ThermalEvent::ProbeApproved).unwrap_err();
        assert_eq!(
            err,
            LearningError::InvalidTransition { from: "priming", event: "probe_approved" }
        );
    }

    #[test]
    fn transient_states() {
        assert!(ThermalState::Probing.is_transient());
        assert!(!ThermalState::Drifting.is_transient());
        assert!(!ThermalState::Priming.allows_passive_learning());
    }
}
