//! Online Learners
//!
//! - [`LightweightOffsetLearner`]: predicts the setpoint offset from time of
//!   day, outdoor temperature and hysteresis phase, keeping only aggregates
//! - [`DelayLearner`]: learns how long a device takes to settle after a
//!   setpoint change, which sets when feedback is sampled
//!
//! Both are streaming: an update folds one observation into fixed-size state
//! and nothing is recomputed from history.

mod delay;
mod offset;

pub use delay::{DelayConfig, DelayLearner, DelayOutcome, DelaySnapshot};
pub use offset::{
    LearningContext, LightweightOffsetLearner, OffsetLearnerConfig, OffsetLearnerSnapshot,
    SmoothedBucket,
};
