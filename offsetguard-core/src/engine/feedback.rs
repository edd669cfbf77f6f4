//! Feedback bookkeeping
//!
//! An applied offset is judged only after the device has had time to
//! respond. [`FeedbackQueue`] holds the pending judgements in FIFO order;
//! [`FeedbackReport`] records what each learner did with one of them.

use heapless::Deque;

use crate::{
    constants::buffers::FEEDBACK_QUEUE_CAPACITY,
    errors::{LearningError, LearningResult},
    time::Timestamp,
    types::HvacMode,
};

/// Readings taken when feedback is collected
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FeedbackContext {
    pub timestamp: Timestamp,
    pub room_temp: Option<f32>,
    pub device_internal_temp: Option<f32>,
    pub outdoor_temp: Option<f32>,
    pub power_reading: Option<f32>,
    pub hvac_mode: HvacMode,
}

/// What one learner did with a feedback event
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum LearnerOutcome {
    Accepted,
    /// Nothing to learn from this event
    #[default]
    Skipped,
    Rejected(LearningError),
}

impl LearnerOutcome {
    pub fn from_result(result: LearningResult<()>) -> Self {
        match result {
            Ok(()) => Self::Accepted,
            Err(e) => Self::Rejected(e),
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, Self::Accepted)
    }

    pub fn error(&self) -> Option<LearningError> {
        match self {
            Self::Rejected(e) => Some(*e),
            _ => None,
        }
    }
}

/// Per-learner result of one `record_feedback` call
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FeedbackReport {
    pub offset_learner: LearnerOutcome,
    pub hysteresis: LearnerOutcome,
    pub seasonal: LearnerOutcome,
    /// Room reading rejected by the outlier detector
    pub room_outlier: bool,
    /// Power reading flagged by the outlier detector
    pub power_outlier: bool,
}

impl FeedbackReport {
    fn outcomes(&self) -> [(&'static str, LearnerOutcome); 3] {
        [
            ("offset_learner", self.offset_learner),
            ("hysteresis", self.hysteresis),
            ("seasonal", self.seasonal),
        ]
    }

    /// Learners that took the event
    pub fn accepted_count(&self) -> usize {
        self.outcomes().iter().filter(|(_, o)| o.is_accepted()).count()
    }

    /// Learners that failed, by name
    pub fn errors(&self) -> impl Iterator<Item = (&'static str, LearningError)> {
        self.outcomes()
            .into_iter()
            .filter_map(|(name, outcome)| outcome.error().map(|e| (name, e)))
    }
}

/// Offset waiting for its outcome
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PendingFeedback {
    pub issued_at: Timestamp,
    pub due_at: Timestamp,
    /// Offset that was applied
    pub predicted_offset: f32,
    pub hvac_mode: HvacMode,
}

/// FIFO of pending feedback, oldest evicted when full
#[derive(Debug, Clone, Default)]
pub struct FeedbackQueue {
    pending: Deque<PendingFeedback, FEEDBACK_QUEUE_CAPACITY>,
}

impl FeedbackQueue {
    pub fn new() -> Self {
        Self { pending: Deque::new() }
    }

    /// Queue an entry; returns the evicted oldest one when full
    pub fn push(&mut self, entry: PendingFeedback) -> Option<PendingFeedback> {
        let evicted = if self.pending.is_full() {
            self.pending.pop_front()
        } else {
            None
        };
        // Room was made above
        let _ = self.pending.push_back(entry);
        evicted
    }

    /// Oldest entry, once it is due
    pub fn pop_due(&mut self, now: Timestamp) -> Option<PendingFeedback> {
        match self.pending.front() {
            Some(entry) if entry.due_at <= now => self.pending.pop_front(),
            _ => None,
        }
    }

    pub fn next_due_at(&self) -> Option<Timestamp> {
        self.pending.front().map(|e| e.due_at)
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(issued_at: Timestamp, due_at: Timestamp) -> PendingFeedback {
        PendingFeedback {
            issued_at,
            due_at,
            predicted_offset: -2.0,
            hvac_mode: HvacMode::Cool,
        }
    }

    #[test]
    fn pops_only_when_due() {
        let mut queue = FeedbackQueue::new();
        queue.push(entry(0, 45_000));

        assert_eq!(queue.pop_due(10_000), None);
        assert_eq!(queue.next_due_at(), Some(45_000));
        assert_eq!(queue.pop_due(45_000).map(|e| e.issued_at), Some(0));
        assert!(queue.is_empty());
    }

    #[test]
    fn fifo_order() {
        let mut queue = FeedbackQueue::new();
        queue.push(entry(0, 100));
        queue.push(entry(1, 50));

        // Front is not due yet, so the later-issued but earlier-due entry waits
        assert_eq!(queue.pop_due(60), None);
        assert_eq!(queue.pop_due(100).map(|e| e.issued_at), Some(0));
        assert_eq!(queue.pop_due(100).map(|e| e.issued_at), Some(1));
    }

    #[test]
    fn evicts_oldest_when_full() {
        let mut queue = FeedbackQueue::new();
        for i in 0..FEEDBACK_QUEUE_CAPACITY as u64 {
            assert!(queue.push(entry(i, i)).is_none());
        }

        let evicted = queue.push(entry(99, 99));
        assert_eq!(evicted.map(|e| e.issued_at), Some(0));
        assert_eq!(queue.len(), FEEDBACK_QUEUE_CAPACITY);
    }

    #[test]
    fn report_counts_and_errors() {
        let report = FeedbackReport {
            offset_learner: LearnerOutcome::Accepted,
            hysteresis: LearnerOutcome::Accepted,
            seasonal: LearnerOutcome::Rejected(LearningError::OutOfRange {
                value: -0.2,
                min: 0.0,
                max: f32::MAX,
            }),
            ..FeedbackReport::default()
        };

        assert_eq!(report.accepted_count(), 2);
        let errors: Vec<_> = report.errors().collect();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].0, "seasonal");
    }
}
