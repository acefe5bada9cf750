//! Error types for detection passes.
//!
//! Nothing in this crate is fatal to the host: every error is recovered
//! locally by skipping the pass (or dropping one sample) and the caller only
//! observes a [`SkipReason`]. The worst case is "no leak detected this
//! cycle", never corruption of the host's own memory management.

use crate::types::{ResourceId, TaskId};
use core::fmt;
use std::time::Duration;
use thiserror::Error;

/// Why a captured snapshot cannot be trusted.
///
/// Any of these invalidates the whole pass: publishing results derived from
/// an inconsistent view could violate the no-false-positive guarantee.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SnapshotError {
    /// The scheduler could not verify quiescence within the budget.
    #[error("quiescence not reached within {budget:?}")]
    QuiesceTimeout {
        /// The budget that was exhausted.
        budget: Duration,
    },
    /// A blocked task has an empty candidate-resource set.
    #[error("blocked task {task} has no candidate resources")]
    EmptyWaitSet {
        /// The malformed task.
        task: TaskId,
    },
    /// A blocked task waits on a resource the snapshot does not contain.
    #[error("task {task} waits on unknown resource {resource}")]
    UnknownResource {
        /// The waiting task.
        task: TaskId,
        /// The missing resource.
        resource: ResourceId,
    },
    /// A blocked task is not listed in its candidate resource's waiter set.
    #[error("resource {resource} does not list blocked task {task} as waiter")]
    WaiterMissing {
        /// The waiting task.
        task: TaskId,
        /// The resource with the incomplete waiter set.
        resource: ResourceId,
    },
    /// A resource lists a waiter that is not blocked on it.
    #[error("resource {resource} lists {task} as waiter but {task} is not blocked on it")]
    PhantomWaiter {
        /// The listed task.
        task: TaskId,
        /// The resource with the stale waiter entry.
        resource: ResourceId,
    },
    /// The same task id appeared twice in the task enumeration.
    #[error("duplicate task {task} in snapshot")]
    DuplicateTask {
        /// The repeated id.
        task: TaskId,
    },
    /// The same resource id appeared twice in the resource enumeration.
    #[error("duplicate resource {resource} in snapshot")]
    DuplicateResource {
        /// The repeated id.
        resource: ResourceId,
    },
}

/// The stage a pass was in when it failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassStage {
    /// Enumerating tasks and resources.
    Capture,
    /// Walking the object graph.
    Mark,
    /// Running the classification fixpoint.
    Classify,
    /// Merging samples into the profile.
    Record,
}

impl fmt::Display for PassStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Capture => "capture",
            Self::Mark => "mark",
            Self::Classify => "classify",
            Self::Record => "record",
        })
    }
}

/// A detection pass failure. All variants are locally recovered.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PassError {
    /// The snapshot was unusable; nothing was published.
    #[error("snapshot inconsistent: {0}")]
    SnapshotInconsistent(#[from] SnapshotError),
    /// The soft time budget ran out mid-pass; partial classification state
    /// was discarded rather than published.
    #[error("pass budget {budget:?} exceeded during {stage}")]
    BudgetExceeded {
        /// The configured budget.
        budget: Duration,
        /// Where the pass was when the budget ran out.
        stage: PassStage,
    },
    /// The profile write lock could not be acquired; the sample was dropped
    /// after one retry and counted as lost.
    #[error("profile merge contention, sample dropped")]
    RecorderContention,
}

/// Why a pass produced no result, surfaced on [`PassResult`](crate::detector::PassResult).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Detection is not enabled.
    Disabled,
    /// The scheduler never reached quiescence within budget.
    QuiesceTimeout,
    /// The captured snapshot failed cross-consistency validation.
    SnapshotInconsistent,
    /// The soft pass budget ran out.
    BudgetExceeded,
}

impl SkipReason {
    /// Maps a pass failure to the reason reported to callers.
    #[must_use]
    pub(crate) fn from_error(error: &PassError) -> Self {
        match error {
            PassError::SnapshotInconsistent(SnapshotError::QuiesceTimeout { .. }) => {
                Self::QuiesceTimeout
            }
            PassError::SnapshotInconsistent(_) | PassError::RecorderContention => {
                Self::SnapshotInconsistent
            }
            PassError::BudgetExceeded { .. } => Self::BudgetExceeded,
        }
    }
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Disabled => "disabled",
            Self::QuiesceTimeout => "quiesce-timeout",
            Self::SnapshotInconsistent => "snapshot-inconsistent",
            Self::BudgetExceeded => "budget-exceeded",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skip_reason_distinguishes_quiesce_from_validation() {
        let quiesce = PassError::SnapshotInconsistent(SnapshotError::QuiesceTimeout {
            budget: Duration::from_millis(5),
        });
        assert_eq!(SkipReason::from_error(&quiesce), SkipReason::QuiesceTimeout);

        let validation = PassError::SnapshotInconsistent(SnapshotError::EmptyWaitSet {
            task: TaskId::new_for_test(0, 0),
        });
        assert_eq!(
            SkipReason::from_error(&validation),
            SkipReason::SnapshotInconsistent
        );
    }

    #[test]
    fn errors_render_with_context() {
        let error = PassError::BudgetExceeded {
            budget: Duration::from_millis(100),
            stage: PassStage::Classify,
        };
        let rendered = error.to_string();
        assert!(rendered.contains("100ms"));
        assert!(rendered.contains("classify"));
    }
}
