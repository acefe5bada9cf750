//! Task scheduling state and resource kinds, as observed in a snapshot.

use crate::types::{CallStack, Frame, ResourceId};
use core::fmt;

/// The kind of synchronization resource a task can block on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceKind {
    /// Channel endpoint (send or receive side).
    Channel,
    /// Mutual-exclusion lock.
    Mutex,
    /// Condition variable.
    Condvar,
    /// Wait-group / barrier counter.
    WaitGroup,
    /// Timer.
    Timer,
}

impl ResourceKind {
    /// Returns the lowercase name used in logs and blocking-site frames.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Channel => "channel",
            Self::Mutex => "mutex",
            Self::Condvar => "condvar",
            Self::WaitGroup => "waitgroup",
            Self::Timer => "timer",
        }
    }
}

impl fmt::Display for ResourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a blocked task is waiting on, captured at the moment it blocked.
///
/// The wait set has more than one entry only for multiplexed waits (a task
/// parked on several candidate resources, woken by whichever fires first).
/// Both the stack and the site are immutable until the task unblocks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BlockedState {
    /// Candidate resources; any one of them being signalled wakes the task.
    pub wait_set: Vec<ResourceId>,
    /// Call stack captured when the task blocked, leaf-first.
    pub stack: CallStack,
    /// The blocking operation itself (primitive name + source location),
    /// appended as the leaf frame of the recorded sample signature.
    pub site: Frame,
}

/// The scheduling state of a task, one variant at a time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskState {
    /// Actively executing on some worker.
    Running,
    /// Ready to execute, waiting for a worker.
    Runnable,
    /// Parked on one or more synchronization resources.
    Blocked(BlockedState),
}

impl TaskState {
    /// Returns true if the task is parked on a resource.
    #[must_use]
    pub const fn is_blocked(&self) -> bool {
        matches!(self, Self::Blocked(_))
    }

    /// Returns true if the task's execution context is a reachability root
    /// without further proof (it can run, so anything it references can be
    /// operated on again).
    #[must_use]
    pub const fn is_schedulable(&self) -> bool {
        matches!(self, Self::Running | Self::Runnable)
    }

    /// Returns the blocking details, if parked.
    #[must_use]
    pub const fn blocked(&self) -> Option<&BlockedState> {
        match self {
            Self::Blocked(state) => Some(state),
            Self::Running | Self::Runnable => None,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Running => f.write_str("running"),
            Self::Runnable => f.write_str("runnable"),
            Self::Blocked(state) => write!(f, "blocked({} candidates)", state.wait_set.len()),
        }
    }
}
