//! The narrow seams between the detector and its host.
//!
//! The detector owns no tasks, no resources, and no heap. Everything it
//! observes arrives through these two traits, implemented by the host
//! runtime's adapter. Both are consumed read-only apart from the explicit
//! pause protocol; the detector never mutates task state, never alters the
//! collector's mark bits, and never frees anything.

use crate::snapshot::{ResourceView, TaskView};
use crate::types::{ObjectId, ResourceId, TaskId};
use std::time::Duration;

/// Scheduler-side operations: the pause protocol and entity enumeration.
///
/// # Pause protocol
///
/// `quiesce(budget)` must return `true` only once every task is parked at a
/// memory-consistent point and no task can transition state until `resume()`.
/// If it returns `false` the host never reached the pause and `resume()` must
/// NOT be called. After a successful `quiesce`, the detector calls `resume()`
/// exactly once, on every path. Reusing the host collector's existing
/// safepoint is strongly preferred over a second global pause.
pub trait SchedulerHooks {
    /// Brings all tasks to a verified quiescent point, or gives up after
    /// `budget`.
    fn quiesce(&mut self, budget: Duration) -> bool;

    /// Releases the pause established by a successful [`quiesce`](Self::quiesce).
    fn resume(&mut self);

    /// Enumerates every live task with its current scheduling state.
    ///
    /// Only called between a successful `quiesce` and the matching `resume`.
    fn list_tasks(&self) -> Vec<TaskView>;

    /// Enumerates every live synchronization resource with its waiter set.
    ///
    /// Only called between a successful `quiesce` and the matching `resume`.
    fn list_resources(&self) -> Vec<ResourceView>;
}

/// Collector-side graph-walk primitives the engine rides.
///
/// The detector performs its own traversal bookkeeping (its visited set is
/// private scratch); these hooks only expose edges. Implementations must not
/// let the detector's walk influence which objects the collector frees.
pub trait CollectorHooks {
    /// Visits every global/static root object.
    fn walk_roots(&self, visit: &mut dyn FnMut(ObjectId));

    /// Visits every object directly referenced by `object`, including any
    /// buffered payload a resource object carries.
    fn walk_references(&self, object: ObjectId, visit: &mut dyn FnMut(ObjectId));

    /// Visits every object referenced from `task`'s execution context
    /// (stack slots and saved registers).
    fn walk_stack_roots(&self, task: TaskId, visit: &mut dyn FnMut(ObjectId));

    /// Returns the resource identity of `object` if it is the heap header of
    /// a synchronization resource.
    fn resource_of(&self, object: ObjectId) -> Option<ResourceId>;
}
