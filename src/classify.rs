//! Leak classifier.
//!
//! Decides which blocked tasks are leaked: permanently parked, with no
//! candidate resource that any still-capable-of-running entity could ever
//! signal.
//!
//! # Fixpoint
//!
//! The classifier starts from the conservative root set (globals plus the
//! stacks of Running/Runnable tasks) with every blocked task's stack
//! *withheld*. Each round promotes the blocked tasks that were proven
//! potentially wakeable (at least one candidate resource tagged reachable,
//! or guarded by an armed timer) and folds their stacks into the marking,
//! which can make further resources reachable and promote further tasks.
//! When a round promotes nobody the remaining withheld tasks are leaked.
//!
//! Withholding first is what makes a waiter's own reference to its
//! primitive harmless: a sender's stack slot pointing at its channel cannot
//! keep the sender alive, because that stack is only scanned once some
//! *other* live path reaches the channel.
//!
//! Promotion is monotone and bounded by the blocked-task count, so the loop
//! terminates in at most (longest wake-dependency chain + 1) rounds. A task
//! stays classified leaked only when every resource that could wake it is
//! unreachable from everything not itself proven leaked; by induction, no
//! sequence of operations by any runnable entity can ever signal it. The
//! cost of conservatism: anything reachable from a global root counts as
//! live, so waits on globally held resources are never reported even when
//! no code will touch them again.

use crate::error::{PassError, PassStage};
use crate::hooks::CollectorHooks;
use crate::reach::Marker;
use crate::snapshot::Snapshot;
use crate::types::{ResourceId, TaskId};
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// Soft wall-clock bound for one pass.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PassDeadline {
    /// Absolute cut-off.
    pub at: Instant,
    /// The budget the cut-off was derived from, for error reporting.
    pub budget: Duration,
}

impl PassDeadline {
    pub(crate) fn exceeded(&self) -> bool {
        Instant::now() >= self.at
    }
}

/// Outcome of one classification fixpoint.
#[derive(Debug, Clone)]
pub struct Classification {
    /// Tasks proven permanently blocked, ascending by id.
    pub leaked: Vec<TaskId>,
    /// Fixpoint rounds run, including the final round that promoted nobody.
    pub rounds: u32,
    /// Distinct heap objects visited by the marking.
    pub objects_visited: usize,
    /// Distinct resources tagged reachable.
    pub resources_reached: usize,
}

/// Runs the classification fixpoint over a validated snapshot.
///
/// # Errors
///
/// `BudgetExceeded` when the deadline passes mid-fixpoint; all scratch state
/// is discarded by the caller and nothing is published.
pub(crate) fn classify<C: CollectorHooks + ?Sized>(
    collector: &C,
    snapshot: &Snapshot,
    deadline: Option<PassDeadline>,
) -> Result<Classification, PassError> {
    let mut marker = Marker::new(collector);

    // Unconditional roots: globals, schedulable stacks, armed timers.
    marker.seed_globals();
    for task in snapshot.schedulable_tasks() {
        marker.seed_task_stack(task.id);
    }
    marker.seed_timer_resources(snapshot);
    marker.drain(deadline.as_ref())?;

    // Blocked tasks start withheld: their stacks join the roots only once a
    // candidate resource is proven reachable.
    let mut withheld: HashMap<TaskId, &[ResourceId]> = snapshot
        .blocked_tasks()
        .filter_map(|task| {
            task.state
                .blocked()
                .map(|blocked| (task.id, blocked.wait_set.as_slice()))
        })
        .collect();

    let mut rounds = 0u32;
    loop {
        rounds += 1;
        if let Some(deadline) = deadline {
            if deadline.exceeded() {
                return Err(PassError::BudgetExceeded {
                    budget: deadline.budget,
                    stage: PassStage::Classify,
                });
            }
        }

        // Evaluate the whole round against the marking as it stood at round
        // entry, then extend the marking once; keeps the round count
        // independent of promotion order.
        let promoted: Vec<TaskId> = withheld
            .iter()
            .filter(|(_, wait_set)| {
                wait_set
                    .iter()
                    .any(|&resource| marker.resource_reached(resource))
            })
            .map(|(&task, _)| task)
            .collect();

        if promoted.is_empty() {
            break;
        }

        tracing::trace!(round = rounds, promoted = promoted.len(), "promoting wakeable tasks");
        for task in promoted {
            withheld.remove(&task);
            marker.seed_task_stack(task);
        }
        marker.drain(deadline.as_ref())?;
    }

    let mut leaked: Vec<TaskId> = withheld.into_keys().collect();
    leaked.sort_unstable();

    tracing::debug!(
        leaked = leaked.len(),
        rounds,
        objects = marker.objects_visited(),
        "classification fixpoint reached"
    );

    Ok(Classification {
        leaked,
        rounds,
        objects_visited: marker.objects_visited(),
        resources_reached: marker.resources_reached(),
    })
}
