//! Concurrency state snapshot.
//!
//! A [`Snapshot`] is the immutable view of scheduler state a pass works
//! from: every task with its scheduling state, every resource with its
//! waiter set. It is only meaningful while the host is quiesced; capture
//! validates internal consistency in both directions (a task recorded as
//! blocked on a resource must appear in that resource's waiter set, and
//! every waiter entry must correspond to a blocked task) so that a torn
//! view can never reach the classifier.

use crate::error::SnapshotError;
use crate::hooks::SchedulerHooks;
use crate::types::{ResourceId, ResourceKind, TaskId, TaskState};
use std::collections::{HashMap, HashSet};

/// One task as observed at capture time.
#[derive(Debug, Clone)]
pub struct TaskView {
    /// Task identity.
    pub id: TaskId,
    /// Scheduling state, including blocking details when parked.
    pub state: TaskState,
}

/// One synchronization resource as observed at capture time.
#[derive(Debug, Clone)]
pub struct ResourceView {
    /// Resource identity.
    pub id: ResourceId,
    /// What kind of primitive this is.
    pub kind: ResourceKind,
    /// Tasks currently parked on this resource.
    pub waiters: Vec<TaskId>,
    /// True while an armed timer can fire on this resource. A pending timer
    /// is a wake source that needs no task, so the resource is always
    /// treated as reachable.
    pub timer_pending: bool,
}

/// An internally consistent view of all tasks and resources.
#[derive(Debug)]
pub struct Snapshot {
    tasks: Vec<TaskView>,
    resources: Vec<ResourceView>,
    resource_index: HashMap<ResourceId, usize>,
}

impl Snapshot {
    /// Captures and validates a snapshot from a quiesced scheduler.
    ///
    /// # Errors
    ///
    /// Returns the first cross-consistency violation found; the caller must
    /// skip the pass without publishing anything.
    pub fn capture<S: SchedulerHooks + ?Sized>(scheduler: &S) -> Result<Self, SnapshotError> {
        let snapshot = Self::from_views(scheduler.list_tasks(), scheduler.list_resources())?;
        tracing::trace!(
            tasks = snapshot.tasks.len(),
            resources = snapshot.resources.len(),
            blocked = snapshot.blocked_tasks().count(),
            "captured scheduler snapshot"
        );
        Ok(snapshot)
    }

    /// Builds a snapshot from pre-enumerated views, validating consistency.
    pub fn from_views(
        tasks: Vec<TaskView>,
        resources: Vec<ResourceView>,
    ) -> Result<Self, SnapshotError> {
        let mut resource_index = HashMap::with_capacity(resources.len());
        for (position, resource) in resources.iter().enumerate() {
            if resource_index.insert(resource.id, position).is_some() {
                return Err(SnapshotError::DuplicateResource {
                    resource: resource.id,
                });
            }
        }

        let snapshot = Self {
            tasks,
            resources,
            resource_index,
        };
        snapshot.validate()?;
        Ok(snapshot)
    }

    fn validate(&self) -> Result<(), SnapshotError> {
        let mut seen_tasks = HashSet::with_capacity(self.tasks.len());
        // (task, resource) pairs claimed by blocked tasks, checked against
        // the waiter sets below.
        let mut claimed: HashSet<(TaskId, ResourceId)> = HashSet::new();

        for task in &self.tasks {
            if !seen_tasks.insert(task.id) {
                return Err(SnapshotError::DuplicateTask { task: task.id });
            }
            if let Some(blocked) = task.state.blocked() {
                if blocked.wait_set.is_empty() {
                    return Err(SnapshotError::EmptyWaitSet { task: task.id });
                }
                for &resource in &blocked.wait_set {
                    let Some(&position) = self.resource_index.get(&resource) else {
                        return Err(SnapshotError::UnknownResource {
                            task: task.id,
                            resource,
                        });
                    };
                    if !self.resources[position].waiters.contains(&task.id) {
                        return Err(SnapshotError::WaiterMissing {
                            task: task.id,
                            resource,
                        });
                    }
                    claimed.insert((task.id, resource));
                }
            }
        }

        for resource in &self.resources {
            for &waiter in &resource.waiters {
                if !claimed.contains(&(waiter, resource.id)) {
                    return Err(SnapshotError::PhantomWaiter {
                        task: waiter,
                        resource: resource.id,
                    });
                }
            }
        }

        Ok(())
    }

    /// All tasks, in enumeration order.
    #[must_use]
    pub fn tasks(&self) -> &[TaskView] {
        &self.tasks
    }

    /// All resources, in enumeration order.
    #[must_use]
    pub fn resources(&self) -> &[ResourceView] {
        &self.resources
    }

    /// Looks up a resource by id.
    #[must_use]
    pub fn resource(&self, id: ResourceId) -> Option<&ResourceView> {
        self.resource_index
            .get(&id)
            .map(|&position| &self.resources[position])
    }

    /// Looks up a task by id.
    #[must_use]
    pub fn task(&self, id: TaskId) -> Option<&TaskView> {
        self.tasks.iter().find(|task| task.id == id)
    }

    /// Iterates over blocked tasks only.
    pub fn blocked_tasks(&self) -> impl Iterator<Item = &TaskView> {
        self.tasks.iter().filter(|task| task.state.is_blocked())
    }

    /// Iterates over tasks whose stacks are unconditional roots.
    pub fn schedulable_tasks(&self) -> impl Iterator<Item = &TaskView> {
        self.tasks.iter().filter(|task| task.state.is_schedulable())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{BlockedState, CallStack, Frame};

    fn task(slot: u32) -> TaskId {
        TaskId::new_for_test(slot, 0)
    }

    fn resource(slot: u32) -> ResourceId {
        ResourceId::new_for_test(slot, 0)
    }

    fn blocked_view(id: TaskId, wait_set: Vec<ResourceId>) -> TaskView {
        TaskView {
            id,
            state: TaskState::Blocked(BlockedState {
                wait_set,
                stack: CallStack::default(),
                site: Frame::new("chan.recv", "chan.rs", 7),
            }),
        }
    }

    fn resource_view(id: ResourceId, waiters: Vec<TaskId>) -> ResourceView {
        ResourceView {
            id,
            kind: ResourceKind::Channel,
            waiters,
            timer_pending: false,
        }
    }

    #[test]
    fn consistent_snapshot_validates() {
        let snapshot = Snapshot::from_views(
            vec![
                TaskView {
                    id: task(0),
                    state: TaskState::Running,
                },
                blocked_view(task(1), vec![resource(0)]),
            ],
            vec![resource_view(resource(0), vec![task(1)])],
        );
        let snapshot = snapshot.expect("snapshot should validate");
        assert_eq!(snapshot.blocked_tasks().count(), 1);
        assert_eq!(snapshot.schedulable_tasks().count(), 1);
    }

    #[test]
    fn missing_waiter_entry_rejected() {
        let result = Snapshot::from_views(
            vec![blocked_view(task(1), vec![resource(0)])],
            vec![resource_view(resource(0), vec![])],
        );
        assert_eq!(
            result.err(),
            Some(SnapshotError::WaiterMissing {
                task: task(1),
                resource: resource(0),
            })
        );
    }

    #[test]
    fn phantom_waiter_rejected() {
        let result = Snapshot::from_views(
            vec![TaskView {
                id: task(1),
                state: TaskState::Runnable,
            }],
            vec![resource_view(resource(0), vec![task(1)])],
        );
        assert_eq!(
            result.err(),
            Some(SnapshotError::PhantomWaiter {
                task: task(1),
                resource: resource(0),
            })
        );
    }

    #[test]
    fn empty_wait_set_rejected() {
        let result = Snapshot::from_views(vec![blocked_view(task(2), vec![])], vec![]);
        assert_eq!(result.err(), Some(SnapshotError::EmptyWaitSet { task: task(2) }));
    }

    #[test]
    fn unknown_resource_rejected() {
        let result = Snapshot::from_views(vec![blocked_view(task(0), vec![resource(9)])], vec![]);
        assert_eq!(
            result.err(),
            Some(SnapshotError::UnknownResource {
                task: task(0),
                resource: resource(9),
            })
        );
    }

    #[test]
    fn duplicate_ids_rejected() {
        let duplicate_tasks = Snapshot::from_views(
            vec![
                TaskView {
                    id: task(0),
                    state: TaskState::Running,
                },
                TaskView {
                    id: task(0),
                    state: TaskState::Runnable,
                },
            ],
            vec![],
        );
        assert_eq!(
            duplicate_tasks.err(),
            Some(SnapshotError::DuplicateTask { task: task(0) })
        );

        let duplicate_resources = Snapshot::from_views(
            vec![],
            vec![
                resource_view(resource(3), vec![]),
                resource_view(resource(3), vec![]),
            ],
        );
        assert_eq!(
            duplicate_resources.err(),
            Some(SnapshotError::DuplicateResource {
                resource: resource(3)
            })
        );
    }

    #[test]
    fn multiplexed_wait_validates_each_candidate() {
        let snapshot = Snapshot::from_views(
            vec![blocked_view(task(0), vec![resource(0), resource(1)])],
            vec![
                resource_view(resource(0), vec![task(0)]),
                resource_view(resource(1), vec![task(0)]),
            ],
        );
        assert!(snapshot.is_ok());
    }
}
