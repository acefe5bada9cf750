//! The scripted host: an in-memory scheduler, heap, and resource table.

use crate::hooks::{CollectorHooks, SchedulerHooks};
use crate::snapshot::{ResourceView, TaskView};
use crate::types::{
    BlockedState, CallStack, Frame, ObjectId, ResourceId, ResourceKind, TaskId, TaskState,
};
use crate::util::Arena;
use std::time::Duration;

#[derive(Debug, Default)]
struct ObjectNode {
    edges: Vec<ObjectId>,
    resource: Option<ResourceId>,
}

#[derive(Debug)]
struct TaskRecord {
    state: TaskState,
    /// Heap objects referenced from this task's stack and registers.
    stack_refs: Vec<ObjectId>,
}

#[derive(Debug)]
struct ResourceRecord {
    kind: ResourceKind,
    object: ObjectId,
    waiters: Vec<TaskId>,
    timer_pending: bool,
}

/// A scripted scheduler/collector pair for tests.
///
/// Panics on stale or unknown handles: in a scripted scenario those are
/// always test bugs, and failing loudly beats silently wrong graphs.
#[derive(Debug, Default)]
pub struct ModelHost {
    objects: Arena<ObjectNode>,
    tasks: Arena<TaskRecord>,
    resources: Arena<ResourceRecord>,
    globals: Vec<ObjectId>,
    quiesce_fails: bool,
    paused: bool,
}

impl ModelHost {
    /// Creates an empty host.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    // ---- heap ----------------------------------------------------------

    /// Allocates a plain heap object with no outgoing edges.
    pub fn alloc_object(&mut self) -> ObjectId {
        ObjectId::from_arena(self.objects.insert(ObjectNode::default()))
    }

    /// Adds a reference edge `from -> to`.
    pub fn link(&mut self, from: ObjectId, to: ObjectId) {
        self.objects
            .get_mut(from.arena_index())
            .expect("link: unknown source object")
            .edges
            .push(to);
    }

    /// Registers `object` as a global/static root.
    pub fn add_global(&mut self, object: ObjectId) {
        assert!(
            self.objects.get(object.arena_index()).is_some(),
            "add_global: unknown object"
        );
        self.globals.push(object);
    }

    // ---- resources -----------------------------------------------------

    /// Creates a synchronization resource backed by a fresh heap object.
    pub fn new_resource(&mut self, kind: ResourceKind) -> ResourceId {
        let object = self.alloc_object();
        let id = ResourceId::from_arena(self.resources.insert(ResourceRecord {
            kind,
            object,
            waiters: Vec::new(),
            timer_pending: false,
        }));
        self.objects
            .get_mut(object.arena_index())
            .expect("freshly allocated object")
            .resource = Some(id);
        id
    }

    /// The heap object backing a resource.
    #[must_use]
    pub fn resource_object(&self, resource: ResourceId) -> ObjectId {
        self.resources
            .get(resource.arena_index())
            .expect("resource_object: unknown resource")
            .object
    }

    /// Arms or disarms the resource's timer.
    pub fn set_timer_pending(&mut self, resource: ResourceId, pending: bool) {
        self.resources
            .get_mut(resource.arena_index())
            .expect("set_timer_pending: unknown resource")
            .timer_pending = pending;
    }

    // ---- tasks ---------------------------------------------------------

    /// Spawns a task in the Running state.
    pub fn spawn_running(&mut self) -> TaskId {
        TaskId::from_arena(self.tasks.insert(TaskRecord {
            state: TaskState::Running,
            stack_refs: Vec::new(),
        }))
    }

    /// Spawns a task in the Runnable state.
    pub fn spawn_runnable(&mut self) -> TaskId {
        TaskId::from_arena(self.tasks.insert(TaskRecord {
            state: TaskState::Runnable,
            stack_refs: Vec::new(),
        }))
    }

    /// Records that `task`'s stack holds a reference to `object`.
    pub fn hold(&mut self, task: TaskId, object: ObjectId) {
        self.tasks
            .get_mut(task.arena_index())
            .expect("hold: unknown task")
            .stack_refs
            .push(object);
    }

    /// Parks `task` on the given candidate resources, capturing `stack` and
    /// the blocking `site`.
    pub fn block(&mut self, task: TaskId, resources: &[ResourceId], stack: CallStack, site: Frame) {
        assert!(!resources.is_empty(), "block: empty wait set");
        {
            let record = self
                .tasks
                .get_mut(task.arena_index())
                .expect("block: unknown task");
            assert!(
                record.state.is_schedulable(),
                "block: task {task} is already blocked"
            );
            record.state = TaskState::Blocked(BlockedState {
                wait_set: resources.to_vec(),
                stack,
                site,
            });
        }
        for &resource in resources {
            self.resources
                .get_mut(resource.arena_index())
                .expect("block: unknown resource")
                .waiters
                .push(task);
        }
    }

    /// Wakes a blocked task back to Runnable, clearing its waiter entries.
    pub fn wake(&mut self, task: TaskId) {
        let record = self
            .tasks
            .get_mut(task.arena_index())
            .expect("wake: unknown task");
        let TaskState::Blocked(blocked) = &record.state else {
            panic!("wake: task {task} is not blocked");
        };
        let wait_set = blocked.wait_set.clone();
        record.state = TaskState::Runnable;
        for resource in wait_set {
            self.resources
                .get_mut(resource.arena_index())
                .expect("wake: unknown resource in wait set")
                .waiters
                .retain(|&waiter| waiter != task);
        }
    }

    /// Removes a finished task. Blocked tasks cannot finish.
    pub fn complete(&mut self, task: TaskId) {
        let record = self
            .tasks
            .remove(task.arena_index())
            .expect("complete: unknown task");
        assert!(
            !record.state.is_blocked(),
            "complete: task {task} is blocked"
        );
    }

    // ---- scripting -----------------------------------------------------

    /// Makes the next `quiesce` calls fail (or succeed again).
    pub fn set_quiesce_result(&mut self, ok: bool) {
        self.quiesce_fails = !ok;
    }

    /// True while a successful `quiesce` has not been resumed.
    #[must_use]
    pub fn is_paused(&self) -> bool {
        self.paused
    }

    /// Corruption hook: adds a waiter entry without blocking the task.
    pub fn force_waiter(&mut self, resource: ResourceId, task: TaskId) {
        self.resources
            .get_mut(resource.arena_index())
            .expect("force_waiter: unknown resource")
            .waiters
            .push(task);
    }

    /// Corruption hook: drops every waiter entry from a resource.
    pub fn clear_waiters(&mut self, resource: ResourceId) {
        self.resources
            .get_mut(resource.arena_index())
            .expect("clear_waiters: unknown resource")
            .waiters
            .clear();
    }
}

impl SchedulerHooks for ModelHost {
    fn quiesce(&mut self, _budget: Duration) -> bool {
        if self.quiesce_fails {
            return false;
        }
        self.paused = true;
        true
    }

    fn resume(&mut self) {
        self.paused = false;
    }

    fn list_tasks(&self) -> Vec<TaskView> {
        self.tasks
            .iter()
            .map(|(index, record)| TaskView {
                id: TaskId::from_arena(index),
                state: record.state.clone(),
            })
            .collect()
    }

    fn list_resources(&self) -> Vec<ResourceView> {
        self.resources
            .iter()
            .map(|(index, record)| ResourceView {
                id: ResourceId::from_arena(index),
                kind: record.kind,
                waiters: record.waiters.clone(),
                timer_pending: record.timer_pending,
            })
            .collect()
    }
}

impl CollectorHooks for ModelHost {
    fn walk_roots(&self, visit: &mut dyn FnMut(ObjectId)) {
        for &object in &self.globals {
            visit(object);
        }
    }

    fn walk_references(&self, object: ObjectId, visit: &mut dyn FnMut(ObjectId)) {
        if let Some(node) = self.objects.get(object.arena_index()) {
            for &edge in &node.edges {
                visit(edge);
            }
        }
    }

    fn walk_stack_roots(&self, task: TaskId, visit: &mut dyn FnMut(ObjectId)) {
        if let Some(record) = self.tasks.get(task.arena_index()) {
            for &object in &record.stack_refs {
                visit(object);
            }
        }
    }

    fn resource_of(&self, object: ObjectId) -> Option<ResourceId> {
        self.objects
            .get(object.arena_index())
            .and_then(|node| node.resource)
    }
}
