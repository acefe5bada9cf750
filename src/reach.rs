//! Reachability engine.
//!
//! Computes the strong-reachable set: the transitive closure of the root
//! objects under ordinary reference-following, tagging every synchronization
//! resource whose heap object the walk touches. The walk is an explicit
//! worklist over opaque [`ObjectId`] handles so traversal depth never
//! touches the call stack and the host collector's walk primitives are
//! reused as-is.
//!
//! All bookkeeping lives in engine-private scratch. The host's own mark
//! bits are never read or written; what the host collector frees is decided
//! entirely by its own mark phase.
//!
//! The marker is incremental: seeding more roots after a drain resumes the
//! same closure, so a classification pass costs one graph walk no matter
//! how many fixpoint rounds promote additional stacks into the root set.

use crate::classify::PassDeadline;
use crate::error::{PassError, PassStage};
use crate::hooks::CollectorHooks;
use crate::snapshot::Snapshot;
use crate::types::{ObjectId, ResourceId, TaskId};
use std::collections::{HashSet, VecDeque};

/// How many worklist pops between deadline checks.
const DEADLINE_CHECK_INTERVAL: usize = 1024;

/// Incremental worklist marker over the host's object graph.
pub(crate) struct Marker<'a, C: CollectorHooks + ?Sized> {
    collector: &'a C,
    visited: HashSet<ObjectId>,
    reached: HashSet<ResourceId>,
    worklist: VecDeque<ObjectId>,
    pops: usize,
}

impl<'a, C: CollectorHooks + ?Sized> Marker<'a, C> {
    pub(crate) fn new(collector: &'a C) -> Self {
        Self {
            collector,
            visited: HashSet::new(),
            reached: HashSet::new(),
            worklist: VecDeque::new(),
            pops: 0,
        }
    }

    fn push(&mut self, object: ObjectId) {
        if self.visited.insert(object) {
            if let Some(resource) = self.collector.resource_of(object) {
                self.reached.insert(resource);
            }
            self.worklist.push_back(object);
        }
    }

    /// Seeds every global/static root.
    pub(crate) fn seed_globals(&mut self) {
        let mut roots = Vec::new();
        self.collector.walk_roots(&mut |object| roots.push(object));
        for object in roots {
            self.push(object);
        }
    }

    /// Seeds the references held by `task`'s execution context.
    pub(crate) fn seed_task_stack(&mut self, task: TaskId) {
        let mut roots = Vec::new();
        self.collector
            .walk_stack_roots(task, &mut |object| roots.push(object));
        for object in roots {
            self.push(object);
        }
    }

    /// Pre-marks every resource with an armed timer as reached. The timer is
    /// a wake source independent of any task, so such resources must never
    /// be seen as unreachable.
    pub(crate) fn seed_timer_resources(&mut self, snapshot: &Snapshot) {
        for resource in snapshot.resources() {
            if resource.timer_pending {
                self.reached.insert(resource.id);
            }
        }
    }

    /// Runs the closure to exhaustion of the current worklist.
    ///
    /// # Errors
    ///
    /// Returns `BudgetExceeded` if the deadline passes mid-walk; the caller
    /// discards the whole pass.
    pub(crate) fn drain(&mut self, deadline: Option<&PassDeadline>) -> Result<(), PassError> {
        while let Some(object) = self.worklist.pop_front() {
            self.pops += 1;
            if self.pops % DEADLINE_CHECK_INTERVAL == 0 {
                if let Some(deadline) = deadline {
                    if deadline.exceeded() {
                        return Err(PassError::BudgetExceeded {
                            budget: deadline.budget,
                            stage: PassStage::Mark,
                        });
                    }
                }
            }

            let collector = self.collector;
            let visited = &mut self.visited;
            let reached = &mut self.reached;
            let worklist = &mut self.worklist;
            collector.walk_references(object, &mut |child| {
                if visited.insert(child) {
                    if let Some(resource) = collector.resource_of(child) {
                        reached.insert(resource);
                    }
                    worklist.push_back(child);
                }
            });
        }
        Ok(())
    }

    /// Returns true if the resource's reachability flag was set this pass.
    pub(crate) fn resource_reached(&self, resource: ResourceId) -> bool {
        self.reached.contains(&resource)
    }

    /// Number of distinct objects visited so far.
    pub(crate) fn objects_visited(&self) -> usize {
        self.visited.len()
    }

    /// Number of distinct resources tagged reachable so far.
    pub(crate) fn resources_reached(&self) -> usize {
        self.reached.len()
    }
}
