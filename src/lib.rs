//! Taskleak: sound detection of leaked lightweight tasks.
//!
//! # Overview
//!
//! A task that blocks on a synchronization resource nobody can ever signal
//! is stuck forever, and invisible to ordinary profiling because it never
//! runs again. Taskleak rides a host runtime's existing quiescent pause and
//! its collector's graph walk to find such tasks with a guarantee of zero
//! false positives: a task is reported only when every resource that could
//! wake it is unreachable from everything still capable of running.
//!
//! # How a pass works
//!
//! 1. The host is quiesced and a consistent snapshot of all tasks and
//!    resource waiter sets is captured.
//! 2. Reachability is marked from global roots and the stacks of
//!    Running/Runnable tasks; blocked tasks' stacks start withheld.
//! 3. Blocked tasks with a reachable or timer-guarded candidate resource
//!    are promoted into the root set, and marking continues to a fixpoint.
//! 4. Whatever stays withheld is leaked; each leaked task's blocking stack
//!    is merged into a process-wide profile, once per task lifetime.
//!
//! The detector never resumes, kills, or otherwise mutates a leaked task,
//! and never alters what the host collector frees. Failures of any kind
//! skip the pass; detection is best-effort by design.
//!
//! Conservatism has a documented cost: a resource reachable through a
//! global/static root always counts as live, so tasks waiting on globally
//! held resources are never reported even if nothing will touch those
//! resources again.
//!
//! # Module Structure
//!
//! - [`types`]: identifiers, call stacks, task state
//! - [`snapshot`]: the quiesced view of tasks and resources
//! - [`hooks`]: the scheduler/collector traits a host implements
//! - [`detector`]: pass sequencing and results
//! - [`profile`]: the process-wide leak profile (samples + locations)
//! - [`config`]: activation switch, budgets, environment overrides
//! - [`error`]: pass error taxonomy (all locally recovered)
//! - [`metrics`]: pass/skip/lost-sample counters
//! - [`lab`]: deterministic model host for tests
//! - [`util`]: slot arena and deterministic RNG

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]

mod classify;
pub mod config;
pub mod detector;
pub mod error;
pub mod hooks;
pub mod lab;
pub mod metrics;
pub mod profile;
mod reach;
mod recorder;
pub mod snapshot;
pub mod test_utils;
pub mod types;
pub mod util;

pub use config::{ConfigError, DetectorConfig};
pub use detector::{LeakDetector, PassResult};
pub use error::{PassError, PassStage, SkipReason, SnapshotError};
pub use hooks::{CollectorHooks, SchedulerHooks};
pub use lab::ModelHost;
pub use metrics::{Counter, DetectorMetrics};
pub use profile::{LocationRecord, Profile, ProfileSnapshot, SampleRecord};
pub use snapshot::{ResourceView, Snapshot, TaskView};
pub use types::{
    BlockedState, CallStack, Frame, ObjectId, ResourceId, ResourceKind, TaskId, TaskState,
};
