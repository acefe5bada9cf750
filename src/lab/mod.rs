//! Deterministic model host for exercising the detector.
//!
//! [`ModelHost`] is a scripted scheduler-plus-heap: tests build tasks,
//! resources, and reference edges explicitly, then run real detection
//! passes against it. It implements both hook traits, can be told to fail
//! quiescence, and exposes corruption hooks for snapshot-validation tests.
//! Everything is deterministic; no threads, no wall-clock dependence beyond
//! the pass budget itself.

pub mod host;

pub use host::ModelHost;
