//! The detector itself: pass sequencing over the host's pause.
//!
//! [`LeakDetector::request_pass`] rides whatever quiescent point the host
//! already imposes: quiesce, capture, classify, record, resume. Passes are
//! totally ordered (the detector is `&mut self` for the duration) and every
//! failure is absorbed into a skipped result: detection is best-effort and
//! must never block forward progress of the system it observes.

use crate::classify::{classify, Classification, PassDeadline};
use crate::config::DetectorConfig;
use crate::error::{PassError, PassStage, SkipReason};
use crate::hooks::{CollectorHooks, SchedulerHooks};
use crate::metrics::DetectorMetrics;
use crate::profile::Profile;
use crate::recorder::SampleRecorder;
use crate::snapshot::Snapshot;
use crate::types::TaskId;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// The outcome of one requested pass.
#[derive(Debug, Clone)]
pub struct PassResult {
    /// Tasks proven permanently blocked this pass (including ones already
    /// reported by earlier passes), ascending by id.
    pub leaked: Vec<TaskId>,
    /// Wall-clock time the pass took, including the pause.
    pub elapsed: Duration,
    /// True if the pass produced no classification.
    pub skipped: bool,
    /// Why the pass was skipped, when it was.
    pub skip_reason: Option<SkipReason>,
    /// Fixpoint rounds run (0 for skipped passes).
    pub rounds: u32,
    /// Tasks newly recorded into the profile this pass.
    pub new_samples: usize,
}

impl PassResult {
    fn completed(classification: Classification, elapsed: Duration, new_samples: usize) -> Self {
        Self {
            leaked: classification.leaked,
            elapsed,
            skipped: false,
            skip_reason: None,
            rounds: classification.rounds,
            new_samples,
        }
    }

    fn skipped(reason: SkipReason, elapsed: Duration) -> Self {
        Self {
            leaked: Vec::new(),
            elapsed,
            skipped: true,
            skip_reason: Some(reason),
            rounds: 0,
            new_samples: 0,
        }
    }
}

/// Detects leaked tasks and aggregates them into a [`Profile`].
///
/// Owns the recorder (single profile writer) and the dedup state that keeps
/// a task reported once per lifetime. Repeatedly invokable without
/// accumulating state beyond the profile and that dedup set.
#[derive(Debug)]
pub struct LeakDetector {
    config: DetectorConfig,
    profile: Arc<Profile>,
    metrics: Arc<DetectorMetrics>,
    recorder: SampleRecorder,
}

impl LeakDetector {
    /// Creates a detector with an empty profile.
    #[must_use]
    pub fn new(config: DetectorConfig) -> Self {
        let profile = Arc::new(Profile::new());
        Self {
            config,
            recorder: SampleRecorder::new(Arc::clone(&profile)),
            profile,
            metrics: Arc::new(DetectorMetrics::new()),
        }
    }

    /// Current configuration.
    #[must_use]
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Flips the activation switch.
    pub fn set_enabled(&mut self, enabled: bool) {
        self.config.enabled = enabled;
    }

    /// A reader handle to the profile; safe to query from any thread while
    /// passes run.
    #[must_use]
    pub fn profile(&self) -> Arc<Profile> {
        Arc::clone(&self.profile)
    }

    /// A handle to the detector's counters.
    #[must_use]
    pub fn metrics(&self) -> Arc<DetectorMetrics> {
        Arc::clone(&self.metrics)
    }

    /// Runs one detection pass against the host.
    ///
    /// Never panics the host and never returns an error: failures surface as
    /// `skipped` with a reason, and a skipped pass publishes nothing.
    pub fn request_pass<H>(&mut self, host: &mut H) -> PassResult
    where
        H: SchedulerHooks + CollectorHooks + ?Sized,
    {
        if !self.config.enabled {
            self.metrics.passes_skipped.increment();
            return PassResult::skipped(SkipReason::Disabled, Duration::ZERO);
        }

        let start = Instant::now();
        if !host.quiesce(self.config.quiesce_budget) {
            // The host never reached the pause; there is nothing to resume.
            self.metrics.passes_skipped.increment();
            tracing::debug!(budget = ?self.config.quiesce_budget, "quiescence not reached, pass skipped");
            return PassResult::skipped(SkipReason::QuiesceTimeout, start.elapsed());
        }

        let outcome = self.run_quiesced(host, start);
        host.resume();
        let elapsed = start.elapsed();

        match outcome {
            Ok((classification, new_samples)) => {
                self.metrics.passes_completed.increment();
                self.metrics.tasks_reported.add(new_samples as u64);
                tracing::debug!(
                    leaked = classification.leaked.len(),
                    rounds = classification.rounds,
                    objects = classification.objects_visited,
                    resources = classification.resources_reached,
                    new_samples,
                    ?elapsed,
                    "detection pass completed"
                );
                PassResult::completed(classification, elapsed, new_samples)
            }
            Err(error) => {
                self.metrics.passes_skipped.increment();
                tracing::warn!(%error, ?elapsed, "detection pass skipped");
                PassResult::skipped(SkipReason::from_error(&error), elapsed)
            }
        }
    }

    fn run_quiesced<H>(
        &mut self,
        host: &H,
        start: Instant,
    ) -> Result<(Classification, usize), PassError>
    where
        H: SchedulerHooks + CollectorHooks + ?Sized,
    {
        let deadline = PassDeadline {
            at: start + self.config.pass_budget,
            budget: self.config.pass_budget,
        };

        let snapshot = Snapshot::capture(host)?;
        if deadline.exceeded() {
            return Err(PassError::BudgetExceeded {
                budget: deadline.budget,
                stage: PassStage::Capture,
            });
        }

        let classification = classify(host, &snapshot, Some(deadline))?;
        let new_samples = self
            .recorder
            .record_pass(&snapshot, &classification.leaked, &self.metrics);
        Ok((classification, new_samples))
    }
}
