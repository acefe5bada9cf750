//! Sample recorder.
//!
//! Turns each newly leaked task into a profile sample: the stack captured
//! when the task blocked, with the blocking primitive appended as the leaf
//! frame. Purely observational; no task state is touched.
//!
//! A leaked task stays blocked forever, so it would reappear in every later
//! pass; the recorder keeps the set of already-reported task ids and
//! records each task once per lifetime. Generation-counted ids keep that
//! set correct even if the host recycles a task slot.

use crate::error::PassError;
use crate::metrics::DetectorMetrics;
use crate::profile::Profile;
use crate::snapshot::Snapshot;
use crate::types::{Frame, TaskId};
use std::collections::HashSet;
use std::sync::Arc;

#[derive(Debug)]
pub(crate) struct SampleRecorder {
    profile: Arc<Profile>,
    reported: HashSet<TaskId>,
}

impl SampleRecorder {
    pub(crate) fn new(profile: Arc<Profile>) -> Self {
        Self {
            profile,
            reported: HashSet::new(),
        }
    }

    /// Merges one sample per not-yet-reported leaked task. Returns how many
    /// tasks were newly recorded.
    ///
    /// Contended merges are retried once, then dropped and counted as lost;
    /// a dropped task is not marked reported, so the next pass retries it.
    pub(crate) fn record_pass(
        &mut self,
        snapshot: &Snapshot,
        leaked: &[TaskId],
        metrics: &DetectorMetrics,
    ) -> usize {
        let mut recorded = 0;
        for &task in leaked {
            if self.reported.contains(&task) {
                continue;
            }
            let Some(blocked) = snapshot.task(task).and_then(|view| view.state.blocked()) else {
                // Classifier output always comes from blocked snapshot
                // entries; a miss here would be a bookkeeping bug upstream.
                tracing::warn!(%task, "leaked task missing from snapshot, sample skipped");
                continue;
            };

            let mut signature: Vec<Frame> = Vec::with_capacity(blocked.stack.len() + 1);
            signature.push(blocked.site.clone());
            signature.extend(blocked.stack.frames().iter().cloned());

            match self.merge_with_retry(&signature) {
                Ok(()) => {
                    self.reported.insert(task);
                    recorded += 1;
                    tracing::debug!(%task, site = %blocked.site, "leaked task recorded");
                }
                Err(PassError::RecorderContention) => {
                    metrics.samples_lost.increment();
                    tracing::warn!(%task, "profile contended twice, sample lost");
                }
                Err(error) => {
                    tracing::warn!(%task, %error, "sample merge failed");
                }
            }
        }
        recorded
    }

    fn merge_with_retry(&self, signature: &[Frame]) -> Result<(), PassError> {
        match self.profile.try_merge(signature) {
            Err(PassError::RecorderContention) => self.profile.try_merge(signature),
            outcome => outcome,
        }
    }

    /// Tasks reported so far, for introspection in tests.
    #[cfg(test)]
    pub(crate) fn reported_len(&self) -> usize {
        self.reported.len()
    }
}
