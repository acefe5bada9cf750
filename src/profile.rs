//! The leak profile.
//!
//! Process-wide, append-only aggregation of leak samples: a samples table
//! keyed by call-stack signature and a locations table mapping numeric ids
//! to symbol/file/line records, the same shape as the host's other
//! execution-sampling profiles. The profile is the only long-lived mutable
//! state in the crate; a single mutex gives it one write discipline (the
//! sample recorder) while readers take stable snapshot copies at any time.

use crate::error::PassError;
use crate::types::Frame;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError, TryLockError};

/// One interned program location.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocationRecord {
    /// Numeric id referenced by sample signatures.
    pub id: u32,
    /// Symbol name.
    pub symbol: String,
    /// Source file.
    pub file: String,
    /// Source line.
    pub line: u32,
    /// Instruction offset within the mapped image.
    pub offset: u64,
}

/// One aggregated sample: a stack signature and its occurrence count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SampleRecord {
    /// Number of leaked tasks that blocked with this exact stack.
    pub count: u64,
    /// Location ids, leaf-first; the blocking primitive is the first entry.
    pub location_ids: Vec<u32>,
}

/// A stable, queryable copy of the profile.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSnapshot {
    /// Aggregated samples, ordered by signature for deterministic output.
    pub samples: Vec<SampleRecord>,
    /// Location table, ordered by id.
    pub locations: Vec<LocationRecord>,
}

impl ProfileSnapshot {
    /// Sum of all sample counts.
    #[must_use]
    pub fn total_count(&self) -> u64 {
        self.samples.iter().map(|sample| sample.count).sum()
    }

    /// Resolves a sample's signature to its location records, leaf-first.
    #[must_use]
    pub fn resolve<'a>(&'a self, sample: &SampleRecord) -> Vec<&'a LocationRecord> {
        sample
            .location_ids
            .iter()
            .filter_map(|&id| self.locations.iter().find(|location| location.id == id))
            .collect()
    }
}

#[derive(Debug, Default)]
struct ProfileState {
    location_ids: HashMap<Frame, u32>,
    locations: Vec<LocationRecord>,
    samples: HashMap<Vec<u32>, u64>,
}

impl ProfileState {
    fn intern(&mut self, frame: &Frame) -> u32 {
        if let Some(&id) = self.location_ids.get(frame) {
            return id;
        }
        let id = u32::try_from(self.locations.len()).expect("location table overflow");
        self.location_ids.insert(frame.clone(), id);
        self.locations.push(LocationRecord {
            id,
            symbol: frame.symbol.clone(),
            file: frame.file.clone(),
            line: frame.line,
            offset: frame.offset,
        });
        id
    }

    fn merge(&mut self, frames: &[Frame]) {
        let signature: Vec<u32> = frames.iter().map(|frame| self.intern(frame)).collect();
        *self.samples.entry(signature).or_insert(0) += 1;
    }
}

/// The process-wide leak profile.
#[derive(Debug, Default)]
pub struct Profile {
    state: Mutex<ProfileState>,
}

impl Profile {
    /// Creates an empty profile.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Merges one signature, failing fast if the write lock is contended.
    ///
    /// # Errors
    ///
    /// `RecorderContention` when the lock is held elsewhere; the caller
    /// retries once and then drops the sample.
    pub(crate) fn try_merge(&self, frames: &[Frame]) -> Result<(), PassError> {
        match self.state.try_lock() {
            Ok(mut state) => {
                state.merge(frames);
                Ok(())
            }
            Err(TryLockError::Poisoned(poisoned)) => {
                // Single-writer data; a panicked reader cannot have torn it.
                poisoned.into_inner().merge(frames);
                Ok(())
            }
            Err(TryLockError::WouldBlock) => Err(PassError::RecorderContention),
        }
    }

    /// Returns a stable copy of the current samples and locations.
    #[must_use]
    pub fn snapshot(&self) -> ProfileSnapshot {
        let state = self.lock();
        let mut samples: Vec<SampleRecord> = state
            .samples
            .iter()
            .map(|(signature, &count)| SampleRecord {
                count,
                location_ids: signature.clone(),
            })
            .collect();
        samples.sort_by(|a, b| a.location_ids.cmp(&b.location_ids));
        ProfileSnapshot {
            samples,
            locations: state.locations.clone(),
        }
    }

    /// Clears all samples and locations.
    pub fn reset(&self) {
        let mut state = self.lock();
        *state = ProfileState::default();
    }

    /// Number of distinct stack signatures recorded.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().samples.len()
    }

    /// Returns true if nothing has been recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Sum of all sample counts.
    #[must_use]
    pub fn total_count(&self) -> u64 {
        self.lock().samples.values().sum()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, ProfileState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Holds the write lock open so tests can provoke merge contention.
    #[cfg(test)]
    pub(crate) fn lock_for_test(&self) -> impl Drop + '_ {
        self.lock()
    }
}
