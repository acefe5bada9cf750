//! Identifier types for the entities a detection pass observes.
//!
//! Tasks, synchronization resources, and heap objects are all owned by the
//! host; the detector refers to them through type-safe handles wrapping
//! generation-counted arena indices. A handle minted before a slot was
//! recycled never matches the new occupant.

use crate::util::ArenaIndex;
use core::fmt;

/// A unique identifier for a schedulable task.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TaskId(pub(crate) ArenaIndex);

impl TaskId {
    /// Creates a task id from an arena index (internal use).
    #[must_use]
    pub(crate) const fn from_arena(index: ArenaIndex) -> Self {
        Self(index)
    }

    /// Creates a task id from raw slot and generation values.
    ///
    /// Host adapters use this to mint handles out of their own task tables.
    #[must_use]
    pub const fn from_parts(slot: u32, generation: u32) -> Self {
        Self(ArenaIndex::new(slot, generation))
    }

    /// Returns the underlying arena index (internal use).
    #[must_use]
    pub(crate) const fn arena_index(self) -> ArenaIndex {
        self.0
    }

    /// Creates a task id for tests.
    #[doc(hidden)]
    #[must_use]
    pub const fn new_for_test(slot: u32, generation: u32) -> Self {
        Self(ArenaIndex::new(slot, generation))
    }
}

impl fmt::Debug for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TaskId({}:{})", self.0.slot(), self.0.generation())
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0.slot())
    }
}

/// A unique identifier for a synchronization resource.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(pub(crate) ArenaIndex);

impl ResourceId {
    /// Creates a resource id from an arena index (internal use).
    #[must_use]
    pub(crate) const fn from_arena(index: ArenaIndex) -> Self {
        Self(index)
    }

    /// Creates a resource id from raw slot and generation values.
    #[must_use]
    pub const fn from_parts(slot: u32, generation: u32) -> Self {
        Self(ArenaIndex::new(slot, generation))
    }

    /// Returns the underlying arena index (internal use).
    #[must_use]
    pub(crate) const fn arena_index(self) -> ArenaIndex {
        self.0
    }

    /// Creates a resource id for tests.
    #[doc(hidden)]
    #[must_use]
    pub const fn new_for_test(slot: u32, generation: u32) -> Self {
        Self(ArenaIndex::new(slot, generation))
    }
}

impl fmt::Debug for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ResourceId({}:{})", self.0.slot(), self.0.generation())
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "R{}", self.0.slot())
    }
}

/// An opaque handle to a heap object in the host's object table.
///
/// The detector never dereferences these; they only key the engine-private
/// visited set while riding the host collector's graph walk.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ObjectId(pub(crate) ArenaIndex);

impl ObjectId {
    /// Creates an object handle from an arena index (internal use).
    #[must_use]
    pub(crate) const fn from_arena(index: ArenaIndex) -> Self {
        Self(index)
    }

    /// Creates an object handle from raw slot and generation values.
    #[must_use]
    pub const fn from_parts(slot: u32, generation: u32) -> Self {
        Self(ArenaIndex::new(slot, generation))
    }

    /// Returns the underlying arena index (internal use).
    #[must_use]
    pub(crate) const fn arena_index(self) -> ArenaIndex {
        self.0
    }

    /// Creates an object handle for tests.
    #[doc(hidden)]
    #[must_use]
    pub const fn new_for_test(slot: u32, generation: u32) -> Self {
        Self(ArenaIndex::new(slot, generation))
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ObjectId({}:{})", self.0.slot(), self.0.generation())
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "O{}", self.0.slot())
    }
}
