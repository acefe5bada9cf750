//! Internal utilities: the slot arena behind all handle types and a
//! deterministic RNG for randomized tests.

pub mod arena;
pub mod det_rng;

pub use arena::{Arena, ArenaIndex};
pub use det_rng::DetRng;
