//! Data Structures
//!
//! Plain (non-reactive) containers that the reactive primitives are built on.
//!
//! - `ShrinkingMap`: a map with constant-time removal that hands memory back
//!   to the allocator after enough deletions.
//! - `ElementSet`: a set with constant-time removal and set algebra helpers.
//! - `SetMutations`: a described delta (added and deleted elements) that can
//!   be applied atomically to an `ElementSet`.
//!
//! None of these types are synchronized. Callers wrap them in their own locks.

mod element_set;
mod shrinking_map;

pub use element_set::{ElementSet, SetMutations};
pub use shrinking_map::ShrinkingMap;
