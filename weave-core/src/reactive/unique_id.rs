//! Per-instance monotonic identifiers.

/// A monotonically increasing identifier scoped to one reactive instance.
///
/// Update identifiers start at zero (no update has happened yet) and are only
/// advanced while the owning instance's value lock is held, so they totally
/// order the transitions of that instance. Identifiers are never shared across
/// instances.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UniqueId(u64);

impl UniqueId {
    /// The identifier before any update happened.
    pub const ZERO: UniqueId = UniqueId(0);

    /// Advance the counter and return the new identifier.
    pub fn next(&mut self) -> UniqueId {
        self.0 += 1;
        *self
    }

    /// Get the raw value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}
