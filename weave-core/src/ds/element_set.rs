//! Element Sets and Set Mutations

use std::fmt::Debug;
use std::hash::Hash;

use indexmap::IndexSet;

/// A set of unique elements.
///
/// Iteration follows insertion order until the first removal. Removing an
/// element moves the last one into its slot.
#[derive(Clone, PartialEq, Eq)]
pub struct ElementSet<T>
where
    T: Hash + Eq,
{
    elements: IndexSet<T>,
}

impl<T> ElementSet<T>
where
    T: Hash + Eq + Clone,
{
    pub fn new() -> Self {
        Self {
            elements: IndexSet::new(),
        }
    }

    /// Add an element. Returns `true` if it was not present before.
    pub fn add(&mut self, element: T) -> bool {
        self.elements.insert(element)
    }

    /// Remove an element in constant time. Returns `true` if it was present.
    pub fn remove(&mut self, element: &T) -> bool {
        self.elements.swap_remove(element)
    }

    pub fn has(&self, element: &T) -> bool {
        self.elements.contains(element)
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.elements.iter()
    }

    /// Elements of both sets, `self` first.
    pub fn union(&self, other: &Self) -> Self {
        self.elements.union(&other.elements).cloned().collect()
    }

    /// Elements of `self` that are not in `other`.
    pub fn subtract(&self, other: &Self) -> Self {
        self.elements.difference(&other.elements).cloned().collect()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.elements.iter().cloned().collect()
    }

    /// Apply a mutation and return the part of it that actually changed the set.
    ///
    /// Deletions are processed before additions. An element that is deleted and
    /// re-added by the same mutation shows up in neither side of the result.
    pub fn apply(&mut self, mutations: &SetMutations<T>) -> SetMutations<T> {
        let mut applied = SetMutations::new();

        for element in mutations.deleted().iter() {
            if self.remove(element) {
                applied.deleted.add(element.clone());
            }
        }

        for element in mutations.added().iter() {
            if self.add(element.clone()) && !applied.deleted.remove(element) {
                applied.added.add(element.clone());
            }
        }

        applied
    }
}

impl<T> Default for ElementSet<T>
where
    T: Hash + Eq + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<T> for ElementSet<T>
where
    T: Hash + Eq + Clone,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self {
            elements: iter.into_iter().collect(),
        }
    }
}

impl<T> IntoIterator for ElementSet<T>
where
    T: Hash + Eq,
{
    type Item = T;
    type IntoIter = indexmap::set::IntoIter<T>;

    fn into_iter(self) -> Self::IntoIter {
        self.elements.into_iter()
    }
}

impl<T> Debug for ElementSet<T>
where
    T: Hash + Eq + Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_set().entries(self.elements.iter()).finish()
    }
}

/// A delta over a set: elements to add and elements to delete.
#[derive(Clone, PartialEq, Eq)]
pub struct SetMutations<T>
where
    T: Hash + Eq,
{
    added: ElementSet<T>,
    deleted: ElementSet<T>,
}

impl<T> SetMutations<T>
where
    T: Hash + Eq + Clone,
{
    pub fn new() -> Self {
        Self {
            added: ElementSet::new(),
            deleted: ElementSet::new(),
        }
    }

    /// A mutation that only adds elements.
    pub fn with_added<I: IntoIterator<Item = T>>(elements: I) -> Self {
        Self::new().add_elements(elements)
    }

    /// A mutation that only deletes elements.
    pub fn with_deleted<I: IntoIterator<Item = T>>(elements: I) -> Self {
        Self::new().delete_elements(elements)
    }

    /// Builder-style: also add `elements`.
    pub fn add_elements<I: IntoIterator<Item = T>>(mut self, elements: I) -> Self {
        for element in elements {
            self.deleted.remove(&element);
            self.added.add(element);
        }
        self
    }

    /// Builder-style: also delete `elements`.
    pub fn delete_elements<I: IntoIterator<Item = T>>(mut self, elements: I) -> Self {
        for element in elements {
            self.added.remove(&element);
            self.deleted.add(element);
        }
        self
    }

    pub fn added(&self) -> &ElementSet<T> {
        &self.added
    }

    pub fn deleted(&self) -> &ElementSet<T> {
        &self.deleted
    }

    pub fn into_parts(self) -> (ElementSet<T>, ElementSet<T>) {
        (self.added, self.deleted)
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.deleted.is_empty()
    }
}

impl<T> Default for SetMutations<T>
where
    T: Hash + Eq + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Debug for SetMutations<T>
where
    T: Hash + Eq + Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SetMutations")
            .field("added", &self.added)
            .field("deleted", &self.deleted)
            .finish()
    }
}
