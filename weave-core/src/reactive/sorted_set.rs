//! Sorted Sets
//!
//! A `SortedSet` is a [`Set`] whose elements are additionally kept in
//! descending order of a per-element weight. Every element exposes its
//! weight as a [`Variable`], and the set follows weight changes as they
//! happen.
//!
//! The order is maintained by local adjacent swaps: when a weight changes,
//! the element first moves left while it is heavier than its left neighbour
//! and, only if it did not move, right while its right neighbour is heavier.
//! Only one weight changes between two consistent states, so this single
//! insertion-sort step restores the order in `O(distance moved)`.
//!
//! Elements of equal weight are ordered by an optional tie breaker and
//! otherwise keep their relative order.
//!
//! A sorted set subscribes to its backing set and to the weight variable of
//! every member. [`SortedSet::unsubscribe`] releases all of them.

use std::cmp::Ordering;
use std::fmt::Debug;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;

use super::set::{Element, ReadableSet, Set};
use super::unique_id::UniqueId;
use super::unsubscribe::Unsubscribe;
use super::variable::{ReadOnlyVariable, Value, Variable};
use crate::ds::{ElementSet, SetMutations, ShrinkingMap};

type WeightFn<T, W> = dyn Fn(&T) -> Variable<W> + Send + Sync;
type TieBreakerFn<T> = dyn Fn(&T, &T) -> Ordering + Send + Sync;

/// An observable set ordered by element weight, heaviest first.
pub struct SortedSet<T: Element, W: Value + Ord> {
    set: Set<T>,
    inner: Arc<SortedInner<T, W>>,
}

struct SortedInner<T: Element, W: Value + Ord> {
    state: Mutex<SortedState<T, W>>,
    weight_of: Box<WeightFn<T, W>>,
    tie_breaker: Option<Box<TieBreakerFn<T>>>,
    heaviest: Variable<Option<T>>,
    lightest: Variable<Option<T>>,

    /// Subscription to the backing set, taken by `unsubscribe`.
    backing: Mutex<Option<Unsubscribe>>,
}

struct SortedState<T: Element, W> {
    entries: ShrinkingMap<T, SortedEntry<W>>,

    /// Elements in descending weight order.
    order: Vec<T>,

    entry_ids: UniqueId,

    /// Set once the sorted set is torn down; no new weight subscriptions.
    detached: bool,
}

struct SortedEntry<W> {
    /// Distinguishes this membership from earlier ones of the same element.
    id: UniqueId,
    weight: W,
    index: usize,
    unsubscribe: Option<Unsubscribe>,
}

impl<T: Element, W: Value + Ord> SortedSet<T, W> {
    /// Create an empty sorted set. `weight_of` returns the weight variable
    /// of an element.
    pub fn new<F>(weight_of: F) -> Self
    where
        F: Fn(&T) -> Variable<W> + Send + Sync + 'static,
    {
        Self::build(Box::new(weight_of), None)
    }

    /// Like [`SortedSet::new`], ordering elements of equal weight by
    /// `tie_breaker`. An element for which it returns
    /// [`Ordering::Greater`] is placed before the other.
    pub fn with_tie_breaker<F, B>(weight_of: F, tie_breaker: B) -> Self
    where
        F: Fn(&T) -> Variable<W> + Send + Sync + 'static,
        B: Fn(&T, &T) -> Ordering + Send + Sync + 'static,
    {
        Self::build(Box::new(weight_of), Some(Box::new(tie_breaker)))
    }

    fn build(weight_of: Box<WeightFn<T, W>>, tie_breaker: Option<Box<TieBreakerFn<T>>>) -> Self {
        let set = Set::new();
        let inner = Arc::new(SortedInner {
            state: Mutex::new(SortedState {
                entries: ShrinkingMap::new(),
                order: Vec::new(),
                entry_ids: UniqueId::ZERO,
                detached: false,
            }),
            weight_of,
            tie_breaker,
            heaviest: Variable::new(None),
            lightest: Variable::new(None),
            backing: Mutex::new(None),
        });

        let backing = {
            let inner = Arc::clone(&inner);
            set.on_update(move |mutations| inner.apply_mutations(mutations), false)
        };
        *inner.backing.lock() = Some(backing);

        Self { set, inner }
    }

    /// Add elements and return the ones that were not present before.
    pub fn add<I: IntoIterator<Item = T>>(&self, elements: I) -> ElementSet<T> {
        self.set.add(elements)
    }

    /// Delete elements and return the ones that were actually present.
    pub fn delete<I: IntoIterator<Item = T>>(&self, elements: I) -> ElementSet<T> {
        self.set.delete(elements)
    }

    pub fn apply(&self, mutations: SetMutations<T>) -> SetMutations<T> {
        self.set.apply(mutations)
    }

    pub fn has(&self, element: &T) -> bool {
        self.set.has(element)
    }

    pub fn size(&self) -> usize {
        self.set.size()
    }

    pub fn is_empty(&self) -> bool {
        self.set.is_empty()
    }

    /// The last weight seen for `element`, if it is a member.
    pub fn weight(&self, element: &T) -> Option<W> {
        self.inner.state.lock().entries.get(element).map(|entry| entry.weight.clone())
    }

    /// A copy of the elements, heaviest first.
    pub fn descending(&self) -> Vec<T> {
        self.inner.state.lock().order.clone()
    }

    /// A copy of the elements, lightest first.
    pub fn ascending(&self) -> Vec<T> {
        let mut elements = self.descending();
        elements.reverse();
        elements
    }

    /// The heaviest element, or `None` while the set is empty.
    pub fn heaviest_element(&self) -> ReadOnlyVariable<Option<T>> {
        self.inner.heaviest.read_only()
    }

    /// The lightest element, or `None` while the set is empty.
    pub fn lightest_element(&self) -> ReadOnlyVariable<Option<T>> {
        self.inner.lightest.read_only()
    }

    /// Subscribe to membership changes of the backing set.
    pub fn on_update<F>(&self, callback: F, trigger_initial: bool) -> Unsubscribe
    where
        F: Fn(&SetMutations<T>) + Send + Sync + 'static,
    {
        self.set.on_update(callback, trigger_initial)
    }

    /// Stop following the backing set and the weights of all members.
    ///
    /// Membership can still change afterwards, but the order, the weights and
    /// the extremes keep their last values. Later calls do nothing.
    pub fn unsubscribe(&self) {
        let backing = self.inner.backing.lock().take();
        if let Some(backing) = backing {
            backing.unsubscribe();
        }

        let weights: Vec<Unsubscribe> = {
            let mut state = self.inner.state.lock();
            state.detached = true;
            state.entries.values_mut().filter_map(|entry| entry.unsubscribe.take()).collect()
        };
        tracing::debug!(weights = weights.len(), "sorted set detached");

        for unsubscribe in weights {
            unsubscribe.unsubscribe();
        }
    }
}

impl<T: Element, W: Value + Ord> SortedInner<T, W> {
    fn apply_mutations(self: &Arc<Self>, mutations: &SetMutations<T>) {
        let mut detached = Vec::new();
        {
            let mut state = self.state.lock();
            if state.detached {
                return;
            }
            for element in mutations.deleted().iter() {
                if let Some(unsubscribe) = state.remove(element) {
                    detached.push(unsubscribe);
                }
            }
            for element in mutations.added().iter() {
                self.insert(&mut state, element);
            }
        }

        for unsubscribe in detached {
            unsubscribe.unsubscribe();
        }
        self.refresh_extremes();
    }

    /// Track the weight of a new member and place it in the order.
    fn insert(self: &Arc<Self>, state: &mut SortedState<T, W>, element: &T) {
        if state.detached || state.entries.contains_key(element) {
            return;
        }

        let entry_id = state.entry_ids.next();
        let weight_variable = (self.weight_of)(element);

        // The initial delivery happens while the state lock is held, so it
        // only hands the weight over instead of locking.
        let initial_weight: Arc<Mutex<Option<W>>> = Arc::new(Mutex::new(None));
        let unsubscribe = {
            let initialized = AtomicBool::new(false);
            let initial_weight = Arc::clone(&initial_weight);
            let inner: Weak<Self> = Arc::downgrade(self);
            let element = element.clone();

            weight_variable.on_update(
                move |_, weight| {
                    if !initialized.swap(true, AtomicOrdering::SeqCst) {
                        *initial_weight.lock() = Some(weight.clone());
                        return;
                    }
                    if let Some(inner) = inner.upgrade() {
                        inner.update_weight(&element, entry_id, weight.clone());
                    }
                },
                true,
            )
        };

        let weight = initial_weight.lock().take().unwrap_or_else(|| weight_variable.get());
        let index = state.order.len();
        state.order.push(element.clone());
        state.entries.insert(
            element.clone(),
            SortedEntry {
                id: entry_id,
                weight,
                index,
                unsubscribe: Some(unsubscribe),
            },
        );
        self.reposition(state, index);
    }

    fn update_weight(&self, element: &T, entry_id: UniqueId, weight: W) {
        {
            let mut state = self.state.lock();
            let Some(entry) = state.entries.get_mut(element) else {
                return;
            };
            if entry.id != entry_id {
                return;
            }
            entry.weight = weight;
            let index = entry.index;
            self.reposition(&mut state, index);
        }
        self.refresh_extremes();
    }

    fn reposition(&self, state: &mut SortedState<T, W>, start: usize) {
        let mut index = start;
        while index > 0 && self.is_heavier(state, index, index - 1) {
            state.swap(index, index - 1);
            index -= 1;
        }

        if index != start {
            return;
        }
        while index + 1 < state.order.len() && self.is_heavier(state, index + 1, index) {
            state.swap(index, index + 1);
            index += 1;
        }
    }

    /// Whether the element at position `a` belongs before the one at `b`.
    fn is_heavier(&self, state: &SortedState<T, W>, a: usize, b: usize) -> bool {
        let (element_a, element_b) = (&state.order[a], &state.order[b]);
        let (Some(entry_a), Some(entry_b)) = (state.entries.get(element_a), state.entries.get(element_b)) else {
            return false;
        };

        match entry_a.weight.cmp(&entry_b.weight) {
            Ordering::Greater => true,
            Ordering::Less => false,
            Ordering::Equal => self
                .tie_breaker
                .as_ref()
                .is_some_and(|tie_breaker| tie_breaker(element_a, element_b) == Ordering::Greater),
        }
    }

    /// Publish the current extremes. Runs under the update-order locks of the
    /// extreme variables so concurrent refreshes cannot publish stale values.
    fn refresh_extremes(&self) {
        self.heaviest.compute(|_| self.state.lock().order.first().cloned());
        self.lightest.compute(|_| self.state.lock().order.last().cloned());
    }
}

impl<T: Element, W> SortedState<T, W> {
    fn swap(&mut self, a: usize, b: usize) {
        self.order.swap(a, b);
        for index in [a, b] {
            if let Some(entry) = self.entries.get_mut(&self.order[index]) {
                entry.index = index;
            }
        }
    }

    /// Forget `element` and return its weight subscription.
    fn remove(&mut self, element: &T) -> Option<Unsubscribe> {
        let mut entry = self.entries.remove(element)?;
        self.order.remove(entry.index);

        for (index, shifted) in self.order.iter().enumerate().skip(entry.index) {
            if let Some(shifted) = self.entries.get_mut(shifted) {
                shifted.index = index;
            }
        }
        entry.unsubscribe.take()
    }
}

impl<T: Element, W: Value + Ord> ReadableSet<T> for SortedSet<T, W> {
    fn has(&self, element: &T) -> bool {
        self.set.has(element)
    }

    fn snapshot(&self) -> ElementSet<T> {
        self.set.snapshot()
    }

    fn size(&self) -> usize {
        self.set.size()
    }

    fn on_update<F>(&self, callback: F, trigger_initial: bool) -> Unsubscribe
    where
        F: Fn(&SetMutations<T>) + Send + Sync + 'static,
    {
        self.set.on_update(callback, trigger_initial)
    }
}

impl<T: Element, W: Value + Ord> Clone for SortedSet<T, W> {
    fn clone(&self) -> Self {
        Self {
            set: self.set.clone(),
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T, W> Debug for SortedSet<T, W>
where
    T: Element + Debug,
    W: Value + Ord + Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SortedSet")
            .field("descending", &self.descending())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::thread;

    fn weights(entries: &[(&'static str, u32)]) -> Arc<HashMap<&'static str, Variable<u32>>> {
        Arc::new(
            entries
                .iter()
                .map(|(name, weight)| (*name, Variable::new(*weight)))
                .collect(),
        )
    }

    fn sorted_by(weights: &Arc<HashMap<&'static str, Variable<u32>>>) -> SortedSet<&'static str, u32> {
        let weights = Arc::clone(weights);
        SortedSet::new(move |element| weights.get(element).cloned().unwrap_or_default())
    }

    #[test]
    fn follows_weight_changes() {
        let weights = weights(&[("A", 1), ("B", 2), ("C", 3)]);
        let sorted = sorted_by(&weights);

        sorted.add(["A", "B", "C"]);
        assert_eq!(sorted.descending(), vec!["C", "B", "A"]);
        assert_eq!(sorted.ascending(), vec!["A", "B", "C"]);

        weights["B"].set(5);
        assert_eq!(sorted.descending(), vec!["B", "C", "A"]);
        assert_eq!(sorted.heaviest_element().get(), Some("B"));

        weights["A"].set(4);
        assert_eq!(sorted.descending(), vec!["B", "A", "C"]);
        assert_eq!(sorted.lightest_element().get(), Some("C"));

        weights["B"].set(0);
        assert_eq!(sorted.descending(), vec!["A", "C", "B"]);
        assert_eq!(sorted.weight(&"B"), Some(0));
    }

    #[test]
    fn delete_shifts_order_and_updates_extremes() {
        let weights = weights(&[("A", 1), ("B", 2), ("C", 3)]);
        let sorted = sorted_by(&weights);
        sorted.add(["A", "B", "C"]);

        sorted.delete(["C"]);
        assert_eq!(sorted.descending(), vec!["B", "A"]);
        assert_eq!(sorted.heaviest_element().get(), Some("B"));

        // Deleted elements no longer follow their weight.
        weights["C"].set(10);
        assert_eq!(sorted.descending(), vec!["B", "A"]);
        assert_eq!(weights["C"].subscriber_count(), 0);

        weights["A"].set(7);
        assert_eq!(sorted.descending(), vec!["A", "B"]);

        sorted.delete(["A", "B"]);
        assert!(sorted.descending().is_empty());
        assert_eq!(sorted.heaviest_element().get(), None);
        assert_eq!(sorted.lightest_element().get(), None);
    }

    #[test]
    fn readding_an_element_uses_its_current_weight() {
        let weights = weights(&[("A", 1), ("B", 2)]);
        let sorted = sorted_by(&weights);
        sorted.add(["A", "B"]);

        sorted.delete(["A"]);
        weights["A"].set(9);
        sorted.add(["A"]);

        assert_eq!(sorted.descending(), vec!["A", "B"]);
        assert_eq!(weights["A"].subscriber_count(), 1);
    }

    #[test]
    fn ties_use_the_tie_breaker() {
        let weights = weights(&[("a", 1), ("b", 1), ("c", 1)]);
        let lookup = Arc::clone(&weights);
        let sorted = SortedSet::with_tie_breaker(
            move |element: &&'static str| lookup.get(element).cloned().unwrap_or_default(),
            |a: &&'static str, b: &&'static str| b.cmp(a),
        );

        sorted.add(["c", "a", "b"]);
        assert_eq!(sorted.descending(), vec!["a", "b", "c"]);

        weights["c"].set(2);
        assert_eq!(sorted.descending(), vec!["c", "a", "b"]);
    }

    #[test]
    fn ties_without_tie_breaker_keep_insertion_order() {
        let weights = weights(&[("x", 1), ("y", 1), ("z", 1)]);
        let sorted = sorted_by(&weights);

        sorted.add(["y", "x", "z"]);
        assert_eq!(sorted.descending(), vec!["y", "x", "z"]);
    }

    #[test]
    fn unsubscribe_releases_backing_set_and_weights() {
        let weights = weights(&[("A", 1), ("B", 2), ("C", 3)]);
        let sorted = sorted_by(&weights);
        sorted.add(["A", "B"]);
        assert_eq!(sorted.set.subscriber_count(), 1);
        assert_eq!(weights["A"].subscriber_count(), 1);

        sorted.unsubscribe();
        sorted.unsubscribe();
        assert_eq!(sorted.set.subscriber_count(), 0);
        assert_eq!(weights["A"].subscriber_count(), 0);
        assert_eq!(weights["B"].subscriber_count(), 0);

        weights["A"].set(5);
        assert_eq!(sorted.descending(), vec!["B", "A"]);

        sorted.add(["C"]);
        assert!(sorted.has(&"C"));
        assert_eq!(weights["C"].subscriber_count(), 0);
        assert_eq!(sorted.descending(), vec!["B", "A"]);
        assert_eq!(sorted.heaviest_element().get(), Some("B"));
    }

    #[test]
    fn extremes_notify_subscribers() {
        let weights = weights(&[("A", 1), ("B", 2)]);
        let sorted = sorted_by(&weights);

        let seen = Arc::new(Mutex::new(Vec::new()));
        let seen_clone = seen.clone();
        let _unsubscribe = sorted
            .heaviest_element()
            .on_update(move |_, heaviest| seen_clone.lock().push(*heaviest), false);

        sorted.add(["A"]);
        sorted.add(["B"]);
        weights["A"].set(3);

        assert_eq!(*seen.lock(), vec![Some("A"), Some("B"), Some("A")]);
    }

    #[test]
    fn concurrent_weight_changes_converge() {
        let names: Vec<&'static str> = vec!["a", "b", "c", "d", "e", "f", "g", "h"];
        let weights = weights(&names.iter().map(|name| (*name, 0)).collect::<Vec<_>>());
        let sorted = sorted_by(&weights);
        sorted.add(names.clone());

        let handles: Vec<_> = names
            .iter()
            .enumerate()
            .map(|(i, name)| {
                let weight = weights[name].clone();
                thread::spawn(move || {
                    for step in 0..50 {
                        weight.set((step * 7 + i as u32 * 13) % 100);
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        let descending = sorted.descending();
        let observed: Vec<u32> = descending.iter().map(|name| weights[name].get()).collect();
        let mut expected = observed.clone();
        expected.sort_unstable_by(|a, b| b.cmp(a));
        assert_eq!(observed, expected);
        assert_eq!(sorted.heaviest_element().get(), descending.first().copied());
    }
}
