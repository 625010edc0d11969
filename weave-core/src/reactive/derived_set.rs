//! Derived Sets
//!
//! A `DerivedSet` is a [`Set`] whose membership is maintained from other
//! sets instead of being written directly.
//!
//! - `inherit_from` keeps the derived set equal to the union of its sources.
//!   Every element carries a reference count of the sources that currently
//!   contribute it, so two sources adding and removing the same element
//!   independently never remove it too early.
//!
//! - `subtracting` (used by [`Set::subtract_reactive`]) keeps the derived set
//!   equal to one source minus the union of others, using a signed counter
//!   per element.
//!
//! Counters and the resulting mutation are updated under one lock, so
//! concurrent source updates are applied to the derived set in the order in
//! which they were counted.

use std::fmt::Debug;
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;

use super::set::{Element, ReadableSet, Set};
use super::unsubscribe::Unsubscribe;
use crate::ds::{ElementSet, SetMutations, ShrinkingMap};

/// A set derived from other sets.
///
/// Dereferences to the underlying [`Set`].
pub struct DerivedSet<T: Element> {
    set: Set<T>,

    /// Number of inherited sources that contribute each element.
    contributions: Arc<Mutex<ShrinkingMap<T, usize>>>,

    /// Subscriptions created at construction time, if any.
    unsubscribe: Arc<Mutex<Option<Unsubscribe>>>,
}

impl<T: Element> DerivedSet<T> {
    /// Create an empty derived set with no sources.
    pub fn new() -> Self {
        Self {
            set: Set::new(),
            contributions: Arc::new(Mutex::new(ShrinkingMap::new())),
            unsubscribe: Arc::new(Mutex::new(None)),
        }
    }

    /// Keep this set equal to the union of `sources` (and of any sources
    /// inherited earlier).
    ///
    /// Tearing down the returned handle withdraws exactly the elements these
    /// sources had contributed.
    pub fn inherit_from<S>(&self, sources: &[S]) -> Unsubscribe
    where
        S: ReadableSet<T>,
    {
        let handles = sources.iter().map(|source| self.inherit_from_source(source));
        Unsubscribe::batch(handles.collect::<Vec<_>>())
    }

    fn inherit_from_source<S>(&self, source: &S) -> Unsubscribe
    where
        S: ReadableSet<T>,
    {
        // `None` once the source is detached, so late deliveries are dropped.
        let contributed: Arc<Mutex<Option<ElementSet<T>>>> =
            Arc::new(Mutex::new(Some(ElementSet::new())));

        let unsubscribe = {
            let this = self.clone();
            let contributed = Arc::clone(&contributed);
            source.on_update(
                move |mutations| {
                    let mut contributed = contributed.lock();
                    if let Some(contributed) = contributed.as_mut() {
                        this.apply_inherited(contributed, mutations);
                    }
                },
                false,
            )
        };

        let this = self.clone();
        Unsubscribe::new(move || {
            unsubscribe.unsubscribe();

            let mut contributed = contributed.lock();
            if let Some(mut elements) = contributed.take() {
                let withdrawn = SetMutations::with_deleted(elements.to_vec());
                this.apply_inherited(&mut elements, &withdrawn);
            }
        })
    }

    /// Count a source's mutation and apply the resulting membership change.
    fn apply_inherited(&self, contributed: &mut ElementSet<T>, mutations: &SetMutations<T>) {
        let mut contributions = self.contributions.lock();
        let mut effective = SetMutations::new();

        for element in mutations.deleted().iter() {
            if !contributed.remove(element) {
                continue;
            }
            match contributions.get_mut(element) {
                Some(count) if *count > 1 => *count -= 1,
                Some(_) => {
                    contributions.remove(element);
                    effective = effective.delete_elements([element.clone()]);
                }
                None => {}
            }
        }

        for element in mutations.added().iter() {
            if !contributed.add(element.clone()) {
                continue;
            }
            match contributions.get_mut(element) {
                Some(count) => *count += 1,
                None => {
                    contributions.insert(element.clone(), 1);
                    effective = effective.add_elements([element.clone()]);
                }
            }
        }

        self.set.apply(effective);
    }

    /// Build `source` minus the union of `others`.
    pub(crate) fn subtracting<S1, S2>(source: &S1, others: &[S2]) -> Self
    where
        S1: ReadableSet<T>,
        S2: ReadableSet<T>,
    {
        let derived = Self::new();
        let counters: Arc<Mutex<ShrinkingMap<T, isize>>> = Arc::new(Mutex::new(ShrinkingMap::new()));

        // Subtracted sets are attached first so their elements never flash
        // through the result while the source delivers its initial content.
        let mut handles: Vec<Unsubscribe> = others
            .iter()
            .map(|other| {
                let (derived, counters) = (derived.clone(), Arc::clone(&counters));
                other.on_update(move |mutations| derived.apply_signed(&counters, mutations, -1), false)
            })
            .collect();

        handles.push({
            let (derived, counters) = (derived.clone(), Arc::clone(&counters));
            source.on_update(move |mutations| derived.apply_signed(&counters, mutations, 1), false)
        });

        *derived.unsubscribe.lock() = Some(Unsubscribe::batch(handles));
        derived
    }

    /// Shift the counters of the mutated elements by `sign` (added) or
    /// `-sign` (deleted) and apply the resulting membership change.
    fn apply_signed(
        &self,
        counters: &Mutex<ShrinkingMap<T, isize>>,
        mutations: &SetMutations<T>,
        sign: isize,
    ) {
        let mut counters = counters.lock();
        let mut effective = SetMutations::new();

        let changes = mutations
            .added()
            .iter()
            .map(|element| (element, sign))
            .chain(mutations.deleted().iter().map(|element| (element, -sign)));

        for (element, delta) in changes {
            let before = counters.get(element).copied().unwrap_or(0);
            let after = before + delta;

            if after == 0 {
                counters.remove(element);
            } else {
                counters.insert(element.clone(), after);
            }

            if before <= 0 && after > 0 {
                effective = effective.add_elements([element.clone()]);
            } else if before > 0 && after <= 0 {
                effective = effective.delete_elements([element.clone()]);
            }
        }

        self.set.apply(effective);
    }

    /// Detach the subscriptions created at construction time. Later calls do
    /// nothing. Sources attached with `inherit_from` are detached through
    /// their own handles.
    pub fn unsubscribe(&self) {
        let unsubscribe = self.unsubscribe.lock().take();
        if let Some(unsubscribe) = unsubscribe {
            unsubscribe.unsubscribe();
        }
    }
}

impl<T: Element> Deref for DerivedSet<T> {
    type Target = Set<T>;

    fn deref(&self) -> &Self::Target {
        &self.set
    }
}

impl<T: Element> ReadableSet<T> for DerivedSet<T> {
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

impl<T: Element> Default for DerivedSet<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> Clone for DerivedSet<T> {
    fn clone(&self) -> Self {
        Self {
            set: self.set.clone(),
            contributions: Arc::clone(&self.contributions),
            unsubscribe: Arc::clone(&self.unsubscribe),
        }
    }
}

impl<T> Debug for DerivedSet<T>
where
    T: Element + Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedSet")
            .field("set", &self.set)
            .field("contributions", &*self.contributions.lock())
            .finish()
    }
}
