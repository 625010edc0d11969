//! Reactive Sets
//!
//! A `Set` is an observable collection of unique elements. It follows the
//! same two-lock scheme as [`Variable`](super::Variable): an apply-order lock
//! serializes mutations together with their notifications, and a value lock
//! protects the elements and the callback registry for cheap reads.
//!
//! Subscribers receive the *effective* delta of every mutation: adding an
//! element that is already present, or deleting one that is absent, is not
//! reported, and a mutation with an empty effective delta notifies nobody.

use std::fmt::Debug;
use std::hash::Hash;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::callback::{dispatch, Callback, CallbackRegistry};
use super::derived_set::DerivedSet;
use super::unique_id::UniqueId;
use super::unsubscribe::Unsubscribe;
use crate::ds::{ElementSet, SetMutations, ShrinkingMap};

/// Elements that can be stored in a [`Set`].
pub trait Element: Clone + Eq + Hash + Send + Sync + 'static {}

impl<T> Element for T where T: Clone + Eq + Hash + Send + Sync + 'static {}

/// Subscriber of a set, called with the applied mutations.
pub(crate) type MutationFn<T> = dyn Fn(&SetMutations<T>) + Send + Sync;

/// Read access to an observable set.
pub trait ReadableSet<T: Element>: Clone + Send + Sync + 'static {
    fn has(&self, element: &T) -> bool;

    /// A copy of the current elements.
    fn snapshot(&self) -> ElementSet<T>;

    fn size(&self) -> usize;

    /// Subscribe to applied mutations.
    ///
    /// On subscription the callback immediately receives a mutation that adds
    /// every current element, unless the set is empty and `trigger_initial`
    /// is not set.
    fn on_update<F>(&self, callback: F, trigger_initial: bool) -> Unsubscribe
    where
        F: Fn(&SetMutations<T>) + Send + Sync + 'static;
}

/// An observable set.
///
/// Cloning a `Set` creates a new handle to the same elements.
pub struct Set<T: Element> {
    inner: Arc<SetInner<T>>,
}

struct SetInner<T: Element> {
    /// Serializes the whole apply-notify sequence of writers.
    apply_order: Mutex<()>,

    state: RwLock<SetState<T>>,
}

struct SetState<T: Element> {
    value: ElementSet<T>,
    callbacks: CallbackRegistry<MutationFn<T>>,
    update_id: UniqueId,
}

impl<T: Element> Set<T> {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::from_elements(std::iter::empty())
    }

    /// Create a set holding `elements`.
    pub fn from_elements<I: IntoIterator<Item = T>>(elements: I) -> Self {
        Self {
            inner: Arc::new(SetInner {
                apply_order: Mutex::new(()),
                state: RwLock::new(SetState {
                    value: elements.into_iter().collect(),
                    callbacks: CallbackRegistry::new(),
                    update_id: UniqueId::ZERO,
                }),
            }),
        }
    }

    /// Add elements and return the ones that were not present before.
    pub fn add<I: IntoIterator<Item = T>>(&self, elements: I) -> ElementSet<T> {
        let (added, _) = self.apply(SetMutations::with_added(elements)).into_parts();
        added
    }

    /// Delete elements and return the ones that were actually present.
    pub fn delete<I: IntoIterator<Item = T>>(&self, elements: I) -> ElementSet<T> {
        let (_, deleted) = self.apply(SetMutations::with_deleted(elements)).into_parts();
        deleted
    }

    /// Apply a mutation and return its effective part.
    pub fn apply(&self, mutations: SetMutations<T>) -> SetMutations<T> {
        if mutations.is_empty() {
            return mutations;
        }

        self.compute(move |_| mutations)
    }

    /// Apply the mutation returned by `compute(current elements)`.
    ///
    /// `compute` runs under the value lock and must not touch this set.
    pub fn compute<F>(&self, compute: F) -> SetMutations<T>
    where
        F: FnOnce(&ElementSet<T>) -> SetMutations<T>,
    {
        let _apply_order = self.inner.apply_order.lock();

        let (applied, update_id, callbacks) = {
            let mut state = self.inner.state.write();

            let mutations = compute(&state.value);
            let applied = state.value.apply(&mutations);
            if applied.is_empty() {
                return applied;
            }

            let update_id = state.update_id.next();
            (applied, update_id, state.callbacks.snapshot())
        };

        dispatch(&callbacks, update_id, |callback| callback(&applied));

        applied
    }

    /// Replace the content with `elements` and return the removed elements.
    pub fn replace<I: IntoIterator<Item = T>>(&self, elements: I) -> ElementSet<T> {
        let replacement: ElementSet<T> = elements.into_iter().collect();

        let (_, deleted) = self
            .compute(move |current| {
                SetMutations::with_deleted(current.subtract(&replacement))
                    .add_elements(replacement.subtract(current))
            })
            .into_parts();
        deleted
    }

    pub fn has(&self, element: &T) -> bool {
        self.inner.state.read().value.has(element)
    }

    /// Whether every element of `elements` is present.
    pub fn has_all<'a, I>(&self, elements: I) -> bool
    where
        I: IntoIterator<Item = &'a T>,
    {
        let state = self.inner.state.read();
        elements.into_iter().all(|element| state.value.has(element))
    }

    pub fn size(&self) -> usize {
        self.inner.state.read().value.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.state.read().value.is_empty()
    }

    /// A copy of the current elements.
    pub fn snapshot(&self) -> ElementSet<T> {
        self.inner.state.read().value.clone()
    }

    /// A copy of the current elements as a `Vec`.
    pub fn to_vec(&self) -> Vec<T> {
        self.inner.state.read().value.to_vec()
    }

    /// Visit a snapshot of the elements until `f` returns `false`.
    ///
    /// `f` runs without any lock held, so it may mutate the set.
    pub fn for_each<F>(&self, mut f: F)
    where
        F: FnMut(&T) -> bool,
    {
        for element in self.snapshot().iter() {
            if !f(element) {
                break;
            }
        }
    }

    /// Subscribe to applied mutations. See [`ReadableSet::on_update`].
    pub fn on_update<F>(&self, callback: F, trigger_initial: bool) -> Unsubscribe
    where
        F: Fn(&SetMutations<T>) + Send + Sync + 'static,
    {
        let mut state = self.inner.state.write();
        let initial = SetMutations::with_added(state.value.iter().cloned());
        let update_id = state.update_id;
        let callback = state.callbacks.register(Box::new(callback));

        // Claim the current update before writers can see the callback.
        let execution = callback.lock_execution(update_id);
        drop(state);

        if execution.is_some() && (trigger_initial || !initial.is_empty()) {
            (callback.invoke())(&initial);
        }
        drop(execution);

        self.unsubscribe_handle(callback)
    }

    /// Run `setup` for every element that is or becomes part of the set.
    ///
    /// The handle returned by `setup` is torn down when the element is removed
    /// or when the returned subscription is torn down.
    pub fn with_elements<F>(&self, setup: F) -> Unsubscribe
    where
        F: Fn(&T) -> Unsubscribe + Send + Sync + 'static,
    {
        self.with_elements_where(setup, |_| true)
    }

    /// Like [`Set::with_elements`], restricted to elements matching `condition`.
    pub fn with_elements_where<F, C>(&self, setup: F, condition: C) -> Unsubscribe
    where
        F: Fn(&T) -> Unsubscribe + Send + Sync + 'static,
        C: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let teardowns: Arc<Mutex<Option<ShrinkingMap<T, Unsubscribe>>>> =
            Arc::new(Mutex::new(Some(ShrinkingMap::new())));

        let unsubscribe = {
            let teardowns = Arc::clone(&teardowns);
            self.on_update(
                move |mutations| {
                    let mut guard = teardowns.lock();
                    let Some(teardowns) = guard.as_mut() else {
                        return;
                    };

                    for element in mutations.deleted().iter() {
                        if let Some(teardown) = teardowns.remove(element) {
                            teardown.unsubscribe();
                        }
                    }
                    for element in mutations.added().iter() {
                        if !condition(element) {
                            continue;
                        }
                        if let Some(stale) = teardowns.insert(element.clone(), setup(element)) {
                            stale.unsubscribe();
                        }
                    }
                },
                false,
            )
        };

        Unsubscribe::new(move || {
            unsubscribe.unsubscribe();

            let remaining = teardowns.lock().take();
            for (_, teardown) in remaining.map(|mut map| map.drain()).unwrap_or_default() {
                teardown.unsubscribe();
            }
        })
    }

    /// A live set holding the elements of `self` that are in none of `others`.
    ///
    /// Every element carries a signed counter: `+1` while `self` has it and
    /// `-1` for every subtracted set that has it. The element is part of the
    /// result while its counter is positive. Call
    /// [`DerivedSet::unsubscribe`] on the result to detach it.
    pub fn subtract_reactive<S>(&self, others: &[S]) -> DerivedSet<T>
    where
        S: ReadableSet<T>,
    {
        DerivedSet::subtracting(self, others)
    }

    /// A handle that can observe but not mutate this set.
    pub fn read_only(&self) -> ReadOnlySet<T> {
        ReadOnlySet { set: self.clone() }
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.state.read().callbacks.len()
    }

    fn unsubscribe_handle(&self, callback: Arc<Callback<MutationFn<T>>>) -> Unsubscribe {
        let inner = Arc::downgrade(&self.inner);
        Unsubscribe::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.state.write().callbacks.remove(callback.id());
            }
            callback.mark_unsubscribed();
        })
    }
}

impl<T: Element> ReadableSet<T> for Set<T> {
    fn has(&self, element: &T) -> bool {
        Set::has(self, element)
    }

    fn snapshot(&self) -> ElementSet<T> {
        Set::snapshot(self)
    }

    fn size(&self) -> usize {
        Set::size(self)
    }

    fn on_update<F>(&self, callback: F, trigger_initial: bool) -> Unsubscribe
    where
        F: Fn(&SetMutations<T>) + Send + Sync + 'static,
    {
        Set::on_update(self, callback, trigger_initial)
    }
}

impl<T: Element> Default for Set<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Element> Clone for Set<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Set<T>
where
    T: Element + Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("Set")
            .field("elements", &state.value)
            .field("subscriber_count", &state.callbacks.len())
            .finish()
    }
}

/// Read-only view of a [`Set`].
pub struct ReadOnlySet<T: Element> {
    set: Set<T>,
}

impl<T: Element> ReadOnlySet<T> {
    pub fn has(&self, element: &T) -> bool {
        self.set.has(element)
    }

    pub fn size(&self) -> usize {
        self.set.size()
    }

    pub fn to_vec(&self) -> Vec<T> {
        self.set.to_vec()
    }
}

impl<T: Element> ReadableSet<T> for ReadOnlySet<T> {
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

impl<T: Element> Clone for ReadOnlySet<T> {
    fn clone(&self) -> Self {
        Self { set: self.set.clone() }
    }
}

impl<T> Debug for ReadOnlySet<T>
where
    T: Element + Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ReadOnlySet").field(&self.set).finish()
    }
}
