//! Variable Implementation
//!
//! A Variable is the fundamental reactive primitive. It holds a value and
//! notifies its subscribers whenever that value actually changes.
//!
//! # How Variables Work
//!
//! 1. A write (`set`/`compute`) takes the variable's update-order lock, which
//!    serializes every writer end to end.
//!
//! 2. Under the value lock the new value is computed and compared with the
//!    current one. Equal values end the write without any notification.
//!
//! 3. Otherwise the value is committed, the next update id is allocated and
//!    the callback list is snapshotted. The value lock is released.
//!
//! 4. Every callback of the snapshot runs synchronously on the writer's
//!    thread, still under the update-order lock, receiving
//!    `(previous, new)`.
//!
//! # Thread Safety
//!
//! Reads only take the value lock (shared), so `get` never waits behind slow
//! subscribers. Writers hold the update-order lock while callbacks run; a
//! callback that blocks forever stalls every later writer of the same
//! variable.
//!
//! The update-order lock is not re-entrant. Calling `set`/`compute` on a
//! variable from inside its own compute function, or from one of its own
//! callbacks, deadlocks. Writing to *other* variables from a callback is the
//! supported way of building propagation graphs.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use super::callback::{dispatch, Callback, CallbackRegistry};
use super::unique_id::UniqueId;
use super::unsubscribe::Unsubscribe;

/// Values that can be stored in a [`Variable`].
///
/// `Default` provides the "zero" value: subscribers are only called for the
/// initial value if it differs from the zero value (or if they ask for it).
pub trait Value: Clone + Default + PartialEq + Send + Sync + 'static {}

impl<T> Value for T where T: Clone + Default + PartialEq + Send + Sync + 'static {}

/// Subscriber of a variable, called with `(previous, new)`.
pub(crate) type UpdateFn<T> = dyn Fn(&T, &T) + Send + Sync;

/// Merges a written value into the current one.
type TransformFn<T> = dyn Fn(&T, T) -> T + Send + Sync;

/// Read access to an observable value.
pub trait ReadableVariable<T: Value>: Clone + Send + Sync + 'static {
    /// The latest committed value.
    fn get(&self) -> T;

    /// Subscribe to value transitions.
    ///
    /// `callback` is invoked with `(previous, new)` once per transition. If the
    /// current value is not the zero value, or `trigger_initial` is set, it is
    /// also invoked immediately with `(zero, current)`.
    fn on_update<F>(&self, callback: F, trigger_initial: bool) -> Unsubscribe
    where
        F: Fn(&T, &T) + Send + Sync + 'static;
}

/// A mutable, observable value.
///
/// Cloning a `Variable` creates a new handle to the same value.
///
/// # Example
///
/// ```rust
/// use weave_core::reactive::Variable;
///
/// let height = Variable::new(1u64);
/// let _logged = height.on_update(|previous, new| println!("{previous} -> {new}"), false);
///
/// assert_eq!(height.set(2), 1);
/// assert_eq!(height.get(), 2);
/// ```
pub struct Variable<T: Value> {
    inner: Arc<VariableInner<T>>,
}

struct VariableInner<T: Value> {
    /// Serializes the whole compute-commit-notify sequence of writers.
    update_order: Mutex<()>,

    /// The value and the subscribers, guarded together.
    state: RwLock<VariableState<T>>,

    /// Optional merge applied to every written value.
    transform: Option<Box<TransformFn<T>>>,
}

struct VariableState<T: Value> {
    value: T,
    callbacks: CallbackRegistry<UpdateFn<T>>,
    update_id: UniqueId,
}

impl<T: Value> Variable<T> {
    /// Create a variable holding `value`.
    pub fn new(value: T) -> Self {
        Self::build(value, None)
    }

    /// Create a variable whose writes are merged through `transform`.
    ///
    /// Every written value `new` is replaced by `transform(current, new)`
    /// before it is compared and committed.
    pub fn with_transform<F>(value: T, transform: F) -> Self
    where
        F: Fn(&T, T) -> T + Send + Sync + 'static,
    {
        Self::build(value, Some(Box::new(transform)))
    }

    fn build(value: T, transform: Option<Box<TransformFn<T>>>) -> Self {
        Self {
            inner: Arc::new(VariableInner {
                update_order: Mutex::new(()),
                state: RwLock::new(VariableState {
                    value,
                    callbacks: CallbackRegistry::new(),
                    update_id: UniqueId::ZERO,
                }),
                transform,
            }),
        }
    }

    /// Get the current value.
    pub fn get(&self) -> T {
        self.inner.state.read().value.clone()
    }

    /// Set a new value and return the previous one.
    pub fn set(&self, value: T) -> T {
        self.compute(move |_| value)
    }

    /// Replace the value with `compute(current)` and return the previous one.
    ///
    /// `compute` runs under the value lock. It must be pure and must not touch
    /// this variable.
    pub fn compute<F>(&self, compute: F) -> T
    where
        F: FnOnce(&T) -> T,
    {
        let _update_order = self.inner.update_order.lock();

        let (previous, new, update_id, callbacks) = {
            let mut state = self.inner.state.write();

            let computed = compute(&state.value);
            let new = match &self.inner.transform {
                Some(transform) => transform(&state.value, computed),
                None => computed,
            };
            if new == state.value {
                return state.value.clone();
            }

            let previous = std::mem::replace(&mut state.value, new.clone());
            let update_id = state.update_id.next();
            (previous, new, update_id, state.callbacks.snapshot())
        };

        dispatch(&callbacks, update_id, |callback| callback(&previous, &new));

        previous
    }

    /// Set `value` only if the current value is the zero value.
    ///
    /// Returns the value after the call and whether it was updated.
    pub fn default_to(&self, value: T) -> (T, bool) {
        let mut updated = false;
        let previous = self.compute(|current| {
            if *current == T::default() {
                updated = value != T::default();
                value
            } else {
                current.clone()
            }
        });

        if updated {
            (self.get(), true)
        } else {
            (previous, false)
        }
    }

    /// Subscribe to value transitions. See [`ReadableVariable::on_update`].
    pub fn on_update<F>(&self, callback: F, trigger_initial: bool) -> Unsubscribe
    where
        F: Fn(&T, &T) + Send + Sync + 'static,
    {
        let mut state = self.inner.state.write();
        let current = state.value.clone();
        let update_id = state.update_id;
        let callback = state.callbacks.register(Box::new(callback));

        // Claim the current update before writers can see the callback, so an
        // in-flight write can neither skip nor repeat the initial delivery.
        let execution = callback.lock_execution(update_id);
        drop(state);

        if execution.is_some() && (trigger_initial || current != T::default()) {
            (callback.invoke())(&T::default(), &current);
        }
        drop(execution);

        self.unsubscribe_handle(callback)
    }

    /// Mirror every value of `other` into this variable.
    pub fn inherit_from<R>(&self, other: &R) -> Unsubscribe
    where
        R: ReadableVariable<T>,
    {
        let this = self.clone();
        other.on_update(
            move |_, new| {
                this.set(new.clone());
            },
            true,
        )
    }

    /// Run `setup` for every non-zero value this variable takes.
    ///
    /// The handle returned by `setup` is torn down when the value changes
    /// again, or when the returned subscription is torn down.
    pub fn with_value<F>(&self, setup: F) -> Unsubscribe
    where
        F: Fn(&T) -> Unsubscribe + Send + Sync + 'static,
    {
        let teardown: Arc<Mutex<Option<Unsubscribe>>> = Arc::new(Mutex::new(None));

        let unsubscribe = {
            let teardown = Arc::clone(&teardown);
            self.on_update(
                move |_, value| {
                    let mut teardown = teardown.lock();
                    if let Some(previous) = teardown.take() {
                        previous.unsubscribe();
                    }
                    if *value != T::default() {
                        *teardown = Some(setup(value));
                    }
                },
                false,
            )
        };

        Unsubscribe::new(move || {
            unsubscribe.unsubscribe();
            if let Some(current) = teardown.lock().take() {
                current.unsubscribe();
            }
        })
    }

    /// A handle that only exposes reads and subscriptions.
    pub fn read_only(&self) -> ReadOnlyVariable<T> {
        ReadOnlyVariable {
            variable: self.clone(),
        }
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.inner.state.read().callbacks.len()
    }

    fn unsubscribe_handle(&self, callback: Arc<Callback<UpdateFn<T>>>) -> Unsubscribe {
        let inner = Arc::downgrade(&self.inner);
        Unsubscribe::new(move || {
            if let Some(inner) = inner.upgrade() {
                inner.state.write().callbacks.remove(callback.id());
            }
            callback.mark_unsubscribed();
        })
    }
}

impl<T: Value> ReadableVariable<T> for Variable<T> {
    fn get(&self) -> T {
        Variable::get(self)
    }

    fn on_update<F>(&self, callback: F, trigger_initial: bool) -> Unsubscribe
    where
        F: Fn(&T, &T) + Send + Sync + 'static,
    {
        Variable::on_update(self, callback, trigger_initial)
    }
}

impl<T: Value> Default for Variable<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

impl<T: Value> Clone for Variable<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for Variable<T>
where
    T: Value + Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.inner.state.read();
        f.debug_struct("Variable")
            .field("value", &state.value)
            .field("update_id", &state.update_id.raw())
            .field("subscriber_count", &state.callbacks.len())
            .finish()
    }
}

/// Read-only view of a [`Variable`].
pub struct ReadOnlyVariable<T: Value> {
    variable: Variable<T>,
}

impl<T: Value> ReadOnlyVariable<T> {
    pub fn get(&self) -> T {
        self.variable.get()
    }

    pub fn on_update<F>(&self, callback: F, trigger_initial: bool) -> Unsubscribe
    where
        F: Fn(&T, &T) + Send + Sync + 'static,
    {
        self.variable.on_update(callback, trigger_initial)
    }
}

impl<T: Value> ReadableVariable<T> for ReadOnlyVariable<T> {
    fn get(&self) -> T {
        self.variable.get()
    }

    fn on_update<F>(&self, callback: F, trigger_initial: bool) -> Unsubscribe
    where
        F: Fn(&T, &T) + Send + Sync + 'static,
    {
        self.variable.on_update(callback, trigger_initial)
    }
}

impl<T: Value> Clone for ReadOnlyVariable<T> {
    fn clone(&self) -> Self {
        Self {
            variable: self.variable.clone(),
        }
    }
}

impl<T> Debug for ReadOnlyVariable<T>
where
    T: Value + Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ReadOnlyVariable").field(&self.variable).finish()
    }
}

// ----------------------------------------------------------------------------
// Tests
// ----------------------------------------------------------------------------
