//! Callback Registry
//!
//! Every reactive instance keeps its subscribers in a `CallbackRegistry`. A
//! registered `Callback` wraps the user function together with the state that
//! makes delivery exactly-once under races:
//!
//! - an execution lock, held while the function runs
//! - the id of the last update the callback executed for
//! - an unsubscribed flag
//!
//! A writer snapshots the callback list under the value lock, releases it,
//! and then calls [`Callback::lock_execution`] with its update id for every
//! entry. A subscriber that registers concurrently takes its own execution
//! lock for the *current* update id before the value lock is released, so a
//! writer that already committed that id is refused, and a writer that commits
//! a later id blocks until the initial delivery has finished.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, MutexGuard};
use smallvec::SmallVec;

use super::unique_id::UniqueId;
use crate::ds::ShrinkingMap;

/// Snapshot of registered callbacks taken by a writer.
pub(crate) type CallbackList<F> = SmallVec<[Arc<Callback<F>>; 4]>;

/// One subscription.
pub(crate) struct Callback<F: ?Sized> {
    id: UniqueId,

    /// Set once the subscription is torn down. Checked after the execution
    /// lock is taken, so unsubscribing from inside the callback is safe.
    unsubscribed: AtomicBool,

    /// Execution lock; guards the last executed update id.
    last_update: Mutex<UniqueId>,

    invoke: Box<F>,
}

impl<F: ?Sized> Callback<F> {
    fn new(id: UniqueId, invoke: Box<F>) -> Self {
        Self {
            id,
            unsubscribed: AtomicBool::new(false),
            last_update: Mutex::new(UniqueId::ZERO),
            invoke,
        }
    }

    pub(crate) fn id(&self) -> UniqueId {
        self.id
    }

    /// Acquire the execution lock for `update_id`.
    ///
    /// Returns `None` if the callback was unsubscribed or already executed for
    /// this (or a later) update. The returned guard must be held while the
    /// callback runs.
    pub(crate) fn lock_execution(&self, update_id: UniqueId) -> Option<MutexGuard<'_, UniqueId>> {
        let mut last_update = self.last_update.lock();
        if self.unsubscribed.load(Ordering::Acquire)
            || (update_id != UniqueId::ZERO && update_id <= *last_update)
        {
            return None;
        }

        *last_update = update_id;
        Some(last_update)
    }

    pub(crate) fn mark_unsubscribed(&self) {
        self.unsubscribed.store(true, Ordering::Release);
    }

    pub(crate) fn invoke(&self) -> &F {
        &self.invoke
    }
}

/// Registered callbacks of one instance, keyed by a per-instance id.
pub(crate) struct CallbackRegistry<F: ?Sized> {
    callbacks: ShrinkingMap<UniqueId, Arc<Callback<F>>>,
    callback_ids: UniqueId,
}

impl<F: ?Sized> CallbackRegistry<F> {
    pub(crate) fn new() -> Self {
        Self {
            callbacks: ShrinkingMap::new(),
            callback_ids: UniqueId::ZERO,
        }
    }

    /// Register a new callback and return it.
    pub(crate) fn register(&mut self, invoke: Box<F>) -> Arc<Callback<F>> {
        let callback = Arc::new(Callback::new(self.callback_ids.next(), invoke));
        self.callbacks.insert(callback.id(), Arc::clone(&callback));
        callback
    }

    pub(crate) fn remove(&mut self, id: UniqueId) {
        self.callbacks.remove(&id);
    }

    /// Registered callbacks in registration order.
    pub(crate) fn snapshot(&self) -> CallbackList<F> {
        let mut callbacks: CallbackList<F> = self.callbacks.values().cloned().collect();
        callbacks.sort_unstable_by_key(|callback| callback.id());
        callbacks
    }

    pub(crate) fn len(&self) -> usize {
        self.callbacks.len()
    }
}

/// Deliver one update to every callback of a snapshot.
///
/// Runs on the writer's thread, with the writer's update-order lock held.
pub(crate) fn dispatch<F, C>(callbacks: &[Arc<Callback<F>>], update_id: UniqueId, mut call: C)
where
    F: ?Sized,
    C: FnMut(&F),
{
    for callback in callbacks {
        if let Some(_execution) = callback.lock_execution(update_id) {
            call(callback.invoke());
        }
    }
}
