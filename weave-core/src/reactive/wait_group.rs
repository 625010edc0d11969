//! Wait Groups
//!
//! A `WaitGroup` counts down over a dynamic set of pending elements and
//! triggers an [`Event`] once the set drains. Unlike a plain counter, marking
//! the same element done twice, or adding an element that is already
//! pending, does not skew the count.

use std::fmt::Debug;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use super::event::Event;
use super::set::{Element, Set};
use super::unsubscribe::Unsubscribe;

/// Countdown over pending elements.
///
/// Cloning a `WaitGroup` creates a new handle to the same group.
pub struct WaitGroup<T: Element> {
    inner: Arc<WaitGroupInner<T>>,
}

struct WaitGroupInner<T: Element> {
    event: Event,
    pending: Set<T>,
    pending_count: AtomicI64,
}

impl<T: Element> WaitGroup<T> {
    /// Create a group waiting for `elements`.
    ///
    /// A group created without elements does not fire until something has
    /// been added and marked done.
    pub fn new<I: IntoIterator<Item = T>>(elements: I) -> Self {
        let group = Self {
            inner: Arc::new(WaitGroupInner {
                event: Event::new(),
                pending: Set::new(),
                pending_count: AtomicI64::new(0),
            }),
        };
        group.add(elements);
        group
    }

    /// Mark `elements` as pending. Elements that are already pending are
    /// ignored.
    pub fn add<I: IntoIterator<Item = T>>(&self, elements: I) {
        let elements: Vec<T> = elements.into_iter().collect();

        // Count first so a concurrent `done` cannot observe zero early.
        let requested = elements.len() as i64;
        self.inner.pending_count.fetch_add(requested, Ordering::SeqCst);

        let added = self.inner.pending.add(elements).len() as i64;
        if added < requested {
            self.inner.pending_count.fetch_sub(requested - added, Ordering::SeqCst);
        }
    }

    /// Mark `elements` as done. Elements that are not pending are ignored.
    pub fn done<I: IntoIterator<Item = T>>(&self, elements: I) {
        let removed = self.inner.pending.delete(elements).len() as i64;
        if removed == 0 {
            return;
        }

        if self.inner.pending_count.fetch_sub(removed, Ordering::SeqCst) == removed
            && self.inner.event.trigger()
        {
            tracing::debug!("wait group drained");
        }
    }

    /// Block until every pending element is done.
    pub fn wait(&self) {
        self.inner.event.wait();
    }

    /// Block until every pending element is done or `timeout` elapses.
    /// Returns whether the group drained.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        self.inner.event.wait_timeout(timeout)
    }

    /// The live set of pending elements.
    pub fn pending_elements(&self) -> Set<T> {
        self.inner.pending.clone()
    }

    pub fn pending_count(&self) -> usize {
        self.inner.pending_count.load(Ordering::SeqCst).max(0) as usize
    }

    pub fn was_triggered(&self) -> bool {
        self.inner.event.was_triggered()
    }

    /// Run `callback` once the group drains.
    pub fn on_trigger<F>(&self, callback: F) -> Unsubscribe
    where
        F: Fn() + Send + Sync + 'static,
    {
        self.inner.event.on_trigger(callback)
    }
}

impl<T: Element> Clone for WaitGroup<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<T> Debug for WaitGroup<T>
where
    T: Element + Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WaitGroup")
            .field("pending", &self.inner.pending)
            .field("triggered", &self.was_triggered())
            .finish()
    }
}
