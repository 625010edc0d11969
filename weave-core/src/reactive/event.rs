//! Event Implementation
//!
//! An Event is a one-shot boolean flag built on a `Variable<bool>` whose
//! writes are OR-merged into the current value. Once triggered it can never
//! revert, so every subscriber sees the trigger exactly once, no matter how
//! many threads race to trigger it.

use std::fmt::Debug;
use std::time::Duration;

use crossbeam_channel::bounded;

use super::unsubscribe::Unsubscribe;
use super::variable::{ReadableVariable, Variable};

/// A monotonic, fire-once flag.
///
/// Cloning an `Event` creates a new handle to the same flag.
#[derive(Clone)]
pub struct Event {
    variable: Variable<bool>,
}

impl Event {
    /// Create an event that has not been triggered.
    pub fn new() -> Self {
        Self {
            variable: Variable::with_transform(false, |current: &bool, new| *current || new),
        }
    }

    /// Create an event that is already triggered.
    pub fn new_triggered() -> Self {
        let event = Self::new();
        event.trigger();
        event
    }

    /// Trigger the event.
    ///
    /// Returns `true` only for the call that actually triggered it.
    pub fn trigger(&self) -> bool {
        !self.variable.set(true)
    }

    pub fn was_triggered(&self) -> bool {
        self.variable.get()
    }

    /// Run `callback` once the event is triggered.
    ///
    /// If the event already fired, `callback` runs immediately and nothing is
    /// registered: the returned handle is a no-op.
    pub fn on_trigger<F>(&self, callback: F) -> Unsubscribe
    where
        F: Fn() + Send + Sync + 'static,
    {
        if self.was_triggered() {
            callback();
            return Unsubscribe::noop();
        }

        self.variable.on_update(
            move |_, triggered| {
                if *triggered {
                    callback();
                }
            },
            false,
        )
    }

    /// Block the calling thread until the event is triggered.
    pub fn wait(&self) {
        let (sender, receiver) = bounded(1);
        let unsubscribe = self.on_trigger(move || {
            let _ = sender.try_send(());
        });

        let _ = receiver.recv();
        unsubscribe.unsubscribe();
    }

    /// Block until the event is triggered or `timeout` elapses.
    ///
    /// Returns whether the event was triggered.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let (sender, receiver) = bounded(1);
        let unsubscribe = self.on_trigger(move || {
            let _ = sender.try_send(());
        });

        let triggered = receiver.recv_timeout(timeout).is_ok();
        unsubscribe.unsubscribe();
        triggered
    }
}

impl Default for Event {
    fn default() -> Self {
        Self::new()
    }
}

impl ReadableVariable<bool> for Event {
    fn get(&self) -> bool {
        self.was_triggered()
    }

    fn on_update<F>(&self, callback: F, trigger_initial: bool) -> Unsubscribe
    where
        F: Fn(&bool, &bool) + Send + Sync + 'static,
    {
        // A triggered event never changes again.
        if self.was_triggered() {
            callback(&false, &true);
            return Unsubscribe::noop();
        }

        self.variable.on_update(callback, trigger_initial)
    }
}

impl Debug for Event {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Event")
            .field("triggered", &self.was_triggered())
            .finish()
    }
}
