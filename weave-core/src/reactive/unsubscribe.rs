//! Subscription teardown handles.

use std::fmt::Debug;

/// Handle returned by every subscribing call (`on_update`, `inherit_from`,
/// `with_elements`, `monitor`, ...).
///
/// Calling [`Unsubscribe::unsubscribe`] detaches the subscription. Dropping the
/// handle without calling it does *not* detach anything: the callback stays
/// registered (and keeps whatever it captured alive) for as long as the
/// observed instance lives. This lets propagation graphs be wired up once and
/// left running without holding on to every handle.
#[must_use = "dropping an Unsubscribe keeps the subscription alive; call `unsubscribe()` to detach it"]
pub struct Unsubscribe {
    teardown: Option<Box<dyn FnOnce() + Send>>,
}

impl Unsubscribe {
    /// Wrap a teardown closure.
    pub fn new<F>(teardown: F) -> Self
    where
        F: FnOnce() + Send + 'static,
    {
        Self {
            teardown: Some(Box::new(teardown)),
        }
    }

    /// A handle that does nothing when called.
    pub fn noop() -> Self {
        Self { teardown: None }
    }

    /// Combine several handles into one that tears them down in order.
    pub fn batch<I>(handles: I) -> Self
    where
        I: IntoIterator<Item = Unsubscribe>,
    {
        let handles: Vec<Unsubscribe> = handles.into_iter().collect();
        Self::new(move || {
            for handle in handles {
                handle.unsubscribe();
            }
        })
    }

    /// Run the teardown.
    pub fn unsubscribe(mut self) {
        if let Some(teardown) = self.teardown.take() {
            teardown();
        }
    }
}

impl Default for Unsubscribe {
    fn default() -> Self {
        Self::noop()
    }
}

impl Debug for Unsubscribe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Unsubscribe")
            .field("pending", &self.teardown.is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicI32, Ordering};
    use std::sync::Arc;

    #[test]
    fn batch_runs_every_teardown() {
        let calls = Arc::new(AtomicI32::new(0));

        let handles = (0..3).map(|_| {
            let calls = calls.clone();
            Unsubscribe::new(move || {
                calls.fetch_add(1, Ordering::SeqCst);
            })
        });
        Unsubscribe::batch(handles).unsubscribe();

        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn dropping_does_not_run_teardown() {
        let calls = Arc::new(AtomicI32::new(0));
        let calls_clone = calls.clone();

        let handle = Unsubscribe::new(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        drop(handle);

        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
