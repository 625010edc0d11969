//! Listeners
//!
//! A `Listener` waits on a variable for the next value that matches a
//! predicate. A wait races four outcomes: a matching value, a timeout, a
//! cancellation [`Event`], and an explicit [`Listener::deregister`]. Each
//! one that is not a value surfaces as its own [`WaitError`].

use std::fmt::Debug;
use std::sync::Arc;
use std::time::Duration;

use crossbeam_channel::{bounded, select, unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;

use super::event::Event;
use super::unsubscribe::Unsubscribe;
use super::variable::{ReadableVariable, Value};
use crate::error::WaitError;

/// Queue of matching values from a variable.
pub struct Listener<T: Value> {
    receiver: Receiver<T>,
    sender: Arc<Mutex<Option<Sender<T>>>>,
    unsubscribe: Mutex<Option<Unsubscribe>>,
}

impl<T: Value> Listener<T> {
    /// Listen for every value of `variable`, including the current one.
    pub fn new<R>(variable: &R) -> Self
    where
        R: ReadableVariable<T>,
    {
        Self::matching(variable, |_| true)
    }

    /// Listen for values of `variable` that satisfy `predicate`, including
    /// the current one.
    pub fn matching<R, P>(variable: &R, predicate: P) -> Self
    where
        R: ReadableVariable<T>,
        P: Fn(&T) -> bool + Send + Sync + 'static,
    {
        let (sender, receiver) = unbounded();
        let sender = Arc::new(Mutex::new(Some(sender)));

        let unsubscribe = {
            let sender = Arc::clone(&sender);
            variable.on_update(
                move |_, value| {
                    if !predicate(value) {
                        return;
                    }
                    if let Some(sender) = sender.lock().as_ref() {
                        let _ = sender.send(value.clone());
                    }
                },
                true,
            )
        };

        Self {
            receiver,
            sender,
            unsubscribe: Mutex::new(Some(unsubscribe)),
        }
    }

    /// Wait for the next matching value.
    ///
    /// Values that arrived before `deregister` are still returned; once they
    /// are consumed the wait fails with [`WaitError::Deregistered`].
    pub fn wait(&self, timeout: Duration, cancel: &Event) -> Result<T, WaitError> {
        let (cancel_sender, cancelled) = bounded(1);
        let cancel_subscription = cancel.on_trigger(move || {
            let _ = cancel_sender.try_send(());
        });

        let result = select! {
            recv(self.receiver) -> value => value.map_err(|_| WaitError::Deregistered),
            recv(cancelled) -> _ => Err(WaitError::Cancelled),
            default(timeout) => Err(WaitError::TimedOut(timeout)),
        };

        cancel_subscription.unsubscribe();
        result
    }

    /// Wait for the next matching value without a cancellation event.
    pub fn wait_for(&self, timeout: Duration) -> Result<T, WaitError> {
        self.receiver.recv_timeout(timeout).map_err(|err| match err {
            RecvTimeoutError::Timeout => WaitError::TimedOut(timeout),
            RecvTimeoutError::Disconnected => WaitError::Deregistered,
        })
    }

    /// A matching value that already arrived, if any.
    pub fn try_next(&self) -> Option<T> {
        self.receiver.try_recv().ok()
    }

    /// Stop listening. Pending and future waits fail with
    /// [`WaitError::Deregistered`] once queued values are consumed.
    pub fn deregister(&self) {
        let unsubscribe = self.unsubscribe.lock().take();
        let Some(unsubscribe) = unsubscribe else {
            return;
        };

        unsubscribe.unsubscribe();
        self.sender.lock().take();
        tracing::trace!("listener deregistered");
    }
}

impl<T: Value> Drop for Listener<T> {
    fn drop(&mut self) {
        self.deregister();
    }
}

impl<T: Value> Debug for Listener<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Listener")
            .field("queued", &self.receiver.len())
            .field("registered", &self.sender.lock().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::reactive::Variable;
    use std::thread;

    #[test]
    fn receives_current_and_later_values() {
        let variable = Variable::new(1);
        let listener = Listener::new(&variable);

        assert_eq!(listener.wait_for(Duration::from_millis(10)), Ok(1));

        variable.set(2);
        assert_eq!(listener.wait_for(Duration::from_millis(10)), Ok(2));
    }

    #[test]
    fn predicate_filters_values() {
        let variable = Variable::new(0);
        let listener = Listener::matching(&variable, |value: &i32| *value % 2 == 1);

        variable.set(2);
        variable.set(3);
        assert_eq!(listener.try_next(), Some(3));
        assert_eq!(listener.try_next(), None);
    }

    #[test]
    fn times_out_without_matching_value() {
        let variable = Variable::new(0);
        let listener = Listener::matching(&variable, |value: &i32| *value > 10);
        let timeout = Duration::from_millis(10);

        assert_eq!(listener.wait(timeout, &Event::new()), Err(WaitError::TimedOut(timeout)));
    }

    #[test]
    fn cancellation_wins_over_timeout() {
        let variable: Variable<i32> = Variable::new(0);
        let listener = Listener::matching(&variable, |value: &i32| *value > 0);
        let cancel = Event::new_triggered();

        assert_eq!(listener.wait(Duration::from_secs(5), &cancel), Err(WaitError::Cancelled));
    }

    #[test]
    fn deregistering_unblocks_waiter() {
        let variable: Variable<i32> = Variable::new(0);
        let listener = Arc::new(Listener::matching(&variable, |value: &i32| *value > 0));

        let waiter = {
            let listener = Arc::clone(&listener);
            thread::spawn(move || listener.wait(Duration::from_secs(5), &Event::new()))
        };

        thread::sleep(Duration::from_millis(20));
        listener.deregister();

        assert_eq!(waiter.join().unwrap(), Err(WaitError::Deregistered));
        assert_eq!(variable.subscriber_count(), 0);
    }

    #[test]
    fn queued_values_survive_deregistration() {
        let variable = Variable::new(0);
        let listener = Listener::matching(&variable, |value: &i32| *value > 0);

        variable.set(4);
        listener.deregister();
        variable.set(5);

        assert_eq!(listener.wait_for(Duration::from_millis(10)), Ok(4));
        assert_eq!(listener.wait_for(Duration::from_millis(10)), Err(WaitError::Deregistered));
    }

    #[test]
    fn value_from_another_thread() {
        let variable = Variable::new(0u64);
        let listener = Listener::matching(&variable, |value: &u64| *value == 3);

        let writer = {
            let variable = variable.clone();
            thread::spawn(move || {
                for value in 1..=3 {
                    thread::sleep(Duration::from_millis(5));
                    variable.set(value);
                }
            })
        };

        assert_eq!(listener.wait(Duration::from_secs(5), &Event::new()), Ok(3));
        writer.join().unwrap();
    }
}
