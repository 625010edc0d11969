//! Counters
//!
//! A `Counter` is a `Variable<usize>` holding how many of the variables it
//! monitors currently satisfy a condition.

use std::fmt::Debug;
use std::sync::Arc;

use parking_lot::Mutex;

use super::unsubscribe::Unsubscribe;
use super::variable::{ReadableVariable, Value, Variable};

type ConditionFn<T> = dyn Fn(&T) -> bool + Send + Sync;

/// Number of monitored variables that satisfy a condition.
pub struct Counter<T: Value> {
    count: Variable<usize>,
    condition: Arc<ConditionFn<T>>,
}

impl<T: Value> Counter<T> {
    /// Count monitored variables whose value is not the default.
    pub fn new() -> Self {
        Self::with_condition(|value: &T| *value != T::default())
    }

    /// Count monitored variables whose value satisfies `condition`.
    pub fn with_condition<F>(condition: F) -> Self
    where
        F: Fn(&T) -> bool + Send + Sync + 'static,
    {
        Self {
            count: Variable::new(0),
            condition: Arc::new(condition),
        }
    }

    /// Start counting `input`. Tearing down the returned handle removes its
    /// contribution.
    pub fn monitor<R>(&self, input: &R) -> Unsubscribe
    where
        R: ReadableVariable<T>,
    {
        // Whether `input` is counted, `None` once it is no longer monitored.
        let counted: Arc<Mutex<Option<bool>>> = Arc::new(Mutex::new(Some(false)));

        let unsubscribe = {
            let counted = Arc::clone(&counted);
            let count = self.count.clone();
            let condition = Arc::clone(&self.condition);

            input.on_update(
                move |_, value| {
                    let mut counted = counted.lock();
                    let Some(was_counted) = counted.as_mut() else {
                        return;
                    };

                    let is_counted = condition(value);
                    if is_counted != *was_counted {
                        *was_counted = is_counted;
                        count.compute(|count| if is_counted { count + 1 } else { count.saturating_sub(1) });
                    }
                },
                true,
            )
        };

        let count = self.count.clone();
        Unsubscribe::new(move || {
            unsubscribe.unsubscribe();

            if let Some(true) = counted.lock().take() {
                count.compute(|count| count.saturating_sub(1));
            }
        })
    }

    pub fn get(&self) -> usize {
        self.count.get()
    }

    /// Subscribe to changes of the count.
    pub fn on_update<F>(&self, callback: F, trigger_initial: bool) -> Unsubscribe
    where
        F: Fn(&usize, &usize) + Send + Sync + 'static,
    {
        self.count.on_update(callback, trigger_initial)
    }
}

impl<T: Value> ReadableVariable<usize> for Counter<T> {
    fn get(&self) -> usize {
        self.count.get()
    }

    fn on_update<F>(&self, callback: F, trigger_initial: bool) -> Unsubscribe
    where
        F: Fn(&usize, &usize) + Send + Sync + 'static,
    {
        self.count.on_update(callback, trigger_initial)
    }
}

impl<T: Value> Default for Counter<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Value> Clone for Counter<T> {
    fn clone(&self) -> Self {
        Self {
            count: self.count.clone(),
            condition: Arc::clone(&self.condition),
        }
    }
}

impl<T: Value> Debug for Counter<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Counter").field("count", &self.count.get()).finish()
    }
}
