//! Derived Variables
//!
//! A `DerivedVariable` holds a value that is recomputed from one to four
//! input variables whenever any of them changes.
//!
//! Construction subscribes to every input with an initial delivery, so the
//! derived value is computed right away. When input `i` changes, the derived
//! value is recomputed with the new value of `i` and the *current* value of
//! every other input, read at recomputation time. Concurrent updates of
//! different inputs therefore converge on the same final value.

use std::fmt::Debug;
use std::ops::Deref;
use std::sync::Arc;

use parking_lot::Mutex;

use super::unsubscribe::Unsubscribe;
use super::variable::{ReadableVariable, Value, Variable};

/// A variable computed from other variables.
///
/// Dereferences to the underlying [`Variable`].
pub struct DerivedVariable<T: Value> {
    variable: Variable<T>,

    /// Detaches from every input. Taken on the first `unsubscribe` call.
    unsubscribe: Arc<Mutex<Option<Unsubscribe>>>,
}

impl<T: Value> DerivedVariable<T> {
    /// Derive from one input.
    pub fn new1<A, I1, F>(compute: F, input1: &I1) -> Self
    where
        A: Value,
        I1: ReadableVariable<A>,
        F: Fn(&T, &A) -> T + Send + Sync + 'static,
    {
        let variable = Variable::default();

        let unsubscribe = {
            let variable = variable.clone();
            input1.on_update(
                move |_, a| {
                    variable.compute(|current| compute(current, a));
                },
                true,
            )
        };

        Self::from_parts(variable, unsubscribe)
    }

    /// Derive from two inputs.
    pub fn new2<A, B, I1, I2, F>(compute: F, input1: &I1, input2: &I2) -> Self
    where
        A: Value,
        B: Value,
        I1: ReadableVariable<A>,
        I2: ReadableVariable<B>,
        F: Fn(&T, &A, &B) -> T + Send + Sync + 'static,
    {
        let variable = Variable::default();
        let compute = Arc::new(compute);

        let unsubscribe1 = {
            let (variable, compute, input2) = (variable.clone(), compute.clone(), input2.clone());
            input1.on_update(
                move |_, a| {
                    variable.compute(|current| compute(current, a, &input2.get()));
                },
                true,
            )
        };
        let unsubscribe2 = {
            let (variable, input1) = (variable.clone(), input1.clone());
            input2.on_update(
                move |_, b| {
                    variable.compute(|current| compute(current, &input1.get(), b));
                },
                true,
            )
        };

        Self::from_parts(variable, Unsubscribe::batch([unsubscribe1, unsubscribe2]))
    }

    /// Derive from three inputs.
    pub fn new3<A, B, C, I1, I2, I3, F>(compute: F, input1: &I1, input2: &I2, input3: &I3) -> Self
    where
        A: Value,
        B: Value,
        C: Value,
        I1: ReadableVariable<A>,
        I2: ReadableVariable<B>,
        I3: ReadableVariable<C>,
        F: Fn(&T, &A, &B, &C) -> T + Send + Sync + 'static,
    {
        let variable = Variable::default();
        let compute = Arc::new(compute);

        let unsubscribe1 = {
            let (variable, compute) = (variable.clone(), compute.clone());
            let (input2, input3) = (input2.clone(), input3.clone());
            input1.on_update(
                move |_, a| {
                    variable.compute(|current| compute(current, a, &input2.get(), &input3.get()));
                },
                true,
            )
        };
        let unsubscribe2 = {
            let (variable, compute) = (variable.clone(), compute.clone());
            let (input1, input3) = (input1.clone(), input3.clone());
            input2.on_update(
                move |_, b| {
                    variable.compute(|current| compute(current, &input1.get(), b, &input3.get()));
                },
                true,
            )
        };
        let unsubscribe3 = {
            let variable = variable.clone();
            let (input1, input2) = (input1.clone(), input2.clone());
            input3.on_update(
                move |_, c| {
                    variable.compute(|current| compute(current, &input1.get(), &input2.get(), c));
                },
                true,
            )
        };

        Self::from_parts(
            variable,
            Unsubscribe::batch([unsubscribe1, unsubscribe2, unsubscribe3]),
        )
    }

    /// Derive from four inputs.
    pub fn new4<A, B, C, D, I1, I2, I3, I4, F>(
        compute: F,
        input1: &I1,
        input2: &I2,
        input3: &I3,
        input4: &I4,
    ) -> Self
    where
        A: Value,
        B: Value,
        C: Value,
        D: Value,
        I1: ReadableVariable<A>,
        I2: ReadableVariable<B>,
        I3: ReadableVariable<C>,
        I4: ReadableVariable<D>,
        F: Fn(&T, &A, &B, &C, &D) -> T + Send + Sync + 'static,
    {
        let variable = Variable::default();
        let compute = Arc::new(compute);

        let unsubscribe1 = {
            let (variable, compute) = (variable.clone(), compute.clone());
            let (input2, input3, input4) = (input2.clone(), input3.clone(), input4.clone());
            input1.on_update(
                move |_, a| {
                    variable.compute(|current| {
                        compute(current, a, &input2.get(), &input3.get(), &input4.get())
                    });
                },
                true,
            )
        };
        let unsubscribe2 = {
            let (variable, compute) = (variable.clone(), compute.clone());
            let (input1, input3, input4) = (input1.clone(), input3.clone(), input4.clone());
            input2.on_update(
                move |_, b| {
                    variable.compute(|current| {
                        compute(current, &input1.get(), b, &input3.get(), &input4.get())
                    });
                },
                true,
            )
        };
        let unsubscribe3 = {
            let (variable, compute) = (variable.clone(), compute.clone());
            let (input1, input2, input4) = (input1.clone(), input2.clone(), input4.clone());
            input3.on_update(
                move |_, c| {
                    variable.compute(|current| {
                        compute(current, &input1.get(), &input2.get(), c, &input4.get())
                    });
                },
                true,
            )
        };
        let unsubscribe4 = {
            let variable = variable.clone();
            let (input1, input2, input3) = (input1.clone(), input2.clone(), input3.clone());
            input4.on_update(
                move |_, d| {
                    variable.compute(|current| {
                        compute(current, &input1.get(), &input2.get(), &input3.get(), d)
                    });
                },
                true,
            )
        };

        Self::from_parts(
            variable,
            Unsubscribe::batch([unsubscribe1, unsubscribe2, unsubscribe3, unsubscribe4]),
        )
    }

    fn from_parts(variable: Variable<T>, unsubscribe: Unsubscribe) -> Self {
        Self {
            variable,
            unsubscribe: Arc::new(Mutex::new(Some(unsubscribe))),
        }
    }

    /// Detach from all inputs. Later calls do nothing.
    ///
    /// The derived variable keeps its last computed value.
    pub fn unsubscribe(&self) {
        let unsubscribe = self.unsubscribe.lock().take();
        if let Some(unsubscribe) = unsubscribe {
            unsubscribe.unsubscribe();
        }
    }
}

impl<T: Value> Deref for DerivedVariable<T> {
    type Target = Variable<T>;

    fn deref(&self) -> &Self::Target {
        &self.variable
    }
}

impl<T: Value> ReadableVariable<T> for DerivedVariable<T> {
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

impl<T: Value> Clone for DerivedVariable<T> {
    fn clone(&self) -> Self {
        Self {
            variable: self.variable.clone(),
            unsubscribe: Arc::clone(&self.unsubscribe),
        }
    }
}

impl<T> Debug for DerivedVariable<T>
where
    T: Value + Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DerivedVariable")
            .field("variable", &self.variable)
            .field("attached", &self.unsubscribe.lock().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::thread;

    #[test]
    fn derives_from_one_input() {
        let input = Variable::new(3);
        let doubled = DerivedVariable::new1(|_: &i32, a: &i32| a * 2, &input);
        assert_eq!(doubled.get(), 6);

        input.set(5);
        assert_eq!(doubled.get(), 10);
    }

    #[test]
    fn derives_from_two_inputs_with_latest_values() {
        let a = Variable::new(1);
        let b = Variable::new(10);
        let sum = DerivedVariable::new2(|_: &i32, a: &i32, b: &i32| a + b, &a, &b);
        assert_eq!(sum.get(), 11);

        a.set(2);
        assert_eq!(sum.get(), 12);
        b.set(20);
        assert_eq!(sum.get(), 22);
    }

    #[test]
    fn derives_from_three_and_four_inputs() {
        let a = Variable::new(1u32);
        let b = Variable::new(2u32);
        let c = Variable::new(3u32);
        let d = Variable::new(4u32);

        let three = DerivedVariable::new3(|_: &u32, a: &u32, b: &u32, c: &u32| a * b * c, &a, &b, &c);
        let four = DerivedVariable::new4(
            |_: &u32, a: &u32, b: &u32, c: &u32, d: &u32| a + b + c + d,
            &a,
            &b,
            &c,
            &d,
        );
        assert_eq!(three.get(), 6);
        assert_eq!(four.get(), 10);

        c.set(10);
        d.set(0);
        assert_eq!(three.get(), 20);
        assert_eq!(four.get(), 13);
    }

    #[test]
    fn compute_sees_current_value() {
        let input = Variable::new(0);
        let total = DerivedVariable::new1(|current: &i32, a: &i32| current + a, &input);

        input.set(1);
        input.set(2);
        assert_eq!(total.get(), 3);
    }

    #[test]
    fn derived_chains_propagate() {
        let base = Variable::new(5);
        let doubled = DerivedVariable::new1(|_: &i32, v: &i32| v * 2, &base);
        let plus_ten = DerivedVariable::new1(|_: &i32, v: &i32| v + 10, &doubled);
        assert_eq!(plus_ten.get(), 20);

        base.set(10);
        assert_eq!(doubled.get(), 20);
        assert_eq!(plus_ten.get(), 30);
    }

    #[test]
    fn unsubscribe_detaches_exactly_once() {
        let a = Variable::new(1);
        let b = Variable::new(2);
        let sum = DerivedVariable::new2(|_: &i32, a: &i32, b: &i32| a + b, &a, &b);
        assert_eq!(a.subscriber_count(), 1);

        sum.unsubscribe();
        sum.clone().unsubscribe();
        assert_eq!(a.subscriber_count(), 0);
        assert_eq!(b.subscriber_count(), 0);

        a.set(100);
        assert_eq!(sum.get(), 3);
    }

    #[test]
    fn concurrent_inputs_converge() {
        let a = Variable::new(0usize);
        let b = Variable::new(0usize);
        let sum = DerivedVariable::new2(|_: &usize, a: &usize, b: &usize| a + b, &a, &b);
        let updates = std::sync::Arc::new(AtomicUsize::new(0));
        let updates_clone = updates.clone();
        let _counted = sum.on_update(
            move |_, _| {
                updates_clone.fetch_add(1, Ordering::SeqCst);
            },
            false,
        );

        let writer_a = {
            let a = a.clone();
            thread::spawn(move || {
                for i in 1..=100 {
                    a.set(i);
                }
            })
        };
        let writer_b = {
            let b = b.clone();
            thread::spawn(move || {
                for i in 1..=100 {
                    b.set(i * 1000);
                }
            })
        };
        writer_a.join().unwrap();
        writer_b.join().unwrap();

        assert_eq!(sum.get(), 100 + 100_000);
        assert!(updates.load(Ordering::SeqCst) > 0);
    }
}
