//! Reactive Primitives
//!
//! This module implements the reactive engine: observable values and
//! collections that notify their subscribers synchronously whenever their
//! state actually changes.
//!
//! # Concepts
//!
//! ## Variables
//!
//! A [`Variable`] holds a single value. Writers are serialized per variable,
//! and every subscriber sees every transition exactly once and in commit
//! order, even when it subscribes while a write is in flight. An [`Event`] is
//! a boolean variable that can only go from `false` to `true`.
//!
//! ## Derived values
//!
//! A [`DerivedVariable`] recomputes itself from up to four inputs whenever
//! one of them changes. [`Counter`] and [`Clock`] are small derived utilities
//! built on variables.
//!
//! ## Sets
//!
//! A [`Set`] notifies subscribers with the effective mutation of every
//! write. [`DerivedSet`] keeps a union or a difference of other sets, and
//! [`SortedSet`] orders its elements by a weight that may change over time.
//!
//! ## Coordination
//!
//! [`EvictionState`] advances a watermark over ordered slots and fires the
//! events of evicted slots, [`WaitGroup`] fires once a dynamic set of
//! pending elements drains, and a [`Listener`] blocks until a variable takes
//! a matching value.
//!
//! # Implementation Notes
//!
//! Every variable and set uses two locks: an update-order lock held for the
//! whole write, including callback execution, and a value lock for the
//! stored state. Callbacks run on the writer's thread. Propagation graphs are
//! built by writing to *other* primitives from callbacks; writing to the
//! same primitive from its own callback deadlocks.
//!
//! Subscriptions are not tied to scopes. Every subscribing call returns an
//! [`Unsubscribe`] handle that must be called to detach.

mod callback;
mod clock;
mod counter;
mod derived_set;
mod derived_variable;
mod eviction_state;
mod event;
mod listener;
mod set;
mod sorted_set;
mod unique_id;
mod unsubscribe;
mod variable;
mod wait_group;

pub use clock::Clock;
pub use counter::Counter;
pub use derived_set::DerivedSet;
pub use derived_variable::DerivedVariable;
pub use eviction_state::EvictionState;
pub use event::Event;
pub use listener::Listener;
pub use set::{Element, ReadOnlySet, ReadableSet, Set};
pub use sorted_set::SortedSet;
pub use unique_id::UniqueId;
pub use unsubscribe::Unsubscribe;
pub use variable::{ReadOnlyVariable, ReadableVariable, Value, Variable};
pub use wait_group::WaitGroup;
