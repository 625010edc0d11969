//! Weave Core
//!
//! This crate provides the reactive state-propagation engine used by
//! long-running, concurrent node software. It implements:
//!
//! - Observable values and events with ordered, exactly-once notification
//! - Derived values, sets, and weight-sorted sets that update themselves
//! - Coordination helpers (eviction watermarks, wait groups, listeners)
//! - A reactive logger and serde-backed configuration
//!
//! # Architecture
//!
//! The crate is organized into several modules:
//!
//! - `reactive`: Reactive primitives and their subscription machinery
//! - `ds`: Container building blocks used by the primitives
//! - `log`: Named loggers with a reactive level, forwarding to `tracing`
//! - `config`: Settings for loggers and clocks
//! - `error`: Errors of the fallible edges (waits, configuration)
//!
//! # Example
//!
//! ```rust
//! use weave_core::reactive::{DerivedVariable, Variable};
//!
//! // Create a variable
//! let count = Variable::new(1);
//!
//! // Derive a value from it
//! let doubled = DerivedVariable::new1(|_, count: &i32| count * 2, &count);
//!
//! // Subscribe to changes
//! let unsubscribe = doubled.on_update(|previous, new| {
//!     println!("doubled: {previous} -> {new}");
//! }, false);
//!
//! // Update the variable, the subscriber prints "doubled: 2 -> 10"
//! count.set(5);
//! assert_eq!(doubled.get(), 10);
//!
//! unsubscribe.unsubscribe();
//! doubled.unsubscribe();
//! ```

pub mod config;
pub mod ds;
pub mod error;
pub mod log;
pub mod reactive;
