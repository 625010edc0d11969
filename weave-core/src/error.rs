//! Error types.
//!
//! Reactive mutations never fail. Errors only come out of the edges of the
//! crate: blocking waits that can lose a race, and configuration loading.

use std::time::Duration;

use thiserror::Error;

/// Outcome of a [`Listener`](crate::reactive::Listener) wait that did not
/// produce a value.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitError {
    /// The listener was deregistered before a matching value arrived.
    #[error("listener was deregistered")]
    Deregistered,

    #[error("wait timed out after {0:?}")]
    TimedOut(Duration),

    /// The cancellation event fired first.
    #[error("wait was cancelled")]
    Cancelled,
}

/// Errors raised while loading a [`Config`](crate::config::Config).
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid configuration: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("clock granularity must be greater than zero")]
    InvalidGranularity,
}
