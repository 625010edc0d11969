//! Clock
//!
//! A `Clock` publishes the wall-clock time as a [`Variable`], truncated to a
//! fixed granularity. A background ticker thread refreshes it, so
//! subscribers are notified at most once per granularity step.

use std::fmt::Debug;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crossbeam_channel::{bounded, select, tick, Sender};
use parking_lot::Mutex;

use super::unsubscribe::Unsubscribe;
use super::variable::{ReadOnlyVariable, Variable};
use crate::config::ClockConfig;

const MIN_GRANULARITY: Duration = Duration::from_millis(1);

/// Wall-clock time as a reactive value.
///
/// Cloning a `Clock` creates a new handle to the same ticker. The ticker
/// stops on [`Clock::shutdown`] or when the last handle is dropped.
#[derive(Clone)]
pub struct Clock {
    inner: Arc<ClockInner>,
}

struct ClockInner {
    time: Variable<Duration>,
    granularity: Duration,
    shutdown: Mutex<Option<Sender<()>>>,
    ticker: Mutex<Option<JoinHandle<()>>>,
}

impl Clock {
    /// Start a clock that refreshes every `granularity` (at least 1ms).
    pub fn new(granularity: Duration) -> Self {
        let granularity = granularity.max(MIN_GRANULARITY);
        let time = Variable::new(since_epoch(granularity));
        let (shutdown, shutdown_signal) = bounded::<()>(1);

        let ticker = {
            let time = time.clone();
            thread::Builder::new().name("weave-clock".into()).spawn(move || {
                let ticks = tick(granularity);
                loop {
                    select! {
                        recv(ticks) -> _ => {
                            time.set(since_epoch(granularity));
                        }
                        recv(shutdown_signal) -> _ => break,
                    }
                }
            })
        };

        let ticker = match ticker {
            Ok(handle) => Some(handle),
            Err(err) => {
                tracing::error!(error = %err, "failed to spawn clock ticker, time will not advance");
                None
            }
        };

        Self {
            inner: Arc::new(ClockInner {
                time,
                granularity,
                shutdown: Mutex::new(Some(shutdown)),
                ticker: Mutex::new(ticker),
            }),
        }
    }

    pub fn from_config(config: &ClockConfig) -> Self {
        Self::new(Duration::from_millis(config.granularity_ms))
    }

    pub fn granularity(&self) -> Duration {
        self.inner.granularity
    }

    /// The current time, truncated to the granularity.
    pub fn now(&self) -> SystemTime {
        UNIX_EPOCH + self.inner.time.get()
    }

    /// Time since the UNIX epoch as a variable.
    pub fn time(&self) -> ReadOnlyVariable<Duration> {
        self.inner.time.read_only()
    }

    /// Run `callback` with every new time.
    pub fn on_tick<F>(&self, callback: F) -> Unsubscribe
    where
        F: Fn(SystemTime) + Send + Sync + 'static,
    {
        self.inner
            .time
            .on_update(move |_, since_epoch| callback(UNIX_EPOCH + *since_epoch), false)
    }

    /// Stop the ticker. The time keeps its last value.
    pub fn shutdown(&self) {
        self.inner.shutdown();
    }
}

impl ClockInner {
    fn shutdown(&self) {
        let Some(shutdown) = self.shutdown.lock().take() else {
            return;
        };
        let _ = shutdown.send(());

        let ticker = self.ticker.lock().take();
        if let Some(ticker) = ticker {
            // A tick subscriber may stop the clock from the ticker thread.
            if ticker.thread().id() != thread::current().id() && ticker.join().is_err() {
                tracing::warn!("clock ticker panicked");
            }
        }

        tracing::debug!(granularity = ?self.granularity, "clock stopped");
    }
}

impl Drop for ClockInner {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl Debug for Clock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clock")
            .field("now", &self.now())
            .field("granularity", &self.inner.granularity)
            .finish()
    }
}

/// Time since the UNIX epoch, truncated to `granularity`.
fn since_epoch(granularity: Duration) -> Duration {
    let elapsed = SystemTime::now().duration_since(UNIX_EPOCH).unwrap_or_default();
    let step = granularity.as_nanos().max(1);
    Duration::from_nanos((elapsed.as_nanos() / step * step) as u64)
}
