//! Logging
//!
//! A `Logger` is a named handle whose level is a reactive
//! [`Variable`](crate::reactive::Variable). Records that pass the level are
//! forwarded to `tracing` with the logger name attached. Child loggers follow
//! their parent's level until they are given one of their own.

use std::fmt::{Debug, Display};
use std::sync::Arc;

use parking_lot::Mutex;
use serde::Deserialize;

use crate::config::Config;
use crate::reactive::{ReadOnlyVariable, Unsubscribe, Value, Variable};

/// Severity of a log record. `Off` disables a logger.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warning,
    Error,
    Off,
}

/// A named logger with a reactive level.
///
/// Cloning a `Logger` creates a new handle to the same logger. A child stops
/// following its parent once its last handle is dropped.
#[derive(Clone)]
pub struct Logger {
    name: Arc<str>,
    level: Variable<LogLevel>,
    parent_link: Arc<ParentLink>,
}

/// Subscription that mirrors the parent's level, if any. Detached when the
/// last handle of the child goes away.
struct ParentLink(Mutex<Option<Unsubscribe>>);

impl ParentLink {
    fn detach(&self) {
        let link = self.0.lock().take();
        if let Some(link) = link {
            link.unsubscribe();
        }
    }
}

impl Drop for ParentLink {
    fn drop(&mut self) {
        self.detach();
    }
}

impl Logger {
    pub fn new(name: impl Into<Arc<str>>, level: LogLevel) -> Self {
        Self {
            name: name.into(),
            level: Variable::new(level),
            parent_link: Arc::new(ParentLink(Mutex::new(None))),
        }
    }

    pub fn from_config(name: impl Into<Arc<str>>, config: &Config) -> Self {
        Self::new(name, config.log_level)
    }

    /// A logger named `<parent>.<name>` whose level follows this one.
    pub fn child(&self, name: &str) -> Logger {
        let child = Logger::new(format!("{}.{}", self.name, name), self.level.get());
        *child.parent_link.0.lock() = Some(child.level.inherit_from(&self.level));
        child
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn level(&self) -> ReadOnlyVariable<LogLevel> {
        self.level.read_only()
    }

    /// Set the level and stop following the parent.
    pub fn set_level(&self, level: LogLevel) {
        self.parent_link.detach();
        self.level.set(level);
    }

    pub fn enabled(&self, level: LogLevel) -> bool {
        level != LogLevel::Off && level >= self.level.get()
    }

    pub fn log(&self, level: LogLevel, message: impl Display) {
        if !self.enabled(level) {
            return;
        }

        let name = &*self.name;
        match level {
            LogLevel::Trace => tracing::trace!(logger = name, "{}", message),
            LogLevel::Debug => tracing::debug!(logger = name, "{}", message),
            LogLevel::Info => tracing::info!(logger = name, "{}", message),
            LogLevel::Warning => tracing::warn!(logger = name, "{}", message),
            LogLevel::Error => tracing::error!(logger = name, "{}", message),
            LogLevel::Off => {}
        }
    }

    pub fn log_trace(&self, message: impl Display) {
        self.log(LogLevel::Trace, message);
    }

    pub fn log_debug(&self, message: impl Display) {
        self.log(LogLevel::Debug, message);
    }

    pub fn log_info(&self, message: impl Display) {
        self.log(LogLevel::Info, message);
    }

    pub fn log_warn(&self, message: impl Display) {
        self.log(LogLevel::Warning, message);
    }

    pub fn log_error(&self, message: impl Display) {
        self.log(LogLevel::Error, message);
    }
}

impl Debug for Logger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Logger")
            .field("name", &self.name)
            .field("level", &self.level.get())
            .finish()
    }
}

impl<T: Value + Debug> Variable<T> {
    /// Log every transition of this variable as `<name> updated` at `level`.
    pub fn log_updates(&self, logger: &Logger, level: LogLevel, name: &str) -> Unsubscribe {
        let logger = logger.clone();
        let name = name.to_owned();
        self.on_update(
            move |previous, new| {
                logger.log(level, format_args!("{name} updated: {previous:?} -> {new:?}"));
            },
            false,
        )
    }
}
