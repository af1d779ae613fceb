//! Logging handle passed to plugins.
//!
//! Plugins are built against this crate alone, so they log through a sink
//! owned by the host rather than through a subscriber of their own.

use std::fmt;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    Warn,
    Error,
}

/// Destination for plugin log records.
pub trait LogSink: Send + Sync {
    fn log(&self, level: LogLevel, scope: &str, message: &str);
}

struct NullSink;

impl LogSink for NullSink {
    fn log(&self, _level: LogLevel, _scope: &str, _message: &str) {}
}

/// Scoped logger forwarding to the host sink.
#[derive(Clone)]
pub struct PluginLogger {
    scope: Arc<str>,
    sink: Arc<dyn LogSink>,
}

impl PluginLogger {
    pub fn new(scope: impl Into<Arc<str>>, sink: Arc<dyn LogSink>) -> Self {
        Self {
            scope: scope.into(),
            sink,
        }
    }

    /// A logger that drops everything.
    pub fn discard() -> Self {
        Self::new("discard", Arc::new(NullSink))
    }

    pub fn scope(&self) -> &str {
        &self.scope
    }

    /// Same sink, different scope.
    pub fn scoped(&self, scope: impl Into<Arc<str>>) -> Self {
        Self::new(scope, Arc::clone(&self.sink))
    }

    pub fn log(&self, level: LogLevel, message: impl AsRef<str>) {
        self.sink.log(level, &self.scope, message.as_ref());
    }

    pub fn trace(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Trace, message);
    }

    pub fn debug(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Debug, message);
    }

    pub fn info(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Info, message);
    }

    pub fn warn(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Warn, message);
    }

    pub fn error(&self, message: impl AsRef<str>) {
        self.log(LogLevel::Error, message);
    }
}

impl fmt::Debug for PluginLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PluginLogger")
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}
