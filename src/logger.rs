// Copyright 2024 FastLabs Developers
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! The logging entry point and the process-wide default logger.

use std::borrow::Cow;
use std::sync::Arc;
use std::sync::RwLock;

use crate::attr::Attr;
use crate::handler::Dispatch;
use crate::handler::Handler;
use crate::record::Level;
use crate::record::Record;
use crate::trap::DefaultTrap;
use crate::trap::Trap;

static DEFAULT_LOGGER: RwLock<Option<Logger>> = RwLock::new(None);

/// A cheap-to-clone handle on a handler chain.
///
/// Logging never fails: errors returned by the root handler are reported to the logger's trap.
///
/// # Examples
///
/// ```
/// use logsieve::attr::Attr;
/// use logsieve::handler::Sink;
/// use logsieve::logger::Logger;
///
/// let logger = Logger::new(Sink::stderr());
/// let db = logger.with_attrs(&[Attr::new("component", "db")]);
/// db.info("connection established", [Attr::new("pool", 8)]);
/// ```
#[derive(Debug, Clone)]
pub struct Logger {
    handler: Arc<dyn Handler>,
    trap: Arc<dyn Trap>,
}

impl Logger {
    /// Create a logger over a handler chain.
    pub fn new(handler: impl Into<Box<dyn Handler>>) -> Self {
        Self {
            handler: Arc::from(handler.into()),
            trap: Arc::new(DefaultTrap::default()),
        }
    }

    /// A logger that discards every record.
    pub fn discard() -> Self {
        Self::new(Dispatch::new(vec![]))
    }

    /// Set the trap receiving handler errors.
    ///
    /// Default to [`DefaultTrap`].
    pub fn with_trap(mut self, trap: impl Into<Box<dyn Trap>>) -> Self {
        self.trap = Arc::from(trap.into());
        self
    }

    /// The root handler.
    pub fn handler(&self) -> &dyn Handler {
        self.handler.as_ref()
    }

    /// Whether a record at `level` would be handled.
    pub fn enabled(&self, level: Level) -> bool {
        self.handler.enabled(level)
    }

    /// Log a message with attributes.
    pub fn log(
        &self,
        level: Level,
        message: impl Into<Cow<'static, str>>,
        attrs: impl IntoIterator<Item = Attr>,
    ) {
        if !self.enabled(level) {
            return;
        }

        let record = Record::builder()
            .level(level)
            .message(message)
            .attrs(attrs)
            .build();
        self.log_record(&record);
    }

    /// Hand a prepared record to the handler chain.
    pub fn log_record(&self, record: &Record) {
        if let Err(err) = self.handler.handle(record) {
            self.trap.trap(&err);
        }
    }

    /// Log at [`Level::Debug`].
    pub fn debug(
        &self,
        message: impl Into<Cow<'static, str>>,
        attrs: impl IntoIterator<Item = Attr>,
    ) {
        self.log(Level::Debug, message, attrs);
    }

    /// Log at [`Level::Info`].
    pub fn info(
        &self,
        message: impl Into<Cow<'static, str>>,
        attrs: impl IntoIterator<Item = Attr>,
    ) {
        self.log(Level::Info, message, attrs);
    }

    /// Log at [`Level::Warn`].
    pub fn warn(
        &self,
        message: impl Into<Cow<'static, str>>,
        attrs: impl IntoIterator<Item = Attr>,
    ) {
        self.log(Level::Warn, message, attrs);
    }

    /// Log at [`Level::Error`].
    pub fn error(
        &self,
        message: impl Into<Cow<'static, str>>,
        attrs: impl IntoIterator<Item = Attr>,
    ) {
        self.log(Level::Error, message, attrs);
    }

    /// A child logger adding `attrs` to every record.
    pub fn with_attrs(&self, attrs: &[Attr]) -> Logger {
        Logger {
            handler: Arc::from(self.handler.with_attrs(attrs)),
            trap: self.trap.clone(),
        }
    }

    /// A child logger nesting subsequent attributes under `name`.
    pub fn with_group(&self, name: &str) -> Logger {
        Logger {
            handler: Arc::from(self.handler.with_group(name)),
            trap: self.trap.clone(),
        }
    }

    /// Flush every sink.
    pub fn flush(&self) {
        if let Err(err) = self.handler.flush() {
            self.trap.trap(&err);
        }
    }
}

/// Install `logger` as the process-wide default, returning the previous one.
pub fn set_default_logger(logger: Logger) -> Option<Logger> {
    let mut slot = DEFAULT_LOGGER.write().unwrap_or_else(|e| e.into_inner());
    slot.replace(logger)
}

/// The process-wide default logger, or a discarding logger if none is installed.
pub fn default_logger() -> Logger {
    let slot = DEFAULT_LOGGER.read().unwrap_or_else(|e| e.into_inner());
    slot.clone().unwrap_or_else(Logger::discard)
}

/// Uninstall the process-wide default logger and return it.
pub fn take_default_logger() -> Option<Logger> {
    let mut slot = DEFAULT_LOGGER.write().unwrap_or_else(|e| e.into_inner());
    slot.take()
}

/// An `error` attribute carrying the error's message.
pub fn error_attr(err: &dyn std::error::Error) -> Attr {
    Attr::new("error", err.to_string())
}

/// An `error` group carrying the error's message and a stack trace.
pub fn error_with_stack(err: &dyn std::error::Error, stack: impl Into<String>) -> Attr {
    let stack: String = stack.into();
    Attr::group(
        "error",
        [
            Attr::new("message", err.to_string()),
            Attr::new("stack", stack),
        ],
    )
}
