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

//! Log record and level.

use std::borrow::Cow;
use std::fmt;
use std::str::FromStr;
use std::time::SystemTime;

use crate::attr::Attr;
use crate::attr::Value;

/// One structured log event.
///
/// A record is immutable once built. Handlers only ever see `&Record`; a handler that needs to
/// add attributes of its own builds a private attribute list instead.
#[derive(Clone, Debug)]
pub struct Record {
    // the observed time
    time: SystemTime,

    level: Level,

    // the payload
    message: Cow<'static, str>,

    // structural logging
    attrs: Vec<Attr>,
}

impl Record {
    /// Create a record observed now, without attributes.
    pub fn new(level: Level, message: impl Into<Cow<'static, str>>) -> Self {
        RecordBuilder::default()
            .level(level)
            .message(message)
            .build()
    }

    /// Create a new [`RecordBuilder`].
    pub fn builder() -> RecordBuilder {
        RecordBuilder::default()
    }

    /// The observed time.
    pub fn time(&self) -> SystemTime {
        self.time
    }

    /// The severity of the record.
    pub fn level(&self) -> Level {
        self.level
    }

    /// The message body.
    pub fn message(&self) -> &str {
        &self.message
    }

    /// The attributes, in the order they were added.
    pub fn attrs(&self) -> &[Attr] {
        &self.attrs
    }

    /// The value of the first top-level attribute named `key`.
    pub fn attr(&self, key: &str) -> Option<&Value> {
        self.attrs
            .iter()
            .find(|attr| attr.key() == key)
            .map(Attr::value)
    }
}

/// Builder for [`Record`].
#[derive(Debug)]
pub struct RecordBuilder {
    record: Record,
}

impl Default for RecordBuilder {
    fn default() -> Self {
        RecordBuilder {
            record: Record {
                time: SystemTime::now(),
                level: Level::Info,
                message: Cow::Borrowed(""),
                attrs: vec![],
            },
        }
    }
}

impl RecordBuilder {
    /// Set [`time`](Record::time).
    pub fn time(mut self, time: SystemTime) -> Self {
        self.record.time = time;
        self
    }

    /// Set [`level`](Record::level).
    pub fn level(mut self, level: Level) -> Self {
        self.record.level = level;
        self
    }

    /// Set [`message`](Record::message).
    pub fn message(mut self, message: impl Into<Cow<'static, str>>) -> Self {
        self.record.message = message.into();
        self
    }

    /// Append one attribute.
    pub fn attr(mut self, attr: Attr) -> Self {
        self.record.attrs.push(attr);
        self
    }

    /// Append attributes, keeping their order.
    pub fn attrs(mut self, attrs: impl IntoIterator<Item = Attr>) -> Self {
        self.record.attrs.extend(attrs);
        self
    }

    /// Invoke the builder and return a `Record`.
    pub fn build(self) -> Record {
        self.record
    }
}

/// The severity of a record, ordered `Debug < Info < Warn < Error`.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Debug, Hash, Default)]
pub enum Level {
    /// The "debug" level.
    ///
    /// Designates lower priority information.
    Debug,
    /// The "info" level.
    ///
    /// Designates useful information.
    #[default]
    Info,
    /// The "warn" level.
    ///
    /// Designates hazardous situations.
    Warn,
    /// The "error" level.
    ///
    /// Designates very serious errors.
    Error,
}

impl Level {
    /// Return the string representation of the `Level`.
    ///
    /// This returns the same string as the `fmt::Display` implementation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Level::Debug => "DEBUG",
            Level::Info => "INFO",
            Level::Warn => "WARN",
            Level::Error => "ERROR",
        }
    }

    /// Parse a level name, falling back to `Info` for anything unknown.
    pub fn parse_or_default(s: &str) -> Level {
        s.parse().unwrap_or_default()
    }
}

impl From<log::Level> for Level {
    fn from(level: log::Level) -> Self {
        match level {
            log::Level::Error => Self::Error,
            log::Level::Warn => Self::Warn,
            log::Level::Info => Self::Info,
            log::Level::Debug | log::Level::Trace => Self::Debug,
        }
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// The type returned by `from_str` when the string doesn't match any of the log levels.
#[derive(Debug, PartialEq, Eq)]
#[non_exhaustive]
pub struct ParseLevelError {}

impl fmt::Display for ParseLevelError {
    fn fmt(&self, fmt: &mut fmt::Formatter) -> fmt::Result {
        fmt.write_str("malformed log level")
    }
}

impl std::error::Error for ParseLevelError {}

impl FromStr for Level {
    type Err = ParseLevelError;

    fn from_str(s: &str) -> Result<Level, Self::Err> {
        for (name, level) in [
            ("debug", Level::Debug),
            ("info", Level::Info),
            ("warn", Level::Warn),
            ("warning", Level::Warn),
            ("error", Level::Error),
        ] {
            if s.trim().eq_ignore_ascii_case(name) {
                return Ok(level);
            }
        }

        Err(ParseLevelError {})
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_ordering() {
        assert!(Level::Debug < Level::Info);
        assert!(Level::Info < Level::Warn);
        assert!(Level::Warn < Level::Error);
    }

    #[test]
    fn test_parse_level() {
        assert_eq!("debug".parse(), Ok(Level::Debug));
        assert_eq!("INFO".parse(), Ok(Level::Info));
        assert_eq!("warn".parse(), Ok(Level::Warn));
        assert_eq!("warning".parse(), Ok(Level::Warn));
        assert_eq!("error".parse(), Ok(Level::Error));
        assert_eq!("invalid".parse::<Level>(), Err(ParseLevelError {}));
        assert_eq!(Level::parse_or_default("invalid"), Level::Info);
    }

    #[test]
    fn test_level_from_log_crate() {
        assert_eq!(Level::from(log::Level::Trace), Level::Debug);
        assert_eq!(Level::from(log::Level::Error), Level::Error);
    }

    #[test]
    fn test_record_attr_lookup() {
        let record = Record::builder()
            .level(Level::Warn)
            .message("not found")
            .attr(Attr::new("status", 404))
            .attr(Attr::new("path", "/missing"))
            .build();

        assert_eq!(record.level(), Level::Warn);
        assert_eq!(record.message(), "not found");
        assert_eq!(record.attr("status"), Some(&Value::Int(404)));
        assert_eq!(record.attr("ip"), None);
    }
}
