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

//! Handlers decide whether a record is emitted and where it goes.
//!
//! Handlers compose as decorators: a [`Dispatch`] fans a record out to its members, a
//! [`SmartFilter`](crate::filter::SmartFilter) guards an inner handler, and a [`Sink`] renders and
//! writes.

use std::fmt;

use crate::Error;
use crate::attr::Attr;
use crate::record::Level;
use crate::record::Record;

mod dispatch;
mod sink;

pub use self::dispatch::Dispatch;
pub use self::sink::Sink;

/// A stage of the logging pipeline.
pub trait Handler: fmt::Debug + Send + Sync + 'static {
    /// Whether a record at `level` could be handled at all.
    fn enabled(&self, level: Level) -> bool;

    /// Process a record. The record is never modified.
    fn handle(&self, record: &Record) -> Result<(), Error>;

    /// Return a new handler that adds `attrs` to every record it handles.
    fn with_attrs(&self, attrs: &[Attr]) -> Box<dyn Handler>;

    /// Return a new handler that nests subsequent attributes under `name`.
    fn with_group(&self, name: &str) -> Box<dyn Handler>;

    /// Flush any buffered records.
    ///
    /// Default to a no-op.
    fn flush(&self) -> Result<(), Error> {
        Ok(())
    }
}

impl<T: Handler> From<T> for Box<dyn Handler> {
    fn from(value: T) -> Self {
        Box::new(value)
    }
}
