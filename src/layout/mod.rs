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

//! Layouts for formatting log records.

use std::borrow::Cow;
use std::fmt;

use jiff::Timestamp;

use crate::Error;
use crate::attr::Attr;
use crate::record::Record;

mod color;
mod json;
mod text;

pub use self::color::ColorLayout;
pub use self::json::JsonLayout;
pub use self::text::TextLayout;

/// A layout for formatting log records.
pub trait Layout: fmt::Debug + Send + Sync + 'static {
    /// Formats a log record.
    ///
    /// `attrs` are the attributes to render: the handler's bound attributes followed by the
    /// record's own, already nested into their groups. The returned bytes carry no trailing
    /// newline.
    fn format(&self, record: &Record, attrs: &[Attr]) -> Result<Vec<u8>, Error>;
}

impl<T: Layout> From<T> for Box<dyn Layout> {
    fn from(value: T) -> Self {
        Box::new(value)
    }
}

fn timestamp(record: &Record) -> Result<Timestamp, Error> {
    Timestamp::try_from(record.time()).map_err(|err| {
        Error::new("record time is out of range")
            .with_context("time", format!("{:?}", record.time()))
            .with_source(err)
    })
}

/// Top-level attribute keys that collide with the leading fields get an `attr.` prefix.
fn attr_key(key: &str) -> Cow<'_, str> {
    match key {
        "time" | "level" | "msg" => Cow::Owned(format!("attr.{key}")),
        _ => Cow::Borrowed(key),
    }
}
