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

//! The module for key-value attributes in a log record.

use std::borrow::Cow;
use std::fmt;
use std::time::Duration;

/// A key-value pair attached to a record or bound to a handler.
#[derive(Debug, Clone, PartialEq)]
pub struct Attr {
    key: Cow<'static, str>,
    value: Value,
}

impl Attr {
    /// Create an attribute from anything convertible into a [`Value`].
    pub fn new(key: impl Into<Cow<'static, str>>, value: impl Into<Value>) -> Self {
        Attr {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Create a group attribute holding nested attributes.
    pub fn group(key: impl Into<Cow<'static, str>>, attrs: impl IntoIterator<Item = Attr>) -> Self {
        Attr {
            key: key.into(),
            value: Value::Group(attrs.into_iter().collect()),
        }
    }

    /// Gets the key string.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Gets the value.
    pub fn value(&self) -> &Value {
        &self.value
    }
}

/// The value of an attribute.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Str(Cow<'static, str>),
    Int(i64),
    Uint(u64),
    Float(f64),
    Bool(bool),
    Duration(Duration),
    /// Nested attributes, rendered under the key of the enclosing attribute.
    Group(Vec<Attr>),
}

impl Value {
    /// Returns the value as an integer if it is numeric, or a string holding an integer.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(v) => Some(*v),
            Value::Uint(v) => i64::try_from(*v).ok(),
            Value::Str(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns the string slice if the value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Whether this is a group with no attributes.
    pub fn is_empty_group(&self) -> bool {
        matches!(self, Value::Group(attrs) if attrs.is_empty())
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Str(s) => f.write_str(s),
            Value::Int(v) => write!(f, "{v}"),
            Value::Uint(v) => write!(f, "{v}"),
            Value::Float(v) => write!(f, "{v}"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Duration(v) => write!(f, "{v:?}"),
            Value::Group(attrs) => {
                f.write_str("[")?;
                for (i, attr) in attrs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(" ")?;
                    }
                    write!(f, "{}={}", attr.key(), attr.value())?;
                }
                f.write_str("]")
            }
        }
    }
}

impl From<&'static str> for Value {
    fn from(value: &'static str) -> Self {
        Value::Str(Cow::Borrowed(value))
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Str(Cow::Owned(value))
    }
}

impl From<Cow<'static, str>> for Value {
    fn from(value: Cow<'static, str>) -> Self {
        Value::Str(value)
    }
}

macro_rules! impl_from_signed {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(value: $t) -> Self {
                Value::Int(value as i64)
            }
        })*
    };
}

macro_rules! impl_from_unsigned {
    ($($t:ty),*) => {
        $(impl From<$t> for Value {
            fn from(value: $t) -> Self {
                Value::Uint(value as u64)
            }
        })*
    };
}

impl_from_signed!(i8, i16, i32, i64, isize);
impl_from_unsigned!(u8, u16, u32, u64, usize);

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(value as f64)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<Duration> for Value {
    fn from(value: Duration) -> Self {
        Value::Duration(value)
    }
}

impl From<Vec<Attr>> for Value {
    fn from(value: Vec<Attr>) -> Self {
        Value::Group(value)
    }
}

/// Attributes and groups bound to a handler through `with_attrs` and `with_group`.
///
/// The first scope is the unnamed root. Every `with_group` opens a new named scope; attributes
/// bound afterwards, and the record's own attributes, land in the innermost scope.
#[derive(Debug, Clone, Default)]
pub struct AttrScope {
    scopes: Vec<Scope>,
}

#[derive(Debug, Clone)]
struct Scope {
    name: Option<String>,
    attrs: Vec<Attr>,
}

impl AttrScope {
    /// Whether nothing has been bound.
    pub fn is_empty(&self) -> bool {
        self.scopes.is_empty()
    }

    /// Return a new scope with `attrs` appended to the innermost group.
    pub fn with_attrs(&self, attrs: &[Attr]) -> AttrScope {
        let mut scope = self.clone();
        if attrs.is_empty() {
            return scope;
        }
        if scope.scopes.is_empty() {
            scope.scopes.push(Scope {
                name: None,
                attrs: vec![],
            });
        }
        if let Some(last) = scope.scopes.last_mut() {
            last.attrs.extend_from_slice(attrs);
        }
        scope
    }

    /// Return a new scope with a group named `name` opened. An empty name is ignored.
    pub fn with_group(&self, name: &str) -> AttrScope {
        let mut scope = self.clone();
        if name.is_empty() {
            return scope;
        }
        if scope.scopes.is_empty() {
            scope.scopes.push(Scope {
                name: None,
                attrs: vec![],
            });
        }
        scope.scopes.push(Scope {
            name: Some(name.to_string()),
            attrs: vec![],
        });
        scope
    }

    /// Combine the bound attributes with a record's attributes.
    ///
    /// Bound attributes come first. Groups that end up without attributes are omitted.
    pub fn resolve<'a>(&self, record_attrs: &'a [Attr]) -> Cow<'a, [Attr]> {
        if self.is_empty() {
            return Cow::Borrowed(record_attrs);
        }

        let mut current = record_attrs.to_vec();
        for scope in self.scopes.iter().rev() {
            let mut attrs = scope.attrs.clone();
            attrs.append(&mut current);
            current = match &scope.name {
                None => attrs,
                Some(_) if attrs.is_empty() => vec![],
                Some(name) => vec![Attr::group(name.clone(), attrs)],
            };
        }
        Cow::Owned(current)
    }
}
