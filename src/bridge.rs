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

//! Forward records of the [`log`] crate to the default logger.

use std::borrow::Cow;

use crate::attr::Attr;
use crate::attr::Value;
use crate::logger::default_logger;
use crate::record::Level;
use crate::record::Record;

struct LogCrateLogger(());

impl log::Log for LogCrateLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        default_logger().enabled(metadata.level().into())
    }

    fn log(&self, record: &log::Record) {
        let logger = default_logger();
        if logger.enabled(record.level().into()) {
            logger.log_record(&convert(record));
        }
    }

    fn flush(&self) {
        default_logger().flush();
    }
}

/// Set up the log crate global logger.
///
/// This function calls [`log::set_logger`] so that every `log` macro, key-values included, is
/// forwarded to the logger installed by [`set_default_logger`](crate::logger::set_default_logger)
/// at the time of the call. Records emitted while no default logger is installed are discarded.
///
/// This function will set the global maximum log level to `Trace`. To override this, call
/// [`log::set_max_level`] after this function.
///
/// # Errors
///
/// Return an error if the log crate global logger has already been set.
pub fn try_setup_log_crate() -> Result<(), log::SetLoggerError> {
    static LOGGER: LogCrateLogger = LogCrateLogger(());
    log::set_logger(&LOGGER)?;
    log::set_max_level(log::LevelFilter::Trace);
    Ok(())
}

/// Set up the log crate global logger.
///
/// See [`try_setup_log_crate`].
///
/// # Panics
///
/// Panic if the log crate global logger has already been set.
///
/// # Examples
///
/// ```
/// logsieve::bridge::setup_log_crate();
/// log::info!(user_id = 42; "user signed in");
/// ```
pub fn setup_log_crate() {
    try_setup_log_crate().expect(
        "logsieve::bridge::setup_log_crate must be called before the log crate global logger initialized",
    )
}

fn convert(record: &log::Record) -> Record {
    let message: Cow<'static, str> = match record.args().as_str() {
        Some(s) => Cow::Borrowed(s),
        None => Cow::Owned(record.args().to_string()),
    };

    let mut visitor = AttrVisitor { attrs: vec![] };
    // collecting into a vec never fails
    let _ = record.key_values().visit(&mut visitor);

    Record::builder()
        .level(Level::from(record.level()))
        .message(message)
        .attrs(visitor.attrs)
        .build()
}

struct AttrVisitor {
    attrs: Vec<Attr>,
}

impl<'kvs> log::kv::VisitSource<'kvs> for AttrVisitor {
    fn visit_pair(
        &mut self,
        key: log::kv::Key<'kvs>,
        value: log::kv::Value<'kvs>,
    ) -> Result<(), log::kv::Error> {
        self.attrs
            .push(Attr::new(key.as_str().to_string(), convert_value(&value)));
        Ok(())
    }
}

fn convert_value(value: &log::kv::Value) -> Value {
    if let Some(v) = value.to_bool() {
        Value::Bool(v)
    } else if let Some(v) = value.to_i64() {
        Value::Int(v)
    } else if let Some(v) = value.to_u64() {
        Value::Uint(v)
    } else if let Some(v) = value.to_f64() {
        Value::Float(v)
    } else {
        Value::Str(Cow::Owned(value.to_string()))
    }
}
