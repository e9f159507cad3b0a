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

use jiff::tz::TimeZone;
use serde_json::Map;
use serde_json::Number;

use crate::Error;
use crate::attr::Attr;
use crate::attr::Value;
use crate::layout::Layout;
use crate::layout::attr_key;
use crate::layout::timestamp;
use crate::record::Record;

/// A JSON layout for formatting log records.
///
/// Output format:
///
/// ```json
/// {"time":"2024-08-11T22:44:57.172+00:00","level":"INFO","msg":"HTTP Request","method":"GET","request":{"id":"req_1"}}
/// ```
///
/// Groups become nested objects and durations are written as integer nanoseconds. Floats that
/// JSON cannot represent are written as strings. Top-level attributes named `time`, `level` or
/// `msg` are written as `attr.time`, `attr.level` and `attr.msg`.
///
/// # Examples
///
/// ```
/// use logsieve::layout::JsonLayout;
///
/// let json_layout = JsonLayout::default();
/// ```
#[derive(Default, Debug, Clone)]
pub struct JsonLayout {
    tz: Option<TimeZone>,
}

impl JsonLayout {
    /// Set the timezone for timestamps.
    pub fn timezone(mut self, tz: TimeZone) -> Self {
        self.tz = Some(tz);
        self
    }
}

fn to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Str(s) => serde_json::Value::String(s.to_string()),
        Value::Int(v) => serde_json::Value::from(*v),
        Value::Uint(v) => serde_json::Value::from(*v),
        Value::Float(v) => match Number::from_f64(*v) {
            Some(n) => serde_json::Value::Number(n),
            None => serde_json::Value::String(v.to_string()),
        },
        Value::Bool(v) => serde_json::Value::Bool(*v),
        Value::Duration(d) => {
            serde_json::Value::from(u64::try_from(d.as_nanos()).unwrap_or(u64::MAX))
        }
        Value::Group(attrs) => serde_json::Value::Object(collect(attrs)),
    }
}

fn collect(attrs: &[Attr]) -> Map<String, serde_json::Value> {
    let mut map = Map::new();
    for attr in attrs {
        if attr.value().is_empty_group() {
            continue;
        }
        map.insert(attr.key().to_string(), to_json(attr.value()));
    }
    map
}

fn write_field(out: &mut Vec<u8>, key: &str, value: &serde_json::Value) -> Result<(), Error> {
    out.push(if out.is_empty() { b'{' } else { b',' });
    serde_json::to_writer(&mut *out, key)
        .and_then(|()| {
            out.push(b':');
            serde_json::to_writer(&mut *out, value)
        })
        .map_err(|err| {
            Error::new("failed to serialize field")
                .with_context("key", key)
                .with_source(err)
        })
}

impl Layout for JsonLayout {
    fn format(&self, record: &Record, attrs: &[Attr]) -> Result<Vec<u8>, Error> {
        let ts = timestamp(record)?;
        let tz = self.tz.clone().unwrap_or_else(TimeZone::system);
        let offset = tz.to_offset(ts);
        let time = format!("{:.3}", ts.display_with_offset(offset));

        let mut out = Vec::new();
        write_field(&mut out, "time", &time.into())?;
        write_field(&mut out, "level", &record.level().as_str().into())?;
        write_field(&mut out, "msg", &record.message().into())?;
        for attr in attrs {
            if attr.value().is_empty_group() {
                continue;
            }
            write_field(&mut out, &attr_key(attr.key()), &to_json(attr.value()))?;
        }
        out.push(b'}');

        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;
    use std::time::UNIX_EPOCH;

    use super::*;
    use crate::record::Level;

    fn render(record: &Record) -> serde_json::Value {
        let layout = JsonLayout::default().timezone(TimeZone::UTC);
        let bytes = layout.format(record, record.attrs()).unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[test]
    fn test_json_layout_nests_groups() {
        let record = Record::builder()
            .time(UNIX_EPOCH + Duration::from_millis(1_723_416_297_172))
            .level(Level::Error)
            .message("HTTP Request")
            .attr(Attr::new("status", 503))
            .attr(Attr::new("latency", Duration::from_millis(3)))
            .attr(Attr::group("request", [Attr::new("id", "req_1")]))
            .attr(Attr::group("empty", []))
            .build();

        let value = render(&record);
        assert_eq!(value["time"], "2024-08-11T22:44:57.172+00:00");
        assert_eq!(value["level"], "ERROR");
        assert_eq!(value["msg"], "HTTP Request");
        assert_eq!(value["status"], 503);
        assert_eq!(value["latency"], 3_000_000);
        assert_eq!(value["request"]["id"], "req_1");
        assert!(value.get("empty").is_none());
    }

    #[test]
    fn test_non_finite_float_becomes_string() {
        let record = Record::builder()
            .time(UNIX_EPOCH)
            .message("ratio")
            .attr(Attr::new("ratio", f64::NAN))
            .build();

        assert_eq!(render(&record)["ratio"], "NaN");
    }

    #[test]
    fn test_colliding_attrs_are_prefixed() {
        let record = Record::builder()
            .time(UNIX_EPOCH)
            .message("login")
            .attr(Attr::new("msg", "from client"))
            .attr(Attr::new("level", 3))
            .attr(Attr::new("time", "yesterday"))
            .attr(Attr::group("auth", [Attr::new("msg", "ok")]))
            .build();

        let value = render(&record);
        assert_eq!(value["msg"], "login");
        assert_eq!(value["level"], "INFO");
        assert_eq!(value["attr.msg"], "from client");
        assert_eq!(value["attr.level"], 3);
        assert_eq!(value["attr.time"], "yesterday");
        assert_eq!(value["auth"]["msg"], "ok");
    }

    #[test]
    fn test_leading_fields_come_first() {
        let layout = JsonLayout::default().timezone(TimeZone::UTC);
        let record = Record::builder()
            .time(UNIX_EPOCH)
            .message("m")
            .attr(Attr::new("a", 1))
            .build();
        let line = String::from_utf8(layout.format(&record, record.attrs()).unwrap()).unwrap();
        assert!(line.starts_with(r#"{"time":"#));
        assert!(line.ends_with(r#""a":1}"#));
    }
}
