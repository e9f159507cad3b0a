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

use std::fmt::Write;

use jiff::tz::TimeZone;

use crate::Error;
use crate::attr::Attr;
use crate::attr::Value;
use crate::layout::Layout;
use crate::layout::attr_key;
use crate::layout::timestamp;
use crate::record::Record;

/// A single-line key=value layout in the logfmt style.
///
/// Output format:
///
/// ```text
/// time=2024-08-11T22:44:57.172+00:00 level=INFO msg="HTTP Request" method=GET request.id=req_1
/// ```
///
/// Group members are flattened with dotted keys. Values containing spaces, quotes, `=` or
/// control characters are quoted and escaped. Top-level attributes named like a leading field
/// get an `attr.` prefix.
///
/// # Examples
///
/// ```
/// use jiff::tz::TimeZone;
/// use logsieve::layout::TextLayout;
///
/// let layout = TextLayout::default().timezone(TimeZone::UTC);
/// ```
#[derive(Default, Debug, Clone)]
pub struct TextLayout {
    tz: Option<TimeZone>,
}

impl TextLayout {
    /// Set the timezone for timestamps.
    pub fn timezone(mut self, tz: TimeZone) -> Self {
        self.tz = Some(tz);
        self
    }
}

struct KvFormatter {
    text: String,
}

impl KvFormatter {
    fn visit(&mut self, prefix: &str, attr: &Attr) {
        let key = if prefix.is_empty() {
            attr_key(attr.key()).into_owned()
        } else {
            format!("{prefix}.{}", attr.key())
        };

        match attr.value() {
            Value::Group(attrs) => {
                for attr in attrs {
                    self.visit(&key, attr);
                }
            }
            value => self.write_pair(&key, &value.to_string()),
        }
    }

    fn write_pair(&mut self, key: &str, value: &str) {
        let needs_quote = value.is_empty()
            || value
                .chars()
                .any(|c| c == ' ' || c == '=' || c == '"' || c.is_control());
        if needs_quote {
            let _ = write!(&mut self.text, " {key}=\"{}\"", value.escape_debug());
        } else {
            let _ = write!(&mut self.text, " {key}={value}");
        }
    }
}

impl Layout for TextLayout {
    fn format(&self, record: &Record, attrs: &[Attr]) -> Result<Vec<u8>, Error> {
        let ts = timestamp(record)?;
        let tz = self.tz.clone().unwrap_or_else(TimeZone::system);
        let offset = tz.to_offset(ts);
        let time = ts.display_with_offset(offset);

        let mut formatter = KvFormatter {
            text: format!("time={time:.3}"),
        };
        formatter.write_pair("level", record.level().as_str());
        formatter.write_pair("msg", record.message());
        for attr in attrs {
            formatter.visit("", attr);
        }

        Ok(formatter.text.into_bytes())
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;
    use std::time::UNIX_EPOCH;

    use super::*;
    use crate::record::Level;

    #[test]
    fn test_text_layout_line() {
        let layout = TextLayout::default().timezone(TimeZone::UTC);
        let record = Record::builder()
            .time(UNIX_EPOCH + Duration::from_millis(1_723_416_297_172))
            .level(Level::Warn)
            .message("HTTP Request")
            .attr(Attr::new("method", "GET"))
            .attr(Attr::group("request", [Attr::new("id", "req_1")]))
            .attr(Attr::new("note", "a=b"))
            .build();

        let line = String::from_utf8(layout.format(&record, record.attrs()).unwrap()).unwrap();
        assert_eq!(
            line,
            r#"time=2024-08-11T22:44:57.172+00:00 level=WARN msg="HTTP Request" method=GET request.id=req_1 note="a=b""#
        );
    }

    #[test]
    fn test_colliding_attrs_are_prefixed() {
        let layout = TextLayout::default().timezone(TimeZone::UTC);
        let record = Record::builder()
            .time(UNIX_EPOCH)
            .message("login")
            .attr(Attr::new("msg", "spoofed"))
            .attr(Attr::group("auth", [Attr::new("level", 2)]))
            .build();

        let line = String::from_utf8(layout.format(&record, record.attrs()).unwrap()).unwrap();
        assert!(line.ends_with("msg=login attr.msg=spoofed auth.level=2"), "{line}");
    }

    #[test]
    fn test_control_characters_are_escaped() {
        let layout = TextLayout::default().timezone(TimeZone::UTC);
        let record = Record::builder()
            .time(UNIX_EPOCH)
            .message("line one\nline two")
            .build();

        let line = String::from_utf8(layout.format(&record, &[]).unwrap()).unwrap();
        assert!(line.ends_with(r#"msg="line one\nline two""#));
        assert!(!line.contains('\n'));
    }
}
