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

use std::borrow::Cow;
use std::fmt::Write;
use std::sync::Mutex;
use std::time::Duration;
use std::time::SystemTime;

use colored::Color;
use colored::ColoredString;
use colored::Colorize;
use jiff::tz::TimeZone;

use crate::Error;
use crate::attr::Attr;
use crate::attr::Value;
use crate::highlight::highlight;
use crate::layout::Layout;
use crate::layout::timestamp;
use crate::record::Level;
use crate::record::Record;

const INDENT: &str = "    ";
const SEPARATOR_GAP: Duration = Duration::from_millis(200);

/// A human-oriented, multi-line colored layout.
///
/// Output format:
///
/// ```text
/// [INFO] 2024-08-11 22:44:57.172 HTTP Request
///     method: POST
///     status: 201
///     headers:
///         content-type: application/json
/// ```
///
/// Well-known keys such as `status`, `latency` or `error` get a dedicated style; other values and
/// the message are passed through keyword highlighting unless it is disabled. When more than
/// 200ms pass between two records, a blank line is emitted first, unless compact mode is on.
///
/// # Examples
///
/// ```
/// use logsieve::layout::ColorLayout;
///
/// let layout = ColorLayout::default().compact(true).highlight(false);
/// ```
#[derive(Debug)]
pub struct ColorLayout {
    colors: LevelColor,
    no_color: bool,
    highlight: bool,
    compact: bool,
    timezone: TimeZone,
    last_time: Mutex<Option<SystemTime>>,
}

impl Default for ColorLayout {
    fn default() -> Self {
        Self {
            colors: LevelColor::default(),
            no_color: false,
            highlight: true,
            compact: false,
            timezone: TimeZone::system(),
            last_time: Mutex::new(None),
        }
    }
}

impl ColorLayout {
    /// Disable colored output.
    pub fn no_color(mut self) -> Self {
        self.no_color = true;
        self
    }

    /// Enable or disable keyword highlighting of messages and values. Default to enabled.
    pub fn highlight(mut self, enabled: bool) -> Self {
        self.highlight = enabled;
        self
    }

    /// Compact mode prints only the time of day and never inserts separator lines.
    pub fn compact(mut self, compact: bool) -> Self {
        self.compact = compact;
        self
    }

    /// Set the timezone for timestamps.
    ///
    /// Defaults to the system timezone if not set.
    pub fn timezone(mut self, tz: TimeZone) -> Self {
        self.timezone = tz;
        self
    }

    /// Customize the color of a log level.
    ///
    /// No effect if `no_color` is set.
    pub fn level_color(mut self, level: Level, color: Color) -> Self {
        match level {
            Level::Debug => self.colors.debug = color,
            Level::Info => self.colors.info = color,
            Level::Warn => self.colors.warn = color,
            Level::Error => self.colors.error = color,
        }
        self
    }

    fn paint(&self, text: &str, style: impl FnOnce(&str) -> ColoredString) -> String {
        if self.no_color {
            text.to_string()
        } else {
            style(text).to_string()
        }
    }

    fn decorate<'a>(&self, text: &'a str) -> Cow<'a, str> {
        if self.highlight && !self.no_color {
            highlight(text)
        } else {
            Cow::Borrowed(text)
        }
    }

    fn needs_separator(&self, now: SystemTime) -> bool {
        let mut last = self.last_time.lock().unwrap_or_else(|e| e.into_inner());
        let previous = last.replace(now);
        if self.compact {
            return false;
        }
        match previous {
            Some(previous) => now
                .duration_since(previous)
                .is_ok_and(|elapsed| elapsed > SEPARATOR_GAP),
            None => false,
        }
    }

    fn write_attr(&self, out: &mut String, attr: &Attr, depth: usize) {
        let indent = INDENT.repeat(depth);
        let key = attr.key();
        let value = attr.value();

        if let Value::Group(attrs) = value {
            if attrs.is_empty() {
                return;
            }
            let _ = write!(out, "\n{indent}{}", self.paint(&format!("{key}:"), |s| s.cyan()));
            for attr in attrs {
                self.write_attr(out, attr, depth + 1);
            }
            return;
        }

        if matches!(key, "error" | "stack" | "trace") {
            let _ = write!(
                out,
                "\n{indent}{}",
                self.paint(&format!("{key}:"), |s| s.bright_red())
            );
            let text = value.to_string();
            for line in split_lines(&text) {
                if !line.is_empty() {
                    let _ = write!(
                        out,
                        "\n{indent}{INDENT}{}",
                        self.paint(line, |s| s.bright_red())
                    );
                }
            }
            return;
        }

        let _ = write!(out, "\n{indent}{} ", self.paint(&format!("{key}:"), |s| s.cyan()));
        let text = value.to_string();
        let styled = match key {
            "method" => self.paint(&text, |s| s.bright_blue().bold()),
            "status" | "status_code" => match value.as_i64() {
                Some(code) if code >= 500 => self.paint(&text, |s| s.red().bold()),
                Some(code) if code >= 400 => self.paint(&text, |s| s.yellow().bold()),
                Some(code) if code >= 200 => self.paint(&text, |s| s.green().bold()),
                _ => text,
            },
            "duration" | "latency" => self.paint(&text, |s| s.magenta()),
            "url" | "path" => self.paint(&text, |s| s.cyan().underline()),
            "ip" | "client_ip" => self.paint(&text, |s| s.yellow()),
            "cache" | "cache_status" => match text.as_str() {
                "HIT" => self.paint(&text, |s| s.green()),
                "MISS" => self.paint(&text, |s| s.yellow()),
                _ => self.paint(&text, |s| s.magenta()),
            },
            "user_id" | "session_id" => self.paint(&text, |s| s.cyan().bold()),
            _ => self.decorate(&text).into_owned(),
        };
        out.push_str(&styled);
    }
}

// splits on real newlines and on escaped "\n" sequences
fn split_lines(text: &str) -> impl Iterator<Item = &str> {
    text.split('\n').flat_map(|line| line.split("\\n"))
}

impl Layout for ColorLayout {
    fn format(&self, record: &Record, attrs: &[Attr]) -> Result<Vec<u8>, Error> {
        let ts = timestamp(record)?;
        let zoned = ts.to_zoned(self.timezone.clone());
        let time = if self.compact {
            format!("{}.{:03}", zoned.strftime("%H:%M:%S"), zoned.millisecond())
        } else {
            format!(
                "{}.{:03}",
                zoned.strftime("%Y-%m-%d %H:%M:%S"),
                zoned.millisecond()
            )
        };

        let mut out = String::new();
        if self.needs_separator(record.time()) {
            out.push('\n');
        }

        let level = self
            .colors
            .colorize_record_level(self.no_color, record.level());
        let message = self.decorate(record.message());
        let _ = write!(out, "{level} {time} {message}");

        for attr in attrs {
            self.write_attr(&mut out, attr, 1);
        }

        Ok(out.into_bytes())
    }
}

/// Colors for different log levels.
#[derive(Debug, Clone)]
struct LevelColor {
    error: Color,
    warn: Color,
    info: Color,
    debug: Color,
}

impl Default for LevelColor {
    fn default() -> Self {
        Self {
            error: Color::Red,
            warn: Color::Yellow,
            info: Color::Green,
            debug: Color::BrightWhite,
        }
    }
}

impl LevelColor {
    /// Colorize the bracketed log level tag.
    fn colorize_record_level(&self, no_color: bool, level: Level) -> ColoredString {
        let tag = format!("[{level}]");
        if no_color {
            ColoredString::from(tag)
        } else {
            let color = match level {
                Level::Error => self.error,
                Level::Warn => self.warn,
                Level::Info => self.info,
                Level::Debug => self.debug,
            };
            ColoredString::from(tag).color(color)
        }
    }
}
