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

use std::io;
use std::io::Write;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Duration;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use jiff::tz::TimeZone;
use logsieve::Attr;
use logsieve::Error;
use logsieve::Level;
use logsieve::Logger;
use logsieve::Record;
use logsieve::config::Config;
use logsieve::filter::FilterResult;
use logsieve::filter::SmartFilter;
use logsieve::handler::Dispatch;
use logsieve::handler::Handler;
use logsieve::handler::Sink;
use logsieve::layout::JsonLayout;
use logsieve::layout::TextLayout;
use logsieve::logger::default_logger;
use logsieve::logger::set_default_logger;
use logsieve::logger::take_default_logger;
use logsieve::trap::NoopTrap;

static GLOBAL: Mutex<()> = Mutex::new(());

#[derive(Clone, Default)]
struct Buffer(Arc<Mutex<Vec<u8>>>);

impl Write for Buffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Buffer {
    fn text(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    fn lines(&self) -> Vec<String> {
        self.text().lines().map(str::to_string).collect()
    }
}

#[derive(Debug)]
struct Failing;

impl Handler for Failing {
    fn enabled(&self, _: Level) -> bool {
        true
    }

    fn handle(&self, _: &Record) -> Result<(), Error> {
        Err(Error::new("sink is broken"))
    }

    fn with_attrs(&self, _: &[Attr]) -> Box<dyn Handler> {
        Box::new(Failing)
    }

    fn with_group(&self, _: &str) -> Box<dyn Handler> {
        Box::new(Failing)
    }
}

fn text_sink(buffer: &Buffer) -> Sink {
    Sink::new(buffer.clone())
        .with_layout(TextLayout::default().timezone(TimeZone::UTC))
        .with_min_level(Level::Debug)
}

fn record_at(time: SystemTime, level: Level, message: &'static str) -> Record {
    Record::builder()
        .time(time)
        .level(level)
        .message(message)
        .build()
}

#[test]
fn test_plain_text_output_is_exact() {
    let buffer = Buffer::default();
    let logger = Logger::new(text_sink(&buffer));

    let record = Record::builder()
        .time(UNIX_EPOCH + Duration::from_millis(1_723_416_297_172))
        .level(Level::Info)
        .message("user created")
        .attr(Attr::new("user_id", 42))
        .attr(Attr::new("email", "te**@example.com"))
        .build();
    logger.log_record(&record);

    assert_eq!(
        buffer.text(),
        "time=2024-08-11T22:44:57.172+00:00 level=INFO msg=\"user created\" user_id=42 email=te**@example.com\n"
    );
}

#[test]
fn test_smart_filter_rules() {
    let buffer = Buffer::default();
    let filter = SmartFilter::new(text_sink(&buffer)).min_level(Level::Info);
    let logger = Logger::new(filter);

    logger.debug("verbose detail", []);
    logger.info("[GIN-debug] GET /api/users --> main.listUsers", []);
    logger.info("GET /health 200", []);
    logger.info("request served", [Attr::new("path", "/metrics")]);
    logger.info("   ", []);
    logger.warn("disk almost full", [Attr::new("free", "2%")]);

    let lines = buffer.lines();
    assert_eq!(lines.len(), 1, "{lines:?}");
    assert!(lines[0].contains("msg=\"disk almost full\""));
}

#[test]
fn test_transient_errors_are_deduplicated() {
    let buffer = Buffer::default();
    let filter = SmartFilter::new(text_sink(&buffer)).dedup_window(Duration::from_secs(300));

    // record timestamps spread over hours still fall within one window of arrival
    let t = UNIX_EPOCH + Duration::from_secs(1_700_000_000);
    let message = "upstream call failed: context deadline exceeded";
    for offset in [0, 360, 7200] {
        let record = record_at(t + Duration::from_secs(offset), Level::Error, message);
        filter.handle(&record).unwrap();
    }
    let other = record_at(t, Level::Error, "write: broken pipe");
    filter.handle(&other).unwrap();

    assert_eq!(buffer.lines().len(), 2);
    assert_eq!(filter.dedup().len(), 2);
    assert_eq!(filter.dedup().window(), Duration::from_secs(300));
}

#[test]
fn test_filter_check_is_pure_for_static_rules() {
    let filter = SmartFilter::new(Dispatch::new(vec![]))
        .suppress(r"^heartbeat")
        .unwrap();

    let heartbeat = record_at(SystemTime::now(), Level::Info, "heartbeat ok");
    let normal = record_at(SystemTime::now(), Level::Info, "order placed");
    assert_eq!(filter.check(&heartbeat), FilterResult::Reject);
    assert_eq!(filter.check(&normal), FilterResult::Neutral);
    assert!(SmartFilter::new(Sink::stderr()).suppress("(").is_err());
}

#[test]
fn test_fan_out_survives_failing_member() {
    let text = Buffer::default();
    let json = Buffer::default();
    let dispatch = Dispatch::new(vec![
        Failing.into(),
        text_sink(&text).into(),
        Sink::new(json.clone())
            .with_layout(JsonLayout::default().timezone(TimeZone::UTC))
            .into(),
    ])
    .with_trap(NoopTrap::default());
    let logger = Logger::new(dispatch).with_trap(NoopTrap::default());

    logger.error("payment failed", [Attr::new("order", 7)]);

    assert_eq!(text.lines().len(), 1);
    let value: serde_json::Value = serde_json::from_str(&json.lines()[0]).unwrap();
    assert_eq!(value["level"], "ERROR");
    assert_eq!(value["msg"], "payment failed");
    assert_eq!(value["order"], 7);
}

#[test]
fn test_bound_attrs_and_groups() {
    let buffer = Buffer::default();
    let logger = Logger::new(text_sink(&buffer))
        .with_attrs(&[Attr::new("service", "billing")])
        .with_group("req");

    logger.info("handled", [Attr::new("id", "r1")]);

    let line = &buffer.lines()[0];
    assert!(line.ends_with("msg=handled service=billing req.id=r1"), "{line}");
}

#[test]
fn test_default_logger_lifecycle() {
    let _guard = GLOBAL.lock().unwrap_or_else(|e| e.into_inner());
    take_default_logger();

    assert!(!default_logger().enabled(Level::Error));

    let buffer = Buffer::default();
    assert!(set_default_logger(Logger::new(text_sink(&buffer))).is_none());
    default_logger().info("via default", []);
    assert_eq!(buffer.lines().len(), 1);

    assert!(take_default_logger().is_some());
    default_logger().info("dropped", []);
    assert_eq!(buffer.lines().len(), 1);
}

#[test]
fn test_log_crate_bridge_forwards_key_values() {
    let _guard = GLOBAL.lock().unwrap_or_else(|e| e.into_inner());
    let _ = logsieve::bridge::try_setup_log_crate();

    let buffer = Buffer::default();
    let previous = set_default_logger(Logger::new(
        Sink::new(buffer.clone()).with_layout(JsonLayout::default()),
    ));

    log::info!(status = 201, method = "POST"; "user created");
    log::debug!("below the sink level");

    take_default_logger();
    if let Some(previous) = previous {
        set_default_logger(previous);
    }

    let lines = buffer.lines();
    assert_eq!(lines.len(), 1, "{lines:?}");
    let value: serde_json::Value = serde_json::from_str(&lines[0]).unwrap();
    assert_eq!(value["msg"], "user created");
    assert_eq!(value["status"], 201);
    assert_eq!(value["method"], "POST");
}

#[test]
fn test_config_builds_file_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("logs").join("app.log");
    let config = Config::from_yaml_str(&format!(
        r#"
logger:
  level: debug
  output:
    console:
      enabled: false
    file:
      path: '{}'
      format: text
      rotation:
        max_size: 1
        max_backups: 2
        compress: false
"#,
        path.display()
    ))
    .unwrap();

    let logger = logsieve::setup::build_logger(&config).unwrap();
    logger.debug("cache warmed", [Attr::new("entries", 128u32)]);
    logger.flush();

    let content = std::fs::read_to_string(&path).unwrap();
    assert!(content.contains("level=DEBUG msg=\"cache warmed\" entries=128"), "{content}");
}
