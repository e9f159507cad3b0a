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

use std::fmt;
use std::io;
use std::io::Write;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;

use crate::Error;
use crate::attr::Attr;
use crate::attr::AttrScope;
use crate::handler::Handler;
use crate::layout::Layout;
use crate::layout::TextLayout;
use crate::record::Level;
use crate::record::Record;

type SharedWriter = Arc<Mutex<Box<dyn Write + Send>>>;

/// A handler that renders records with a [`Layout`] and writes them to an [`io::Write`].
///
/// One record is rendered and written per lock acquisition, so lines from concurrent callers
/// never interleave. Handlers derived through `with_attrs` and `with_group` share the writer and
/// the layout.
///
/// # Examples
///
/// ```
/// use logsieve::handler::Sink;
/// use logsieve::layout::ColorLayout;
/// use logsieve::record::Level;
///
/// let sink = Sink::stderr()
///     .with_layout(ColorLayout::default())
///     .with_min_level(Level::Debug);
/// ```
pub struct Sink {
    min_level: Level,
    layout: Arc<dyn Layout>,
    writer: SharedWriter,
    scope: AttrScope,
}

impl fmt::Debug for Sink {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sink")
            .field("min_level", &self.min_level)
            .field("layout", &self.layout)
            .field("scope", &self.scope)
            .finish_non_exhaustive()
    }
}

impl Sink {
    /// Create a sink writing to `writer`.
    ///
    /// Default to [`TextLayout`] and [`Level::Info`].
    pub fn new(writer: impl Write + Send + 'static) -> Self {
        Self {
            min_level: Level::Info,
            layout: Arc::new(TextLayout::default()),
            writer: Arc::new(Mutex::new(Box::new(writer))),
            scope: AttrScope::default(),
        }
    }

    /// Create a sink writing to the standard error.
    pub fn stderr() -> Self {
        Self::new(io::stderr())
    }

    /// Create a sink writing to the standard output.
    pub fn stdout() -> Self {
        Self::new(io::stdout())
    }

    /// Set the layout.
    pub fn with_layout(mut self, layout: impl Into<Box<dyn Layout>>) -> Self {
        self.layout = Arc::from(layout.into());
        self
    }

    /// Set the minimum level of records this sink accepts.
    pub fn with_min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    fn writer(&self) -> MutexGuard<'_, Box<dyn Write + Send>> {
        self.writer.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn derive(&self, scope: AttrScope) -> Sink {
        Sink {
            min_level: self.min_level,
            layout: self.layout.clone(),
            writer: self.writer.clone(),
            scope,
        }
    }
}

impl Handler for Sink {
    fn enabled(&self, level: Level) -> bool {
        level >= self.min_level
    }

    fn handle(&self, record: &Record) -> Result<(), Error> {
        if !self.enabled(record.level()) {
            return Ok(());
        }

        let attrs = self.scope.resolve(record.attrs());
        let mut writer = self.writer();
        let mut bytes = self.layout.format(record, &attrs)?;
        bytes.push(b'\n');
        writer.write_all(&bytes).map_err(Error::from_io_error)?;
        writer.flush().map_err(Error::from_io_error)?;
        Ok(())
    }

    fn with_attrs(&self, attrs: &[Attr]) -> Box<dyn Handler> {
        Box::new(self.derive(self.scope.with_attrs(attrs)))
    }

    fn with_group(&self, name: &str) -> Box<dyn Handler> {
        Box::new(self.derive(self.scope.with_group(name)))
    }

    fn flush(&self) -> Result<(), Error> {
        self.writer().flush().map_err(Error::from_io_error)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;
    use std::thread;
    use std::time::UNIX_EPOCH;

    use jiff::tz::TimeZone;

    use super::*;
    use crate::layout::ColorLayout;

    #[derive(Clone, Default)]
    struct Buffer(Arc<Mutex<Vec<u8>>>);

    impl Write for Buffer {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().write(buf)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl Buffer {
        fn contents(&self) -> String {
            String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
        }
    }

    /// Accepts at most three bytes per call.
    #[derive(Clone, Default)]
    struct ShortWriter(Buffer);

    impl Write for ShortWriter {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            let n = buf.len().min(3);
            self.0.write_all(&buf[..n])?;
            thread::yield_now();
            Ok(n)
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[derive(Debug)]
    struct FailingWriter;

    impl Write for FailingWriter {
        fn write(&mut self, _: &[u8]) -> io::Result<usize> {
            Err(io::Error::new(io::ErrorKind::BrokenPipe, "closed"))
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    fn record(level: Level, message: &'static str) -> Record {
        Record::builder()
            .time(UNIX_EPOCH)
            .level(level)
            .message(message)
            .build()
    }

    fn color_sink(buffer: &Buffer) -> Sink {
        Sink::new(buffer.clone()).with_layout(
            ColorLayout::default()
                .no_color()
                .compact(true)
                .timezone(TimeZone::UTC),
        )
    }

    #[test]
    fn test_level_gate() {
        let sink = Sink::new(io::sink()).with_min_level(Level::Warn);
        assert!(!sink.enabled(Level::Info));
        assert!(sink.enabled(Level::Warn));
        assert!(sink.enabled(Level::Error));
    }

    #[test]
    fn test_records_below_level_are_not_written() {
        let buffer = Buffer::default();
        let sink = color_sink(&buffer).with_min_level(Level::Warn);
        sink.handle(&record(Level::Info, "quiet")).unwrap();
        assert_eq!(buffer.contents(), "");
    }

    #[test]
    fn test_bound_attrs_render_before_record_attrs() {
        let buffer = Buffer::default();
        let sink = color_sink(&buffer);
        let child = sink
            .with_attrs(&[Attr::new("service", "api")])
            .with_group("request");

        let record = Record::builder()
            .time(UNIX_EPOCH)
            .message("done")
            .attr(Attr::new("status", 200))
            .build();
        child.handle(&record).unwrap();

        assert_eq!(
            buffer.contents(),
            "[INFO] 00:00:00.000 done\n    service: api\n    request:\n        status: 200\n"
        );
    }

    #[test]
    fn test_parent_unchanged_by_binding() {
        let buffer = Buffer::default();
        let sink = color_sink(&buffer);
        let _child = sink.with_attrs(&[Attr::new("service", "api")]);

        sink.handle(&record(Level::Info, "plain")).unwrap();
        assert_eq!(buffer.contents(), "[INFO] 00:00:00.000 plain\n");
    }

    #[test]
    fn test_concurrent_short_writes_keep_lines_whole() {
        let writer = ShortWriter::default();
        let sink =
            Sink::new(writer.clone()).with_layout(TextLayout::default().timezone(TimeZone::UTC));

        let handles = (0..8)
            .map(|worker| {
                let handler = sink.with_attrs(&[Attr::new("worker", worker)]);
                thread::spawn(move || {
                    for seq in 0..50 {
                        let record = Record::builder()
                            .time(UNIX_EPOCH)
                            .message("tick")
                            .attr(Attr::new("seq", seq))
                            .build();
                        handler.handle(&record).unwrap();
                    }
                })
            })
            .collect::<Vec<_>>();
        for handle in handles {
            handle.join().unwrap();
        }

        let contents = writer.0.contents();
        let mut seen = HashSet::new();
        for line in contents.lines() {
            assert!(line.starts_with("time=1970-01-01T00:00:00"), "{line}");
            let (_, tail) = line.split_once(" level=INFO msg=tick worker=").unwrap();
            let (worker, seq) = tail.split_once(" seq=").unwrap();
            let worker: usize = worker.parse().unwrap();
            let seq: usize = seq.parse().unwrap();
            assert!(seen.insert((worker, seq)), "{line}");
        }
        assert_eq!(seen.len(), 400);
        assert_eq!(contents.lines().count(), 400);
    }

    #[test]
    fn test_poisoned_writer_still_writes() {
        let buffer = Buffer::default();
        let sink = Sink::new(buffer.clone()).with_layout(TextLayout::default());

        let writer = sink.writer.clone();
        let result = thread::spawn(move || {
            let _guard = writer.lock().unwrap();
            panic!("writer owner panicked");
        })
        .join();
        assert!(result.is_err());
        assert!(sink.writer.is_poisoned());

        sink.handle(&record(Level::Warn, "after")).unwrap();
        sink.flush().unwrap();
        assert!(buffer.contents().contains("level=WARN msg=after"));
    }

    #[test]
    fn test_write_failure_is_returned() {
        let sink = Sink::new(FailingWriter);
        let err = sink.handle(&record(Level::Error, "lost")).unwrap_err();
        assert_eq!(err.message(), "failed to perform io");
    }
}
