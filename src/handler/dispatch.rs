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

use std::sync::Arc;

use crate::Error;
use crate::attr::Attr;
use crate::handler::Handler;
use crate::record::Level;
use crate::record::Record;
use crate::trap::DefaultTrap;
use crate::trap::Trap;

/// A handler that forwards every record to each enabled member.
///
/// A failing member never stops the others: its error is reported to the trap and the dispatch
/// itself always succeeds. A dispatch without members accepts nothing.
///
/// # Examples
///
/// ```
/// use logsieve::handler::Dispatch;
/// use logsieve::handler::Sink;
///
/// let dispatch = Dispatch::new(vec![Sink::stderr().into(), Sink::stdout().into()]);
/// ```
#[derive(Debug)]
pub struct Dispatch {
    handlers: Vec<Box<dyn Handler>>,
    trap: Arc<dyn Trap>,
}

impl Dispatch {
    /// Create a dispatch over `handlers`.
    pub fn new(handlers: Vec<Box<dyn Handler>>) -> Self {
        Self {
            handlers,
            trap: Arc::new(DefaultTrap::default()),
        }
    }

    /// Set the trap receiving member errors.
    ///
    /// Default to [`DefaultTrap`].
    pub fn with_trap(mut self, trap: impl Into<Box<dyn Trap>>) -> Self {
        self.trap = Arc::from(trap.into());
        self
    }

    /// The number of members.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// Whether the dispatch has no member.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    fn map(&self, f: impl Fn(&dyn Handler) -> Box<dyn Handler>) -> Dispatch {
        Dispatch {
            handlers: self.handlers.iter().map(|h| f(h.as_ref())).collect(),
            trap: self.trap.clone(),
        }
    }
}

impl Handler for Dispatch {
    fn enabled(&self, level: Level) -> bool {
        self.handlers.iter().any(|h| h.enabled(level))
    }

    fn handle(&self, record: &Record) -> Result<(), Error> {
        for handler in &self.handlers {
            if !handler.enabled(record.level()) {
                continue;
            }
            if let Err(err) = handler.handle(record) {
                let err = Error::new("failed to handle record")
                    .with_context("message", record.message())
                    .with_source(err);
                self.trap.trap(&err);
            }
        }
        Ok(())
    }

    fn with_attrs(&self, attrs: &[Attr]) -> Box<dyn Handler> {
        Box::new(self.map(|h| h.with_attrs(attrs)))
    }

    fn with_group(&self, name: &str) -> Box<dyn Handler> {
        Box::new(self.map(|h| h.with_group(name)))
    }

    fn flush(&self) -> Result<(), Error> {
        for handler in &self.handlers {
            if let Err(err) = handler.flush() {
                self.trap.trap(&err);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;

    #[derive(Debug, Default)]
    struct Recorder {
        min_level: Option<Level>,
        fail: bool,
        seen: Arc<Mutex<Vec<String>>>,
    }

    impl Handler for Recorder {
        fn enabled(&self, level: Level) -> bool {
            self.min_level.is_none_or(|min| level >= min)
        }

        fn handle(&self, record: &Record) -> Result<(), Error> {
            if self.fail {
                return Err(Error::new("member failed"));
            }
            self.seen.lock().unwrap().push(record.message().to_string());
            Ok(())
        }

        fn with_attrs(&self, _: &[Attr]) -> Box<dyn Handler> {
            Box::new(Recorder {
                min_level: self.min_level,
                fail: self.fail,
                seen: self.seen.clone(),
            })
        }

        fn with_group(&self, _: &str) -> Box<dyn Handler> {
            self.with_attrs(&[])
        }
    }

    #[derive(Debug, Default, Clone)]
    struct CountingTrap(Arc<Mutex<usize>>);

    impl Trap for CountingTrap {
        fn trap(&self, _: &Error) {
            *self.0.lock().unwrap() += 1;
        }
    }

    #[test]
    fn test_failing_member_does_not_stop_others() {
        let seen = Arc::new(Mutex::new(vec![]));
        let trap = CountingTrap::default();
        let dispatch = Dispatch::new(vec![
            Recorder {
                fail: true,
                ..Default::default()
            }
            .into(),
            Recorder {
                seen: seen.clone(),
                ..Default::default()
            }
            .into(),
        ])
        .with_trap(trap.clone());

        let result = dispatch.handle(&Record::new(Level::Info, "fan out"));
        assert!(result.is_ok());
        assert_eq!(*seen.lock().unwrap(), vec!["fan out".to_string()]);
        assert_eq!(*trap.0.lock().unwrap(), 1);
    }

    #[test]
    fn test_enabled_if_any_member_enabled() {
        let dispatch = Dispatch::new(vec![
            Recorder {
                min_level: Some(Level::Error),
                ..Default::default()
            }
            .into(),
            Recorder {
                min_level: Some(Level::Warn),
                ..Default::default()
            }
            .into(),
        ]);
        assert!(!dispatch.enabled(Level::Info));
        assert!(dispatch.enabled(Level::Warn));
    }

    #[test]
    fn test_only_enabled_members_receive() {
        let quiet = Arc::new(Mutex::new(vec![]));
        let loud = Arc::new(Mutex::new(vec![]));
        let dispatch = Dispatch::new(vec![
            Recorder {
                min_level: Some(Level::Error),
                seen: quiet.clone(),
                ..Default::default()
            }
            .into(),
            Recorder {
                seen: loud.clone(),
                ..Default::default()
            }
            .into(),
        ]);

        dispatch.handle(&Record::new(Level::Info, "hello")).unwrap();
        assert!(quiet.lock().unwrap().is_empty());
        assert_eq!(loud.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_empty_dispatch_accepts_nothing() {
        let dispatch = Dispatch::new(vec![]);
        assert!(dispatch.is_empty());
        assert!(!dispatch.enabled(Level::Error));
        assert!(dispatch.handle(&Record::new(Level::Error, "x")).is_ok());
    }

    #[test]
    fn test_binding_maps_every_member() {
        let seen = Arc::new(Mutex::new(vec![]));
        let dispatch = Dispatch::new(vec![
            Recorder {
                seen: seen.clone(),
                ..Default::default()
            }
            .into(),
            Recorder {
                seen: seen.clone(),
                ..Default::default()
            }
            .into(),
        ]);

        let child = dispatch.with_group("g");
        child.handle(&Record::new(Level::Info, "m")).unwrap();
        assert_eq!(seen.lock().unwrap().len(), 2);
    }
}
