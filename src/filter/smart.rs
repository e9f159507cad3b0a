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
use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;

use crate::Error;
use crate::attr::Attr;
use crate::filter::DedupCache;
use crate::filter::FilterResult;
use crate::handler::Handler;
use crate::record::Level;
use crate::record::Record;

static FRAMEWORK_DEBUG: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\[GIN-debug\]|\[GIN\]").expect("framework pattern must compile")
});

static CDP_NOISE: LazyLock<[Regex; 2]> = LazyLock::new(|| {
    [
        Regex::new(r"could not unmarshal event.*CookiePartitionKey"),
        Regex::new(r"chromedp: could not retrieve|context deadline exceeded.*chromedp"),
    ]
    .map(|re| re.expect("cdp pattern must compile"))
});

static HEALTH_CHECK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"/health|/ping|/status|/metrics").expect("health pattern must compile")
});

const TRANSIENT_ERRORS: [&str; 4] = [
    "context canceled",
    "context deadline exceeded",
    "connection reset by peer",
    "broken pipe",
];

/// A handler that drops noise before it reaches the inner handler.
///
/// Rules run in order and the first rejection wins:
///
/// 1. records below the minimum level;
/// 2. framework chatter (`[GIN-debug] ...` and `[GIN] ...` access lines) when enabled, browser protocol noise, and any
///    pattern added with [`suppress`](SmartFilter::suppress), regardless of level;
/// 3. health check traffic when enabled, matched on the message or a `path` / `url` attribute;
/// 4. repeated transient network errors within the dedup window;
/// 5. empty messages.
///
/// Handlers derived through `with_attrs` and `with_group` share the dedup memory.
///
/// # Examples
///
/// ```
/// use std::time::Duration;
///
/// use logsieve::filter::SmartFilter;
/// use logsieve::handler::Sink;
///
/// let filter = SmartFilter::new(Sink::stderr())
///     .dedup_window(Duration::from_secs(60))
///     .suppress(r"^heartbeat")
///     .unwrap();
/// ```
#[derive(Debug)]
pub struct SmartFilter {
    inner: Box<dyn Handler>,
    min_level: Level,
    ignore_framework_debug: bool,
    ignore_health_check: bool,
    patterns: Arc<Vec<Regex>>,
    dedup: Arc<DedupCache>,
}

impl SmartFilter {
    /// Wrap `inner` with the default rules.
    pub fn new(inner: impl Into<Box<dyn Handler>>) -> Self {
        Self {
            inner: inner.into(),
            min_level: Level::Info,
            ignore_framework_debug: true,
            ignore_health_check: true,
            patterns: Arc::new(vec![]),
            dedup: Arc::new(DedupCache::default()),
        }
    }

    /// Set the minimum level. Default to [`Level::Info`].
    pub fn min_level(mut self, level: Level) -> Self {
        self.min_level = level;
        self
    }

    /// Whether to drop framework debug chatter. Default to `true`.
    pub fn ignore_framework_debug(mut self, ignore: bool) -> Self {
        self.ignore_framework_debug = ignore;
        self
    }

    /// Whether to drop health check traffic. Default to `true`.
    pub fn ignore_health_check(mut self, ignore: bool) -> Self {
        self.ignore_health_check = ignore;
        self
    }

    /// Set the dedup window of transient errors. Default to five minutes.
    pub fn dedup_window(mut self, window: Duration) -> Self {
        self.dedup = Arc::new(DedupCache::new(window));
        self
    }

    /// Drop every record whose message matches `pattern`.
    ///
    /// # Errors
    ///
    /// Return an error if the pattern is not a valid regular expression.
    pub fn suppress(mut self, pattern: &str) -> Result<Self, Error> {
        let regex = Regex::new(pattern).map_err(|err| {
            Error::new("invalid suppression pattern")
                .with_context("pattern", pattern)
                .with_source(err)
        })?;
        Arc::make_mut(&mut self.patterns).push(regex);
        Ok(self)
    }

    /// The dedup memory shared by this filter and every filter derived from it.
    pub fn dedup(&self) -> &Arc<DedupCache> {
        &self.dedup
    }

    /// Run the rule chain against `record`.
    pub fn check(&self, record: &Record) -> FilterResult {
        let rules = [
            Self::check_level,
            Self::check_static_patterns,
            Self::check_health,
            Self::check_transient,
            Self::check_empty,
        ];

        for rule in rules {
            match rule(self, record) {
                FilterResult::Neutral => {}
                result => return result,
            }
        }
        FilterResult::Neutral
    }

    fn check_level(&self, record: &Record) -> FilterResult {
        if record.level() < self.min_level {
            FilterResult::Reject
        } else {
            FilterResult::Neutral
        }
    }

    fn check_static_patterns(&self, record: &Record) -> FilterResult {
        let msg = record.message();
        let framework = self.ignore_framework_debug && FRAMEWORK_DEBUG.is_match(msg);
        let cdp = CDP_NOISE.iter().any(|re| re.is_match(msg));
        let user = self.patterns.iter().any(|re| re.is_match(msg));

        if framework || cdp || user {
            FilterResult::Reject
        } else {
            FilterResult::Neutral
        }
    }

    fn check_health(&self, record: &Record) -> FilterResult {
        if !self.ignore_health_check {
            return FilterResult::Neutral;
        }

        let in_message = HEALTH_CHECK.is_match(record.message());
        let in_attrs = record
            .attrs()
            .iter()
            .filter(|attr| matches!(attr.key(), "path" | "url"))
            .any(|attr| HEALTH_CHECK.is_match(&attr.value().to_string()));

        if in_message || in_attrs {
            FilterResult::Reject
        } else {
            FilterResult::Neutral
        }
    }

    fn check_transient(&self, record: &Record) -> FilterResult {
        let msg = record.message().to_lowercase();
        if !TRANSIENT_ERRORS.iter().any(|e| msg.contains(e)) {
            return FilterResult::Neutral;
        }

        match self.dedup.check(record.message()) {
            FilterResult::Reject => FilterResult::Reject,
            _ => FilterResult::Neutral,
        }
    }

    fn check_empty(&self, record: &Record) -> FilterResult {
        if record.message().trim().is_empty() {
            FilterResult::Reject
        } else {
            FilterResult::Neutral
        }
    }

    fn derive(&self, inner: Box<dyn Handler>) -> SmartFilter {
        SmartFilter {
            inner,
            min_level: self.min_level,
            ignore_framework_debug: self.ignore_framework_debug,
            ignore_health_check: self.ignore_health_check,
            patterns: self.patterns.clone(),
            dedup: self.dedup.clone(),
        }
    }
}

impl Handler for SmartFilter {
    fn enabled(&self, level: Level) -> bool {
        level >= self.min_level && self.inner.enabled(level)
    }

    fn handle(&self, record: &Record) -> Result<(), Error> {
        if self.check(record) == FilterResult::Reject {
            return Ok(());
        }
        if !self.inner.enabled(record.level()) {
            return Ok(());
        }
        self.inner.handle(record)
    }

    fn with_attrs(&self, attrs: &[Attr]) -> Box<dyn Handler> {
        Box::new(self.derive(self.inner.with_attrs(attrs)))
    }

    fn with_group(&self, name: &str) -> Box<dyn Handler> {
        Box::new(self.derive(self.inner.with_group(name)))
    }

    fn flush(&self) -> Result<(), Error> {
        self.inner.flush()
    }
}
