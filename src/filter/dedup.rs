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

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;
use std::time::Instant;

use crate::clock::Clock;
use crate::filter::FilterResult;

/// Time-windowed memory of recently seen messages.
///
/// A message seen again within the window is rejected; the first sighting, or one after the
/// window has elapsed, is accepted and restarts the window. Windows are measured on a monotonic
/// clock when the message is checked, so record timestamps and wall-clock steps do not matter.
#[derive(Debug)]
pub struct DedupCache {
    window: Duration,
    clock: Clock,
    entries: Mutex<HashMap<String, Instant>>,
}

impl Default for DedupCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_WINDOW)
    }
}

impl DedupCache {
    /// The window used unless configured otherwise.
    pub const DEFAULT_WINDOW: Duration = Duration::from_secs(5 * 60);

    /// Create an empty cache with the given window.
    pub fn new(window: Duration) -> Self {
        Self::with_clock(window, Clock::DefaultClock)
    }

    pub(crate) fn with_clock(window: Duration, clock: Clock) -> Self {
        Self {
            window,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// The dedup window.
    pub fn window(&self) -> Duration {
        self.window
    }

    /// The number of remembered messages.
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    /// Whether no message is remembered.
    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, Instant>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Decide whether `key` seen now is a duplicate.
    ///
    /// Purging stale entries, the lookup and the insert happen under one lock.
    pub fn check(&self, key: &str) -> FilterResult {
        let window = self.window;
        let mut entries = self.entries();
        let now = self.clock.instant();
        let elapsed = |since: Instant| now.saturating_duration_since(since);

        entries.retain(|_, seen| elapsed(*seen) <= window);

        if entries.get(key).is_some_and(|seen| elapsed(*seen) < window) {
            return FilterResult::Reject;
        }

        entries.insert(key.to_string(), now);
        FilterResult::Accept
    }

    #[cfg(test)]
    pub(crate) fn clock(&self) -> &Clock {
        &self.clock
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;
    use std::time::SystemTime;

    use super::*;
    use crate::clock::ManualClock;

    fn manual(window: Duration) -> DedupCache {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_000_000);
        DedupCache::with_clock(window, Clock::ManualClock(ManualClock::new(now)))
    }

    #[test]
    fn test_window() {
        let cache = manual(DedupCache::DEFAULT_WINDOW);
        assert_eq!(cache.window(), Duration::from_secs(300));

        assert_eq!(cache.check("context canceled"), FilterResult::Accept);
        cache.clock().advance(Duration::from_secs(60));
        assert_eq!(cache.check("context canceled"), FilterResult::Reject);
        cache.clock().advance(Duration::from_secs(5 * 60));
        assert_eq!(cache.check("context canceled"), FilterResult::Accept);
    }

    #[test]
    fn test_rejection_does_not_refresh() {
        let cache = manual(Duration::from_secs(10));

        assert_eq!(cache.check("m"), FilterResult::Accept);
        cache.clock().advance(Duration::from_secs(9));
        assert_eq!(cache.check("m"), FilterResult::Reject);
        // still measured from the first sighting
        cache.clock().advance(Duration::from_secs(2));
        assert_eq!(cache.check("m"), FilterResult::Accept);
    }

    #[test]
    fn test_stale_entries_are_purged() {
        let cache = manual(Duration::from_secs(10));

        cache.check("a");
        cache.check("b");
        assert_eq!(cache.len(), 2);
        assert!(!cache.is_empty());

        cache.clock().advance(Duration::from_secs(30));
        cache.check("c");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_wall_clock_step_back_keeps_window() {
        let cache = manual(Duration::from_secs(60));

        assert_eq!(cache.check("broken pipe"), FilterResult::Accept);
        cache
            .clock()
            .set_now(SystemTime::UNIX_EPOCH + Duration::from_secs(10));
        assert_eq!(cache.check("broken pipe"), FilterResult::Reject);

        cache.clock().advance(Duration::from_secs(61));
        assert_eq!(cache.check("broken pipe"), FilterResult::Accept);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_concurrent_first_sighting_accepted_once() {
        let cache = Arc::new(manual(DedupCache::DEFAULT_WINDOW));

        let handles = (0..8)
            .map(|_| {
                let cache = cache.clone();
                thread::spawn(move || cache.check("broken pipe"))
            })
            .collect::<Vec<_>>();

        let accepted = handles
            .into_iter()
            .map(|h| h.join().unwrap())
            .filter(|r| *r == FilterResult::Accept)
            .count();
        assert_eq!(accepted, 1);
    }
}
