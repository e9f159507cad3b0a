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

use std::time::Instant;
use std::time::SystemTime;

/// Source of wall-clock time for archive ages and monotonic time for dedup windows.
#[derive(Debug)]
pub(crate) enum Clock {
    DefaultClock,
    #[cfg(test)]
    ManualClock(ManualClock),
}

impl Clock {
    pub(crate) fn now(&self) -> SystemTime {
        match self {
            Clock::DefaultClock => SystemTime::now(),
            #[cfg(test)]
            Clock::ManualClock(clock) => clock.now(),
        }
    }

    pub(crate) fn instant(&self) -> Instant {
        match self {
            Clock::DefaultClock => Instant::now(),
            #[cfg(test)]
            Clock::ManualClock(clock) => clock.instant(),
        }
    }

    #[cfg(test)]
    pub(crate) fn set_now(&self, new_time: SystemTime) {
        if let Clock::ManualClock(clock) = self {
            clock.set_now(new_time);
        }
    }

    #[cfg(test)]
    pub(crate) fn advance(&self, by: std::time::Duration) {
        if let Clock::ManualClock(clock) = self {
            clock.advance(by);
        }
    }
}

/// The wall time could be reset. Monotonic time only moves forward.
#[derive(Debug)]
#[cfg(test)]
pub(crate) struct ManualClock {
    state: std::sync::Mutex<(SystemTime, Instant)>,
}

#[cfg(test)]
impl ManualClock {
    pub(crate) fn new(now: SystemTime) -> ManualClock {
        ManualClock {
            state: std::sync::Mutex::new((now, Instant::now())),
        }
    }

    fn now(&self) -> SystemTime {
        self.state.lock().unwrap().0
    }

    fn instant(&self) -> Instant {
        self.state.lock().unwrap().1
    }

    pub(crate) fn set_now(&self, now: SystemTime) {
        self.state.lock().unwrap().0 = now;
    }

    pub(crate) fn advance(&self, by: std::time::Duration) {
        let mut state = self.state.lock().unwrap();
        state.0 += by;
        state.1 += by;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn test_manual_clock_adjusting() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_672_574_400);
        let clock = Clock::ManualClock(ManualClock::new(now));
        assert_eq!(clock.now(), now);

        let later = now + Duration::from_secs(86_400);
        clock.set_now(later);
        assert_eq!(clock.now(), later);
    }

    #[test]
    fn test_wall_reset_leaves_monotonic_time() {
        let now = SystemTime::UNIX_EPOCH + Duration::from_secs(1_672_574_400);
        let clock = Clock::ManualClock(ManualClock::new(now));
        let start = clock.instant();

        clock.set_now(now - Duration::from_secs(3600));
        assert_eq!(clock.instant(), start);

        clock.advance(Duration::from_secs(90));
        assert_eq!(clock.instant() - start, Duration::from_secs(90));
        assert_eq!(clock.now(), now - Duration::from_secs(3510));
    }
}
