// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use kcoop_clock::{Clock, Instant};

/// The condition a suspended task waits for before it may be resumed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[non_exhaustive]
pub enum Pollable {
    /// Ready once the clock reaches `deadline`.
    Timer { deadline: Instant },
}

impl Pollable {
    #[must_use]
    pub const fn timer(deadline: Instant) -> Self {
        Self::Timer { deadline }
    }

    /// Returns `true` if the condition holds at `now`.
    ///
    /// Readiness is monotonic: once a pollable is ready for some `now` it stays ready for every
    /// later instant.
    #[must_use]
    pub fn is_ready(&self, now: Instant) -> bool {
        match self {
            Pollable::Timer { deadline } => now >= *deadline,
        }
    }

    /// Sample `clock` and check whether the condition holds.
    pub fn poll_ready(&self, clock: &Clock) -> bool {
        self.is_ready(clock.now())
    }

    /// Returns the instant at which this pollable becomes ready, if it is time based.
    #[must_use]
    pub fn deadline(&self) -> Option<Instant> {
        match self {
            Pollable::Timer { deadline } => Some(*deadline),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;
    use kcoop_clock::MockClock;
    use proptest::prelude::*;

    fn at(ms: u64) -> Instant {
        Instant::ZERO + Duration::from_millis(ms)
    }

    #[test]
    fn timer_against_mock_clock() {
        let mock = MockClock::millis();
        let clock = mock.clock();
        let pollable = Pollable::timer(at(10));

        assert!(!pollable.poll_ready(&clock));
        mock.advance(9);
        assert!(!pollable.poll_ready(&clock));
        mock.advance(1);
        assert!(pollable.poll_ready(&clock));
        assert_eq!(pollable.deadline(), Some(at(10)));
    }

    proptest! {
        #[test]
        fn readiness_is_monotonic(
            deadline in 0u64..10_000,
            mut samples in proptest::collection::vec(0u64..20_000, 1..64),
        ) {
            samples.sort_unstable();
            let pollable = Pollable::timer(at(deadline));

            let mut seen_ready = false;
            for now in samples {
                let ready = pollable.is_ready(at(now));
                prop_assert_eq!(ready, now >= deadline);
                prop_assert!(ready || !seen_ready, "readiness flipped back to false");
                seen_ready |= ready;
            }
        }
    }
}
