// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::cell::Cell;
use core::fmt;
use core::num::NonZeroU64;
use core::time::Duration;
use std::sync::Arc;

use crate::{Instant, NANOS_PER_SEC};

/// A raw number of clock ticks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Ticks(pub u64);

/// The width of the raw counter backing a [`Clock`].
///
/// Hardware tick counters are usually narrower than 64 bits and silently start over at zero
/// once they overflow. A clock needs to know where that happens to compute correct elapsed
/// times across the overflow.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Wrap {
    /// The counter spans the whole `u64` range.
    Full,
    /// The counter counts `0..modulus` and then restarts at zero.
    ///
    /// A counter of width `W` therefore is `Wrap::At(W)`, its largest value is `W - 1`.
    At(NonZeroU64),
}

type NowFn = dyn Fn() -> u64 + Send + Sync;

/// A monotonic clock built on top of a (possibly wrapping) raw tick counter.
///
/// Every sample of the raw counter is compared against the previous one and the elapsed
/// ticks are accumulated into a 64-bit running total. This makes [`Clock::now`] strictly
/// non-decreasing even when the underlying counter wraps around, as long as the clock is
/// sampled at least once per wrap period.
///
/// Instants produced by a clock are measured from the moment the clock was created.
pub struct Clock {
    name: &'static str,
    tick_duration: Duration,
    wrap: Wrap,
    source: Arc<NowFn>,
    last: Cell<Sample>,
}

#[derive(Clone, Copy, Debug)]
struct Sample {
    raw: u64,
    ticks: Ticks,
}

// === impl Wrap ===

impl Wrap {
    /// Returns the `Wrap` of an `n`-bit counter, or `None` if `bits` is `0` or larger than `64`.
    #[must_use]
    pub fn bits(bits: u32) -> Option<Self> {
        match bits {
            64 => Some(Wrap::Full),
            1..64 => NonZeroU64::new(1 << bits).map(Wrap::At),
            _ => None,
        }
    }

    /// Returns the number of ticks between two raw counter samples `earlier` and `now`.
    ///
    /// If `now < earlier` the counter wrapped in between, and the elapsed ticks are
    /// `(modulus - earlier) + now` where `modulus` is one past the largest raw value.
    #[must_use]
    pub fn elapsed(self, earlier: u64, now: u64) -> u64 {
        if now >= earlier {
            return now - earlier;
        }

        match self {
            Wrap::Full => (u64::MAX - earlier) + now + 1,
            Wrap::At(modulus) => modulus.get().saturating_sub(earlier) + now,
        }
    }

    /// Advance the raw counter value `raw` by `n` ticks, wrapping where the counter would.
    #[must_use]
    pub fn advance(self, raw: u64, n: u64) -> u64 {
        match self {
            Wrap::Full => raw.wrapping_add(n),
            Wrap::At(modulus) => {
                let m = u128::from(modulus.get());
                #[expect(
                    clippy::cast_possible_truncation,
                    reason = "the result is smaller than the u64 modulus"
                )]
                let next = ((u128::from(raw) + u128::from(n)) % m) as u64;
                next
            }
        }
    }
}

// === impl Clock ===

impl Clock {
    /// Create a new clock reading its raw counter from `source`.
    ///
    /// `tick_duration` is the amount of time a single raw tick represents, `wrap` describes
    /// where the raw counter overflows.
    pub fn new<F>(tick_duration: Duration, wrap: Wrap, source: F) -> Self
    where
        F: Fn() -> u64 + Send + Sync + 'static,
    {
        let source: Arc<NowFn> = Arc::new(source);
        let raw = source();

        Self {
            name: "<unnamed mystery clock>",
            tick_duration,
            wrap,
            source,
            last: Cell::new(Sample {
                raw,
                ticks: Ticks(0),
            }),
        }
    }

    /// Returns a clock with 1ms precision that is backed by the system's monotonic clock.
    #[must_use]
    pub fn system() -> Self {
        let anchor = std::time::Instant::now();
        Self::new(Duration::from_millis(1), Wrap::Full, move || {
            u64::try_from(anchor.elapsed().as_millis()).unwrap_or(u64::MAX)
        })
        .named("system clock")
    }

    #[must_use]
    pub const fn named(mut self, name: &'static str) -> Self {
        self.name = name;
        self
    }

    /// Returns this `Clock`'s name, if it was given one using the [`Clock::named`]
    /// method.
    #[must_use]
    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the [`Duration`] of one tick of this clock.
    #[must_use]
    pub const fn tick_duration(&self) -> Duration {
        self.tick_duration
    }

    /// Returns the width of the raw counter backing this clock.
    #[must_use]
    pub const fn wrap(&self) -> Wrap {
        self.wrap
    }

    /// Returns the time it takes the raw counter to wrap around once, or `None` for a full
    /// width counter.
    ///
    /// The clock has to be sampled more often than this to keep counting correctly.
    #[must_use]
    pub fn wrap_period(&self) -> Option<Duration> {
        match self.wrap {
            Wrap::Full => None,
            Wrap::At(modulus) => Some(self.ticks_to_duration(Ticks(modulus.get()))),
        }
    }

    /// Sample the raw counter and return the total number of ticks since this clock was created.
    pub fn now_ticks(&self) -> Ticks {
        let raw = (self.source)();
        let last = self.last.get();

        let delta = self.wrap.elapsed(last.raw, raw);
        if raw < last.raw {
            tracing::trace!(clock = self.name, last = last.raw, raw, delta, "tick counter wrapped");
        }

        let ticks = Ticks(last.ticks.0.saturating_add(delta));
        self.last.set(Sample { raw, ticks });
        ticks
    }

    /// Returns an instant corresponding to "now".
    pub fn now(&self) -> Instant {
        Instant::from_elapsed(self.ticks_to_duration(self.now_ticks()))
    }

    /// Returns the amount of time elapsed since `earlier`, or zero if `earlier` lies in the future.
    pub fn elapsed_since(&self, earlier: Instant) -> Duration {
        self.now().saturating_duration_since(earlier)
    }

    /// Convert the given raw [`Ticks`] into a [`Duration`] using this clock's tick duration.
    ///
    /// Saturates at [`Duration::MAX`].
    #[must_use]
    pub fn ticks_to_duration(&self, ticks: Ticks) -> Duration {
        let nanos = self.tick_duration.as_nanos() * u128::from(ticks.0);
        let secs = nanos / u128::from(NANOS_PER_SEC);

        let Ok(secs) = u64::try_from(secs) else {
            return Duration::MAX;
        };
        #[expect(
            clippy::cast_possible_truncation,
            reason = "the remainder of a division by NANOS_PER_SEC always fits into u32"
        )]
        let subsec_nanos = (nanos % u128::from(NANOS_PER_SEC)) as u32;

        Duration::new(secs, subsec_nanos)
    }
}

impl fmt::Debug for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Clock")
            .field("name", &self.name)
            .field("tick_duration", &self.tick_duration)
            .field("wrap", &self.wrap)
            .field("last", &self.last.get())
            .finish_non_exhaustive()
    }
}

impl fmt::Display for Clock {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {:?} precision", self.name, self.tick_duration)
    }
}
