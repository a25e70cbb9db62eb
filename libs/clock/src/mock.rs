// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::sync::atomic::{AtomicU64, Ordering};
use core::time::Duration;
use std::sync::Arc;

use crate::{Clock, Wrap};

/// A manually driven tick source for tests.
///
/// The raw counter only moves when told to, either explicitly through [`MockClock::advance`]
/// and friends, or implicitly by a fixed amount on every read when auto-advance is enabled.
#[derive(Clone, Debug)]
pub struct MockClock {
    inner: Arc<Inner>,
}

#[derive(Debug)]
struct Inner {
    tick_duration: Duration,
    wrap: Wrap,
    raw: AtomicU64,
    auto_advance: AtomicU64,
}

impl MockClock {
    pub fn new(tick_duration: Duration, wrap: Wrap) -> Self {
        Self {
            inner: Arc::new(Inner {
                tick_duration,
                wrap,
                raw: AtomicU64::new(0),
                auto_advance: AtomicU64::new(0),
            }),
        }
    }

    /// A full width mock clock with 1ms ticks.
    pub fn millis() -> Self {
        Self::new(Duration::from_millis(1), Wrap::Full)
    }

    /// Returns a [`Clock`] reading this mock counter.
    pub fn clock(&self) -> Clock {
        let inner = Arc::clone(&self.inner);
        Clock::new(self.inner.tick_duration, self.inner.wrap, move || {
            let step = inner.auto_advance.load(Ordering::Relaxed);
            let raw = inner.raw.load(Ordering::Acquire);
            if step > 0 {
                inner
                    .raw
                    .store(inner.wrap.advance(raw, step), Ordering::Release);
            }
            raw
        })
        .named("mock test clock")
    }

    /// Advance the raw counter by `ticks`.
    pub fn advance(&self, ticks: u64) {
        let raw = self.inner.raw.load(Ordering::Acquire);
        self.inner
            .raw
            .store(self.inner.wrap.advance(raw, ticks), Ordering::Release);
    }

    /// Advance the raw counter by the number of whole ticks in `duration`.
    ///
    /// # Panics
    ///
    /// Panics if the tick count does not fit into a `u64`.
    pub fn advance_by(&self, duration: Duration) {
        let ticks = duration.as_nanos() / self.inner.tick_duration.as_nanos();
        self.advance(u64::try_from(ticks).expect("duration too long for mock clock"));
    }

    /// Overwrite the raw counter value.
    pub fn set_raw(&self, raw: u64) {
        self.inner.raw.store(raw, Ordering::Release);
    }

    pub fn raw(&self) -> u64 {
        self.inner.raw.load(Ordering::Acquire)
    }

    /// Make every read of the counter advance it by `ticks` afterwards. `0` disables this.
    pub fn auto_advance(&self, ticks: u64) {
        self.inner.auto_advance.store(ticks, Ordering::Relaxed);
    }
}
