// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use kcoop_clock::{Clock, Instant};

/// What the driver loop does when a pass over the wait set resumed nothing.
pub trait Park {
    /// Wait for at most until `deadline`, the earliest instant a waiting task becomes ready.
    ///
    /// Returning early is always allowed, the driver simply polls again.
    fn park_until(&self, deadline: Instant, clock: &Clock);
}

/// Busy polling: return right away after hinting the CPU that we are spinning.
#[derive(Clone, Copy, Debug, Default)]
pub struct Spin;

impl Park for Spin {
    #[inline]
    fn park_until(&self, _deadline: Instant, _clock: &Clock) {
        core::hint::spin_loop();
    }
}

/// Put the thread to sleep until the deadline.
///
/// Only useful with clocks that advance on their own, a manually driven clock would never
/// reach the deadline while the thread sleeps. On clocks with a narrow raw counter a single
/// park lasts at most half a wrap period, so that the clock keeps being sampled often enough.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThreadPark;

impl Park for ThreadPark {
    fn park_until(&self, deadline: Instant, clock: &Clock) {
        let mut timeout = deadline.saturating_duration_since(clock.now());
        if let Some(period) = clock.wrap_period() {
            timeout = timeout.min(period / 2);
        }
        if !timeout.is_zero() {
            tracing::trace!(?timeout, "parking thread");
            std::thread::sleep(timeout);
        }
    }
}

impl<P: Park + ?Sized> Park for &P {
    fn park_until(&self, deadline: Instant, clock: &Clock) {
        (**self).park_until(deadline, clock);
    }
}
