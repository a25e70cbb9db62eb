// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Monotonic time for the kcoop scheduler.
//!
//! A [`Clock`] turns a raw, fixed-width tick counter (a hardware timer, an OS interval timer,
//! a background thread, ...) into a monotonically non-decreasing stream of [`Instant`]s. The
//! counter is allowed to wrap around, the clock detects this and accumulates the true number of
//! elapsed ticks.

mod clock;
mod counter;
mod instant;
#[cfg(any(test, feature = "test-util"))]
mod mock;

pub const NANOS_PER_SEC: u64 = 1_000_000_000;

pub use clock::{Clock, Ticks, Wrap};
pub use counter::TickCounter;
pub use instant::Instant;
#[cfg(any(test, feature = "test-util"))]
pub use mock::MockClock;
