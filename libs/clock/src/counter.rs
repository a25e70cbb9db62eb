// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;
use core::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use core::time::Duration;
use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crate::{Clock, Wrap};

/// A periodic tick source, emulating a hardware timer interrupt.
///
/// On bare metal a timer peripheral (e.g. SysTick) fires every tick period and its interrupt
/// handler increments a global counter. `TickCounter` plays the same role on a hosted system:
/// a background thread increments an atomic counter once per `period`, wrapping it according
/// to the configured [`Wrap`]. Reading the counter is lock-free.
///
/// The background thread is stopped and joined when the `TickCounter` is dropped. Clocks
/// created from it keep returning the last counter value afterwards.
pub struct TickCounter {
    shared: Arc<Shared>,
    period: Duration,
    thread: Option<JoinHandle<()>>,
}

struct Shared {
    count: AtomicU64,
    stop: AtomicBool,
    wrap: Wrap,
}

impl TickCounter {
    /// Start a new tick counter that advances once every `period`.
    ///
    /// # Errors
    ///
    /// Returns an [`io::ErrorKind::InvalidInput`] error if `period` is zero and the underlying
    /// I/O error if the background thread could not be spawned.
    pub fn spawn(period: Duration, wrap: Wrap) -> io::Result<Self> {
        if period.is_zero() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "tick period must be non-zero",
            ));
        }

        let shared = Arc::new(Shared {
            count: AtomicU64::new(0),
            stop: AtomicBool::new(false),
            wrap,
        });

        let thread = thread::Builder::new().name("kcoop-tick".into()).spawn({
            let shared = Arc::clone(&shared);
            move || shared.run(period)
        })?;

        tracing::debug!(?period, ?wrap, "tick counter started");

        Ok(Self {
            shared,
            period,
            thread: Some(thread),
        })
    }

    /// Returns a [`Clock`] reading this counter, with one tick per `period`.
    #[must_use]
    pub fn clock(&self) -> Clock {
        let shared = Arc::clone(&self.shared);
        Clock::new(self.period, self.shared.wrap, move || {
            shared.count.load(Ordering::Acquire)
        })
        .named("tick counter")
    }

    /// Returns the current raw counter value.
    #[must_use]
    pub fn raw(&self) -> u64 {
        self.shared.count.load(Ordering::Acquire)
    }

    #[must_use]
    pub fn period(&self) -> Duration {
        self.period
    }
}

impl Drop for TickCounter {
    fn drop(&mut self) {
        self.shared.stop.store(true, Ordering::Release);
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                tracing::error!("tick counter thread panicked");
            }
        }
    }
}

impl fmt::Debug for TickCounter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TickCounter")
            .field("raw", &self.raw())
            .field("period", &self.period)
            .field("wrap", &self.shared.wrap)
            .finish_non_exhaustive()
    }
}

impl Shared {
    fn run(&self, period: Duration) {
        let mut next = std::time::Instant::now() + period;

        while !self.stop.load(Ordering::Acquire) {
            let now = std::time::Instant::now();
            if now < next {
                thread::sleep(next - now);
                continue;
            }

            // catch up on every period we overslept, the counter must not lose ticks
            while next <= std::time::Instant::now() {
                self.tick();
                next += period;
            }
        }
    }

    fn tick(&self) {
        // single writer, so a plain load/store pair is race free
        let raw = self.count.load(Ordering::Relaxed);
        self.count
            .store(self.wrap.advance(raw, 1), Ordering::Release);
    }
}
