// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::num::NonZeroUsize;

use kcoop_clock::Clock;

use crate::scheduler::Scheduler;

/// What happens when a task panics, or when the scheduler detects a broken invariant.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PanicPolicy {
    /// Log the failure and abort the process.
    #[default]
    Abort,
    /// Let the panic unwind out of the scheduler call that polled the task.
    ///
    /// Mostly useful in tests, where the unwind can be observed with `#[should_panic]`.
    Propagate,
}

#[derive(Clone, Debug, Default)]
pub(crate) struct Config {
    pub(crate) task_capacity: Option<NonZeroUsize>,
    pub(crate) panic_policy: PanicPolicy,
    pub(crate) wait_set_capacity: usize,
}

/// Configures a [`Scheduler`] before building it.
///
/// ```
/// use core::num::NonZeroUsize;
/// use kcoop::{Builder, PanicPolicy};
/// use kcoop_clock::Clock;
///
/// let scheduler = Builder::new()
///     .task_capacity(NonZeroUsize::new(16).unwrap())
///     .on_task_panic(PanicPolicy::Propagate)
///     .build(Clock::system());
/// assert!(scheduler.is_idle());
/// ```
#[derive(Debug, Default)]
#[must_use]
pub struct Builder {
    config: Config,
}

impl Builder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Limit the number of tasks that may be alive at the same time.
    ///
    /// Spawning beyond the limit fails with [`SpawnError::Exhausted`]. By default the number of
    /// tasks is only bounded by memory.
    ///
    /// [`SpawnError::Exhausted`]: crate::SpawnError::Exhausted
    pub fn task_capacity(mut self, capacity: NonZeroUsize) -> Self {
        self.config.task_capacity = Some(capacity);
        self
    }

    /// Choose what happens when a task panics. Defaults to [`PanicPolicy::Abort`].
    pub fn on_task_panic(mut self, policy: PanicPolicy) -> Self {
        self.config.panic_policy = policy;
        self
    }

    /// Pre-allocate room for `capacity` waiting tasks.
    pub fn wait_set_capacity(mut self, capacity: usize) -> Self {
        self.config.wait_set_capacity = capacity;
        self
    }

    pub fn build(self, clock: Clock) -> Scheduler {
        Scheduler::from_config(clock, self.config)
    }
}
