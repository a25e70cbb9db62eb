// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;

/// An opaque handle that identifies a task of one [`Scheduler`][crate::Scheduler].
///
/// # Notes
///
/// - The storage slot of a completed task is reused by later tasks, but IDs are not: every
///   spawn gets a fresh serial number, so a stale ID never aliases a newer task.
/// - IDs only have meaning relative to the scheduler that issued them.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq)]
pub struct TaskId {
    pub(crate) slot: u32,
    pub(crate) serial: u64,
}

impl TaskId {
    pub(crate) const fn new(slot: u32, serial: u64) -> Self {
        Self { slot, serial }
    }

    /// Returns the spawn serial number of this task, `0` for the first task of a scheduler.
    #[must_use]
    pub fn as_u64(self) -> u64 {
        self.serial
    }
}

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.serial)
    }
}
