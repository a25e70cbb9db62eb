// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use std::collections::VecDeque;

use kcoop_clock::Instant;

use crate::pollable::Pollable;
use crate::task::TaskId;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) struct WaitEntry {
    pub(crate) pollable: Pollable,
    pub(crate) task: TaskId,
}

/// The suspended tasks, in registration order.
///
/// A task appears at most once.
#[derive(Debug, Default)]
pub(crate) struct WaitSet {
    entries: VecDeque<WaitEntry>,
}

impl WaitSet {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
        }
    }

    pub(crate) fn insert(&mut self, entry: WaitEntry) {
        debug_assert!(!self.contains(entry.task), "{} already waiting", entry.task);
        self.entries.push_back(entry);
    }

    pub(crate) fn pop_front(&mut self) -> Option<WaitEntry> {
        self.entries.pop_front()
    }

    /// Put an entry that was not ready back at the end of the set.
    pub(crate) fn requeue(&mut self, entry: WaitEntry) {
        self.entries.push_back(entry);
    }

    pub(crate) fn remove(&mut self, task: TaskId) -> Option<WaitEntry> {
        let pos = self.entries.iter().position(|entry| entry.task == task)?;
        self.entries.remove(pos)
    }

    pub(crate) fn contains(&self, task: TaskId) -> bool {
        self.entries.iter().any(|entry| entry.task == task)
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    pub(crate) fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The earliest deadline of any waiting timer.
    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.entries
            .iter()
            .filter_map(|entry| entry.pollable.deadline())
            .min()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use core::time::Duration;

    fn entry(serial: u64, ms: u64) -> WaitEntry {
        WaitEntry {
            pollable: Pollable::timer(Instant::ZERO + Duration::from_millis(ms)),
            task: TaskId::new(u32::try_from(serial).unwrap(), serial),
        }
    }

    #[test]
    fn requeue_keeps_the_others_in_order() {
        let mut set = WaitSet::default();
        set.insert(entry(0, 30));
        set.insert(entry(1, 10));
        set.insert(entry(2, 20));

        let first = set.pop_front().unwrap();
        set.requeue(first);

        let order: Vec<_> = core::iter::from_fn(|| set.pop_front())
            .map(|e| e.task.as_u64())
            .collect();
        assert_eq!(order, [1, 2, 0]);
    }

    #[test]
    fn remove_and_next_deadline() {
        let mut set = WaitSet::with_capacity(4);
        assert_eq!(set.next_deadline(), None);

        set.insert(entry(0, 30));
        set.insert(entry(1, 10));
        assert_eq!(
            set.next_deadline(),
            Some(Instant::ZERO + Duration::from_millis(10))
        );

        assert!(set.remove(TaskId::new(1, 1)).is_some());
        assert!(set.remove(TaskId::new(1, 1)).is_none());
        assert!(!set.contains(TaskId::new(1, 1)));
        assert_eq!(set.len(), 1);
        assert_eq!(
            set.next_deadline(),
            Some(Instant::ZERO + Duration::from_millis(30))
        );
    }
}
