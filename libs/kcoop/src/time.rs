// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;
use core::pin::Pin;
use core::task::{Context, Poll};

use kcoop_clock::Instant;

use crate::error::Violation;
use crate::pollable::Pollable;
use crate::scheduler::Handle;
use crate::task::TaskId;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum State {
    Unregistered,
    Registered(TaskId),
    Completed,
}

/// Future returned by [`Handle::sleep`] and [`Handle::sleep_until`].
///
/// The first poll either completes right away, if the deadline already passed, or registers a
/// timer for the current task and yields. The task then stays in the wait set until
/// [`Scheduler::poll_once`] finds the deadline reached and resumes it.
///
/// [`Scheduler::poll_once`]: crate::Scheduler::poll_once
#[must_use = "futures do nothing unless `.await`ed or `poll`ed"]
pub struct Sleep<'h> {
    handle: &'h Handle,
    deadline: Instant,
    state: State,
}

impl<'h> Sleep<'h> {
    pub(crate) fn new(handle: &'h Handle, deadline: Instant) -> Self {
        Self {
            handle,
            deadline,
            state: State::Unregistered,
        }
    }

    /// Returns the instant at which this sleep completes.
    #[must_use]
    pub fn deadline(&self) -> Instant {
        self.deadline
    }
}

impl Future for Sleep<'_> {
    type Output = ();

    fn poll(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Self::Output> {
        let me = &mut *self;
        let shared = me.handle.shared();
        let pollable = Pollable::timer(me.deadline);

        match me.state {
            State::Unregistered => {
                if pollable.poll_ready(shared.clock()) {
                    tracing::trace!(deadline = ?me.deadline, "sleep already due");
                    shared.note_fast_path();
                    me.state = State::Completed;
                    return Poll::Ready(());
                }

                let Some(task) = shared.current_task() else {
                    shared.fatal(Violation::DelayOutsideTask);
                };
                shared.register(task, pollable);
                me.state = State::Registered(task);
                Poll::Pending
            }
            State::Registered(task) => {
                if !pollable.poll_ready(shared.clock()) {
                    return Poll::Pending;
                }
                // no-op unless polled again before the task yielded
                shared.withdraw(task);
                me.state = State::Completed;
                Poll::Ready(())
            }
            State::Completed => Poll::Ready(()),
        }
    }
}

impl Drop for Sleep<'_> {
    fn drop(&mut self) {
        if let State::Registered(task) = self.state {
            self.handle.shared().withdraw(task);
        }
    }
}

impl fmt::Debug for Sleep<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Sleep")
            .field("deadline", &self.deadline)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}
