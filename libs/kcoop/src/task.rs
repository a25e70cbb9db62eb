// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

mod builder;
mod id;

use core::fmt;
use core::pin::Pin;

pub use builder::TaskBuilder;
pub use id::TaskId;

use crate::error::Violation;

pub(crate) type BoxFuture = Pin<Box<dyn Future<Output = ()>>>;

/// The lifecycle state of a task.
///
/// ```text
/// Created -> Running -> (Suspended <-> Running)* -> Completed
/// ```
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskState {
    /// Spawned, but not yet run for the first time.
    Created,
    /// Currently executing its body.
    Running,
    /// Waiting in the wait set for its resumption condition.
    Suspended,
    /// Ran to completion. Terminal.
    Completed,
}

/// A spawned task, as stored in the scheduler's task slab.
///
/// The future is taken out of the task while it runs, so that the task body is free to call
/// back into the scheduler.
pub(crate) struct Task {
    pub(crate) id: TaskId,
    pub(crate) state: TaskState,
    pub(crate) span: tracing::Span,
    pub(crate) resumptions: u64,
    pub(crate) suspensions: u64,
    future: Option<BoxFuture>,
}

impl Task {
    pub(crate) fn new(id: TaskId, future: BoxFuture, span: tracing::Span) -> Self {
        Self {
            id,
            state: TaskState::Created,
            span,
            resumptions: 0,
            suspensions: 0,
            future: Some(future),
        }
    }

    /// `Created | Suspended -> Running`, handing out the future to poll.
    pub(crate) fn start_resume(&mut self) -> Result<BoxFuture, Violation> {
        match self.state {
            TaskState::Created | TaskState::Suspended => {}
            TaskState::Running => return Err(Violation::AlreadyRunning(self.id)),
            TaskState::Completed => return Err(Violation::Completed(self.id)),
        }

        let future = self
            .future
            .take()
            .ok_or(Violation::AlreadyRunning(self.id))?;

        self.state = TaskState::Running;
        self.resumptions += 1;
        Ok(future)
    }

    /// Hand the future back after a poll that returned `Pending`.
    ///
    /// The task must have registered a resumption condition during that poll.
    pub(crate) fn end_resume(&mut self, future: BoxFuture) -> Result<(), Violation> {
        debug_assert!(self.future.is_none());
        if self.state != TaskState::Suspended {
            return Err(Violation::PendingWithoutCondition(self.id));
        }
        self.future = Some(future);
        Ok(())
    }

    /// `Running -> Suspended`, called when the task registers its resumption condition.
    pub(crate) fn suspend(&mut self) -> Result<(), Violation> {
        match self.state {
            TaskState::Running => {
                self.state = TaskState::Suspended;
                self.suspensions += 1;
                Ok(())
            }
            TaskState::Suspended => Err(Violation::DoubleRegistration(self.id)),
            TaskState::Created => Err(Violation::NotStarted(self.id)),
            TaskState::Completed => Err(Violation::Completed(self.id)),
        }
    }

    /// `Suspended -> Running`, undoing a registration that was withdrawn before the task
    /// yielded.
    pub(crate) fn withdraw(&mut self) {
        if self.state == TaskState::Suspended {
            self.state = TaskState::Running;
            self.suspensions -= 1;
        }
    }
}

impl fmt::Debug for Task {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("state", &self.state)
            .field("resumptions", &self.resumptions)
            .field("suspensions", &self.suspensions)
            .field("polling", &self.future.is_none())
            .finish_non_exhaustive()
    }
}
