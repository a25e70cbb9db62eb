// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::panic::Location;

use crate::error::SpawnError;
use crate::scheduler::Handle;
use crate::task::TaskId;

/// Configures a task before spawning it.
///
/// Obtained from [`Handle::build_task`].
#[derive(Debug)]
pub struct TaskBuilder<'a> {
    handle: &'a Handle,
    name: Option<&'static str>,
    location: Option<&'static Location<'static>>,
}

impl<'a> TaskBuilder<'a> {
    pub(crate) fn new(handle: &'a Handle) -> Self {
        Self {
            handle,
            name: None,
            location: None,
        }
    }

    /// Override the name of the task, it shows up in the task's tracing span.
    ///
    /// By default, tasks are unnamed.
    #[must_use]
    pub fn name(mut self, name: &'static str) -> Self {
        self.name = Some(name);
        self
    }

    /// Override the source code location that will be associated with the task.
    ///
    /// By default, tasks inherit the source code location of where they have been spawned.
    #[must_use]
    pub fn location(mut self, location: &'static Location<'static>) -> Self {
        self.location = Some(location);
        self
    }

    /// Spawn the task and run it until it first suspends or completes.
    ///
    /// # Errors
    ///
    /// Returns [`SpawnError::Closed`] if the scheduler has been dropped and
    /// [`SpawnError::Exhausted`] if its task storage is full.
    #[track_caller]
    pub fn spawn<F>(self, future: F) -> Result<TaskId, SpawnError>
    where
        F: Future<Output = ()> + 'static,
    {
        let location = self.location.unwrap_or(Location::caller());
        self.handle
            .shared()
            .spawn(Box::pin(future), self.name, location)
    }
}
