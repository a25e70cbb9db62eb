// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::fmt;

use crate::config::PanicPolicy;
use crate::task::TaskId;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpawnError {
    /// The scheduler this handle belongs to has been dropped.
    Closed,
    /// The scheduler already holds as many tasks as it was configured to.
    Exhausted { capacity: usize },
}

impl fmt::Display for SpawnError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SpawnError::Closed => f.write_str("scheduler was closed"),
            SpawnError::Exhausted { capacity } => {
                write!(f, "task storage exhausted (capacity {capacity})")
            }
        }
    }
}

impl core::error::Error for SpawnError {}

/// A broken scheduler invariant.
///
/// These indicate a bug in a task or in the scheduler itself and are never recoverable: they
/// are raised as panics, which abort the process under the default [`PanicPolicy`].
///
/// [`PanicPolicy`]: crate::PanicPolicy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum Violation {
    /// A task tried to register a second resumption condition while already waiting.
    DoubleRegistration(TaskId),
    /// A task that already ran to completion was resumed or registered.
    Completed(TaskId),
    /// The handle does not belong to any task this scheduler ever spawned.
    UnknownTask(TaskId),
    /// A task was resumed while it was running.
    AlreadyRunning(TaskId),
    /// A resumption condition was registered for a task that has not run yet.
    ///
    /// Tasks run as part of being spawned and their ID is only handed out afterwards, so this
    /// cannot be caused through [`Handle`]. It completes the set of rejected task state
    /// transitions.
    ///
    /// [`Handle`]: crate::Handle
    NotStarted(TaskId),
    /// A task yielded without registering a resumption condition, nothing would ever wake it.
    PendingWithoutCondition(TaskId),
    /// A delay was requested outside of any running task.
    DelayOutsideTask,
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Violation::DoubleRegistration(id) => {
                write!(f, "task {id} registered twice while already waiting")
            }
            Violation::Completed(id) => write!(f, "task {id} has already completed"),
            Violation::UnknownTask(id) => write!(f, "task {id} was never spawned"),
            Violation::AlreadyRunning(id) => write!(f, "task {id} resumed while running"),
            Violation::NotStarted(id) => write!(f, "task {id} has not started yet"),
            Violation::PendingWithoutCondition(id) => {
                write!(f, "task {id} suspended without a resumption condition")
            }
            Violation::DelayOutsideTask => f.write_str("delay requested outside of a task"),
        }
    }
}

impl core::error::Error for Violation {}

/// Report a broken scheduler invariant. Never returns.
///
/// Under [`PanicPolicy::Abort`] the process is aborted right away, otherwise the violation is
/// raised as a panic.
#[cold]
#[track_caller]
pub(crate) fn fatal(violation: Violation, policy: PanicPolicy) -> ! {
    tracing::error!(%violation, "scheduler invariant violated");
    match policy {
        PanicPolicy::Abort => std::process::abort(),
        PanicPolicy::Propagate => panic!("scheduler invariant violated: {violation}"),
    }
}
