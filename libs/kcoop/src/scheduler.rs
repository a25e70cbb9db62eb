// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

mod wait_set;

use core::cell::{Cell, RefCell};
use core::fmt;
use core::mem;
use core::panic::{AssertUnwindSafe, Location};
use core::task::{Context, Poll};
use core::time::Duration;
use std::panic;
use std::rc::Rc;

use futures::task::noop_waker_ref;
use kcoop_clock::{Clock, Instant};
use wasmtime_slab::{Id, Slab};

use crate::config::{Builder, Config, PanicPolicy};
use crate::driver::{self, RunSummary};
use crate::error::{SpawnError, Violation, fatal};
use crate::park::{Park, Spin};
use crate::pollable::Pollable;
use crate::task::{BoxFuture, Task, TaskBuilder, TaskId, TaskState};
use crate::time::Sleep;
use wait_set::{WaitEntry, WaitSet};

/// Owns every task and drives them forward.
///
/// Tasks are spawned through the scheduler or any of its [`Handle`]s and run until they first
/// suspend. After that, only [`poll_once`] (or the [`run`] loop built on top of it) moves them
/// along. Dropping the scheduler drops all tasks that have not completed yet.
///
/// [`poll_once`]: Scheduler::poll_once
/// [`run`]: Scheduler::run
pub struct Scheduler {
    handle: Handle,
}

/// A cheap, cloneable reference to a [`Scheduler`].
///
/// Tasks use handles to delay themselves and to spawn further tasks.
#[derive(Clone)]
pub struct Handle {
    shared: Rc<Shared>,
}

/// Cumulative counters of a scheduler.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Stats {
    /// Tasks spawned.
    pub spawned: u64,
    /// Times a task body was run, including the initial run on spawn.
    pub resumed: u64,
    /// Times a task registered a resumption condition and yielded.
    pub suspended: u64,
    /// Delays that were already due when requested and returned without yielding.
    pub fast_path: u64,
    /// Tasks that ran to completion.
    pub completed: u64,
}

/// The outcome of a single [`Scheduler::poll_once`] pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[must_use]
pub struct Tick {
    /// Entries whose condition held and whose task was resumed.
    pub ready: usize,
    /// Resumed tasks that ran to completion.
    pub completed: usize,
    /// Entries left in the wait set after the pass.
    pub remaining: usize,
}

impl Tick {
    /// Returns `true` if tasks are still waiting after this pass.
    #[must_use]
    pub fn has_remaining(&self) -> bool {
        self.remaining > 0
    }
}

pub(crate) struct Shared {
    clock: Clock,
    config: Config,
    closed: Cell<bool>,
    core: RefCell<Core>,
}

struct Core {
    tasks: Slab<Task>,
    /// One past the highest slab slot handed out so far, the slab panics on IDs beyond it.
    slots: u32,
    wait_set: WaitSet,
    /// The task whose body is executing right now.
    current: Option<TaskId>,
    next_serial: u64,
    stats: Stats,
}

// === impl Scheduler ===

impl Scheduler {
    /// Returns a scheduler with the default configuration driven by `clock`.
    pub fn new(clock: Clock) -> Self {
        Self::from_config(clock, Config::default())
    }

    pub fn builder() -> Builder {
        Builder::new()
    }

    pub(crate) fn from_config(clock: Clock, config: Config) -> Self {
        tracing::debug!(clock = %clock, ?config, "new scheduler");

        let tasks = match config.task_capacity {
            Some(capacity) => Slab::with_capacity(capacity.get()),
            None => Slab::new(),
        };
        let core = Core {
            tasks,
            slots: 0,
            wait_set: WaitSet::with_capacity(config.wait_set_capacity),
            current: None,
            next_serial: 0,
            stats: Stats::default(),
        };

        Self {
            handle: Handle {
                shared: Rc::new(Shared {
                    clock,
                    config,
                    closed: Cell::new(false),
                    core: RefCell::new(core),
                }),
            },
        }
    }

    /// Returns a new [`Handle`] to this scheduler.
    #[must_use]
    pub fn handle(&self) -> Handle {
        self.handle.clone()
    }

    /// Spawn a task, see [`Handle::spawn`].
    ///
    /// # Errors
    ///
    /// Returns [`SpawnError::Exhausted`] if the configured task capacity is used up.
    #[track_caller]
    pub fn spawn<F>(&self, future: F) -> Result<TaskId, SpawnError>
    where
        F: Future<Output = ()> + 'static,
    {
        self.handle.spawn(future)
    }

    pub fn build_task(&self) -> TaskBuilder<'_> {
        self.handle.build_task()
    }

    /// Visit the wait set once and resume every task whose condition holds.
    ///
    /// Entries are visited in registration order. A ready entry is removed before its task is
    /// resumed, so the task may register again right away; such new entries are only looked
    /// at by the next pass.
    pub fn poll_once(&self) -> Tick {
        self.handle.shared.poll_once()
    }

    /// Busy poll until no task is waiting anymore.
    pub fn run(&self) -> RunSummary {
        self.run_with(&Spin)
    }

    /// Poll until no task is waiting anymore, handing idle periods to `park`.
    pub fn run_with<P>(&self, park: &P) -> RunSummary
    where
        P: Park + ?Sized,
    {
        driver::run_until_idle(&self.handle.shared, park)
    }

    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.handle.is_idle()
    }

    pub fn now(&self) -> Instant {
        self.handle.now()
    }

    #[must_use]
    pub fn clock(&self) -> &Clock {
        self.handle.clock()
    }

    #[must_use]
    pub fn stats(&self) -> Stats {
        self.handle.stats()
    }

    #[must_use]
    pub fn wait_set_len(&self) -> usize {
        self.handle.wait_set_len()
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.handle.next_deadline()
    }

    #[must_use]
    pub fn task_state(&self, task: TaskId) -> Option<TaskState> {
        self.handle.task_state(task)
    }
}

impl Drop for Scheduler {
    fn drop(&mut self) {
        let shared = &self.handle.shared;
        shared.closed.set(true);

        let Ok(mut core) = shared.core.try_borrow_mut() else {
            tracing::warn!("scheduler dropped while in use, leaking its tasks");
            return;
        };
        let wait_set = mem::take(&mut core.wait_set);
        let tasks = mem::replace(&mut core.tasks, Slab::new());
        core.slots = 0;
        core.current = None;
        drop(core);

        tracing::debug!(
            tasks = tasks.len(),
            waiting = wait_set.len(),
            "scheduler closed"
        );

        // task futures may call back into the scheduler while being dropped
        drop(wait_set);
        drop(tasks);
    }
}

impl fmt::Debug for Scheduler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("shared", &self.handle.shared)
            .finish()
    }
}

// === impl Handle ===

impl Handle {
    /// Spawn `future` as a new task and run it until it first suspends or completes.
    ///
    /// # Errors
    ///
    /// Returns [`SpawnError::Closed`] if the scheduler has been dropped and
    /// [`SpawnError::Exhausted`] if the configured task capacity is used up.
    #[track_caller]
    pub fn spawn<F>(&self, future: F) -> Result<TaskId, SpawnError>
    where
        F: Future<Output = ()> + 'static,
    {
        self.build_task().spawn(future)
    }

    /// Returns a [`TaskBuilder`] for configuring a task before spawning it.
    pub fn build_task(&self) -> TaskBuilder<'_> {
        TaskBuilder::new(self)
    }

    /// Delay the current task by `duration`.
    ///
    /// If the delay is already due when the returned future is first polled, it completes
    /// without yielding.
    pub fn sleep(&self, duration: Duration) -> Sleep<'_> {
        Sleep::new(self, self.now().saturating_add(duration))
    }

    /// Delay the current task until `deadline`.
    pub fn sleep_until(&self, deadline: Instant) -> Sleep<'_> {
        Sleep::new(self, deadline)
    }

    /// Suspend `task` until `pollable` is ready.
    ///
    /// This is the low-level operation behind [`Handle::sleep`]: the task must be running and
    /// must yield right after registering.
    ///
    /// # Panics
    ///
    /// Registering a task that is already waiting, has not started, has completed or that this
    /// scheduler never spawned is an invariant violation and is fatal.
    pub fn register(&self, task: TaskId, pollable: Pollable) {
        self.shared.register(task, pollable);
    }

    pub fn now(&self) -> Instant {
        self.shared.clock.now()
    }

    #[must_use]
    pub fn clock(&self) -> &Clock {
        &self.shared.clock
    }

    /// Returns the task whose body is executing right now, if any.
    #[must_use]
    pub fn current_task(&self) -> Option<TaskId> {
        self.shared.current_task()
    }

    /// Returns `true` if no task is waiting.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.shared.is_idle()
    }

    #[must_use]
    pub fn wait_set_len(&self) -> usize {
        self.shared.core.borrow().wait_set.len()
    }

    #[must_use]
    pub fn next_deadline(&self) -> Option<Instant> {
        self.shared.next_deadline()
    }

    #[must_use]
    pub fn stats(&self) -> Stats {
        self.shared.core.borrow().stats
    }

    /// Returns the state of `task`, or `None` if this scheduler never spawned it.
    #[must_use]
    pub fn task_state(&self, task: TaskId) -> Option<TaskState> {
        let core = self.shared.core.borrow();
        match core.task(task) {
            Some(task) => Some(task.state),
            None if task.serial < core.next_serial => Some(TaskState::Completed),
            None => None,
        }
    }

    /// Returns `true` if the scheduler this handle belongs to has been dropped.
    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.shared.closed.get()
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.shared
    }
}

impl fmt::Debug for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Handle")
            .field("shared", &self.shared)
            .finish()
    }
}

// === impl Shared ===

impl Shared {
    pub(crate) fn clock(&self) -> &Clock {
        &self.clock
    }

    pub(crate) fn current_task(&self) -> Option<TaskId> {
        self.core.borrow().current
    }

    pub(crate) fn is_idle(&self) -> bool {
        self.core.borrow().wait_set.is_empty()
    }

    pub(crate) fn next_deadline(&self) -> Option<Instant> {
        self.core.borrow().wait_set.next_deadline()
    }

    #[cold]
    #[track_caller]
    pub(crate) fn fatal(&self, violation: Violation) -> ! {
        fatal(violation, self.config.panic_policy)
    }

    pub(crate) fn spawn(
        &self,
        future: BoxFuture,
        name: Option<&'static str>,
        location: &'static Location<'static>,
    ) -> Result<TaskId, SpawnError> {
        if self.closed.get() {
            return Err(SpawnError::Closed);
        }

        let id = {
            let mut core = self.core.borrow_mut();

            if let Some(capacity) = self.config.task_capacity {
                if core.tasks.len() >= capacity.get() {
                    tracing::warn!(capacity = capacity.get(), "task storage exhausted");
                    return Err(SpawnError::Exhausted {
                        capacity: capacity.get(),
                    });
                }
            }

            let serial = core.next_serial;
            let slot = core.tasks.alloc(Task::new(
                TaskId::new(0, serial),
                future,
                tracing::Span::none(),
            ));
            let id = TaskId::new(slot.into_raw(), serial);
            core.slots = core.slots.max(id.slot + 1);
            core.next_serial += 1;
            core.stats.spawned += 1;

            let task = &mut core.tasks[slot];
            task.id = id;
            task.span = tracing::trace_span!(
                "task",
                task.id = id.as_u64(),
                task.name = name.unwrap_or("<unnamed>"),
                loc.file = location.file(),
                loc.line = location.line(),
                loc.col = location.column(),
            );
            id
        };

        tracing::trace!(task.id = %id, task.name = ?name, "spawned");
        self.resume(id);
        Ok(id)
    }

    /// Run the body of `task` until it suspends or completes.
    fn resume(&self, id: TaskId) -> TaskState {
        let (mut future, span, previous) = {
            let mut core = self.core.borrow_mut();
            let task = match core.task_mut(id) {
                Ok(task) => task,
                Err(violation) => {
                    drop(core);
                    self.fatal(violation)
                }
            };
            let future = match task.start_resume() {
                Ok(future) => future,
                Err(violation) => {
                    drop(core);
                    self.fatal(violation)
                }
            };
            let span = task.span.clone();
            core.stats.resumed += 1;
            (future, span, core.current.replace(id))
        };

        let poll = {
            let _running = Running {
                shared: self,
                task: id,
                previous,
            };
            let _entered = span.enter();
            self.poll_future(id, &mut future)
        };

        let mut core = self.core.borrow_mut();

        match poll {
            Poll::Ready(()) => {
                let mut task = core.tasks.dealloc(Id::from_raw(id.slot));
                if task.state == TaskState::Suspended {
                    // registered, then completed without yielding
                    core.wait_set.remove(id);
                    core.stats.suspended -= 1;
                    task.withdraw();
                }
                core.stats.completed += 1;
                drop(core);

                debug_assert_eq!(task.resumptions, task.suspensions + 1);
                tracing::debug!(
                    parent: &span,
                    task.id = %id,
                    resumptions = task.resumptions,
                    suspensions = task.suspensions,
                    "task completed"
                );
                drop(future);
                drop(task);
                TaskState::Completed
            }
            Poll::Pending => {
                let result = core
                    .task_mut(id)
                    .and_then(|task| task.end_resume(future));
                drop(core);

                if let Err(violation) = result {
                    self.fatal(violation);
                }
                TaskState::Suspended
            }
        }
    }

    fn poll_future(&self, id: TaskId, future: &mut BoxFuture) -> Poll<()> {
        let mut cx = Context::from_waker(noop_waker_ref());

        match self.config.panic_policy {
            PanicPolicy::Propagate => future.as_mut().poll(&mut cx),
            PanicPolicy::Abort => {
                match panic::catch_unwind(AssertUnwindSafe(|| future.as_mut().poll(&mut cx))) {
                    Ok(poll) => poll,
                    Err(_) => {
                        tracing::error!(task.id = %id, "task panicked, aborting");
                        std::process::abort()
                    }
                }
            }
        }
    }

    pub(crate) fn poll_once(&self) -> Tick {
        let now = self.clock.now();
        let mut tick = Tick::default();

        // only the entries present now, anything registered during this pass lands behind them
        let pending = self.core.borrow().wait_set.len();
        for _ in 0..pending {
            let Some(entry) = self.core.borrow_mut().wait_set.pop_front() else {
                break;
            };

            if entry.pollable.is_ready(now) {
                tick.ready += 1;
                tracing::trace!(task.id = %entry.task, ?now, "ready");
                if self.resume(entry.task) == TaskState::Completed {
                    tick.completed += 1;
                }
            } else {
                self.core.borrow_mut().wait_set.requeue(entry);
            }
        }

        tick.remaining = self.core.borrow().wait_set.len();
        tick
    }

    pub(crate) fn register(&self, id: TaskId, pollable: Pollable) {
        let mut core = self.core.borrow_mut();
        if let Err(violation) = core.task_mut(id).and_then(Task::suspend) {
            drop(core);
            self.fatal(violation);
        }

        core.wait_set.insert(WaitEntry { pollable, task: id });
        core.stats.suspended += 1;
        tracing::trace!(task.id = %id, ?pollable, "suspended");
    }

    /// Take back the registration of `id`, if it is still waiting.
    ///
    /// Used when a delay is dropped or found ready before the task yielded. Does nothing while
    /// the scheduler is busy or tearing down.
    pub(crate) fn withdraw(&self, id: TaskId) {
        if self.closed.get() {
            return;
        }
        let Ok(mut core) = self.core.try_borrow_mut() else {
            return;
        };
        let core = &mut *core;

        let Some(slot) = core.slab_id(id) else {
            return;
        };
        let Some(task) = core.tasks.get_mut(slot) else {
            return;
        };
        if task.id != id || task.state != TaskState::Suspended {
            return;
        }

        task.withdraw();
        core.wait_set.remove(id);
        core.stats.suspended -= 1;
        tracing::trace!(task.id = %id, "registration withdrawn");
    }

    pub(crate) fn note_fast_path(&self) {
        self.core.borrow_mut().stats.fast_path += 1;
    }
}

impl fmt::Debug for Shared {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_struct("Shared");
        dbg.field("clock", &self.clock)
            .field("config", &self.config)
            .field("closed", &self.closed.get());
        if let Ok(core) = self.core.try_borrow() {
            dbg.field("tasks", &core.tasks.len())
                .field("waiting", &core.wait_set.len())
                .field("current", &core.current)
                .field("stats", &core.stats);
        } else {
            dbg.field("core", &format_args!("<borrowed>"));
        }
        dbg.finish()
    }
}

/// Marks a task as the current one while its body runs.
///
/// Dropping it restores the previously current task. If the body panicked, the task is reaped
/// so that neither it nor a registration it left behind can be resumed.
struct Running<'a> {
    shared: &'a Shared,
    task: TaskId,
    previous: Option<TaskId>,
}

impl Drop for Running<'_> {
    fn drop(&mut self) {
        let Ok(mut core) = self.shared.core.try_borrow_mut() else {
            return;
        };
        core.current = self.previous;

        if std::thread::panicking() {
            let Some(slot) = core.slab_id(self.task) else {
                return;
            };
            let reaped = core.tasks.get(slot).is_some_and(|task| task.id == self.task);
            if reaped {
                let task = core.tasks.dealloc(slot);
                if task.state == TaskState::Suspended {
                    core.wait_set.remove(self.task);
                    core.stats.suspended -= 1;
                }
                drop(core);
                tracing::debug!(task.id = %self.task, "task panicked, reaped");
            }
        }
    }
}

// === impl Core ===

impl Core {
    /// Returns the slab ID for `id`, or `None` if no task ever occupied its slot.
    fn slab_id(&self, id: TaskId) -> Option<Id> {
        (id.slot < self.slots).then(|| Id::from_raw(id.slot))
    }

    fn task(&self, id: TaskId) -> Option<&Task> {
        self.tasks
            .get(self.slab_id(id)?)
            .filter(|task| task.id == id)
    }

    fn task_mut(&mut self, id: TaskId) -> Result<&mut Task, Violation> {
        if self.task(id).is_none() {
            return Err(self.missing(id));
        }
        Ok(&mut self.tasks[Id::from_raw(id.slot)])
    }

    /// Classify an ID that has no live task behind it.
    fn missing(&self, id: TaskId) -> Violation {
        if id.serial < self.next_serial {
            Violation::Completed(id)
        } else {
            Violation::UnknownTask(id)
        }
    }
}
