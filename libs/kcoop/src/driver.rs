// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use crate::park::Park;
use crate::scheduler::Shared;

/// What a [`Scheduler::run`] call did.
///
/// [`Scheduler::run`]: crate::Scheduler::run
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Passes over the wait set.
    pub passes: usize,
    /// Tasks resumed from the wait set.
    pub resumed: usize,
    /// Resumed tasks that ran to completion.
    pub completed: usize,
}

pub(crate) fn run_until_idle<P>(shared: &Shared, park: &P) -> RunSummary
where
    P: Park + ?Sized,
{
    let span = tracing::debug_span!("run", clock = shared.clock().name());
    let _entered = span.enter();

    let mut summary = RunSummary::default();
    while !shared.is_idle() {
        let tick = shared.poll_once();
        summary.passes += 1;
        summary.resumed += tick.ready;
        summary.completed += tick.completed;

        if tick.ready == 0 {
            if let Some(deadline) = shared.next_deadline() {
                park.park_until(deadline, shared.clock());
            }
        }
    }

    tracing::debug!(
        passes = summary.passes,
        resumed = summary.resumed,
        completed = summary.completed,
        "idle"
    );
    summary
}
