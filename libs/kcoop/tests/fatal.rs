// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::time::Duration;
use std::process::Command;

use kcoop::{PanicPolicy, Pollable, Scheduler};
use kcoop_clock::MockClock;

/// Set in the environment of re-executed test binaries.
const CHILD_ENV: &str = "KCOOP_FATAL_CHILD";

fn register_twice(scheduler: &Scheduler) {
    let h = scheduler.handle();
    scheduler
        .spawn(async move {
            let me = h.current_task().unwrap();
            let mut first = h.sleep(Duration::from_secs(1));
            assert!(futures::poll!(&mut first).is_pending());

            h.register(me, Pollable::timer(h.now() + Duration::from_secs(2)));
            unreachable!("second registration must not return");
        })
        .unwrap();
}

/// Re-run the single test `name` in a child process and return its exit status.
fn run_child(name: &str) -> std::process::ExitStatus {
    Command::new(std::env::current_exe().unwrap())
        .args(["--exact", name, "--nocapture", "--test-threads=1"])
        .env(CHILD_ENV, "1")
        .status()
        .unwrap()
}

fn assert_aborted(status: std::process::ExitStatus) {
    assert!(!status.success(), "child exited cleanly: {status}");

    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        assert_eq!(status.signal(), Some(6), "child was not aborted: {status}");
    }
}

#[test_log::test]
#[should_panic(expected = "registered twice")]
fn double_registration_panics_when_propagating() {
    let mock = MockClock::millis();
    let scheduler = Scheduler::builder()
        .on_task_panic(PanicPolicy::Propagate)
        .build(mock.clock());
    register_twice(&scheduler);
}

#[test]
fn double_registration_aborts_by_default() {
    if std::env::var_os(CHILD_ENV).is_some() {
        let mock = MockClock::millis();
        register_twice(&Scheduler::new(mock.clock()));
        return;
    }

    assert_aborted(run_child("double_registration_aborts_by_default"));
}

#[test]
fn panicking_task_aborts_by_default() {
    if std::env::var_os(CHILD_ENV).is_some() {
        let mock = MockClock::millis();
        let scheduler = Scheduler::new(mock.clock());
        let h = scheduler.handle();
        scheduler
            .spawn(async move {
                h.sleep(Duration::from_millis(1)).await;
                panic!("task failure");
            })
            .unwrap();
        mock.advance(1);
        let _ = scheduler.poll_once();
        return;
    }

    assert_aborted(run_child("panicking_task_aborts_by_default"));
}

#[test_log::test]
#[should_panic(expected = "has already completed")]
fn registering_a_completed_task_is_fatal() {
    let mock = MockClock::millis();
    let scheduler = Scheduler::builder()
        .on_task_panic(PanicPolicy::Propagate)
        .build(mock.clock());

    let done = scheduler.spawn(async {}).unwrap();
    scheduler
        .handle()
        .register(done, Pollable::timer(scheduler.now()));
}

#[test_log::test]
#[should_panic(expected = "without a resumption condition")]
fn yielding_without_a_condition_is_fatal() {
    let mock = MockClock::millis();
    let scheduler = Scheduler::builder()
        .on_task_panic(PanicPolicy::Propagate)
        .build(mock.clock());

    let _ = scheduler.spawn(futures::future::pending::<()>());
}
