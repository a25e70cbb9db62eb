// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::cell::RefCell;
use core::time::Duration;
use std::rc::Rc;

use kcoop::{PanicPolicy, Scheduler, TaskId, TaskState, ThreadPark};
use kcoop_clock::{Clock, Instant, MockClock, TickCounter, Wrap};

type Log = Rc<RefCell<Vec<(&'static str, Instant)>>>;

fn scheduler(clock: Clock) -> Scheduler {
    Scheduler::builder()
        .on_task_panic(PanicPolicy::Propagate)
        .build(clock)
}

fn ms(ms: u64) -> Instant {
    Instant::ZERO + Duration::from_millis(ms)
}

/// Spawn A (sleeps 1000ms, then 500ms) and B (sleeps 750ms) and record their progress.
fn spawn_a_and_b(scheduler: &Scheduler, log: &Log) -> (TaskId, TaskId) {
    let h = scheduler.handle();
    let a_log = log.clone();
    let a = scheduler
        .build_task()
        .name("A")
        .spawn(async move {
            h.sleep(Duration::from_millis(1000)).await;
            a_log.borrow_mut().push(("A stage 1", h.now()));
            h.sleep(Duration::from_millis(500)).await;
            a_log.borrow_mut().push(("A done", h.now()));
        })
        .unwrap();

    let h = scheduler.handle();
    let b_log = log.clone();
    let b = scheduler
        .build_task()
        .name("B")
        .spawn(async move {
            h.sleep(Duration::from_millis(750)).await;
            b_log.borrow_mut().push(("B done", h.now()));
        })
        .unwrap();

    (a, b)
}

#[test_log::test]
fn interleaved_sleepers_resume_in_deadline_order() {
    let mock = MockClock::millis();
    let scheduler = scheduler(mock.clock());
    let log = Log::default();

    spawn_a_and_b(&scheduler, &log);
    assert_eq!(scheduler.wait_set_len(), 2);

    for _ in 0..6 {
        mock.advance(250);
        let _ = scheduler.poll_once();
    }

    assert!(scheduler.is_idle());
    assert_eq!(
        *log.borrow(),
        [
            ("B done", ms(750)),
            ("A stage 1", ms(1000)),
            ("A done", ms(1500)),
        ]
    );
}

#[test_log::test]
fn poll_once_resumes_nothing_early() {
    let mock = MockClock::millis();
    let scheduler = scheduler(mock.clock());
    let log = Log::default();

    spawn_a_and_b(&scheduler, &log);

    mock.advance(749);
    let tick = scheduler.poll_once();
    assert_eq!(tick.ready, 0);
    assert_eq!(tick.remaining, 2);
    assert!(log.borrow().is_empty());

    mock.advance(1);
    let tick = scheduler.poll_once();
    assert_eq!((tick.ready, tick.completed, tick.remaining), (1, 1, 1));
    assert_eq!(scheduler.next_deadline(), Some(ms(1000)));
}

#[test_log::test]
fn run_drives_everything_to_completion() {
    let mock = MockClock::millis();
    mock.auto_advance(1);
    let scheduler = scheduler(mock.clock());
    let log = Log::default();

    let (a, b) = spawn_a_and_b(&scheduler, &log);
    let summary = scheduler.run();

    assert!(scheduler.is_idle());
    assert_eq!(summary.resumed, 3);
    assert_eq!(summary.completed, 2);
    assert_eq!(scheduler.task_state(a), Some(TaskState::Completed));
    assert_eq!(scheduler.task_state(b), Some(TaskState::Completed));

    // one resumption per suspension, plus the initial run of each task
    let stats = scheduler.stats();
    assert_eq!(stats.suspended, 3);
    assert_eq!(stats.resumed, stats.spawned + stats.suspended);

    let log = log.borrow();
    let order: Vec<_> = log.iter().map(|(what, _)| *what).collect();
    assert_eq!(order, ["B done", "A stage 1", "A done"]);
    for (what, at) in log.iter() {
        let due = match *what {
            "B done" => ms(750),
            "A stage 1" => ms(1000),
            _ => ms(1500),
        };
        assert!(*at >= due, "{what} resumed at {at:?}, before {due:?}");
    }
}

#[test_log::test]
fn sleepers_survive_a_wrapping_counter() {
    // a 10 bit counter wraps at 1024 ticks, before A is done
    let mock = MockClock::new(Duration::from_millis(1), Wrap::bits(10).unwrap());
    let scheduler = scheduler(mock.clock());
    let log = Log::default();

    spawn_a_and_b(&scheduler, &log);
    for _ in 0..6 {
        mock.advance(250);
        let _ = scheduler.poll_once();
    }

    assert!(mock.raw() < 1024);
    assert_eq!(
        *log.borrow(),
        [
            ("B done", ms(750)),
            ("A stage 1", ms(1000)),
            ("A done", ms(1500)),
        ]
    );
}

#[test_log::test]
fn thread_park_with_a_real_tick_source() {
    let counter = TickCounter::spawn(Duration::from_millis(1), Wrap::Full).unwrap();
    let scheduler = scheduler(counter.clock());
    let h = scheduler.handle();
    let start = scheduler.now();

    let id = scheduler
        .spawn(async move {
            h.sleep(Duration::from_millis(5)).await;
            h.sleep(Duration::from_millis(5)).await;
        })
        .unwrap();

    let summary = scheduler.run_with(&ThreadPark);
    assert_eq!(summary.resumed, 2);
    assert_eq!(scheduler.task_state(id), Some(TaskState::Completed));
    assert!(scheduler.now() - start >= Duration::from_millis(10));
}

#[test_log::test]
fn tasks_spawned_from_tasks_are_driven_too() {
    let mock = MockClock::millis();
    mock.auto_advance(1);
    let scheduler = scheduler(mock.clock());
    let h = scheduler.handle();
    let log = Log::default();

    let outer_log = log.clone();
    scheduler
        .spawn(async move {
            h.sleep(Duration::from_millis(10)).await;
            let child = h.clone();
            let child_log = outer_log.clone();
            h.build_task()
                .name("child")
                .spawn(async move {
                    child.sleep(Duration::from_millis(5)).await;
                    child_log.borrow_mut().push(("child", child.now()));
                })
                .unwrap();
            outer_log.borrow_mut().push(("parent", h.now()));
        })
        .unwrap();

    scheduler.run();
    let order: Vec<_> = log.borrow().iter().map(|(what, _)| *what).collect();
    assert_eq!(order, ["parent", "child"]);
    assert_eq!(scheduler.stats().spawned, 2);
}

#[test_log::test]
fn thread_park_keeps_sampling_a_narrow_counter() {
    // an 8 bit counter at 1ms wraps every 256ms, the sleep spans a couple of wraps
    let counter = TickCounter::spawn(Duration::from_millis(1), Wrap::bits(8).unwrap()).unwrap();
    let scheduler = scheduler(counter.clock());
    let h = scheduler.handle();
    let start = scheduler.now();
    let wall = std::time::Instant::now();

    let id = scheduler
        .spawn(async move { h.sleep(Duration::from_millis(600)).await })
        .unwrap();

    let summary = scheduler.run_with(&ThreadPark);
    let elapsed = wall.elapsed();

    assert_eq!(summary.resumed, 1);
    assert_eq!(scheduler.task_state(id), Some(TaskState::Completed));
    assert!(scheduler.now() - start >= Duration::from_millis(600));
    assert!(
        elapsed < Duration::from_millis(1500),
        "600ms sleep took {elapsed:?}"
    );
}
