// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

use core::time::Duration;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use kcoop::{PanicPolicy, Scheduler};
use kcoop_clock::MockClock;

fn sleepers_until_idle(c: &mut Criterion) {
    let mut group = c.benchmark_group("sleepers_until_idle");

    for tasks in [1_usize, 16, 256] {
        group.bench_with_input(BenchmarkId::from_parameter(tasks), &tasks, |b, &tasks| {
            b.iter(|| {
                let mock = MockClock::millis();
                mock.auto_advance(1);
                let scheduler = Scheduler::builder()
                    .on_task_panic(PanicPolicy::Propagate)
                    .wait_set_capacity(tasks)
                    .build(mock.clock());

                for i in 0..tasks {
                    let h = scheduler.handle();
                    let delay = Duration::from_millis((i % 7) as u64 + 1);
                    scheduler
                        .spawn(async move {
                            for _ in 0..10 {
                                h.sleep(delay).await;
                            }
                        })
                        .unwrap();
                }

                scheduler.run()
            });
        });
    }

    group.finish();
}

fn poll_not_ready(c: &mut Criterion) {
    let mock = MockClock::millis();
    let scheduler = Scheduler::builder()
        .on_task_panic(PanicPolicy::Propagate)
        .build(mock.clock());

    for _ in 0..256 {
        let h = scheduler.handle();
        scheduler
            .spawn(async move { h.sleep(Duration::from_secs(3600)).await })
            .unwrap();
    }

    c.bench_function("poll_256_not_ready", |b| {
        b.iter(|| scheduler.poll_once());
    });
}

fn zero_delay_fast_path(c: &mut Criterion) {
    let mock = MockClock::millis();
    let scheduler = Scheduler::builder()
        .on_task_panic(PanicPolicy::Propagate)
        .build(mock.clock());

    c.bench_function("zero_delay_10k", |b| {
        b.iter(|| {
            let h = scheduler.handle();
            scheduler
                .spawn(async move {
                    for _ in 0..10_000 {
                        h.sleep(Duration::ZERO).await;
                    }
                })
                .unwrap()
        });
    });
}

criterion_group!(
    benches,
    sleepers_until_idle,
    poll_not_ready,
    zero_delay_fast_path
);
criterion_main!(benches);
