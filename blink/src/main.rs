// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! Two blinking "LEDs" sharing one cooperative scheduler.

use core::time::Duration;
use std::process;

use anyhow::Context;
use kcoop::{Handle, Scheduler};
use kcoop_clock::{TickCounter, Wrap};
use tracing_subscriber::EnvFilter;

/// A blinker pattern: each delay in milliseconds, followed by the mark logged once it is over.
type Pattern = [(u64, Option<&'static str>); 6];

const FB0: Pattern = [
    (1000, Some("1")),
    (1000, Some("2")),
    (500, Some("3")),
    (250, Some("4")),
    (250, Some("5")),
    (3000, None),
];

const FB1: Pattern = [
    (2000, Some("a")),
    (500, Some("b")),
    (2000, Some("c")),
    (1000, Some("d")),
    (250, Some("e")),
    (3000, None),
];

fn main() {
    if let Err(err) = run() {
        tracing::error!("{err:?}");
        process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let ticks = TickCounter::spawn(Duration::from_millis(1), Wrap::Full)
        .context("failed to start the tick counter")?;
    let scheduler = Scheduler::new(ticks.clock().named("systick"));

    for (name, pattern) in [("fb0", FB0), ("fb1", FB1)] {
        let h = scheduler.handle();
        scheduler
            .build_task()
            .name(name)
            .spawn(blink(h, name, pattern))
            .with_context(|| format!("failed to spawn {name}"))?;
    }

    tracing::info!("start");
    let summary = scheduler.run();
    tracing::info!(passes = summary.passes, resumed = summary.resumed, "done");

    Ok(())
}

async fn blink(h: Handle, name: &'static str, pattern: Pattern) {
    tracing::info!(at = ?h.now(), "{name}");
    for (ms, mark) in pattern {
        h.sleep(Duration::from_millis(ms)).await;
        if let Some(mark) = mark {
            tracing::info!(led = name, at = ?h.now(), "{mark}");
        }
    }
}
