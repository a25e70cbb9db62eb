// Copyright 2025 Jonas Kruckenberg
//
// Licensed under the Apache License, Version 2.0, <LICENSE-APACHE or
// http://apache.org/licenses/LICENSE-2.0> or the MIT license <LICENSE-MIT or
// http://opensource.org/licenses/MIT>, at your option. This file may not be
// copied, modified, or distributed except according to those terms.

//! A cooperative, single-threaded task scheduler with deadline-based suspension.
//!
//! Tasks are plain `async` blocks. They run eagerly when spawned and only ever give up
//! control when they ask to be delayed through [`Handle::sleep`]. A delayed task is parked in
//! the scheduler's *wait set* together with a [`Pollable`] describing when it may continue;
//! [`Scheduler::poll_once`] visits the wait set and resumes every task whose condition holds,
//! and the driver loop ([`Scheduler::run`]) keeps doing that until no task is left waiting.
//!
//! ```no_run
//! use core::time::Duration;
//! use kcoop::Scheduler;
//! use kcoop_clock::Clock;
//!
//! let scheduler = Scheduler::new(Clock::system());
//! let h = scheduler.handle();
//!
//! scheduler
//!     .spawn(async move {
//!         tracing::info!("before");
//!         h.sleep(Duration::from_millis(100)).await;
//!         tracing::info!("after");
//!     })
//!     .unwrap();
//!
//! scheduler.run();
//! ```

mod config;
mod driver;
mod error;
mod park;
mod pollable;
mod scheduler;
mod task;
mod time;

pub use config::{Builder, PanicPolicy};
pub use driver::RunSummary;
pub use error::{SpawnError, Violation};
pub use park::{Park, Spin, ThreadPark};
pub use pollable::Pollable;
pub use scheduler::{Handle, Scheduler, Stats, Tick};
pub use task::{TaskBuilder, TaskId, TaskState};
pub use time::Sleep;
