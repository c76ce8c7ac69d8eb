//! `slotclaim-scheduler`: weekly trigger and windowed polling.
//!
//! # Overview
//!
//! [`engine::Scheduler`] ticks once a second. When the weekly trigger at
//! `(day_of_week, start_time)` comes due it starts a
//! [`checker::WindowedChecker`] session, which runs a job every
//! `check_interval` minutes until the window closes, a slot is claimed, or the
//! stop signal is raised.
//!
//! | Source of a stop        | Observed by                         |
//! |-------------------------|-------------------------------------|
//! | Successful registration | the job (with `stop_after_success`) |
//! | Registration failure    | the registrar                       |
//! | Stop file               | the scheduler tick                  |
//! | SIGINT / SIGTERM        | the binary's signal handler         |
//!
//! Wall-clock reads go through [`clock::Clock`] so tests can drive whole
//! windows under a paused tokio runtime.

pub mod checker;
pub mod clock;
pub mod engine;
pub mod error;
pub mod schedule;
pub mod sentinel;
pub mod types;

pub use checker::WindowedChecker;
pub use clock::{Clock, SystemClock, TokioClock};
pub use engine::Scheduler;
pub use error::{Result, SchedulerError};
pub use schedule::{next_weekly, WeeklyTrigger};
pub use sentinel::StopFile;
pub use types::{CheckSummary, EndReason, StartOutcome};
