//! `slotclaim-runner`: a single registration attempt.
//!
//! [`job::Job`] ties the two browser-driving steps together:
//!
//! 1. [`discovery::LinkFinder`] scans the source page for a link on the
//!    sign-up domain (or takes a direct sign-up URL as-is).
//! 2. [`registration::SlotRegistrar`] walks the sign-up form and claims one
//!    slot for the configured identity.
//!
//! Both steps return typed results; the job decides what gets logged and when
//! the shared stop signal is raised.

pub mod discovery;
pub mod error;
pub mod job;
pub mod registration;
pub mod target;

#[cfg(test)]
mod fake;

pub use discovery::{DiscoveryResult, LinkFinder};
pub use error::{DiscoveryError, RegistrationError, Step};
pub use job::{Job, JobOutcome, JobRequest, JobRunner, ScheduledJob};
pub use registration::{RegistrationResult, SignupForm, SlotRegistrar};
pub use target::is_target_url;
