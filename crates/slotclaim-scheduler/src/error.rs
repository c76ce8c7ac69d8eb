use thiserror::Error;

/// Errors that can occur while arming the scheduler.
#[derive(Debug, Error)]
pub enum SchedulerError {
    /// The configured schedule cannot be turned into a weekly window.
    #[error("Invalid schedule: {0}")]
    InvalidSchedule(String),

    /// Underlying configuration problem.
    #[error(transparent)]
    Config(#[from] slotclaim_core::CoreError),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;
