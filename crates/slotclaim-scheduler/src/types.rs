use std::fmt;

/// Result of asking the checker to begin a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StartOutcome {
    Started,
    /// A session is already running; nothing changed.
    AlreadyChecking,
    /// Wall clock is outside the window, the checker stays idle.
    OutsideWindow,
    /// The stop signal is raised.
    Stopped,
}

/// Why a checking session returned to idle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EndReason {
    /// A job claimed a slot.
    Registered,
    WindowClosed,
    /// The process-wide stop signal was raised.
    Stopped,
    /// [`crate::WindowedChecker::stop`] was called.
    Cancelled,
}

impl fmt::Display for EndReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EndReason::Registered => "registered",
            EndReason::WindowClosed => "window closed",
            EndReason::Stopped => "stopped",
            EndReason::Cancelled => "cancelled",
        };
        write!(f, "{s}")
    }
}

/// What one session did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckSummary {
    pub attempts: u32,
    pub ended: EndReason,
}
