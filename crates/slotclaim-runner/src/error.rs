use std::fmt;

use slotclaim_browser::BrowserError;
use thiserror::Error;

/// Link discovery failures. Callers normally fold these into "not found".
#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("Could not start browser: {0}")]
    Setup(#[source] BrowserError),

    #[error("Failed to load {url}: {source}")]
    Navigation {
        url: String,
        #[source]
        source: BrowserError,
    },

    #[error("Failed to read links: {0}")]
    Scan(#[source] BrowserError),
}

/// One step of the sign-up form sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Step {
    Navigate,
    SignupButton,
    Confirm,
    FirstName,
    LastName,
    Email,
    Submit,
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Step::Navigate => "navigate",
            Step::SignupButton => "signup button",
            Step::Confirm => "confirm button",
            Step::FirstName => "first name field",
            Step::LastName => "last name field",
            Step::Email => "email field",
            Step::Submit => "submit button",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Error)]
pub enum RegistrationError {
    /// The browser never started; nothing on the page was touched.
    #[error("Could not start browser: {0}")]
    Setup(#[source] BrowserError),

    /// Signup controls exist but none is enabled and visible.
    #[error("No enabled signup button among {candidates} found; slots may be full")]
    SlotsExhausted { candidates: usize },

    #[error("Registration failed at {step}: {source}")]
    Step {
        step: Step,
        #[source]
        source: BrowserError,
    },
}

impl RegistrationError {
    pub fn at(step: Step) -> impl FnOnce(BrowserError) -> RegistrationError {
        move |source| RegistrationError::Step { step, source }
    }

    /// Whether the rest of the automation session should stop.
    ///
    /// A full page or a form left half filled is not retried; a browser that
    /// failed to start touched nothing and the next interval may try again.
    pub fn halts_session(&self) -> bool {
        !matches!(self, RegistrationError::Setup(_))
    }
}
