use fantoccini::error::{CmdError, NewSessionError};
use thiserror::Error;

/// Errors raised while talking to a browser automation backend.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// Could not start a browser session at all.
    #[error("Session setup failed: {0}")]
    SessionSetup(String),

    /// A wait-for-condition step ran out of time.
    #[error("Timed out after {ms}ms waiting for {what}")]
    Timeout { what: String, ms: u64 },

    /// The requested element is not on the page.
    #[error("No such element: {0}")]
    ElementMissing(String),

    /// The element handle no longer refers to a live node.
    #[error("Stale element reference: {0}")]
    StaleElement(String),

    /// Any other failure reported by the WebDriver server or its transport.
    #[error("WebDriver command failed: {0}")]
    Command(String),

    /// The session was already closed.
    #[error("Browser session closed")]
    Closed,
}

impl BrowserError {
    /// Whether the failure means the page is not in the expected shape
    /// (timeout or missing node) rather than a broken driver.
    pub fn is_page_mismatch(&self) -> bool {
        matches!(
            self,
            BrowserError::Timeout { .. }
                | BrowserError::ElementMissing(_)
                | BrowserError::StaleElement(_)
        )
    }
}

impl From<CmdError> for BrowserError {
    fn from(e: CmdError) -> Self {
        if e.is_no_such_element() {
            BrowserError::ElementMissing(e.to_string())
        } else {
            BrowserError::Command(e.to_string())
        }
    }
}

impl From<NewSessionError> for BrowserError {
    fn from(e: NewSessionError) -> Self {
        BrowserError::SessionSetup(e.to_string())
    }
}

pub type Result<T> = std::result::Result<T, BrowserError>;
