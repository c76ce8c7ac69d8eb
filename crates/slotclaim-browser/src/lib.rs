//! `slotclaim-browser`: the browser automation seam.
//!
//! The orchestration core only sees [`BrowserDriver`] / [`BrowserContext`];
//! [`webdriver::WebDriverClient`] is the production backend, driving chromedriver
//! or geckodriver through `fantoccini`.

pub mod driver;
pub mod error;
pub mod wait;
pub mod webdriver;

pub use driver::{BrowserContext, BrowserDriver, ElementRef, Locator};
pub use error::{BrowserError, Result};
pub use wait::WaitPolicy;
pub use webdriver::WebDriverClient;
