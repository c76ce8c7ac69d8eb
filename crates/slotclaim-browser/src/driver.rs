use std::fmt;

use async_trait::async_trait;

use crate::error::Result;

/// How to find elements on a page.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    Css(String),
    XPath(String),
    Id(String),
    Name(String),
    TagName(String),
}

impl Locator {
    pub fn css(s: impl Into<String>) -> Self {
        Locator::Css(s.into())
    }
    pub fn xpath(s: impl Into<String>) -> Self {
        Locator::XPath(s.into())
    }
    pub fn id(s: impl Into<String>) -> Self {
        Locator::Id(s.into())
    }
    pub fn name(s: impl Into<String>) -> Self {
        Locator::Name(s.into())
    }
    pub fn tag(s: impl Into<String>) -> Self {
        Locator::TagName(s.into())
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Locator::Css(s) => write!(f, "css `{s}`"),
            Locator::XPath(s) => write!(f, "xpath `{s}`"),
            Locator::Id(s) => write!(f, "id `{s}`"),
            Locator::Name(s) => write!(f, "name `{s}`"),
            Locator::TagName(s) => write!(f, "tag `{s}`"),
        }
    }
}

/// Opaque handle to an element inside one browser context.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementRef(pub String);

impl ElementRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Starts browser sessions. Implementations must be shareable across tasks;
/// the contexts they hand out are not.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Start a fresh, isolated browser context.
    async fn open(&self, headless: bool) -> Result<Box<dyn BrowserContext>>;
}

/// One live browser session, owned by exactly one call.
///
/// Callers must `close()` the context on every exit path.
#[async_trait]
pub trait BrowserContext: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;

    /// All elements currently matching `locator` (possibly none).
    async fn find_all(&self, locator: &Locator) -> Result<Vec<ElementRef>>;

    async fn is_enabled(&self, element: &ElementRef) -> Result<bool>;

    async fn is_displayed(&self, element: &ElementRef) -> Result<bool>;

    async fn click(&self, element: &ElementRef) -> Result<()>;

    async fn clear(&self, element: &ElementRef) -> Result<()>;

    async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<()>;

    /// DOM property value (e.g. the resolved `href` of an anchor).
    async fn property(&self, element: &ElementRef, name: &str) -> Result<Option<String>>;

    /// Maximise the window. Headless sessions may treat this as a no-op.
    async fn maximize(&self) -> Result<()> {
        Ok(())
    }

    async fn close(&self) -> Result<()>;
}
