//! Link discovery: find a freshly published sign-up link on the source page.

use std::sync::Arc;

use slotclaim_browser::{BrowserContext, BrowserDriver, BrowserError, Locator};
use tracing::{debug, error, info, warn};

use crate::error::DiscoveryError;
use crate::target::is_target_url;

/// `Ok(None)` means the page loaded fine but had no matching link.
pub type DiscoveryResult = Result<Option<String>, DiscoveryError>;

pub struct LinkFinder {
    driver: Arc<dyn BrowserDriver>,
    target_domain: String,
}

impl LinkFinder {
    pub fn new(driver: Arc<dyn BrowserDriver>, target_domain: &str) -> Self {
        Self {
            driver,
            target_domain: target_domain.to_string(),
        }
    }

    /// Return the sign-up link for `source_url`, or `None`.
    ///
    /// Never fails: every browser problem is logged and reported as "not found"
    /// so one bad page load cannot end unattended automation.
    pub async fn discover(&self, source_url: &str, headless: bool, skip_check: bool) -> Option<String> {
        match self.find(source_url, headless, skip_check).await {
            Ok(found) => found,
            Err(e) => {
                error!(%source_url, "link check failed: {e}");
                None
            }
        }
    }

    /// Typed variant of [`LinkFinder::discover`].
    pub async fn find(&self, source_url: &str, headless: bool, skip_check: bool) -> DiscoveryResult {
        if skip_check && is_target_url(source_url, &self.target_domain) {
            info!(%source_url, "skipping link check, source is already a sign-up URL");
            return Ok(Some(source_url.to_string()));
        }

        info!(%source_url, driver = self.driver.name(), "starting link check");
        let ctx = self
            .driver
            .open(headless)
            .await
            .map_err(DiscoveryError::Setup)?;

        let result = self.scan(ctx.as_ref(), source_url).await;

        if let Err(e) = ctx.close().await {
            warn!("error closing browser after link check: {e}");
        }
        result
    }

    async fn scan(&self, ctx: &dyn BrowserContext, source_url: &str) -> DiscoveryResult {
        ctx.navigate(source_url)
            .await
            .map_err(|source| DiscoveryError::Navigation {
                url: source_url.to_string(),
                source,
            })?;

        let anchors = match ctx.find_all(&Locator::tag("a")).await {
            Ok(anchors) => anchors,
            Err(BrowserError::ElementMissing(_)) => Vec::new(),
            Err(e) => return Err(DiscoveryError::Scan(e)),
        };
        debug!(count = anchors.len(), "scanning anchors");

        for anchor in &anchors {
            let href = match ctx.property(anchor, "href").await {
                Ok(Some(href)) => href,
                Ok(None) => continue,
                Err(e) => {
                    warn!("error reading a link, skipping it: {e}");
                    continue;
                }
            };
            if is_target_url(&href, &self.target_domain) {
                info!(%href, "found signup link");
                return Ok(Some(href));
            }
        }

        info!(scanned = anchors.len(), "no matching signup link found");
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fake::{FakeBrowser, FakeElement, FakePage};
    use std::sync::atomic::Ordering;

    const DOMAIN: &str = "signupgenius.com";
    const SOURCE: &str = "https://uwm.edu/food-pantry/";

    fn finder(browser: &Arc<FakeBrowser>) -> LinkFinder {
        LinkFinder::new(browser.clone(), DOMAIN)
    }

    #[tokio::test]
    async fn skip_check_short_circuits_without_browser() {
        let browser = Arc::new(FakeBrowser::new(FakePage::new()));
        let url = "https://www.signupgenius.com/go/10C0F4";

        let found = finder(&browser).discover(url, true, true).await;

        assert_eq!(found.as_deref(), Some(url));
        assert_eq!(browser.page.opens.load(Ordering::SeqCst), 0);
        assert_eq!(browser.page.navigations.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn skip_check_on_foreign_url_still_scans() {
        let page = FakePage::new().with(
            Locator::tag("a"),
            vec![FakeElement::link("https://www.signupgenius.com/go/abc")],
        );
        let browser = Arc::new(FakeBrowser::new(page));

        let found = finder(&browser).discover(SOURCE, true, true).await;

        assert_eq!(found.as_deref(), Some("https://www.signupgenius.com/go/abc"));
        assert_eq!(browser.page.navigations.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn returns_first_target_link_only() {
        let page = FakePage::new().with(
            Locator::tag("a"),
            vec![
                FakeElement::link("https://uwm.edu/about"),
                FakeElement::link("https://signupgenius.com.evil.net/go/x"),
                FakeElement::button(true),
                FakeElement::link("https://www.signupgenius.com/go/first"),
                FakeElement::link("https://www.signupgenius.com/go/second"),
            ],
        );
        let browser = Arc::new(FakeBrowser::new(page));

        let found = finder(&browser).discover(SOURCE, true, false).await;

        assert_eq!(found.as_deref(), Some("https://www.signupgenius.com/go/first"));
        assert_eq!(browser.page.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn no_matching_link_is_not_found() {
        let page = FakePage::new().with(
            Locator::tag("a"),
            vec![FakeElement::link("https://uwm.edu/hours")],
        );
        let browser = Arc::new(FakeBrowser::new(page));

        let result = finder(&browser).find(SOURCE, true, false).await;

        assert!(matches!(result, Ok(None)));
        assert_eq!(browser.page.closes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn navigation_failure_becomes_not_found_and_closes() {
        let browser = Arc::new(FakeBrowser::new(FakePage::new().failing_navigation()));

        let typed = finder(&browser).find(SOURCE, true, false).await;
        assert!(matches!(typed, Err(DiscoveryError::Navigation { .. })));

        assert_eq!(finder(&browser).discover(SOURCE, true, false).await, None);
        assert_eq!(browser.page.closes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn browser_setup_failure_becomes_not_found() {
        let browser = Arc::new(FakeBrowser::broken());
        assert_eq!(finder(&browser).discover(SOURCE, false, false).await, None);
    }
}
