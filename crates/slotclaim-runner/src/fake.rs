//! Scriptable in-memory browser used by the unit tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use slotclaim_browser::{
    BrowserContext, BrowserDriver, BrowserError, ElementRef, Locator, Result,
};

#[derive(Debug, Clone)]
pub struct FakeElement {
    pub enabled: bool,
    pub displayed: bool,
    pub href: Option<String>,
}

impl FakeElement {
    pub fn button(enabled: bool) -> Self {
        Self {
            enabled,
            displayed: true,
            href: None,
        }
    }

    pub fn link(href: &str) -> Self {
        Self {
            enabled: true,
            displayed: true,
            href: Some(href.to_string()),
        }
    }
}

#[derive(Default)]
pub struct FakePage {
    by_locator: Mutex<HashMap<Locator, Vec<String>>>,
    elements: Mutex<HashMap<String, FakeElement>>,
    values: Mutex<HashMap<String, String>>,
    actions: Mutex<Vec<String>>,
    headless: Mutex<Vec<bool>>,
    pub fail_navigation: bool,
    pub opens: AtomicUsize,
    pub navigations: AtomicUsize,
    pub closes: AtomicUsize,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(self, locator: Locator, elements: Vec<FakeElement>) -> Self {
        {
            let mut by_locator = self.by_locator.lock().unwrap();
            let mut all = self.elements.lock().unwrap();
            let ids = by_locator.entry(locator).or_default();
            for element in elements {
                let id = format!("el-{}", all.len() + 1);
                all.insert(id.clone(), element);
                ids.push(id);
            }
        }
        self
    }

    pub fn failing_navigation(mut self) -> Self {
        self.fail_navigation = true;
        self
    }

    pub fn actions(&self) -> Vec<String> {
        self.actions.lock().unwrap().clone()
    }

    pub fn value_of(&self, locator: &Locator) -> Option<String> {
        let id = self.by_locator.lock().unwrap().get(locator)?.first()?.clone();
        self.values.lock().unwrap().get(&id).cloned()
    }

    /// Display mode of every session opened so far.
    pub fn headless_modes(&self) -> Vec<bool> {
        self.headless.lock().unwrap().clone()
    }

    fn record(&self, action: String) {
        self.actions.lock().unwrap().push(action);
    }

    fn element(&self, element: &ElementRef) -> Result<FakeElement> {
        self.elements
            .lock()
            .unwrap()
            .get(element.as_str())
            .cloned()
            .ok_or_else(|| BrowserError::StaleElement(element.as_str().to_string()))
    }
}

pub struct FakeBrowser {
    pub page: Arc<FakePage>,
    pub fail_open: bool,
}

impl FakeBrowser {
    pub fn new(page: FakePage) -> Self {
        Self {
            page: Arc::new(page),
            fail_open: false,
        }
    }

    pub fn broken() -> Self {
        Self {
            page: Arc::new(FakePage::new()),
            fail_open: true,
        }
    }
}

#[async_trait]
impl BrowserDriver for FakeBrowser {
    fn name(&self) -> &str {
        "fake"
    }

    async fn open(&self, headless: bool) -> Result<Box<dyn BrowserContext>> {
        if self.fail_open {
            return Err(BrowserError::SessionSetup("no browser installed".to_string()));
        }
        self.page.opens.fetch_add(1, Ordering::SeqCst);
        self.page.headless.lock().unwrap().push(headless);
        Ok(Box::new(FakeContext {
            page: Arc::clone(&self.page),
        }))
    }
}

struct FakeContext {
    page: Arc<FakePage>,
}

#[async_trait]
impl BrowserContext for FakeContext {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.page.navigations.fetch_add(1, Ordering::SeqCst);
        self.page.record(format!("navigate {url}"));
        if self.page.fail_navigation {
            return Err(BrowserError::Timeout {
                what: format!("page load of {url}"),
                ms: 30_000,
            });
        }
        Ok(())
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<ElementRef>> {
        Ok(self
            .page
            .by_locator
            .lock()
            .unwrap()
            .get(locator)
            .map(|ids| ids.iter().cloned().map(ElementRef).collect())
            .unwrap_or_default())
    }

    async fn is_enabled(&self, element: &ElementRef) -> Result<bool> {
        Ok(self.page.element(element)?.enabled)
    }

    async fn is_displayed(&self, element: &ElementRef) -> Result<bool> {
        Ok(self.page.element(element)?.displayed)
    }

    async fn click(&self, element: &ElementRef) -> Result<()> {
        self.page.element(element)?;
        self.page.record(format!("click {}", element.as_str()));
        Ok(())
    }

    async fn clear(&self, element: &ElementRef) -> Result<()> {
        self.page.element(element)?;
        self.page
            .values
            .lock()
            .unwrap()
            .insert(element.as_str().to_string(), String::new());
        self.page.record(format!("clear {}", element.as_str()));
        Ok(())
    }

    async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<()> {
        self.page.element(element)?;
        self.page
            .values
            .lock()
            .unwrap()
            .entry(element.as_str().to_string())
            .or_default()
            .push_str(text);
        self.page
            .record(format!("type {} {text}", element.as_str()));
        Ok(())
    }

    async fn property(&self, element: &ElementRef, name: &str) -> Result<Option<String>> {
        let el = self.page.element(element)?;
        Ok(if name == "href" { el.href } else { None })
    }

    async fn close(&self) -> Result<()> {
        self.page.closes.fetch_add(1, Ordering::SeqCst);
        self.page.record("close".to_string());
        Ok(())
    }
}
