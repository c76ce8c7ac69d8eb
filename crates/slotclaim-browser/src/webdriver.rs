//! WebDriver backend (chromedriver / geckodriver) on top of `fantoccini`.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use fantoccini::elements::Element;
use fantoccini::{Client, ClientBuilder};
use serde_json::{json, Map, Value};
use slotclaim_core::config::{BrowserConfig, BrowserKind};
use tracing::{debug, info, warn};

use crate::driver::{BrowserContext, BrowserDriver, ElementRef, Locator};
use crate::error::{BrowserError, Result};

/// Upper bound for the blocking session delete issued from `Drop`.
const DROP_DELETE_TIMEOUT: Duration = Duration::from_secs(3);

pub struct WebDriverClient {
    webdriver_url: String,
    kind: BrowserKind,
    page_load_timeout: Duration,
}

impl WebDriverClient {
    pub fn new(config: &BrowserConfig) -> Self {
        Self {
            webdriver_url: config.webdriver_url.trim_end_matches('/').to_string(),
            kind: config.kind,
            page_load_timeout: config.page_load_timeout(),
        }
    }
}

fn capabilities(kind: BrowserKind, headless: bool) -> Map<String, Value> {
    let caps = match kind {
        BrowserKind::Chrome => {
            let mut args = vec![
                "--start-maximized",
                "--no-sandbox",
                "--disable-dev-shm-usage",
                "--ignore-certificate-errors",
                "--ignore-ssl-errors",
                "--allow-insecure-localhost",
            ];
            if headless {
                args.push("--headless=new");
            }
            json!({
                "browserName": "chrome",
                "acceptInsecureCerts": true,
                "goog:chromeOptions": {
                    "args": args,
                    "excludeSwitches": ["enable-logging"],
                    // skip image downloads, pages only need their DOM
                    "prefs": { "profile.managed_default_content_settings.images": 2 },
                },
            })
        }
        BrowserKind::Firefox => {
            let args: Vec<&str> = if headless { vec!["-headless"] } else { Vec::new() };
            json!({
                "browserName": "firefox",
                "acceptInsecureCerts": true,
                "moz:firefoxOptions": {
                    "args": args,
                    "prefs": { "permissions.default.image": 2 },
                },
            })
        }
    };
    match caps {
        Value::Object(map) => map,
        _ => Map::new(),
    }
}

/// Name lookups go through CSS; fantoccini has no `name` or tag strategy.
fn css_for(locator: &Locator) -> Option<String> {
    match locator {
        Locator::Css(s) | Locator::TagName(s) => Some(s.clone()),
        Locator::Name(s) => Some(attribute_selector("name", s)),
        Locator::XPath(_) | Locator::Id(_) => None,
    }
}

fn attribute_selector(attr: &str, value: &str) -> String {
    let escaped = value.replace('\\', "\\\\").replace('"', "\\\"");
    format!("[{attr}=\"{escaped}\"]")
}

#[async_trait]
impl BrowserDriver for WebDriverClient {
    fn name(&self) -> &str {
        "webdriver"
    }

    async fn open(&self, headless: bool) -> Result<Box<dyn BrowserContext>> {
        debug!(url = %self.webdriver_url, headless, "creating WebDriver session");
        let mut builder = ClientBuilder::rustls()
            .map_err(|e| BrowserError::SessionSetup(format!("TLS setup: {e}")))?;
        builder.capabilities(capabilities(self.kind, headless));
        let client = builder.connect(&self.webdriver_url).await?;

        let session_id = match client.session_id().await {
            Ok(Some(id)) => id,
            other => {
                // Release the browser before reporting the setup failure.
                let _ = client.close().await;
                return Err(BrowserError::SessionSetup(format!(
                    "no session id from WebDriver server: {other:?}"
                )));
            }
        };
        info!(%session_id, headless, "browser session started");

        Ok(Box::new(WebDriverSession {
            client,
            webdriver_url: self.webdriver_url.clone(),
            session_id,
            page_load_timeout: self.page_load_timeout,
            elements: Mutex::new(HashMap::new()),
            next_element: AtomicU64::new(0),
            closed: AtomicBool::new(false),
        }))
    }
}

/// A live WebDriver session. Deleted on `close()`, or on drop as a fallback.
pub struct WebDriverSession {
    client: Client,
    webdriver_url: String,
    session_id: String,
    page_load_timeout: Duration,
    /// Elements handed out as opaque refs during this session.
    elements: Mutex<HashMap<String, Element>>,
    next_element: AtomicU64,
    closed: AtomicBool,
}

impl WebDriverSession {
    fn live(&self) -> Result<()> {
        if self.closed.load(Ordering::SeqCst) {
            Err(BrowserError::Closed)
        } else {
            Ok(())
        }
    }

    fn remember(&self, element: Element) -> ElementRef {
        let key = format!("e{}", self.next_element.fetch_add(1, Ordering::Relaxed));
        self.elements
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(key.clone(), element);
        ElementRef(key)
    }

    fn element(&self, element: &ElementRef) -> Result<Element> {
        self.live()?;
        self.elements
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .get(element.as_str())
            .cloned()
            .ok_or_else(|| BrowserError::StaleElement(element.as_str().to_string()))
    }
}

#[async_trait]
impl BrowserContext for WebDriverSession {
    async fn navigate(&self, url: &str) -> Result<()> {
        self.live()?;
        debug!(session_id = %self.session_id, %url, "navigating");
        match tokio::time::timeout(self.page_load_timeout, self.client.goto(url)).await {
            Ok(result) => Ok(result?),
            Err(_) => Err(BrowserError::Timeout {
                what: format!("page load of {url}"),
                ms: self.page_load_timeout.as_millis() as u64,
            }),
        }
    }

    async fn find_all(&self, locator: &Locator) -> Result<Vec<ElementRef>> {
        self.live()?;
        let css = css_for(locator);
        let search = match (locator, css.as_deref()) {
            (Locator::XPath(x), _) => fantoccini::Locator::XPath(x),
            (Locator::Id(id), _) => fantoccini::Locator::Id(id),
            (_, Some(css)) => fantoccini::Locator::Css(css),
            (_, None) => return Ok(Vec::new()),
        };
        let found = self.client.find_all(search).await?;
        Ok(found.into_iter().map(|e| self.remember(e)).collect())
    }

    async fn is_enabled(&self, element: &ElementRef) -> Result<bool> {
        Ok(self.element(element)?.is_enabled().await?)
    }

    async fn is_displayed(&self, element: &ElementRef) -> Result<bool> {
        Ok(self.element(element)?.is_displayed().await?)
    }

    async fn click(&self, element: &ElementRef) -> Result<()> {
        Ok(self.element(element)?.click().await?)
    }

    async fn clear(&self, element: &ElementRef) -> Result<()> {
        Ok(self.element(element)?.clear().await?)
    }

    async fn send_keys(&self, element: &ElementRef, text: &str) -> Result<()> {
        Ok(self.element(element)?.send_keys(text).await?)
    }

    async fn property(&self, element: &ElementRef, name: &str) -> Result<Option<String>> {
        Ok(self.element(element)?.prop(name).await?)
    }

    async fn maximize(&self) -> Result<()> {
        self.live()?;
        Ok(self.client.maximize_window().await?)
    }

    async fn close(&self) -> Result<()> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }
        self.client.clone().close().await?;
        info!(session_id = %self.session_id, "browser session closed");
        Ok(())
    }
}

impl Drop for WebDriverSession {
    fn drop(&mut self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        warn!(session_id = %self.session_id, "browser session dropped without close, deleting");
        // The runtime may already be shutting down, so the delete runs on its
        // own thread with a blocking client and is joined here.
        let url = format!("{}/session/{}", self.webdriver_url, self.session_id);
        let deleter = std::thread::spawn(move || -> reqwest::Result<()> {
            let client = reqwest::blocking::Client::builder()
                .timeout(DROP_DELETE_TIMEOUT)
                .build()?;
            client.delete(url).send().map(drop)
        });
        match deleter.join() {
            Ok(Ok(())) => {}
            Ok(Err(e)) => warn!("session delete on drop failed: {e}"),
            Err(_) => warn!("session delete thread panicked"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::SocketAddr;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    #[test]
    fn chrome_headless_adds_flag_and_disables_images() {
        let caps = capabilities(BrowserKind::Chrome, true);
        let args = caps["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(args.iter().any(|a| a == "--headless=new"));
        assert!(args.iter().any(|a| a == "--no-sandbox"));
        assert_eq!(
            caps["goog:chromeOptions"]["prefs"]["profile.managed_default_content_settings.images"],
            2
        );

        let visible = capabilities(BrowserKind::Chrome, false);
        let args = visible["goog:chromeOptions"]["args"].as_array().unwrap();
        assert!(!args.iter().any(|a| a == "--headless=new"));
    }

    #[test]
    fn firefox_headless_uses_moz_options() {
        let caps = capabilities(BrowserKind::Firefox, true);
        assert_eq!(caps["browserName"], "firefox");
        assert_eq!(caps["moz:firefoxOptions"]["args"][0], "-headless");
    }

    #[test]
    fn names_and_tags_become_css() {
        assert_eq!(css_for(&Locator::name("btn\"x")).unwrap(), "[name=\"btn\\\"x\"]");
        assert_eq!(css_for(&Locator::tag("a")).unwrap(), "a");
        assert!(css_for(&Locator::xpath("//a")).is_none());
    }

    /// Minimal WebDriver endpoint on its own thread and runtime, so it keeps
    /// answering while the runtime under test shuts down.
    struct StubDriver {
        addr: SocketAddr,
        requests: Arc<Mutex<Vec<String>>>,
    }

    impl StubDriver {
        /// Requests whose path ends with `hang_on` never get a response.
        fn spawn(hang_on: Option<&'static str>) -> Self {
            let requests = Arc::new(Mutex::new(Vec::new()));
            let log = Arc::clone(&requests);
            let (tx, rx) = std::sync::mpsc::channel();
            std::thread::spawn(move || {
                let rt = tokio::runtime::Builder::new_current_thread()
                    .enable_all()
                    .build()
                    .unwrap();
                rt.block_on(async move {
                    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
                    tx.send(listener.local_addr().unwrap()).unwrap();
                    loop {
                        let (sock, _) = listener.accept().await.unwrap();
                        tokio::spawn(serve(sock, Arc::clone(&log), hang_on));
                    }
                });
            });
            Self {
                addr: rx.recv().unwrap(),
                requests,
            }
        }

        fn config(&self) -> BrowserConfig {
            BrowserConfig {
                webdriver_url: format!("http://{}", self.addr),
                ..BrowserConfig::default()
            }
        }

        fn count(&self, line: &str) -> usize {
            self.requests
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.as_str() == line)
                .count()
        }

        /// Poll until `line` was received, up to five seconds.
        fn saw(&self, line: &str) -> bool {
            for _ in 0..100 {
                if self.count(line) > 0 {
                    return true;
                }
                std::thread::sleep(Duration::from_millis(50));
            }
            false
        }
    }

    async fn serve(mut sock: TcpStream, log: Arc<Mutex<Vec<String>>>, hang_on: Option<&str>) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        let head_end = loop {
            let n = sock.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);
            if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
                break pos;
            }
        };
        let head = String::from_utf8_lossy(&buf[..head_end]).to_string();
        let body_len = head
            .lines()
            .find_map(|l| {
                let (k, v) = l.split_once(':')?;
                k.eq_ignore_ascii_case("content-length")
                    .then(|| v.trim().parse::<usize>().ok())
                    .flatten()
            })
            .unwrap_or(0);
        while buf.len() < head_end + 4 + body_len {
            let n = sock.read(&mut chunk).await.unwrap_or(0);
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);
        }

        let mut parts = head.lines().next().unwrap_or_default().split_whitespace();
        let method = parts.next().unwrap_or_default().to_string();
        let path = parts.next().unwrap_or_default().to_string();
        log.lock().unwrap().push(format!("{method} {path}"));

        if hang_on.is_some_and(|suffix| path.ends_with(suffix)) {
            std::future::pending::<()>().await;
        }
        let body = if method == "POST" && path == "/session" {
            r#"{"value":{"sessionId":"s1","capabilities":{"browserName":"chrome"}}}"#
        } else {
            r#"{"value":null}"#
        };
        let response = format!(
            "HTTP/1.1 200 OK\r\nContent-Type: application/json; charset=utf-8\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
            body.len()
        );
        let _ = sock.write_all(response.as_bytes()).await;
        let _ = sock.shutdown().await;
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn close_is_idempotent_and_final() {
        let stub = StubDriver::spawn(None);
        let ctx = WebDriverClient::new(&stub.config()).open(true).await.unwrap();

        ctx.close().await.unwrap();
        ctx.close().await.unwrap();
        assert_eq!(stub.count("DELETE /session/s1"), 1);

        assert!(matches!(
            ctx.navigate("https://example.org").await,
            Err(BrowserError::Closed)
        ));
        assert!(matches!(
            ctx.find_all(&Locator::tag("a")).await,
            Err(BrowserError::Closed)
        ));
        drop(ctx);
        assert_eq!(stub.count("DELETE /session/s1"), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn unreachable_server_is_a_setup_error() {
        // bind then release a port so nothing is listening on it
        let addr = std::net::TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let config = BrowserConfig {
            webdriver_url: format!("http://{addr}"),
            ..BrowserConfig::default()
        };
        let err = WebDriverClient::new(&config).open(true).await.err().unwrap();
        assert!(matches!(err, BrowserError::SessionSetup(_)), "{err}");
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn dropping_an_open_session_deletes_it() {
        let stub = StubDriver::spawn(None);
        let ctx = WebDriverClient::new(&stub.config()).open(true).await.unwrap();
        drop(ctx);
        assert!(stub.saw("DELETE /session/s1"));
    }

    #[test]
    fn session_is_deleted_when_runtime_shuts_down_mid_navigation() {
        let stub = StubDriver::spawn(Some("/url"));
        let config = stub.config();
        let rt = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.spawn(async move {
            let ctx = WebDriverClient::new(&config).open(true).await.unwrap();
            let _ = ctx.navigate("https://example.org").await;
            let _ = ctx.close().await;
        });
        assert!(stub.saw("POST /session/s1/url"));

        drop(rt);
        assert!(stub.saw("DELETE /session/s1"));
    }
}
