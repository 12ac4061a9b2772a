//! Thin wrapper over `spider_chrome`'s CDP client: launching/connecting to
//! Chrome and the page-level primitives the tool bus dispatches into
//! (spec §4.1 "Browser driver", §6 tool catalogue).
//!
//! Every operation here is scoped to a single `Page` rather than "the
//! first page of the browser" the way a single-tab driver would do it —
//! the session layer owns one `Page` per `Tab` and passes it in.

use crate::cookie_store::Cookie;
use crate::error::{BrowserError, Result};
use chromiumoxide::browser::{Browser, BrowserConfig};
use chromiumoxide::page::{Page, ScreenshotParams};
use chromiumoxide_fetcher::{BrowserFetcher, BrowserFetcherOptions};
use futures::StreamExt;
use std::path::PathBuf;
use std::time::Duration;

/// How to obtain a `Browser` handle.
pub enum ConnectionMode {
    /// Launch a fresh Chrome process using the system (or auto-downloaded)
    /// binary.
    Sandboxed {
        chrome_path: Option<String>,
        no_sandbox: bool,
        headless: bool,
    },
    /// Attach to an already-running Chrome exposing a remote debugging
    /// port (headful mode, spec §4.1 "headful sessions").
    DebugPort(u16),
}

/// Owns the `Browser` process/connection for one session. Tabs are pages
/// created from this driver; the driver itself has no notion of "the
/// current page".
pub struct Driver {
    browser: Browser,
    temp_dir: Option<PathBuf>,
}

impl Driver {
    pub async fn launch_sandboxed(headless: bool) -> Result<Self> {
        Self::new(ConnectionMode::Sandboxed {
            chrome_path: None,
            no_sandbox: false,
            headless,
        })
        .await
    }

    pub async fn launch_no_sandbox(headless: bool) -> Result<Self> {
        Self::new(ConnectionMode::Sandboxed {
            chrome_path: None,
            no_sandbox: true,
            headless,
        })
        .await
    }

    pub async fn connect_debug_port(port: u16) -> Result<Self> {
        Self::new(ConnectionMode::DebugPort(port)).await
    }

    pub async fn new(mode: ConnectionMode) -> Result<Self> {
        let (browser, temp_dir) = match mode {
            ConnectionMode::Sandboxed {
                chrome_path,
                no_sandbox,
                headless,
            } => {
                let unique_id = std::time::SystemTime::now()
                    .duration_since(std::time::UNIX_EPOCH)
                    .unwrap_or_default()
                    .as_nanos();
                let temp_dir = std::env::temp_dir().join(format!("agentbrowse-{unique_id}"));
                std::fs::create_dir_all(&temp_dir).map_err(|e| {
                    BrowserError::ConnectionFailed(format!("create temp dir: {e}"))
                })?;

                let mut config = if headless {
                    BrowserConfig::builder()
                } else {
                    BrowserConfig::builder().with_head()
                };
                config = config.user_data_dir(&temp_dir);
                if no_sandbox {
                    config = config.arg("--no-sandbox");
                }
                if let Some(path) = chrome_path {
                    config = config.chrome_executable(path);
                } else if let Ok(path) = Self::ensure_chrome_installed().await {
                    config = config.chrome_executable(path);
                }

                let (browser, mut handler) = Browser::launch(
                    config
                        .build()
                        .map_err(|e| BrowserError::ConnectionFailed(e.to_string()))?,
                )
                .await
                .map_err(|e| BrowserError::ConnectionFailed(e.to_string()))?;

                tokio::spawn(async move { while (handler.next().await).is_some() {} });
                (browser, Some(temp_dir))
            }
            ConnectionMode::DebugPort(port) => {
                let url = format!("http://localhost:{port}");
                let (browser, mut handler) = Browser::connect(&url).await.map_err(|e| {
                    BrowserError::ConnectionFailed(format!(
                        "connect to Chrome on port {port}: {e}"
                    ))
                })?;
                tokio::spawn(async move { while (handler.next().await).is_some() {} });
                (browser, None)
            }
        };

        Ok(Self { browser, temp_dir })
    }

    pub async fn new_page(&self, url: &str) -> Result<Page> {
        self.browser
            .new_page(url)
            .await
            .map_err(|e| BrowserError::Other(format!("create page: {e}")))
    }

    pub async fn close(self) -> Result<()> {
        self.browser
            .close()
            .await
            .map_err(|e| BrowserError::Other(e.to_string()))?;
        Ok(())
    }

    async fn ensure_chrome_installed() -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| BrowserError::Other("no cache directory".to_string()))?
            .join("agentbrowse")
            .join("chrome");
        tokio::fs::create_dir_all(&cache_dir)
            .await
            .map_err(|e| BrowserError::Other(format!("create cache dir: {e}")))?;

        let marker = cache_dir.join(".downloaded");
        if marker.exists() {
            if let Some(exe) = Self::find_chrome_in_cache(&cache_dir).await {
                return Ok(exe);
            }
        }

        let fetcher = BrowserFetcher::new(
            BrowserFetcherOptions::builder()
                .with_path(&cache_dir)
                .build()
                .map_err(|e| BrowserError::Other(format!("fetcher config: {e}")))?,
        );
        let info = fetcher
            .fetch()
            .await
            .map_err(|e| BrowserError::Other(format!("chrome download: {e}")))?;
        tokio::fs::write(&marker, "downloaded")
            .await
            .map_err(|e| BrowserError::Other(format!("write marker: {e}")))?;
        Ok(info.executable_path)
    }

    async fn find_chrome_in_cache(cache_dir: &std::path::Path) -> Option<PathBuf> {
        for candidate in [
            cache_dir.join("chrome"),
            cache_dir.join("chrome.exe"),
            cache_dir.join("chrome-linux/chrome"),
            cache_dir.join("chrome-mac/Chromium.app/Contents/MacOS/Chromium"),
            cache_dir.join("chrome-win/chrome.exe"),
        ] {
            if candidate.exists() {
                return Some(candidate);
            }
        }
        None
    }
}

impl Drop for Driver {
    fn drop(&mut self) {
        if let Some(dir) = &self.temp_dir {
            if dir.exists() {
                let _ = std::fs::remove_dir_all(dir);
            }
        }
    }
}

/// Navigates `page` and waits for the load event (spec §6 `navigate`).
pub async fn navigate(page: &Page, url: &str) -> Result<()> {
    log::debug!("navigating to {url}");
    let navigated = page
        .goto(url)
        .await
        .map_err(|e| BrowserError::NavigationFailed(format!("{url}: {e}")))?;
    navigated
        .wait_for_navigation()
        .await
        .map_err(|e| BrowserError::NavigationFailed(format!("timeout for {url}: {e}")))?;
    Ok(())
}

pub async fn go_back(page: &Page) -> Result<()> {
    page.evaluate("window.history.back()")
        .await
        .map_err(|e| BrowserError::Other(format!("go_back: {e}")))?;
    Ok(())
}

pub async fn current_url(page: &Page) -> Result<String> {
    page.url()
        .await
        .map_err(|e| BrowserError::Other(e.to_string()))?
        .ok_or_else(|| BrowserError::Other("page has no url".to_string()))
}

pub async fn title(page: &Page) -> Result<String> {
    page.get_title()
        .await
        .map_err(|e| BrowserError::Other(e.to_string()))?
        .ok_or_else(|| BrowserError::Other("page has no title".to_string()))
}

pub async fn page_source(page: &Page) -> Result<String> {
    page.content()
        .await
        .map_err(|e| BrowserError::Other(e.to_string()))
}

/// Rendered visible text of the page body (spec §6 `get_page_content`).
pub async fn page_text(page: &Page) -> Result<String> {
    let element = page
        .find_element("body")
        .await
        .map_err(|_| BrowserError::ElementNotFound("body".to_string()))?;
    element
        .inner_text()
        .await
        .map_err(|_| BrowserError::ElementNotFound("body".to_string()))?
        .ok_or_else(|| BrowserError::ElementNotFound("body".to_string()))
}

pub async fn find_element(page: &Page, selector: &str) -> Result<()> {
    page.find_element(selector)
        .await
        .map(|_| ())
        .map_err(|_| BrowserError::ElementNotFound(selector.to_string()))
}

pub async fn click(page: &Page, selector: &str) -> Result<()> {
    let element = page
        .find_element(selector)
        .await
        .map_err(|_| BrowserError::ElementNotFound(selector.to_string()))?;
    element
        .click()
        .await
        .map_err(|e| BrowserError::Other(format!("click {selector}: {e}")))?;
    Ok(())
}

pub async fn hover(page: &Page, selector: &str) -> Result<()> {
    let element = page
        .find_element(selector)
        .await
        .map_err(|_| BrowserError::ElementNotFound(selector.to_string()))?;
    element
        .hover()
        .await
        .map_err(|e| BrowserError::Other(format!("hover {selector}: {e}")))?;
    Ok(())
}

pub async fn type_text(page: &Page, selector: &str, text: &str) -> Result<()> {
    let element = page
        .find_element(selector)
        .await
        .map_err(|_| BrowserError::ElementNotFound(selector.to_string()))?;
    element
        .click()
        .await
        .map_err(|e| BrowserError::Other(format!("focus {selector}: {e}")))?;
    element
        .type_str(text)
        .await
        .map_err(|e| BrowserError::Other(format!("type into {selector}: {e}")))?;
    Ok(())
}

pub async fn set_value(page: &Page, selector: &str, value: &str) -> Result<()> {
    let script = format!(
        "(() => {{ const el = document.querySelector({selector:?}); if (!el) return false; \
         el.value = {value:?}; el.dispatchEvent(new Event('input', {{ bubbles: true }})); \
         el.dispatchEvent(new Event('change', {{ bubbles: true }})); return true; }})()"
    );
    let ok: bool = execute_javascript_typed(page, &script).await?;
    if ok {
        Ok(())
    } else {
        Err(BrowserError::ElementNotFound(selector.to_string()))
    }
}

pub async fn select_option(page: &Page, selector: &str, value: &str) -> Result<()> {
    let element = page
        .find_element(selector)
        .await
        .map_err(|_| BrowserError::ElementNotFound(selector.to_string()))?;
    element
        .select_text(value)
        .await
        .map_err(|e| BrowserError::Other(format!("select_option {selector}: {e}")))?;
    Ok(())
}

pub async fn press_key(page: &Page, key: &str) -> Result<()> {
    page.evaluate(format!(
        "document.activeElement && document.activeElement.dispatchEvent(new KeyboardEvent('keydown', {{ key: {key:?}, bubbles: true }})))"
    ))
    .await
    .map_err(|e| BrowserError::Other(format!("press_key {key}: {e}")))?;
    Ok(())
}

pub async fn scroll(page: &Page, dx: f64, dy: f64) -> Result<()> {
    page.evaluate(format!("window.scrollBy({dx}, {dy})"))
        .await
        .map_err(|e| BrowserError::Other(format!("scroll: {e}")))?;
    Ok(())
}

pub async fn wait_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

pub async fn execute_javascript(page: &Page, script: &str) -> Result<serde_json::Value> {
    let result = page
        .evaluate(script)
        .await
        .map_err(|e| BrowserError::Other(format!("execute_javascript: {e}")))?;
    Ok(result.into_value().unwrap_or(serde_json::Value::Null))
}

async fn execute_javascript_typed<T: serde::de::DeserializeOwned>(
    page: &Page,
    script: &str,
) -> Result<T> {
    let result = page
        .evaluate(script)
        .await
        .map_err(|e| BrowserError::Other(format!("execute_javascript: {e}")))?;
    result
        .into_value()
        .map_err(|e| BrowserError::Other(format!("deserialize result: {e}")))
}

pub async fn screenshot(page: &Page) -> Result<Vec<u8>> {
    page.screenshot(ScreenshotParams::default())
        .await
        .map_err(|e| BrowserError::Other(format!("screenshot: {e}")))
}

/// Harvests the page's cookies over CDP `Network.getAllCookies` (spec §3
/// "Cookie Store", §4.1 "Cookie discipline").
pub async fn harvest_cookies(page: &Page) -> Result<Vec<Cookie>> {
    let cookies = page
        .get_cookies()
        .await
        .map_err(|e| BrowserError::Other(format!("harvest cookies: {e}")))?;
    Ok(cookies
        .into_iter()
        .map(|c| Cookie {
            name: c.name,
            value: c.value,
            domain: c.domain,
            path: c.path,
            secure: c.secure,
            http_only: c.http_only,
            expires: if c.expires > 0.0 {
                Some(c.expires)
            } else {
                None
            },
        })
        .collect())
}

/// Injects previously-harvested cookies before navigation so a headless
/// session resuming work picks up an authenticated state (spec §4.1
/// "Cookie discipline").
pub async fn inject_cookies(page: &Page, cookies: &[Cookie]) -> Result<()> {
    for cookie in cookies {
        let script = format!(
            "document.cookie = {};",
            serde_json::to_string(&format!(
                "{}={}; path={}; domain={}",
                cookie.name, cookie.value, cookie.path, cookie.domain
            ))
            .unwrap_or_default()
        );
        let _ = page.evaluate(script).await;
    }
    Ok(())
}
