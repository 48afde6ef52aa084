//! Browser session and the Chromium driver.
//!
//! With the `browser` feature, [`ChromiumDriver`] drives real Chromium over
//! the Chrome `DevTools` Protocol via chromiumoxide. [`BrowserSession`] owns
//! one driver for the whole run and must be closed explicitly.

use std::time::Duration;

use tracing::{info, warn};

use crate::driver::PortalDriver;
use crate::locator::Selector;

/// Attribute used to find tagged elements again
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
pub(crate) const HANDLE_ATTR: &str = "data-courtside-id";

/// Browser configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BrowserConfig {
    /// Run in headless mode
    pub headless: bool,
    /// Sandbox mode (disable for containers)
    pub sandbox: bool,
    /// Window width
    pub window_width: u32,
    /// Window height
    pub window_height: u32,
    /// Path to chromium binary (None = auto-detect)
    pub chromium_path: Option<String>,
    /// User agent string
    pub user_agent: Option<String>,
    /// Timeout for a single CDP request
    pub request_timeout: Duration,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            headless: true,
            sandbox: false,
            window_width: 1920,
            window_height: 1080,
            chromium_path: None,
            user_agent: None,
            request_timeout: Duration::from_secs(60),
        }
    }
}

impl BrowserConfig {
    /// Set window dimensions
    #[must_use]
    pub const fn with_window(mut self, width: u32, height: u32) -> Self {
        self.window_width = width;
        self.window_height = height;
        self
    }

    /// Set headless mode
    #[must_use]
    pub const fn with_headless(mut self, headless: bool) -> Self {
        self.headless = headless;
        self
    }

    /// Set chromium path
    #[must_use]
    pub fn with_chromium_path(mut self, path: impl Into<String>) -> Self {
        self.chromium_path = Some(path.into());
        self
    }

    /// Set user agent
    #[must_use]
    pub fn with_user_agent(mut self, ua: impl Into<String>) -> Self {
        self.user_agent = Some(ua.into());
        self
    }

    /// Enable the Chromium sandbox
    #[must_use]
    pub const fn with_sandbox(mut self, sandbox: bool) -> Self {
        self.sandbox = sandbox;
        self
    }
}

/// Owns the driver for one booking run
///
/// `close` must be called on every exit path; dropping an open session
/// only logs a warning.
#[derive(Debug)]
pub struct BrowserSession<D: PortalDriver> {
    driver: D,
    closed: bool,
}

impl<D: PortalDriver> BrowserSession<D> {
    /// Wrap an already-started driver
    #[must_use]
    pub const fn new(driver: D) -> Self {
        Self {
            driver,
            closed: false,
        }
    }

    /// The session's driver
    #[must_use]
    pub const fn driver(&self) -> &D {
        &self.driver
    }

    /// Close the browser. Close failures are logged, not returned.
    pub async fn close(mut self) {
        match self.driver.close().await {
            Ok(()) => info!("browser closed"),
            Err(e) => warn!(error = %e, "browser did not close cleanly"),
        }
        self.closed = true;
    }
}

impl<D: PortalDriver> Drop for BrowserSession<D> {
    fn drop(&mut self) {
        if !self.closed {
            warn!("browser session dropped without close");
        }
    }
}

/// Script returning descriptors of every element matching `selector`,
/// tagging each with [`HANDLE_ATTR`]. Returns `null` when the scope is gone.
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
pub(crate) fn query_script(selector: &Selector, scope: Option<u64>) -> String {
    let root = scope.map_or_else(|| "document".to_string(), element_lookup);
    format!(
        r"(function() {{
  const root = {root};
  if (!root) return null;
  const found = {elements};
  return found.map(el => {{
    if (!el.hasAttribute('{HANDLE_ATTR}')) {{
      window.__courtsideNext = (window.__courtsideNext || 0) + 1;
      el.setAttribute('{HANDLE_ATTR}', String(window.__courtsideNext));
    }}
    const rect = el.getBoundingClientRect();
    const style = window.getComputedStyle(el);
    return {{
      id: Number(el.getAttribute('{HANDLE_ATTR}')),
      tag_name: el.tagName.toLowerCase(),
      text: (el.innerText || el.textContent || '').trim().slice(0, 2000),
      visible: rect.width > 0 && rect.height > 0 && style.visibility !== 'hidden' && style.display !== 'none',
    }};
  }});
}})()",
        elements = selector.to_elements_js("root"),
    )
}

/// Script running `body` with the tagged element bound to `el`
#[cfg_attr(not(feature = "browser"), allow(dead_code))]
pub(crate) fn call_script(id: u64, body: &str) -> String {
    format!(
        "(function(el) {{\n  if (!el) return {{ __courtsideStale: true }};\n{body}\n}})({})",
        element_lookup(id)
    )
}

#[cfg_attr(not(feature = "browser"), allow(dead_code))]
fn element_lookup(id: u64) -> String {
    format!("document.querySelector('[{HANDLE_ATTR}=\"{id}\"]')")
}

// ============================================================================
// Real CDP Implementation (when `browser` feature is enabled)
// ============================================================================

#[cfg(feature = "browser")]
#[allow(clippy::significant_drop_tightening, clippy::items_after_statements)]
mod cdp {
    use super::*;
    use crate::driver::{ElementHandle, Key};
    use crate::locator::js_string;
    use crate::result::{BookingError, BookingResult};
    use async_trait::async_trait;
    use chromiumoxide::browser::{Browser as CdpBrowser, BrowserConfig as CdpConfig};
    use chromiumoxide::cdp::browser_protocol::input::{
        DispatchKeyEventParams, DispatchKeyEventType,
    };
    use chromiumoxide::cdp::browser_protocol::page::{
        AddScriptToEvaluateOnNewDocumentParams, CaptureScreenshotFormat, CaptureScreenshotParams,
    };
    use chromiumoxide::element::Element;
    use chromiumoxide::page::Page as CdpPage;
    use futures::StreamExt;
    use serde::Deserialize;
    use serde_json::Value;
    use std::sync::atomic::{AtomicU64, Ordering};
    use tokio::sync::Mutex;
    use tracing::debug;

    const MASK_WEBDRIVER: &str =
        "Object.defineProperty(navigator, 'webdriver', { get: () => undefined });";

    #[derive(Debug, Deserialize)]
    struct RawHandle {
        id: u64,
        tag_name: String,
        text: String,
        visible: bool,
    }

    /// Chromium over CDP
    #[derive(Debug)]
    pub struct ChromiumDriver {
        browser: Mutex<CdpBrowser>,
        page: Mutex<CdpPage>,
        generation: AtomicU64,
        handler: tokio::task::JoinHandle<()>,
    }

    impl ChromiumDriver {
        /// Launch Chromium and open a blank page
        pub async fn launch(config: &BrowserConfig) -> BookingResult<Self> {
            let mut builder = CdpConfig::builder()
                .window_size(config.window_width, config.window_height)
                .request_timeout(config.request_timeout)
                .arg("--disable-dev-shm-usage")
                .arg("--disable-blink-features=AutomationControlled");

            // chromiumoxide's own headless flag selects the legacy mode.
            builder = builder.with_head();
            if config.headless {
                builder = builder.arg("--headless=new");
            }
            if !config.sandbox {
                builder = builder.no_sandbox();
            }
            if let Some(ref path) = config.chromium_path {
                builder = builder.chrome_executable(path);
            }
            if let Some(ref ua) = config.user_agent {
                builder = builder.arg(format!("--user-agent={ua}"));
            }

            let cdp_config = builder.build().map_err(BookingError::browser)?;
            let (browser, mut handler) = CdpBrowser::launch(cdp_config)
                .await
                .map_err(BookingError::browser)?;

            let handler = tokio::spawn(async move {
                while let Some(event) = handler.next().await {
                    if event.is_err() {
                        break;
                    }
                }
            });

            let page = browser
                .new_page("about:blank")
                .await
                .map_err(BookingError::browser)?;
            page.execute(AddScriptToEvaluateOnNewDocumentParams::new(MASK_WEBDRIVER))
                .await
                .map_err(BookingError::browser)?;
            info!(headless = config.headless, "chromium launched");

            Ok(Self {
                browser: Mutex::new(browser),
                page: Mutex::new(page),
                generation: AtomicU64::new(0),
                handler,
            })
        }

        fn current_generation(&self) -> u64 {
            self.generation.load(Ordering::SeqCst)
        }

        fn check(&self, handle: &ElementHandle) -> BookingResult<()> {
            let current = self.current_generation();
            if handle.generation == current {
                Ok(())
            } else {
                Err(BookingError::StaleElement {
                    id: handle.id,
                    generation: handle.generation,
                    current,
                })
            }
        }

        fn stale(&self, handle: &ElementHandle) -> BookingError {
            BookingError::StaleElement {
                id: handle.id,
                generation: handle.generation,
                current: self.current_generation(),
            }
        }

        async fn evaluate(&self, script: &str) -> BookingResult<Value> {
            let page = self.page.lock().await;
            let result = page.evaluate(script).await.map_err(BookingError::script)?;
            Ok(result.value().cloned().unwrap_or(Value::Null))
        }

        async fn element(&self, handle: &ElementHandle) -> BookingResult<Element> {
            self.check(handle)?;
            let page = self.page.lock().await;
            page.find_element(format!("[{HANDLE_ATTR}=\"{}\"]", handle.id))
                .await
                .map_err(|_| self.stale(handle))
        }

        async fn dispatch_key(&self, key: Key, kind: DispatchKeyEventType) -> BookingResult<()> {
            let mut builder = DispatchKeyEventParams::builder()
                .r#type(kind)
                .key(key.key())
                .code(key.key())
                .windows_virtual_key_code(key.key_code())
                .native_virtual_key_code(key.key_code());
            if key == Key::Enter {
                builder = builder.text("\r");
            }
            let params = builder.build().map_err(BookingError::browser)?;
            let page = self.page.lock().await;
            page.execute(params).await.map_err(BookingError::browser)?;
            Ok(())
        }
    }

    #[async_trait]
    impl PortalDriver for ChromiumDriver {
        async fn navigate(&self, url: &str) -> BookingResult<()> {
            {
                let page = self.page.lock().await;
                page.goto(url).await.map_err(|e| BookingError::Navigation {
                    url: url.to_string(),
                    message: e.to_string(),
                })?;
            }
            let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
            debug!(%url, generation, "navigated");
            Ok(())
        }

        async fn reload(&self) -> BookingResult<()> {
            {
                let page = self.page.lock().await;
                page.reload().await.map_err(BookingError::browser)?;
            }
            let _ = self.generation.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn current_url(&self) -> BookingResult<String> {
            let page = self.page.lock().await;
            let url = page.url().await.map_err(BookingError::browser)?;
            Ok(url.unwrap_or_default())
        }

        async fn query_all(
            &self,
            selector: &Selector,
            scope: Option<&ElementHandle>,
        ) -> BookingResult<Vec<ElementHandle>> {
            if let Some(scope) = scope {
                self.check(scope)?;
            }
            let value = self
                .evaluate(&query_script(selector, scope.map(|s| s.id)))
                .await?;
            if value.is_null() {
                return match scope {
                    Some(scope) => Err(self.stale(scope)),
                    None => Ok(Vec::new()),
                };
            }
            let raw: Vec<RawHandle> = serde_json::from_value(value)?;
            let generation = self.current_generation();
            Ok(raw
                .into_iter()
                .map(|r| ElementHandle {
                    id: r.id,
                    generation,
                    tag_name: r.tag_name,
                    text: r.text,
                    visible: r.visible,
                })
                .collect())
        }

        async fn click(&self, element: &ElementHandle) -> BookingResult<()> {
            let target = self.element(element).await?;
            target.click().await.map_err(BookingError::browser)?;
            Ok(())
        }

        async fn focus(&self, element: &ElementHandle) -> BookingResult<()> {
            let target = self.element(element).await?;
            target.focus().await.map_err(BookingError::browser)?;
            Ok(())
        }

        async fn press_key(&self, element: &ElementHandle, key: Key) -> BookingResult<()> {
            self.focus(element).await?;
            self.dispatch_key(key, DispatchKeyEventType::KeyDown).await?;
            self.dispatch_key(key, DispatchKeyEventType::KeyUp).await
        }

        async fn type_text(&self, element: &ElementHandle, text: &str) -> BookingResult<()> {
            let target = self.element(element).await?;
            target.focus().await.map_err(BookingError::browser)?;
            target.type_str(text).await.map_err(BookingError::browser)?;
            Ok(())
        }

        async fn clear(&self, element: &ElementHandle) -> BookingResult<()> {
            let _ = self
                .call_on(
                    element,
                    "el.value = ''; el.dispatchEvent(new Event('input', { bubbles: true })); return true;",
                )
                .await?;
            Ok(())
        }

        async fn text(&self, element: &ElementHandle) -> BookingResult<String> {
            let value = self
                .call_on(element, "return (el.innerText || el.textContent || '').trim();")
                .await?;
            Ok(value.as_str().unwrap_or_default().to_string())
        }

        async fn attribute(
            &self,
            element: &ElementHandle,
            name: &str,
        ) -> BookingResult<Option<String>> {
            let body = format!("return el.getAttribute({});", js_string(name));
            let value = self.call_on(element, &body).await?;
            Ok(value.as_str().map(String::from))
        }

        async fn execute_script(&self, script: &str) -> BookingResult<Value> {
            self.evaluate(script).await
        }

        async fn call_on(&self, element: &ElementHandle, body: &str) -> BookingResult<Value> {
            self.check(element)?;
            let value = self.evaluate(&call_script(element.id, body)).await?;
            if value.get("__courtsideStale").is_some() {
                return Err(self.stale(element));
            }
            Ok(value)
        }

        async fn screenshot(&self) -> BookingResult<Vec<u8>> {
            let page = self.page.lock().await;
            let params = CaptureScreenshotParams::builder()
                .format(CaptureScreenshotFormat::Png)
                .build();
            let screenshot = page.execute(params).await.map_err(BookingError::browser)?;

            use base64::Engine;
            base64::engine::general_purpose::STANDARD
                .decode(&screenshot.data)
                .map_err(BookingError::browser)
        }

        async fn close(&self) -> BookingResult<()> {
            let mut browser = self.browser.lock().await;
            browser.close().await.map_err(BookingError::browser)?;
            let _ = browser.wait().await;
            self.handler.abort();
            Ok(())
        }
    }

    impl BrowserSession<ChromiumDriver> {
        /// Launch Chromium and wrap it in a session
        pub async fn launch(config: &BrowserConfig) -> BookingResult<Self> {
            Ok(Self::new(ChromiumDriver::launch(config).await?))
        }
    }
}

#[cfg(feature = "browser")]
pub use cdp::ChromiumDriver;
