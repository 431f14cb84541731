//! Headless Chromium implementation of the page traits.

use crate::error::{Result, ScanError};
use crate::page::{BrowserSession, PageElement, RenderedPage, SessionLauncher};
use async_trait::async_trait;
use chromiumoxide::{Browser, BrowserConfig, Element, Page};
use futures::StreamExt;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

const IS_VISIBLE_JS: &str = "function() { \
    const style = window.getComputedStyle(this); \
    return style.display !== 'none' && style.visibility !== 'hidden' \
        && !!(this.offsetWidth || this.offsetHeight || this.getClientRects().length); \
}";

const CLICK_JS: &str = "function() { this.click(); }";

const SCROLL_TO_BOTTOM_JS: &str = "window.scrollTo(0, document.body.scrollHeight)";

fn browser_error(e: impl std::fmt::Display) -> ScanError {
    ScanError::Browser(e.to_string())
}

/// Options for launching Chromium.
#[derive(Debug, Clone)]
pub struct ChromeOptions {
    pub headless: bool,
    pub window_size: (u32, u32),
    pub user_agent: Option<String>,
}

impl Default for ChromeOptions {
    fn default() -> Self {
        Self {
            headless: true,
            window_size: (1920, 1080),
            user_agent: None,
        }
    }
}

pub struct ChromeLauncher {
    options: ChromeOptions,
}

impl ChromeLauncher {
    pub fn new(options: ChromeOptions) -> Self {
        Self { options }
    }

    fn config(&self) -> Result<BrowserConfig> {
        let (width, height) = self.options.window_size;
        let mut builder = BrowserConfig::builder()
            .window_size(width, height)
            .arg("--no-sandbox")
            .arg("--disable-dev-shm-usage")
            .arg("--disable-gpu");
        if !self.options.headless {
            builder = builder.with_head();
        }
        if let Some(ref agent) = self.options.user_agent {
            builder = builder.arg(format!("--user-agent={}", agent));
        }
        builder.build().map_err(ScanError::SessionInit)
    }
}

impl Default for ChromeLauncher {
    fn default() -> Self {
        Self::new(ChromeOptions::default())
    }
}

#[async_trait]
impl SessionLauncher for ChromeLauncher {
    type Session = ChromeSession;

    async fn launch(&self, url: &str) -> Result<ChromeSession> {
        let config = self.config()?;
        let (mut browser, mut handler) = Browser::launch(config)
            .await
            .map_err(|e| ScanError::SessionInit(e.to_string()))?;

        let handler_task = tokio::spawn(async move {
            while let Some(event) = handler.next().await {
                if let Err(e) = event {
                    debug!("Browser handler stopped: {}", e);
                    break;
                }
            }
        });

        let page = match browser.new_page(url).await {
            Ok(page) => page,
            Err(e) => {
                if let Err(close_err) = browser.close().await {
                    warn!("Failed to close browser after navigation error: {}", close_err);
                }
                handler_task.abort();
                return Err(ScanError::SessionInit(format!("{}: {}", url, e)));
            }
        };
        info!("Opened {}", url);

        Ok(ChromeSession {
            browser,
            handler_task,
            page: ChromePage { page },
        })
    }
}

pub struct ChromeSession {
    browser: Browser,
    handler_task: JoinHandle<()>,
    page: ChromePage,
}

#[async_trait]
impl BrowserSession for ChromeSession {
    type Page = ChromePage;

    fn page(&self) -> &ChromePage {
        &self.page
    }

    async fn close(self) -> Result<()> {
        let ChromeSession {
            mut browser,
            handler_task,
            page: _,
        } = self;
        let closed = browser.close().await.map(|_| ()).map_err(browser_error);
        if let Err(e) = browser.wait().await {
            debug!("Browser process did not exit cleanly: {}", e);
        }
        handler_task.abort();
        closed
    }
}

pub struct ChromePage {
    page: Page,
}

#[async_trait]
impl RenderedPage for ChromePage {
    type Element = ChromeElement;

    async fn find_all(&self, selector: &str) -> Result<Vec<ChromeElement>> {
        let elements = self
            .page
            .find_elements(selector)
            .await
            .map_err(browser_error)?;
        Ok(elements
            .into_iter()
            .map(|element| ChromeElement { element })
            .collect())
    }

    async fn scroll_to_bottom(&self) -> Result<()> {
        self.page
            .evaluate(SCROLL_TO_BOTTOM_JS)
            .await
            .map_err(browser_error)?;
        Ok(())
    }
}

pub struct ChromeElement {
    element: Element,
}

#[async_trait]
impl PageElement for ChromeElement {
    async fn find_all(&self, selector: &str) -> Result<Vec<Self>> {
        let elements = self
            .element
            .find_elements(selector)
            .await
            .map_err(browser_error)?;
        Ok(elements
            .into_iter()
            .map(|element| ChromeElement { element })
            .collect())
    }

    async fn text(&self) -> Result<String> {
        let text = self.element.inner_text().await.map_err(browser_error)?;
        Ok(text.unwrap_or_default().trim().to_string())
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>> {
        self.element.attribute(name).await.map_err(browser_error)
    }

    async fn is_visible(&self) -> Result<bool> {
        let returns = self
            .element
            .call_js_fn(IS_VISIBLE_JS, false)
            .await
            .map_err(browser_error)?;
        Ok(returns
            .result
            .value
            .and_then(|value| value.as_bool())
            .unwrap_or(false))
    }

    async fn click(&self) -> Result<()> {
        // script click: overlays on the directory swallow synthesized mouse events
        self.element
            .call_js_fn(CLICK_JS, false)
            .await
            .map_err(browser_error)?;
        Ok(())
    }
}
