//! Capabilities the crawl needs from a rendered page.
//!
//! The walker never talks to a browser directly. It sees a [`RenderedPage`]
//! that can look elements up by CSS selector and scroll, and
//! [`PageElement`]s that can be read, tested for visibility and clicked.
//! Bounded waits are built here on top of those lookups.

use crate::error::{Result, ScanError};
use async_trait::async_trait;
use std::time::Duration;
use tokio::time::Instant;
use tracing::debug;

#[async_trait]
pub trait PageElement: Send + Sync + Sized {
    /// Descendants of this element matching `selector`.
    async fn find_all(&self, selector: &str) -> Result<Vec<Self>>;

    /// Rendered text, trimmed.
    async fn text(&self) -> Result<String>;

    async fn attribute(&self, name: &str) -> Result<Option<String>>;

    async fn is_visible(&self) -> Result<bool>;

    async fn click(&self) -> Result<()>;
}

#[async_trait]
pub trait RenderedPage: Send + Sync {
    type Element: PageElement;

    async fn find_all(&self, selector: &str) -> Result<Vec<Self::Element>>;

    /// Scroll the document to the bottom; some listings render their
    /// pagination lazily.
    async fn scroll_to_bottom(&self) -> Result<()>;
}

/// An established browsing session positioned on the start page.
#[async_trait]
pub trait BrowserSession: Send {
    type Page: RenderedPage;

    fn page(&self) -> &Self::Page;

    async fn close(self) -> Result<()>;
}

/// Opens a [`BrowserSession`] on a URL.
#[async_trait]
pub trait SessionLauncher: Send + Sync {
    type Session: BrowserSession;

    async fn launch(&self, url: &str) -> Result<Self::Session>;
}

/// First descendant of `element` matching `selector`, if any.
pub async fn find_first<E: PageElement>(element: &E, selector: &str) -> Result<Option<E>> {
    Ok(element.find_all(selector).await?.into_iter().next())
}

/// Poll until at least one element matches `selector`.
pub async fn wait_for_present<P: RenderedPage>(
    page: &P,
    selector: &str,
    timeout: Duration,
    poll: Duration,
) -> Result<P::Element> {
    let deadline = Instant::now() + timeout;
    loop {
        match page.find_all(selector).await {
            Ok(found) => {
                if let Some(element) = found.into_iter().next() {
                    return Ok(element);
                }
            }
            Err(e) => debug!("Lookup of '{}' failed while waiting: {}", selector, e),
        }

        if Instant::now() >= deadline {
            return Err(ScanError::Timeout {
                selector: selector.to_string(),
                waited: timeout,
            });
        }
        tokio::time::sleep(poll).await;
    }
}

/// Poll until a visible element matches `selector`.
pub async fn wait_for_clickable<P: RenderedPage>(
    page: &P,
    selector: &str,
    timeout: Duration,
    poll: Duration,
) -> Result<P::Element> {
    let deadline = Instant::now() + timeout;
    loop {
        match page.find_all(selector).await {
            Ok(found) => {
                for element in found {
                    if element.is_visible().await.unwrap_or(false) {
                        return Ok(element);
                    }
                }
            }
            Err(e) => debug!("Lookup of '{}' failed while waiting: {}", selector, e),
        }

        if Instant::now() >= deadline {
            return Err(ScanError::Timeout {
                selector: selector.to_string(),
                waited: timeout,
            });
        }
        tokio::time::sleep(poll).await;
    }
}

/// Elements matching `selector` that are currently displayed, in document
/// order. Elements whose visibility cannot be determined are left out.
pub async fn visible_elements<P: RenderedPage>(page: &P, selector: &str) -> Result<Vec<P::Element>> {
    let mut visible = Vec::new();
    for element in page.find_all(selector).await? {
        if element.is_visible().await.unwrap_or(false) {
            visible.push(element);
        }
    }
    Ok(visible)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteSelectors;
    use crate::mock::{MockMenu, MockSite};

    #[tokio::test]
    async fn test_wait_for_present_times_out() {
        let site = MockSite::new(vec![]);
        let err = wait_for_present(
            &site,
            "ul.nothing",
            Duration::from_millis(20),
            Duration::from_millis(5),
        )
        .await
        .unwrap_err();

        assert!(matches!(err, ScanError::Timeout { .. }));
    }

    #[tokio::test]
    async fn test_visible_elements_excludes_hidden_menus() {
        let site = MockSite::new(vec![
            MockMenu::new("1F"),
            MockMenu::new("hidden").hidden(),
            MockMenu::new("2F"),
        ]);
        let selectors = SiteSelectors::default();

        let visible = visible_elements(&site, &selectors.menu_items).await.unwrap();
        assert_eq!(visible.len(), 2);
    }

    #[tokio::test]
    async fn test_wait_for_clickable_finds_visible_control() {
        let site = MockSite::new(vec![MockMenu::new("1F")]);
        let selectors = SiteSelectors::default();

        let found = wait_for_clickable(
            &site,
            &selectors.menu_items,
            Duration::from_millis(20),
            Duration::from_millis(5),
        )
        .await;
        assert!(found.is_ok());
    }
}
