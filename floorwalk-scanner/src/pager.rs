use crate::config::{Pacing, SiteSelectors};
use crate::error::{Result, ScanError};
use crate::page::{PageElement, RenderedPage, wait_for_clickable};
use tracing::{debug, warn};

/// Discovers and walks the pages of the active listing.
#[derive(Debug, Clone)]
pub struct PageFetcher {
    selectors: SiteSelectors,
    pacing: Pacing,
}

impl PageFetcher {
    pub fn new(selectors: SiteSelectors, pacing: Pacing) -> Self {
        Self { selectors, pacing }
    }

    /// Highest page value among the pagination links, or 1 when there are
    /// none or they cannot be read.
    pub async fn page_count<P: RenderedPage>(&self, page: &P) -> u32 {
        match self.scan_page_values(page).await {
            Ok(Some(max)) => max.max(1),
            Ok(None) => 1,
            Err(e) => {
                warn!("Could not determine page count ({}); visiting page 1 only", e);
                1
            }
        }
    }

    async fn scan_page_values<P: RenderedPage>(&self, page: &P) -> Result<Option<u32>> {
        let links = page.find_all(&self.selectors.pagination_links).await?;
        let mut max = None;
        for link in links {
            let Some(raw) = link.attribute(&self.selectors.page_value_attribute).await? else {
                continue;
            };
            let value = raw
                .trim()
                .parse::<u32>()
                .map_err(|_| ScanError::InvalidPageValue(raw.clone()))?;
            max = max.max(Some(value));
        }
        Ok(max)
    }

    /// Bring page `number` of the listing into view. Page 1 is already
    /// rendered after activation.
    pub async fn advance_to<P: RenderedPage>(&self, page: &P, number: u32) -> Result<()> {
        if number <= 1 {
            return Ok(());
        }

        let navigation_failed = |reason: String| ScanError::PageNavigation {
            page: number,
            reason,
        };

        page.scroll_to_bottom()
            .await
            .map_err(|e| navigation_failed(e.to_string()))?;

        let selector = self.selectors.page_button_for(number);
        let control = wait_for_clickable(
            page,
            &selector,
            self.pacing.wait_timeout(),
            self.pacing.poll_interval(),
        )
        .await
        .map_err(|e| navigation_failed(e.to_string()))?;

        control
            .click()
            .await
            .map_err(|e| navigation_failed(e.to_string()))?;

        let settle = self.pacing.page_settle();
        debug!("Page {} requested, settling for {:?}", number, settle);
        tokio::time::sleep(settle).await;
        Ok(())
    }

    /// Item handles on the current page.
    pub async fn list_items<P: RenderedPage>(&self, page: &P) -> Result<Vec<P::Element>> {
        page.find_all(&self.selectors.items).await
    }
}
