use crate::config::{Pacing, SiteSelectors};
use crate::error::{Result, ScanError};
use crate::extractor::{FieldExtractor, RecordPolicy};
use crate::page::{
    PageElement, RenderedPage, find_first, visible_elements, wait_for_clickable, wait_for_present,
};
use crate::pager::PageFetcher;
use crate::result::{BrandRecord, MenuEntry, MenuReport, MenuStatus};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Called with the menu's display index and a human readable status line.
pub type ProgressCallback = Arc<dyn Fn(usize, String) + Send + Sync>;

/// Everything collected during a walk. Owned by the caller so that whatever
/// was gathered survives an interrupted walk.
#[derive(Debug, Default)]
pub struct Harvest {
    pub records: Vec<BrandRecord>,
    pub menus: Vec<MenuReport>,
}

impl Harvest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// Walks every visible menu of a directory page, one at a time.
pub struct Crawler {
    selectors: SiteSelectors,
    pacing: Pacing,
    extractor: FieldExtractor,
    fetcher: PageFetcher,
    progress_callback: Option<ProgressCallback>,
}

impl Crawler {
    pub fn new() -> Self {
        Self::with_selectors(SiteSelectors::default())
    }

    pub fn with_selectors(selectors: SiteSelectors) -> Self {
        let pacing = Pacing::default();
        Self {
            extractor: FieldExtractor::new(selectors.clone()),
            fetcher: PageFetcher::new(selectors.clone(), pacing.clone()),
            selectors,
            pacing,
            progress_callback: None,
        }
    }

    pub fn with_pacing(mut self, pacing: Pacing) -> Self {
        self.fetcher = PageFetcher::new(self.selectors.clone(), pacing.clone());
        self.pacing = pacing;
        self
    }

    pub fn with_record_policy(mut self, policy: RecordPolicy) -> Self {
        self.extractor = self.extractor.with_policy(policy);
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    /// Dismiss the overlay if one shows up, then wait for the menu list.
    pub async fn prepare<P: RenderedPage>(&self, page: &P) -> Result<()> {
        self.dismiss_popup(page).await;
        wait_for_present(
            page,
            &self.selectors.menu_items,
            self.pacing.wait_timeout(),
            self.pacing.poll_interval(),
        )
        .await?;
        Ok(())
    }

    /// Returns whether a popup was closed. Absence is not an error.
    pub async fn dismiss_popup<P: RenderedPage>(&self, page: &P) -> bool {
        let close = wait_for_clickable(
            page,
            &self.selectors.popup_close,
            self.pacing.popup_timeout(),
            self.pacing.poll_interval(),
        )
        .await;

        match close {
            Ok(button) => match button.click().await {
                Ok(()) => {
                    info!("Closed popup overlay");
                    true
                }
                Err(e) => {
                    warn!("Popup close control did not respond: {}", e);
                    false
                }
            },
            Err(_) => {
                debug!("No popup overlay detected");
                false
            }
        }
    }

    /// Visible menu entries, in display order.
    pub async fn enumerate_menus<P: RenderedPage>(&self, page: &P) -> Result<Vec<MenuEntry>> {
        let visible = visible_elements(page, &self.selectors.menu_items).await?;
        let mut entries = Vec::with_capacity(visible.len());
        for (display_index, element) in visible.iter().enumerate() {
            let label = match find_first(element, &self.selectors.menu_link).await {
                Ok(Some(link)) => link.text().await.unwrap_or_default(),
                _ => element.text().await.unwrap_or_default(),
            };
            entries.push(MenuEntry::new(display_index, label));
        }
        Ok(entries)
    }

    /// Re-resolve `entry` against the live menu list, click it and wait for
    /// its listing to render.
    pub async fn activate<P: RenderedPage>(&self, page: &P, entry: &MenuEntry) -> Result<()> {
        let activation_failed = |reason: String| ScanError::MenuActivation {
            index: entry.display_index,
            reason,
        };

        let visible = visible_elements(page, &self.selectors.menu_items)
            .await
            .map_err(|e| activation_failed(e.to_string()))?;
        let item = visible.get(entry.display_index).ok_or_else(|| {
            activation_failed(format!(
                "only {} menus visible, wanted position {}",
                visible.len(),
                entry.display_index
            ))
        })?;
        let link = find_first(item, &self.selectors.menu_link)
            .await
            .map_err(|e| activation_failed(e.to_string()))?
            .ok_or_else(|| activation_failed(format!("no '{}' in menu", self.selectors.menu_link)))?;

        if let Ok(live_label) = link.text().await
            && !live_label.is_empty()
            && live_label != entry.label
        {
            debug!(
                "Menu at position {} is now '{}' (enumerated as '{}')",
                entry.display_index, live_label, entry.label
            );
        }

        link.click()
            .await
            .map_err(|e| activation_failed(e.to_string()))?;

        tokio::time::sleep(self.pacing.menu_settle()).await;

        wait_for_present(
            page,
            &self.selectors.listing,
            self.pacing.wait_timeout(),
            self.pacing.poll_interval(),
        )
        .await
        .map_err(|e| activation_failed(e.to_string()))?;

        Ok(())
    }

    /// Activate one menu and collect every page of its listing into
    /// `records`. Failures stay inside this menu.
    pub async fn walk_menu<P: RenderedPage>(
        &self,
        page: &P,
        entry: &MenuEntry,
        records: &mut Vec<BrandRecord>,
    ) -> MenuReport {
        info!("Processing menu '{}'", entry.label);

        if let Err(e) = self.activate(page, entry).await {
            warn!("Skipping menu '{}': {}", entry.label, e);
            return MenuReport::skipped(entry.clone(), e.to_string());
        }

        let mut report = MenuReport::new(entry.clone());
        let total = self.fetcher.page_count(page).await;
        report.total_pages = total;
        info!("Menu '{}' has {} page(s)", entry.label, total);

        let mut first_page_empty = false;
        for number in 1..=total {
            if let Err(e) = self.fetcher.advance_to(page, number).await {
                warn!(
                    "Stopping pagination of '{}' at page {}: {}",
                    entry.label, number, e
                );
                report.status = MenuStatus::PaginationAborted {
                    at_page: number,
                    reason: e.to_string(),
                };
                break;
            }
            report.pages_visited += 1;

            let items = match self.fetcher.list_items(page).await {
                Ok(items) => items,
                Err(e) => {
                    warn!("Could not list items of '{}' page {}: {}", entry.label, number, e);
                    Vec::new()
                }
            };

            if items.is_empty() {
                if number == 1 {
                    info!("No brands found in '{}'", entry.label);
                    first_page_empty = true;
                } else {
                    debug!("Page {} of '{}' is empty", number, entry.label);
                }
                continue;
            }

            debug!("Page {}/{} of '{}': {} items", number, total, entry.label, items.len());
            let mut kept = 0;
            for item in &items {
                if let Some(record) = self.extractor.extract_included(item).await {
                    records.push(record);
                    kept += 1;
                }
            }
            report.records_collected += kept;

            if let Some(ref callback) = self.progress_callback {
                callback(
                    entry.display_index,
                    format!("{}: page {}/{} ({} brands)", entry.label, number, total, kept),
                );
            }
        }

        if first_page_empty
            && report.records_collected == 0
            && report.status == MenuStatus::Completed
        {
            report.status = MenuStatus::NoData;
        }

        info!(
            "Finished menu '{}': {} record(s) from {} page(s)",
            entry.label, report.records_collected, report.pages_visited
        );
        report
    }

    /// Walk every visible menu in order. Only a failure to find the menu list
    /// at all is returned as an error; per-menu failures are recorded in the
    /// harvest's menu reports.
    pub async fn walk<P: RenderedPage>(&self, page: &P, harvest: &mut Harvest) -> Result<()> {
        self.prepare(page).await?;
        let entries = self.enumerate_menus(page).await?;
        info!("Found {} visible menu(s)", entries.len());

        for entry in &entries {
            let report = self.walk_menu(page, entry, &mut harvest.records).await;
            harvest.menus.push(report);
        }

        info!(
            "Walk complete: {} record(s) from {} menu(s)",
            harvest.records.len(),
            harvest.menus.len()
        );
        Ok(())
    }
}

impl Default for Crawler {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockItem, MockMenu, MockSite};
    use std::sync::Mutex;

    fn item(name: &str, floor: &str) -> MockItem {
        MockItem::new(name, floor, "Fashion", "02-1234")
    }

    fn crawler() -> Crawler {
        Crawler::new().with_pacing(Pacing::immediate())
    }

    #[tokio::test]
    async fn test_enumerate_skips_hidden_menus() {
        let site = MockSite::new(vec![
            MockMenu::new("1F"),
            MockMenu::new("staff only").hidden(),
            MockMenu::new("2F"),
        ]);

        let entries = crawler().enumerate_menus(&site).await.unwrap();

        assert_eq!(
            entries,
            vec![MenuEntry::new(0, "1F"), MenuEntry::new(1, "2F")]
        );
    }

    #[tokio::test]
    async fn test_activation_resolves_display_index_against_visible_set() {
        let site = MockSite::new(vec![
            MockMenu::new("hidden").hidden(),
            MockMenu::new("1F").with_page(vec![item("A", "1F")]),
            MockMenu::new("2F").with_page(vec![item("B", "2F")]),
        ]);

        crawler()
            .activate(&site, &MenuEntry::new(1, "2F"))
            .await
            .unwrap();

        // position 1 among visible menus is underlying menu 2
        assert_eq!(site.activations(), vec![2]);
    }

    #[tokio::test]
    async fn test_activation_out_of_range_is_menu_error() {
        let site = MockSite::new(vec![MockMenu::new("1F")]);

        let err = crawler()
            .activate(&site, &MenuEntry::new(5, "gone"))
            .await
            .unwrap_err();

        assert!(matches!(err, ScanError::MenuActivation { index: 5, .. }));
    }

    #[tokio::test]
    async fn test_walk_collects_every_page() {
        let site = MockSite::new(vec![
            MockMenu::new("1F")
                .with_page(vec![item("A", "1F"), item("B", "1F")])
                .with_page(vec![item("C", "1F")]),
            MockMenu::new("2F").with_page(vec![item("D", "2F")]),
        ]);
        let mut harvest = Harvest::new();

        crawler().walk(&site, &mut harvest).await.unwrap();

        let names: Vec<_> = harvest.records.iter().map(|r| r.brand_name.as_str()).collect();
        assert_eq!(names, vec!["A", "B", "C", "D"]);
        assert_eq!(harvest.menus.len(), 2);
        assert_eq!(harvest.menus[0].total_pages, 2);
        assert_eq!(harvest.menus[0].pages_visited, 2);
        assert_eq!(harvest.menus[0].status, MenuStatus::Completed);
    }

    #[tokio::test]
    async fn test_failed_activation_skips_only_that_menu() {
        let site = MockSite::new(vec![
            MockMenu::new("1F").failing_activation(),
            MockMenu::new("2F").with_page(vec![item("B", "2F")]),
        ]);
        let mut harvest = Harvest::new();

        crawler().walk(&site, &mut harvest).await.unwrap();

        assert!(harvest.menus[0].is_skipped());
        assert_eq!(harvest.records, vec![BrandRecord::new("B", "2F", "Fashion", "02-1234")]);
    }

    #[tokio::test]
    async fn test_missing_listing_skips_menu() {
        let site = MockSite::new(vec![
            MockMenu::new("1F").with_page(vec![item("A", "1F")]).without_listing(),
            MockMenu::new("2F").with_page(vec![item("B", "2F")]),
        ]);
        let mut harvest = Harvest::new();

        crawler().walk(&site, &mut harvest).await.unwrap();

        assert!(harvest.menus[0].is_skipped());
        assert_eq!(harvest.records.len(), 1);
        assert_eq!(harvest.records[0].brand_name, "B");
    }

    #[tokio::test]
    async fn test_pagination_failure_keeps_earlier_pages_and_continues() {
        let site = MockSite::new(vec![
            MockMenu::new("1F")
                .with_page(vec![item("A", "1F")])
                .with_page(vec![item("B", "1F")])
                .with_page(vec![item("C", "1F")])
                .with_broken_page(2),
            MockMenu::new("2F").with_page(vec![item("D", "2F")]),
        ]);
        let mut harvest = Harvest::new();

        crawler().walk(&site, &mut harvest).await.unwrap();

        let names: Vec<_> = harvest.records.iter().map(|r| r.brand_name.as_str()).collect();
        assert_eq!(names, vec!["A", "D"]);
        assert!(matches!(
            harvest.menus[0].status,
            MenuStatus::PaginationAborted { at_page: 2, .. }
        ));
        assert_eq!(harvest.menus[0].pages_visited, 1);
        assert_eq!(harvest.menus[1].status, MenuStatus::Completed);
    }

    #[tokio::test]
    async fn test_empty_menu_reports_no_data() {
        let site = MockSite::new(vec![MockMenu::new("1F").with_page(vec![])]);
        let mut harvest = Harvest::new();

        crawler().walk(&site, &mut harvest).await.unwrap();

        assert!(harvest.is_empty());
        assert_eq!(harvest.menus[0].status, MenuStatus::NoData);
    }

    #[tokio::test]
    async fn test_empty_later_page_is_skipped() {
        let site = MockSite::new(vec![
            MockMenu::new("1F")
                .with_page(vec![item("A", "1F")])
                .with_page(vec![])
                .with_page(vec![item("C", "1F")]),
        ]);
        let mut harvest = Harvest::new();

        crawler().walk(&site, &mut harvest).await.unwrap();

        assert_eq!(harvest.records.len(), 2);
        assert_eq!(harvest.menus[0].pages_visited, 3);
        assert_eq!(harvest.menus[0].status, MenuStatus::Completed);
    }

    #[tokio::test]
    async fn test_record_policy_applies_during_walk() {
        let site = MockSite::new(vec![MockMenu::new("1F").with_page(vec![
            item("A", "1F"),
            MockItem::new("", "1F", "", "").without_brand_name(),
        ])]);
        let mut harvest = Harvest::new();

        crawler()
            .with_record_policy(RecordPolicy::RequireBrandName)
            .walk(&site, &mut harvest)
            .await
            .unwrap();

        assert_eq!(harvest.records.len(), 1);
        assert_eq!(harvest.menus[0].records_collected, 1);
    }

    #[tokio::test]
    async fn test_popup_is_dismissed_before_walking() {
        let site = MockSite::with_popup(vec![MockMenu::new("1F").with_page(vec![item("A", "1F")])]);
        let mut harvest = Harvest::new();

        crawler().walk(&site, &mut harvest).await.unwrap();

        assert!(site.popup_dismissed());
        assert_eq!(harvest.records.len(), 1);
    }

    #[tokio::test]
    async fn test_broken_menu_list_fails_walk() {
        let site = MockSite::broken(vec![MockMenu::new("1F")]);
        let mut harvest = Harvest::new();

        let result = crawler().walk(&site, &mut harvest).await;

        assert!(matches!(result, Err(ScanError::Timeout { .. })));
        assert!(harvest.menus.is_empty());
    }

    #[tokio::test]
    async fn test_progress_callback_reports_pages() {
        let messages: Arc<Mutex<Vec<(usize, String)>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = messages.clone();
        let site = MockSite::new(vec![
            MockMenu::new("1F")
                .with_page(vec![item("A", "1F")])
                .with_page(vec![item("B", "1F")]),
        ]);
        let mut harvest = Harvest::new();

        crawler()
            .with_progress_callback(Arc::new(move |index, message| {
                sink.lock().unwrap().push((index, message));
            }))
            .walk(&site, &mut harvest)
            .await
            .unwrap();

        let messages = messages.lock().unwrap();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1], (0, "1F: page 2/2 (1 brands)".to_string()));
    }
}
