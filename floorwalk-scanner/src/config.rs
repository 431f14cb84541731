use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Placeholder substituted with the page number in `SiteSelectors::page_button`.
pub const PAGE_PLACEHOLDER: &str = "{page}";

/// CSS selectors describing the target directory page.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSelectors {
    pub popup_close: String,
    pub menu_items: String,
    pub menu_link: String,
    pub listing: String,
    pub items: String,
    pub pagination_links: String,
    pub page_value_attribute: String,
    pub page_button: String,
    pub brand_name: String,
    pub location: String,
    pub category: String,
    pub phone: String,
}

impl Default for SiteSelectors {
    fn default() -> Self {
        Self {
            popup_close: "button.c-modal__close".to_string(),
            menu_items: "ul.stordFloor li".to_string(),
            menu_link: "a".to_string(),
            listing: "ul.floorStore".to_string(),
            items: "ul.floorStore li a.inner".to_string(),
            pagination_links: ".listPaging span.page a[data-value]".to_string(),
            page_value_attribute: "data-value".to_string(),
            page_button: ".listPaging a.num[data-value='{page}'], \
                          .listPaging a[data-value='{page}'] button.last"
                .to_string(),
            brand_name: ".brandName".to_string(),
            location: ".floor".to_string(),
            category: ".sort".to_string(),
            phone: ".tel".to_string(),
        }
    }
}

impl SiteSelectors {
    /// Selector for the control that navigates to `page`.
    pub fn page_button_for(&self, page: u32) -> String {
        self.page_button.replace(PAGE_PLACEHOLDER, &page.to_string())
    }
}

/// Timing knobs for waits and settle delays, in milliseconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Pacing {
    pub wait_timeout_ms: u64,
    pub popup_timeout_ms: u64,
    pub poll_interval_ms: u64,
    pub menu_settle_min_ms: u64,
    pub menu_settle_max_ms: u64,
    pub page_settle_min_ms: u64,
    pub page_settle_max_ms: u64,
}

impl Default for Pacing {
    fn default() -> Self {
        Self {
            wait_timeout_ms: 15_000,
            popup_timeout_ms: 10_000,
            poll_interval_ms: 250,
            menu_settle_min_ms: 2_500,
            menu_settle_max_ms: 3_500,
            page_settle_min_ms: 2_500,
            page_settle_max_ms: 4_000,
        }
    }
}

impl Pacing {
    /// No settling and short waits, for scripted pages.
    pub fn immediate() -> Self {
        Self {
            wait_timeout_ms: 50,
            popup_timeout_ms: 20,
            poll_interval_ms: 5,
            menu_settle_min_ms: 0,
            menu_settle_max_ms: 0,
            page_settle_min_ms: 0,
            page_settle_max_ms: 0,
        }
    }

    pub fn wait_timeout(&self) -> Duration {
        Duration::from_millis(self.wait_timeout_ms)
    }

    pub fn popup_timeout(&self) -> Duration {
        Duration::from_millis(self.popup_timeout_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn menu_settle(&self) -> Duration {
        random_between(self.menu_settle_min_ms, self.menu_settle_max_ms)
    }

    pub fn page_settle(&self) -> Duration {
        random_between(self.page_settle_min_ms, self.page_settle_max_ms)
    }
}

fn random_between(min_ms: u64, max_ms: u64) -> Duration {
    if max_ms <= min_ms {
        return Duration::from_millis(min_ms);
    }
    let mut rng = rand::thread_rng();
    Duration::from_millis(rng.gen_range(min_ms..=max_ms))
}
