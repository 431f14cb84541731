use crate::config::SiteSelectors;
use crate::error::{Result, ScanError};
use crate::page::{PageElement, find_first};
use crate::result::BrandRecord;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Decides whether an extracted record is kept.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordPolicy {
    #[default]
    Always,
    /// Drop records whose brand name came back empty.
    RequireBrandName,
}

impl RecordPolicy {
    pub fn includes(&self, record: &BrandRecord) -> bool {
        match self {
            RecordPolicy::Always => true,
            RecordPolicy::RequireBrandName => !record.brand_name.is_empty(),
        }
    }
}

/// Reads the four brand fields off a listing item.
#[derive(Debug, Clone)]
pub struct FieldExtractor {
    selectors: SiteSelectors,
    policy: RecordPolicy,
}

impl FieldExtractor {
    pub fn new(selectors: SiteSelectors) -> Self {
        Self {
            selectors,
            policy: RecordPolicy::default(),
        }
    }

    pub fn with_policy(mut self, policy: RecordPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> RecordPolicy {
        self.policy
    }

    /// Extract every field independently; a field that cannot be read is
    /// left empty and the others are unaffected.
    pub async fn extract<E: PageElement>(&self, item: &E) -> BrandRecord {
        BrandRecord {
            brand_name: Self::field_or_empty(item, &self.selectors.brand_name).await,
            location: Self::field_or_empty(item, &self.selectors.location).await,
            category: Self::field_or_empty(item, &self.selectors.category).await,
            phone: Self::field_or_empty(item, &self.selectors.phone).await,
        }
    }

    /// Extract and apply the record policy.
    pub async fn extract_included<E: PageElement>(&self, item: &E) -> Option<BrandRecord> {
        let record = self.extract(item).await;
        if self.policy.includes(&record) {
            Some(record)
        } else {
            debug!("Dropping record without brand name: {:?}", record);
            None
        }
    }

    async fn field_or_empty<E: PageElement>(item: &E, selector: &str) -> String {
        match Self::field(item, selector).await {
            Ok(text) => text,
            Err(e) => {
                debug!("Field '{}' unavailable: {}", selector, e);
                String::new()
            }
        }
    }

    async fn field<E: PageElement>(item: &E, selector: &str) -> Result<String> {
        let element = find_first(item, selector)
            .await?
            .ok_or_else(|| ScanError::ElementNotFound(selector.to_string()))?;
        Ok(element.text().await?.trim().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{MockItem, MockMenu, MockSite};
    use crate::page::RenderedPage;

    async fn first_item(site: &MockSite) -> crate::mock::MockElement {
        let selectors = SiteSelectors::default();
        let menus = site.find_all(&selectors.menu_items).await.unwrap();
        menus[0].click().await.unwrap();
        site.find_all(&selectors.items).await.unwrap().remove(0)
    }

    #[tokio::test]
    async fn test_extracts_all_fields() {
        let site = MockSite::new(vec![MockMenu::new("1F").with_page(vec![MockItem::new(
            "Aesop", "1F", "Cosmetics", "02-000-0000",
        )])]);
        let item = first_item(&site).await;

        let record = FieldExtractor::new(SiteSelectors::default())
            .extract(&item)
            .await;

        assert_eq!(record, BrandRecord::new("Aesop", "1F", "Cosmetics", "02-000-0000"));
    }

    #[tokio::test]
    async fn test_missing_phone_only_blanks_phone() {
        let site = MockSite::new(vec![MockMenu::new("1F").with_page(vec![
            MockItem::new("Aesop", "1F", "Cosmetics", "unused").without_phone(),
        ])]);
        let item = first_item(&site).await;

        let record = FieldExtractor::new(SiteSelectors::default())
            .extract(&item)
            .await;

        assert_eq!(record.phone, "");
        assert_eq!(record.brand_name, "Aesop");
        assert_eq!(record.location, "1F");
        assert_eq!(record.category, "Cosmetics");
    }

    #[tokio::test]
    async fn test_missing_location_and_category_blank_only_themselves() {
        let site = MockSite::new(vec![MockMenu::new("1F").with_page(vec![
            MockItem::new("Tumi", "unused", "unused", "02-1")
                .without_location()
                .without_category(),
        ])]);
        let item = first_item(&site).await;

        let record = FieldExtractor::new(SiteSelectors::default())
            .extract(&item)
            .await;

        assert_eq!(record, BrandRecord::new("Tumi", "", "", "02-1"));
    }

    #[tokio::test]
    async fn test_require_brand_name_policy_drops_blank_brand() {
        let site = MockSite::new(vec![MockMenu::new("1F").with_page(vec![
            MockItem::new("", "1F", "Cosmetics", "02").without_brand_name(),
        ])]);
        let item = first_item(&site).await;

        let lenient = FieldExtractor::new(SiteSelectors::default());
        let strict = lenient.clone().with_policy(RecordPolicy::RequireBrandName);
        assert_eq!(lenient.policy(), RecordPolicy::Always);
        assert_eq!(strict.policy(), RecordPolicy::RequireBrandName);

        assert!(lenient.extract_included(&item).await.is_some());
        assert!(strict.extract_included(&item).await.is_none());
    }

    #[test]
    fn test_policy_includes() {
        let blank = BrandRecord::new("", "1F", "", "");
        let named = BrandRecord::new("Gucci", "1F", "", "");
        assert!(RecordPolicy::Always.includes(&blank));
        assert!(!RecordPolicy::RequireBrandName.includes(&blank));
        assert!(RecordPolicy::RequireBrandName.includes(&named));
    }
}
