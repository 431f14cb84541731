use serde::{Deserialize, Serialize};

/// One brand entry as read off a listing item. Fields that could not be
/// located are empty strings, never absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct BrandRecord {
    pub brand_name: String,
    pub location: String,
    pub category: String,
    pub phone: String,
}

impl BrandRecord {
    pub fn new(
        brand_name: impl Into<String>,
        location: impl Into<String>,
        category: impl Into<String>,
        phone: impl Into<String>,
    ) -> Self {
        Self {
            brand_name: brand_name.into(),
            location: location.into(),
            category: category.into(),
            phone: phone.into(),
        }
    }
}

/// A visible top-level menu as seen at enumeration time.
///
/// `display_index` is a position among the currently visible entries, not an
/// identity: it is re-resolved against the live page before every activation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuEntry {
    pub display_index: usize,
    pub label: String,
}

impl MenuEntry {
    pub fn new(display_index: usize, label: impl Into<String>) -> Self {
        let label = label.into();
        let label = if label.trim().is_empty() {
            format!("menu #{}", display_index)
        } else {
            label.trim().to_string()
        };
        Self {
            display_index,
            label,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MenuStatus {
    /// Every discovered page was visited.
    Completed,
    /// The first page had no items.
    NoData,
    /// Navigation to `at_page` failed; earlier pages were kept.
    PaginationAborted { at_page: u32, reason: String },
    /// Activation or the listing wait failed; nothing was collected.
    Skipped { reason: String },
}

/// Outcome of walking a single menu.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MenuReport {
    pub entry: MenuEntry,
    pub total_pages: u32,
    pub pages_visited: u32,
    pub records_collected: usize,
    pub status: MenuStatus,
}

impl MenuReport {
    pub fn new(entry: MenuEntry) -> Self {
        Self {
            entry,
            total_pages: 0,
            pages_visited: 0,
            records_collected: 0,
            status: MenuStatus::Completed,
        }
    }

    pub fn skipped(entry: MenuEntry, reason: String) -> Self {
        Self {
            status: MenuStatus::Skipped { reason },
            ..Self::new(entry)
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self.status, MenuStatus::Skipped { .. })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_menu_entry_trims_label() {
        let entry = MenuEntry::new(2, "  1F  ");
        assert_eq!(entry.label, "1F");
        assert_eq!(entry.display_index, 2);
    }

    #[test]
    fn test_menu_entry_blank_label_falls_back_to_index() {
        let entry = MenuEntry::new(4, "   ");
        assert_eq!(entry.label, "menu #4");
    }

    #[test]
    fn test_skipped_report() {
        let report = MenuReport::skipped(MenuEntry::new(0, "B1"), "gone".to_string());
        assert!(report.is_skipped());
        assert_eq!(report.records_collected, 0);
    }
}
