// Deduplication and ordering of collected records

use floorwalk_scanner::BrandRecord;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;

/// Identity of a record: the same brand on two floors is two records.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CompositeKey {
    pub brand_name: String,
    pub location: String,
}

impl CompositeKey {
    pub fn of(record: &BrandRecord) -> Self {
        Self {
            brand_name: record.brand_name.clone(),
            location: record.location.clone(),
        }
    }

    /// The id column value sent to the store: `brand-location`.
    pub fn wire_id(&self) -> String {
        format!("{}-{}", self.brand_name, self.location)
    }
}

impl fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.wire_id())
    }
}

/// Deduplicated records sorted by (location, brand name).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CrawlResult {
    records: Vec<BrandRecord>,
}

impl CrawlResult {
    pub fn records(&self) -> &[BrandRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records with their position in the finalized order.
    pub fn rows(&self) -> impl Iterator<Item = (usize, &BrandRecord)> {
        self.records.iter().enumerate()
    }
}

/// Keep the first occurrence of each composite key, then stable-sort by
/// (location, brand name).
pub fn finalize(records: impl IntoIterator<Item = BrandRecord>) -> CrawlResult {
    let mut seen = HashSet::new();
    let mut unique: Vec<BrandRecord> = records
        .into_iter()
        .filter(|record| seen.insert(CompositeKey::of(record)))
        .collect();

    unique.sort_by(|a, b| {
        a.location
            .cmp(&b.location)
            .then_with(|| a.brand_name.cmp(&b.brand_name))
    });

    CrawlResult { records: unique }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(brand: &str, location: &str) -> BrandRecord {
        BrandRecord::new(brand, location, "", "")
    }

    #[test]
    fn test_duplicate_pairs_collapse() {
        let result = finalize(vec![
            record("A", "L1"),
            record("A", "L1"),
            record("A", "L2"),
        ]);

        assert_eq!(result.records(), &[record("A", "L1"), record("A", "L2")]);
    }

    #[test]
    fn test_sorted_by_location_then_brand() {
        let result = finalize(vec![record("B", "L2"), record("A", "L1")]);
        assert_eq!(result.records(), &[record("A", "L1"), record("B", "L2")]);

        let result = finalize(vec![record("Z", "L1"), record("B", "L1"), record("A", "L3")]);
        let names: Vec<_> = result.records().iter().map(|r| r.brand_name.as_str()).collect();
        assert_eq!(names, vec!["B", "Z", "A"]);
    }

    #[test]
    fn test_first_occurrence_wins() {
        let result = finalize(vec![
            BrandRecord::new("A", "L1", "Fashion", "first"),
            BrandRecord::new("A", "L1", "Beauty", "second"),
        ]);

        assert_eq!(result.len(), 1);
        assert_eq!(result.records()[0].phone, "first");
        assert_eq!(result.records()[0].category, "Fashion");
    }

    #[test]
    fn test_same_brand_on_two_floors_is_kept_twice() {
        let result = finalize(vec![record("Gucci", "1F"), record("Gucci", "2F")]);
        assert_eq!(result.len(), 2);
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let input = vec![
            record("Dior", "2F"),
            record("Chanel", "1F"),
            record("Dior", "2F"),
            record("", "1F"),
            record("Aesop", "2F"),
            record("Chanel", "B1"),
        ];

        let once = finalize(input);
        let twice = finalize(once.records().to_vec());

        assert_eq!(once, twice);
    }

    #[test]
    fn test_rows_are_reindexed() {
        let result = finalize(vec![record("B", "2F"), record("A", "1F")]);
        let rows: Vec<_> = result.rows().map(|(i, r)| (i, r.brand_name.clone())).collect();
        assert_eq!(rows, vec![(0, "A".to_string()), (1, "B".to_string())]);
    }

    #[test]
    fn test_empty_input() {
        assert!(finalize(Vec::new()).is_empty());
    }

    #[test]
    fn test_wire_id() {
        let key = CompositeKey::of(&record("Louis Vuitton", "1F-East"));
        assert_eq!(key.wire_id(), "Louis Vuitton-1F-East");
        assert_eq!(key.to_string(), key.wire_id());
    }
}
