// Mapping of brand records onto a destination table

use crate::aggregate::{CompositeKey, CrawlResult};
use floorwalk_scanner::BrandRecord;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashSet;
use tracing::warn;

/// One row as sent to a store: column name to value.
pub type Row = Map<String, Value>;

/// Table and column names a record set is written under.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchemaMapping {
    pub table: String,
    pub id_column: String,
    pub brand_name: String,
    pub location: String,
    pub category: String,
    pub phone: String,
}

impl Default for SchemaMapping {
    fn default() -> Self {
        Self {
            table: "brands".to_string(),
            id_column: "id".to_string(),
            brand_name: "brand_name".to_string(),
            location: "location".to_string(),
            category: "category".to_string(),
            phone: "tel".to_string(),
        }
    }
}

impl SchemaMapping {
    /// Korean column names used by the `brands` table.
    pub fn korean(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            id_column: "id".to_string(),
            brand_name: "브랜드명".to_string(),
            location: "위치".to_string(),
            category: "카테고리".to_string(),
            phone: "연락처".to_string(),
        }
    }

    pub fn english(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            ..Self::default()
        }
    }

    /// Data columns in record order, without the id column.
    pub fn columns(&self) -> [&str; 4] {
        [
            self.brand_name.as_str(),
            self.location.as_str(),
            self.category.as_str(),
            self.phone.as_str(),
        ]
    }

    pub fn values<'a>(&self, record: &'a BrandRecord) -> [&'a str; 4] {
        [
            record.brand_name.as_str(),
            record.location.as_str(),
            record.category.as_str(),
            record.phone.as_str(),
        ]
    }

    pub fn to_row(&self, record: &BrandRecord) -> Row {
        let mut row = Row::new();
        row.insert(
            self.id_column.clone(),
            Value::String(CompositeKey::of(record).wire_id()),
        );
        for (column, value) in self.columns().into_iter().zip(self.values(record)) {
            row.insert(column.to_string(), Value::String(value.to_string()));
        }
        row
    }

    /// Rows for a whole result. Distinct composite keys can still render the
    /// same wire id ("a-b" + "c" vs "a" + "b-c"); only the first is kept.
    pub fn to_rows(&self, result: &CrawlResult) -> Vec<Row> {
        let mut seen = HashSet::new();
        let mut rows = Vec::with_capacity(result.len());

        for record in result.records() {
            let id = CompositeKey::of(record).wire_id();
            if !seen.insert(id.clone()) {
                warn!(
                    "Dropping {} / {}: id '{}' already used in this batch",
                    record.brand_name, record.location, id
                );
                continue;
            }
            rows.push(self.to_row(record));
        }

        rows
    }
}
