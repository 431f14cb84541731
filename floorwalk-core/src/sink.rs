// Idempotent persistence of a crawl result

use crate::aggregate::CrawlResult;
use crate::schema::{Row, SchemaMapping};
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("Store unreachable: {0}")]
    Unavailable(String),

    #[error("Store rejected batch (status {status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Unexpected store response: {0}")]
    InvalidResponse(String),

    #[error("Invalid store configuration: {0}")]
    Config(String),

    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),
}

/// A table store that can upsert a batch keyed on one column.
#[async_trait]
pub trait UpsertStore: Send + Sync {
    /// Insert or replace every row; returns the rows the store acknowledged.
    async fn upsert_batch(
        &self,
        table: &str,
        rows: Vec<Row>,
        conflict_key: &str,
    ) -> Result<Vec<Row>, SinkError>;

    fn describe(&self) -> String;
}

#[async_trait]
impl<T: UpsertStore + ?Sized> UpsertStore for Arc<T> {
    async fn upsert_batch(
        &self,
        table: &str,
        rows: Vec<Row>,
        conflict_key: &str,
    ) -> Result<Vec<Row>, SinkError> {
        (**self).upsert_batch(table, rows, conflict_key).await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// What happened to the persistence step of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SinkOutcome {
    Skipped { reason: String },
    Accepted { rows: usize },
    Failed { error: String },
}

impl SinkOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        SinkOutcome::Skipped {
            reason: reason.into(),
        }
    }
}

/// Writes a [`CrawlResult`] through a store under a schema mapping.
pub struct PersistenceSink {
    store: Box<dyn UpsertStore>,
    mapping: SchemaMapping,
}

impl PersistenceSink {
    pub fn new(store: impl UpsertStore + 'static, mapping: SchemaMapping) -> Self {
        Self {
            store: Box::new(store),
            mapping,
        }
    }

    pub fn describe(&self) -> String {
        format!("{} ({})", self.store.describe(), self.mapping.table)
    }

    /// Upsert every record keyed on its wire id. An empty result is not sent.
    pub async fn upsert(&self, result: &CrawlResult) -> Result<usize, SinkError> {
        if result.is_empty() {
            debug!("Nothing to persist");
            return Ok(0);
        }

        let rows = self.mapping.to_rows(result);
        let sent = rows.len();
        let accepted = self
            .store
            .upsert_batch(&self.mapping.table, rows, &self.mapping.id_column)
            .await?;

        info!(
            "{} accepted {}/{} rows",
            self.describe(),
            accepted.len(),
            sent
        );
        Ok(accepted.len())
    }
}
