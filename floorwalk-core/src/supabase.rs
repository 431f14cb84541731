// Supabase (PostgREST) upsert store

use crate::schema::Row;
use crate::sink::{SinkError, UpsertStore};
use async_trait::async_trait;
use reqwest::Client;
use std::env;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const URL_VAR: &str = "SUPABASE_URL";
pub const KEY_VAR: &str = "SUPABASE_KEY";

const MERGE_PREFERENCE: &str = "resolution=merge-duplicates,return=representation";

/// Endpoint and key for a Supabase project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupabaseConfig {
    pub url: String,
    pub key: String,
}

impl SupabaseConfig {
    /// Both variables must be set and non-empty.
    pub fn from_vars(url: Option<String>, key: Option<String>) -> Option<Self> {
        let url = url.filter(|u| !u.trim().is_empty())?;
        let key = key.filter(|k| !k.trim().is_empty())?;
        Some(Self {
            url: url.trim().to_string(),
            key: key.trim().to_string(),
        })
    }

    /// Read `SUPABASE_URL` and `SUPABASE_KEY` from the process environment.
    pub fn from_env() -> Option<Self> {
        Self::from_vars(env::var(URL_VAR).ok(), env::var(KEY_VAR).ok())
    }
}

pub struct SupabaseStore {
    client: Client,
    base_url: Url,
    key: String,
}

impl SupabaseStore {
    pub fn new(config: &SupabaseConfig) -> Result<Self, SinkError> {
        let mut base = config.url.clone();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base_url =
            Url::parse(&base).map_err(|e| SinkError::Config(format!("{}: {}", config.url, e)))?;

        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| SinkError::Config(e.to_string()))?;

        Ok(Self {
            client,
            base_url,
            key: config.key.clone(),
        })
    }

    fn endpoint(&self, table: &str) -> Result<Url, SinkError> {
        self.base_url
            .join(&format!("rest/v1/{}", table))
            .map_err(|e| SinkError::Config(format!("table '{}': {}", table, e)))
    }
}

#[async_trait]
impl UpsertStore for SupabaseStore {
    async fn upsert_batch(
        &self,
        table: &str,
        rows: Vec<Row>,
        conflict_key: &str,
    ) -> Result<Vec<Row>, SinkError> {
        let endpoint = self.endpoint(table)?;
        debug!("POST {} ({} rows)", endpoint, rows.len());

        let response = self
            .client
            .post(endpoint)
            .query(&[("on_conflict", conflict_key)])
            .header("apikey", &self.key)
            .bearer_auth(&self.key)
            .header("Prefer", MERGE_PREFERENCE)
            .json(&rows)
            .send()
            .await
            .map_err(|e| SinkError::Unavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let message = response.text().await.unwrap_or_default();
            return Err(SinkError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        response
            .json::<Vec<Row>>()
            .await
            .map_err(|e| SinkError::InvalidResponse(e.to_string()))
    }

    fn describe(&self) -> String {
        format!("supabase {}", self.base_url)
    }
}
