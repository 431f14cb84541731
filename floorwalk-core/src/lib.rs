pub mod aggregate;
pub mod config;
pub mod crawl;
pub mod data;
pub mod export;
pub mod schema;
pub mod sink;
pub mod supabase;

pub use aggregate::{CompositeKey, CrawlResult, finalize};
pub use config::{ConfigError, SiteProfile};
pub use crawl::{CrawlOptions, CrawlPhase, CrawlProgressCallback, CrawlReport, execute_crawl};
pub use data::SqliteStore;
pub use export::{ExportFormat, ExportOutcome, ExportTarget};
pub use schema::{Row, SchemaMapping};
pub use sink::{PersistenceSink, SinkError, SinkOutcome, UpsertStore};
pub use supabase::{SupabaseConfig, SupabaseStore};
