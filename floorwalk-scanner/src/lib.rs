pub mod config;
pub mod crawler;
pub mod error;
pub mod extractor;
pub mod page;
pub mod pager;
pub mod result;

#[cfg(feature = "chrome")]
pub mod chrome;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

pub use config::{Pacing, SiteSelectors};
pub use crawler::{Crawler, Harvest, ProgressCallback};
pub use error::ScanError;
pub use extractor::{FieldExtractor, RecordPolicy};
pub use page::{BrowserSession, PageElement, RenderedPage, SessionLauncher};
pub use pager::PageFetcher;
pub use result::{BrandRecord, MenuEntry, MenuReport, MenuStatus};
