use crate::aggregate::{CrawlResult, finalize};
use crate::config::SiteProfile;
use crate::export::{ExportOutcome, ExportTarget, export_result};
use crate::sink::{PersistenceSink, SinkOutcome};
use floorwalk_scanner::{BrowserSession, Crawler, Harvest, MenuReport, SessionLauncher};
use futures::FutureExt;
use serde::Serialize;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Options for configuring a crawl run
pub struct CrawlOptions {
    pub profile: SiteProfile,
    /// Overrides the profile's start URL
    pub start_url: Option<String>,
    /// `None` disables the file export
    pub export: Option<ExportTarget>,
}

impl CrawlOptions {
    pub fn new(profile: SiteProfile) -> Self {
        Self {
            profile,
            start_url: None,
            export: None,
        }
    }

    pub fn start_url(&self) -> &str {
        self.start_url.as_deref().unwrap_or(&self.profile.start_url)
    }
}

/// Callback for reporting crawl progress
pub type CrawlProgressCallback = Arc<dyn Fn(String) + Send + Sync>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CrawlPhase {
    Init,
    Walking,
    Aggregating,
    Persisting,
    Cleanup,
    Done,
    Failed,
}

/// Everything a run produced, including the failures it contained.
#[derive(Debug, Clone, Serialize)]
pub struct CrawlReport {
    pub phases: Vec<CrawlPhase>,
    pub menus: Vec<MenuReport>,
    /// Records collected before deduplication
    pub collected: usize,
    pub result: CrawlResult,
    pub session_error: Option<String>,
    pub walk_error: Option<String>,
    pub cleanup_error: Option<String>,
    pub export: ExportOutcome,
    pub sink: SinkOutcome,
}

impl CrawlReport {
    fn new() -> Self {
        Self {
            phases: vec![CrawlPhase::Init],
            menus: Vec::new(),
            collected: 0,
            result: CrawlResult::default(),
            session_error: None,
            walk_error: None,
            cleanup_error: None,
            export: ExportOutcome::skipped("run did not reach persistence"),
            sink: SinkOutcome::skipped("run did not reach persistence"),
        }
    }

    fn enter(&mut self, phase: CrawlPhase) {
        self.phases.push(phase);
    }

    pub fn final_phase(&self) -> CrawlPhase {
        self.phases.last().copied().unwrap_or(CrawlPhase::Init)
    }

    /// Done, even if some menus, the export or the store failed.
    pub fn succeeded(&self) -> bool {
        self.final_phase() == CrawlPhase::Done
    }
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn build_crawler(profile: &SiteProfile, progress_callback: Option<&CrawlProgressCallback>) -> Crawler {
    let mut crawler = Crawler::with_selectors(profile.selectors.clone())
        .with_pacing(profile.pacing.clone())
        .with_record_policy(profile.record_policy);

    if let Some(callback) = progress_callback {
        let callback = callback.clone();
        let scanner_callback: floorwalk_scanner::ProgressCallback =
            Arc::new(move |_menu: usize, message: String| callback(message));
        crawler = crawler.with_progress_callback(scanner_callback);
    }
    crawler
}

/// Execute a crawl run: open a session, walk every menu, deduplicate, export
/// and persist whatever was collected, then close the session.
///
/// Per-menu failures, walk errors and panics are contained; nothing after
/// the walk can fail the run, so the session is always closed once opened.
/// Only a session that cannot be established ends the run in
/// [`CrawlPhase::Failed`].
pub async fn execute_crawl<L: SessionLauncher>(
    options: CrawlOptions,
    launcher: &L,
    sink: Option<&PersistenceSink>,
    progress_callback: Option<CrawlProgressCallback>,
) -> CrawlReport {
    let mut report = CrawlReport::new();
    let notify = |message: String| {
        if let Some(ref callback) = progress_callback {
            callback(message);
        }
    };

    let url = options.start_url().to_string();
    let profile = options.profile;
    info!("Starting crawl of {} with profile '{}'", url, profile.name);
    notify(format!("Opening {}", url));

    let session = match launcher.launch(&url).await {
        Ok(session) => session,
        Err(e) => {
            error!("Could not establish a browser session: {}", e);
            report.session_error = Some(e.to_string());
            report.export = ExportOutcome::skipped("no session");
            report.sink = SinkOutcome::skipped("no session");
            report.enter(CrawlPhase::Failed);
            return report;
        }
    };

    report.enter(CrawlPhase::Walking);
    let crawler = build_crawler(&profile, progress_callback.as_ref());
    let mut harvest = Harvest::new();
    let walked = AssertUnwindSafe(crawler.walk(session.page(), &mut harvest))
        .catch_unwind()
        .await;
    match walked {
        Ok(Ok(())) => {}
        Ok(Err(e)) => {
            warn!("Walk ended early: {}", e);
            report.walk_error = Some(e.to_string());
        }
        Err(payload) => {
            let message = panic_message(payload);
            error!("Walk panicked: {}", message);
            report.walk_error = Some(format!("panic: {}", message));
        }
    }

    report.enter(CrawlPhase::Aggregating);
    let Harvest { records, menus } = harvest;
    report.collected = records.len();
    report.menus = menus;
    report.result = finalize(records);
    info!(
        "Collected {} record(s), {} unique",
        report.collected,
        report.result.len()
    );
    notify(format!("{} unique brands", report.result.len()));

    report.enter(CrawlPhase::Persisting);
    if report.result.is_empty() {
        info!("No records collected; skipping export and persistence");
        report.export = ExportOutcome::skipped("no records");
        report.sink = SinkOutcome::skipped("no records");
    } else {
        report.export = match options.export {
            Some(ref target) => match export_result(&report.result, &profile.schema, target) {
                Ok(rows) => {
                    info!("Exported {} row(s) to {}", rows, target.path.display());
                    ExportOutcome::Written {
                        path: target.path.clone(),
                        rows,
                    }
                }
                Err(e) => {
                    warn!("Export to {} failed: {}", target.path.display(), e);
                    ExportOutcome::Failed {
                        error: e.to_string(),
                    }
                }
            },
            None => ExportOutcome::skipped("export disabled"),
        };

        report.sink = match sink {
            Some(sink) => {
                notify(format!("Saving to {}", sink.describe()));
                match sink.upsert(&report.result).await {
                    Ok(rows) => SinkOutcome::Accepted { rows },
                    Err(e) => {
                        warn!("Persistence to {} failed: {}", sink.describe(), e);
                        SinkOutcome::Failed {
                            error: e.to_string(),
                        }
                    }
                }
            }
            None => SinkOutcome::skipped("no store configured"),
        };
    }

    report.enter(CrawlPhase::Cleanup);
    if let Err(e) = session.close().await {
        warn!("Failed to close browser session: {}", e);
        report.cleanup_error = Some(e.to_string());
    }

    report.enter(CrawlPhase::Done);
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message_from_str_and_string() {
        assert_eq!(panic_message(Box::new("boom")), "boom");
        assert_eq!(panic_message(Box::new("bang".to_string())), "bang");
        assert_eq!(panic_message(Box::new(7_u8)), "unknown panic");
    }

    #[test]
    fn test_start_url_override() {
        let mut options = CrawlOptions::new(SiteProfile::t2());
        assert_eq!(options.start_url(), SiteProfile::t2().start_url);

        options.start_url = Some("http://localhost:8080/stores".to_string());
        assert_eq!(options.start_url(), "http://localhost:8080/stores");
    }

    #[test]
    fn test_final_phase() {
        let mut report = CrawlReport::new();
        assert_eq!(report.final_phase(), CrawlPhase::Init);
        assert!(!report.succeeded());

        report.enter(CrawlPhase::Done);
        assert!(report.succeeded());
    }
}
