use anyhow::{Context, Result};
use clap::ArgMatches;
use colored::Colorize;
use floorwalk_core::config::SiteProfile;
use floorwalk_core::crawl::{CrawlOptions, CrawlProgressCallback, CrawlReport, execute_crawl};
use floorwalk_core::data::{RunStatus, SqliteStore};
use floorwalk_core::export::{
    ExportFormat, ExportOutcome, ExportTarget, generate_menu_summary, generate_record_table,
};
use floorwalk_core::schema::SchemaMapping;
use floorwalk_core::sink::{PersistenceSink, SinkOutcome};
use floorwalk_core::supabase::{self, SupabaseConfig, SupabaseStore};
use floorwalk_scanner::chrome::{ChromeLauncher, ChromeOptions};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use url::Url;

const OWN_CRATES: [&str; 3] = ["floorwalk", "floorwalk_core", "floorwalk_scanner"];

/// Install the fmt subscriber. `RUST_LOG` wins over the flags.
pub fn init_tracing(quiet: bool, verbose: bool) {
    let level = if verbose {
        "debug"
    } else if quiet {
        "warn"
    } else {
        "info"
    };
    let directives = OWN_CRATES
        .iter()
        .fold("warn".to_string(), |acc, name| format!("{},{}={}", acc, name, level));
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(directives));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Expand a leading `~` to the home directory.
pub fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).into_owned())
}

pub fn resolve_profile(spec: &str) -> Result<SiteProfile> {
    let expanded = shellexpand::tilde(spec);
    SiteProfile::resolve(expanded.as_ref()).with_context(|| format!("could not load profile '{}'", spec))
}

/// Where to export, or `None` when exporting is disabled. An explicit format
/// wins over the file extension.
pub fn export_target(
    profile: &SiteProfile,
    output: Option<&str>,
    format: Option<&str>,
    no_export: bool,
) -> Option<ExportTarget> {
    if no_export {
        return None;
    }
    let path = expand_path(output.unwrap_or(&profile.export_file));
    let format = format
        .and_then(ExportFormat::from_str)
        .unwrap_or_else(|| ExportFormat::from_path(&path));
    Some(ExportTarget::new(path, format))
}

pub fn exit_code(report: &CrawlReport) -> i32 {
    if report.succeeded() { 0 } else { 1 }
}

/// Store selection for one run.
#[derive(Default)]
pub struct SinkSetup {
    pub sink: Option<PersistenceSink>,
    /// The SQLite store, when it doubles as run log
    pub run_log: Option<Arc<SqliteStore>>,
    /// Why a configured store could not be set up
    pub error: Option<String>,
}

/// A Supabase sink from `config`. A malformed configuration does not stop
/// the crawl; it is carried along and reported as the store outcome.
pub fn supabase_sink(config: Option<SupabaseConfig>, mapping: &SchemaMapping) -> SinkSetup {
    let Some(config) = config else {
        warn!(
            "{} / {} not set; results will not be persisted",
            supabase::URL_VAR,
            supabase::KEY_VAR
        );
        return SinkSetup::default();
    };

    match SupabaseStore::new(&config) {
        Ok(store) => SinkSetup {
            sink: Some(PersistenceSink::new(store, mapping.clone())),
            ..SinkSetup::default()
        },
        Err(e) => {
            warn!("Invalid Supabase configuration, results will not be persisted: {}", e);
            SinkSetup {
                error: Some(e.to_string()),
                ..SinkSetup::default()
            }
        }
    }
}

fn open_sink(mapping: &SchemaMapping, sqlite: Option<&str>) -> Result<SinkSetup> {
    let Some(path) = sqlite else {
        return Ok(supabase_sink(SupabaseConfig::from_env(), mapping));
    };

    let path = expand_path(path);
    if !SqliteStore::exists(&path) {
        info!("Creating database at {}", path.display());
    }
    let store = Arc::new(
        SqliteStore::open(&path)
            .with_context(|| format!("could not open database {}", path.display()))?,
    );
    Ok(SinkSetup {
        sink: Some(PersistenceSink::new(store.clone(), mapping.clone())),
        run_log: Some(store),
        error: None,
    })
}

/// Report a store that could not be set up as a failed persistence step,
/// unless there was nothing to persist.
pub fn apply_store_error(report: &mut CrawlReport, error: Option<&str>) {
    if let Some(error) = error
        && !report.result.is_empty()
    {
        report.sink = SinkOutcome::Failed {
            error: error.to_string(),
        };
    }
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn spinner(hidden: bool) -> ProgressBar {
    if hidden {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg}") {
        pb.set_style(style);
    }
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

pub async fn handle_crawl(sub_matches: &ArgMatches) -> Result<i32> {
    let profile_spec = sub_matches
        .get_one::<String>("profile")
        .map(String::as_str)
        .unwrap_or("t1");
    let profile = resolve_profile(profile_spec)?;
    let start_url = sub_matches.get_one::<Url>("url").map(Url::to_string);
    let export = export_target(
        &profile,
        sub_matches.get_one::<String>("output").map(String::as_str),
        sub_matches.get_one::<String>("format").map(String::as_str),
        sub_matches.get_flag("no-export"),
    );
    let headed = sub_matches.get_flag("headed");
    let summary_rows = sub_matches.get_one::<usize>("rows").copied();
    let quiet = sub_matches.get_flag("quiet");
    let SinkSetup {
        sink,
        run_log,
        error: store_error,
    } = open_sink(
        &profile.schema,
        sub_matches.get_one::<String>("sqlite").map(String::as_str),
    )?;

    let mut options = CrawlOptions::new(profile);
    options.start_url = start_url;
    options.export = export;
    let url = options.start_url().to_string();
    let mapping = options.profile.schema.clone();

    if !quiet {
        print_divider();
        println!("{}", "  FLOORWALK CRAWL".bright_white().bold());
        print_divider();
        println!("{} Profile: {}", "→".blue(), options.profile.name.bright_white());
        println!("{} Start:   {}", "→".blue(), url.bright_white());
        match options.export {
            Some(ref target) => println!(
                "{} Export:  {} ({})",
                "→".blue(),
                target.path.display().to_string().bright_white(),
                target.format.extension()
            ),
            None => println!("{} Export:  {}", "→".blue(), "disabled".dimmed()),
        }
        match sink {
            Some(ref sink) => println!("{} Store:   {}", "→".blue(), sink.describe().bright_white()),
            None => match store_error {
                Some(ref e) => println!("{} Store:   {}", "→".blue(), e.red()),
                None => println!("{} Store:   {}", "→".blue(), "not configured".dimmed()),
            },
        }
        println!();
    }

    let run_id = run_log.as_ref().and_then(|log| {
        log.start_run(&options.profile.name, &url)
            .map_err(|e| warn!("Could not record run start: {}", e))
            .ok()
    });

    let pb = spinner(quiet);
    pb.set_message("Launching browser...");
    let pb_clone = pb.clone();
    let progress_callback: CrawlProgressCallback = Arc::new(move |message: String| {
        pb_clone.set_message(message);
    });

    let launcher = ChromeLauncher::new(ChromeOptions {
        headless: !headed,
        ..ChromeOptions::default()
    });
    let mut report =
        execute_crawl(options, &launcher, sink.as_ref(), Some(progress_callback)).await;
    pb.finish_and_clear();
    apply_store_error(&mut report, store_error.as_deref());

    if let (Some(log), Some(id)) = (&run_log, &run_id) {
        let status = if report.succeeded() {
            RunStatus::Done
        } else {
            RunStatus::Failed
        };
        if let Err(e) = log.finish_run(id, status, report.result.len()) {
            warn!("Could not record run end: {}", e);
        }
    }

    print_crawl_report(&report, &mapping, summary_rows, quiet);
    Ok(exit_code(&report))
}

pub fn print_crawl_report(
    report: &CrawlReport,
    mapping: &SchemaMapping,
    summary_rows: Option<usize>,
    quiet: bool,
) {
    if let Some(ref e) = report.session_error {
        eprintln!("{} Crawl failed: {}", "✗".red().bold(), e);
        return;
    }

    if !quiet {
        print!("{}", generate_menu_summary(&report.menus));
        if !report.result.is_empty() {
            print!("{}", generate_record_table(&report.result, mapping, summary_rows));
            println!();
        }
    }

    println!(
        "{} Collected {} record(s), {} unique",
        "✓".green().bold(),
        report.collected,
        report.result.len().to_string().cyan()
    );
    if let Some(ref e) = report.walk_error {
        println!("{} Walk ended early: {}", "⚠".yellow().bold(), e);
    }

    match report.export {
        ExportOutcome::Written { ref path, rows } => println!(
            "{} Exported {} row(s) to {}",
            "✓".green().bold(),
            rows,
            path.display().to_string().bright_white()
        ),
        ExportOutcome::Skipped { ref reason } => {
            println!("{} Export skipped: {}", "-".dimmed(), reason)
        }
        ExportOutcome::Failed { ref error } => {
            println!("{} Export failed: {}", "✗".red().bold(), error)
        }
    }

    match report.sink {
        SinkOutcome::Accepted { rows } => println!(
            "{} Store accepted {} row(s) into '{}'",
            "✓".green().bold(),
            rows,
            mapping.table
        ),
        SinkOutcome::Skipped { ref reason } => {
            println!("{} Store skipped: {}", "-".dimmed(), reason)
        }
        SinkOutcome::Failed { ref error } => {
            println!("{} Store failed: {}", "✗".red().bold(), error)
        }
    }

    if let Some(ref e) = report.cleanup_error {
        println!("{} Browser did not close cleanly: {}", "⚠".yellow().bold(), e);
    }
}

pub fn handle_profile_show(args: &ArgMatches) -> Result<()> {
    let spec = args
        .get_one::<String>("profile")
        .map(String::as_str)
        .unwrap_or("t1");
    let profile = resolve_profile(spec)?;
    print!("{}", profile.to_toml()?);
    Ok(())
}

pub fn handle_profile_list() {
    for name in SiteProfile::PRESETS {
        if let Some(profile) = SiteProfile::preset(name) {
            println!(
                "{}  table {:<8} {}",
                name.bright_white().bold(),
                profile.schema.table,
                profile.start_url.dimmed()
            );
        }
    }
}
