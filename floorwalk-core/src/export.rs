// File export and console summaries of a crawl result

use crate::aggregate::CrawlResult;
use crate::schema::SchemaMapping;
use colored::Colorize;
use floorwalk_scanner::{MenuReport, MenuStatus};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";
const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ExportFormat {
    Csv,
    Json,
}

impl ExportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "csv" => Some(ExportFormat::Csv),
            "json" => Some(ExportFormat::Json),
            _ => None,
        }
    }

    /// Guess from a file extension, falling back to CSV.
    pub fn from_path(path: &Path) -> Self {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_str)
            .unwrap_or(ExportFormat::Csv)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ExportFormat::Csv => "csv",
            ExportFormat::Json => "json",
        }
    }
}

/// Where the finalized result is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportTarget {
    pub path: PathBuf,
    pub format: ExportFormat,
}

impl ExportTarget {
    pub fn new(path: impl Into<PathBuf>, format: ExportFormat) -> Self {
        Self {
            path: path.into(),
            format,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExportOutcome {
    Skipped { reason: String },
    Written { path: PathBuf, rows: usize },
    Failed { error: String },
}

impl ExportOutcome {
    pub fn skipped(reason: impl Into<String>) -> Self {
        ExportOutcome::Skipped {
            reason: reason.into(),
        }
    }
}

/// CSV with the mapping's column names as header. Prefixed with a BOM so
/// spreadsheet apps read the Korean headers correctly.
pub fn write_csv<W: Write>(
    writer: W,
    result: &CrawlResult,
    mapping: &SchemaMapping,
) -> Result<usize, ExportError> {
    let mut writer = writer;
    writer.write_all(UTF8_BOM)?;

    let mut csv_writer = csv::Writer::from_writer(writer);
    csv_writer.write_record(mapping.columns())?;
    for record in result.records() {
        csv_writer.write_record(mapping.values(record))?;
    }
    csv_writer.flush()?;
    Ok(result.len())
}

/// JSON array of objects keyed by the mapping's column names.
pub fn write_json<W: Write>(
    writer: W,
    result: &CrawlResult,
    mapping: &SchemaMapping,
) -> Result<usize, ExportError> {
    let rows: Vec<BTreeMap<&str, &str>> = result
        .records()
        .iter()
        .map(|record| {
            mapping
                .columns()
                .into_iter()
                .zip(mapping.values(record))
                .collect()
        })
        .collect();
    serde_json::to_writer_pretty(writer, &rows)?;
    Ok(rows.len())
}

pub fn export_result(
    result: &CrawlResult,
    mapping: &SchemaMapping,
    target: &ExportTarget,
) -> Result<usize, ExportError> {
    let mut file = BufWriter::new(File::create(&target.path)?);
    let rows = match target.format {
        ExportFormat::Csv => write_csv(&mut file, result, mapping)?,
        ExportFormat::Json => write_json(&mut file, result, mapping)?,
    };
    file.flush()?;
    Ok(rows)
}

fn status_label(status: &MenuStatus) -> String {
    match status {
        MenuStatus::Completed => "ok".green().to_string(),
        MenuStatus::NoData => "empty".yellow().to_string(),
        MenuStatus::PaginationAborted { at_page, .. } => {
            format!("stopped at page {}", at_page).yellow().to_string()
        }
        MenuStatus::Skipped { .. } => "skipped".red().to_string(),
    }
}

/// Per-menu outcome of a walk.
pub fn generate_menu_summary(menus: &[MenuReport]) -> String {
    let mut report = String::new();
    report.push_str(RULE);
    report.push('\n');
    report.push_str("MENUS\n");
    report.push_str(RULE);
    report.push_str("\n\n");

    for menu in menus {
        report.push_str(&format!(
            "  {:<20} {:>3}/{:<3} pages {:>5} brands  {}\n",
            menu.entry.label,
            menu.pages_visited,
            menu.total_pages,
            menu.records_collected,
            status_label(&menu.status)
        ));
        match &menu.status {
            MenuStatus::PaginationAborted { reason, .. } | MenuStatus::Skipped { reason } => {
                report.push_str(&format!("  {:<20} {}\n", "", reason.dimmed()));
            }
            _ => {}
        }
    }
    report.push('\n');
    report
}

/// The first `limit` finalized records as an aligned, indexed table.
/// The finalized table as aligned text. `limit` caps the rows shown; `None`
/// prints every row.
pub fn generate_record_table(
    result: &CrawlResult,
    mapping: &SchemaMapping,
    limit: Option<usize>,
) -> String {
    let columns = mapping.columns();
    let shown: Vec<_> = result.rows().take(limit.unwrap_or(usize::MAX)).collect();

    let index_width = shown.len().saturating_sub(1).to_string().len();
    let mut widths = columns.map(|c| c.chars().count());
    for (_, record) in &shown {
        for (width, value) in widths.iter_mut().zip(mapping.values(record)) {
            *width = (*width).max(value.chars().count());
        }
    }

    let format_line = |index: &str, cells: [&str; 4]| -> String {
        let mut line = format!("  {:>width$}", index, width = index_width);
        for (cell, width) in cells.iter().zip(widths) {
            let pad = width.saturating_sub(cell.chars().count());
            line.push_str("  ");
            line.push_str(cell);
            line.push_str(&" ".repeat(pad));
        }
        line.trim_end().to_string()
    };

    let mut table = String::new();
    table.push_str(&format_line("", columns).bold().to_string());
    table.push('\n');
    for (index, record) in &shown {
        table.push_str(&format_line(&index.to_string(), mapping.values(record)));
        table.push('\n');
    }
    if result.len() > shown.len() {
        table.push_str(&format!("  ... {} more\n", result.len() - shown.len()));
    }
    table
}
