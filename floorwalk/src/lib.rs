pub mod commands;

pub mod handlers;

// Re-export commonly used handler functions for convenience
pub use handlers::{export_target, exit_code, expand_path, resolve_profile};

// Re-export crawl functionality from floorwalk-core
pub use floorwalk_core::crawl::{
    CrawlOptions, CrawlPhase, CrawlProgressCallback, CrawlReport, execute_crawl,
};

pub const CLAP_STYLING: clap::builder::styling::Styles = clap::builder::styling::Styles::styled()
    .header(clap_cargo::style::HEADER)
    .usage(clap_cargo::style::USAGE)
    .literal(clap_cargo::style::LITERAL)
    .placeholder(clap_cargo::style::PLACEHOLDER)
    .error(clap_cargo::style::ERROR)
    .valid(clap_cargo::style::VALID)
    .invalid(clap_cargo::style::INVALID);
