//! Output module for crawl reports
//!
//! This module handles:
//! - Per-province outcomes and the end-of-run summary
//! - Statistics read back from the division database

pub mod stats;
mod summary;

pub use stats::{load_statistics, print_statistics, CrawlStatistics};
pub use summary::{
    format_run_summary, print_run_summary, ProvinceOutcome, ProvinceReport, RunSummary,
};
