//! Crawler module for walking the division tables
//!
//! This module contains the core crawling logic, including:
//! - HTTP fetching with retry logic
//! - Parsing of the five kinds of division table rows
//! - The per-province descent from cities to villages
//! - A bounded worker pool running one task per province
//! - Overall run orchestration

mod fetcher;
mod orchestrator;
mod parser;
mod pool;
mod walker;

pub use fetcher::{build_http_client, FetchErrorKind, FetchFailure, Page, PageFetcher, RetryPolicy};
pub use orchestrator::{run_crawl, Orchestrator};
pub use parser::{parse_provinces, parse_table, truncate_code, ParsedTable, ProvinceLink, TableRow};
pub use pool::{PoolError, WorkerPool};
pub use walker::{HierarchyWalker, Truncation, TruncationReason, WalkOutcome, MUNICIPAL_DISTRICT};
