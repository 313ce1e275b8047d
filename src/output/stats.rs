//! Statistics generation from the division database
//!
//! This module provides functionality for extracting and displaying
//! stored division counts and the outcome of the latest run.

use crate::storage::{ProvinceCount, ProvinceResultRecord, RunRecord, Storage, StorageResult};

/// Division database statistics
#[derive(Debug, Clone)]
pub struct CrawlStatistics {
    /// Total number of stored village rows
    pub total_villages: u64,

    /// Stored and active rows per province
    pub by_province: Vec<ProvinceCount>,

    /// Most recent crawl run, if any
    pub latest_run: Option<RunRecord>,

    /// Province outcomes of the latest run
    pub latest_results: Vec<ProvinceResultRecord>,
}

impl CrawlStatistics {
    /// Rows still listed by the source as of the last complete walk
    pub fn active_villages(&self) -> u64 {
        self.by_province.iter().map(|p| p.active).sum()
    }
}

/// Loads statistics from storage
///
/// # Arguments
///
/// * `storage` - The storage backend to query
///
/// # Returns
///
/// * `Ok(CrawlStatistics)` - Successfully loaded statistics
/// * `Err(StorageError)` - Failed to query statistics
pub fn load_statistics(storage: &dyn Storage) -> StorageResult<CrawlStatistics> {
    let total_villages = storage.count_divisions()?;
    let by_province = storage.count_by_province()?;
    let latest_run = storage.get_latest_run()?;

    let latest_results = match &latest_run {
        Some(run) => storage.get_province_results(run.id)?,
        None => Vec::new(),
    };

    Ok(CrawlStatistics {
        total_villages,
        by_province,
        latest_run,
        latest_results,
    })
}

/// Prints statistics to stdout in a formatted manner
///
/// # Arguments
///
/// * `stats` - The statistics to display
pub fn print_statistics(stats: &CrawlStatistics) {
    println!("=== Division Statistics ===\n");

    println!("Overview:");
    println!("  Stored villages: {}", stats.total_villages);
    println!("  Active villages: {}", stats.active_villages());
    println!("  Provinces: {}", stats.by_province.len());
    println!();

    if !stats.by_province.is_empty() {
        println!("Villages by Province:");
        for count in &stats.by_province {
            let inactive = count.villages - count.active;
            if inactive > 0 {
                println!(
                    "  {} {}: {} ({} inactive)",
                    count.province_code, count.province_name, count.villages, inactive
                );
            } else {
                println!(
                    "  {} {}: {}",
                    count.province_code, count.province_name, count.villages
                );
            }
        }
        println!();
    }

    match &stats.latest_run {
        Some(run) => {
            println!("Latest Run:");
            println!("  ID: {}", run.id);
            println!("  Started: {}", run.started_at);
            if let Some(finished) = &run.finished_at {
                println!("  Finished: {}", finished);
            }
            println!("  Status: {}", run.status.to_db_string());

            for result in &stats.latest_results {
                let detail = match &result.error_message {
                    Some(error) => format!(": {}", error),
                    None if result.truncations > 0 => {
                        format!(" ({} truncated branches)", result.truncations)
                    }
                    None => String::new(),
                };
                println!(
                    "  {} {}: {}{}",
                    result.province_code,
                    result.province_name,
                    result.status.to_db_string(),
                    detail
                );
            }
        }
        None => println!("No crawl runs recorded"),
    }
}
