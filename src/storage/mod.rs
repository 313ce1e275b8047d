//! Storage module for persisting crawl data
//!
//! This module handles all database operations for the crawler, including:
//! - SQLite database initialization and schema management
//! - Flattening walked provinces into village rows
//! - Transactional per-province writes
//! - Run and per-province outcome tracking

mod rows;
mod schema;
mod sqlite;
mod traits;

pub use rows::{flatten_province, DivisionRow};
pub use sqlite::SqliteStorage;
pub use traits::{Storage, StorageError, StorageResult};

use crate::division::DivisionNode;
use std::path::Path;

/// Flattens a walked province and writes its rows in one transaction
///
/// A fresh connection is opened for every call so that concurrent province
/// tasks never share one. Pass `complete = false` for a province with
/// truncated branches: its rows are still written, but villages missing from
/// this walk are left untouched instead of being deactivated.
///
/// # Returns
///
/// * `Ok(usize)` - Number of village rows written
/// * `Err(StorageError)` - The transaction was rolled back
pub fn persist_province(path: &Path, province: &DivisionNode, complete: bool) -> StorageResult<usize> {
    let rows = flatten_province(province);
    let mut storage = SqliteStorage::new(path)?;
    // A walk that found no villages never retires stored ones
    let deactivate_missing = complete && !rows.is_empty();
    storage.persist_province(&province.code, &rows, deactivate_missing)
}

/// Represents a crawl run
#[derive(Debug, Clone)]
pub struct RunRecord {
    pub id: i64,
    pub started_at: String,
    pub finished_at: Option<String>,
    pub config_hash: String,
    pub status: RunStatus,
}

/// Status of a crawl run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunStatus {
    Running,
    /// Every province persisted without truncation
    Completed,
    /// Finished, but some provinces are partial, failed or rejected
    CompletedWithErrors,
    Failed,
}

impl RunStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Completed => "completed",
            Self::CompletedWithErrors => "completed_with_errors",
            Self::Failed => "failed",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "running" => Some(Self::Running),
            "completed" => Some(Self::Completed),
            "completed_with_errors" => Some(Self::CompletedWithErrors),
            "failed" => Some(Self::Failed),
            _ => None,
        }
    }
}

/// Stored outcome of one province task
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvinceResultRecord {
    pub province_code: String,
    pub province_name: String,
    pub status: ProvinceStatus,
    pub villages: u64,
    pub truncations: u64,
    pub error_message: Option<String>,
}

/// Status of one province task
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProvinceStatus {
    Complete,
    /// Persisted, but some branches were truncated
    Partial,
    Failed,
    /// Never admitted to the worker pool
    Rejected,
}

impl ProvinceStatus {
    pub fn to_db_string(&self) -> &'static str {
        match self {
            Self::Complete => "complete",
            Self::Partial => "partial",
            Self::Failed => "failed",
            Self::Rejected => "rejected",
        }
    }

    pub fn from_db_string(s: &str) -> Option<Self> {
        match s {
            "complete" => Some(Self::Complete),
            "partial" => Some(Self::Partial),
            "failed" => Some(Self::Failed),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

/// Stored and active village counts of one province
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProvinceCount {
    pub province_code: String,
    pub province_name: String,
    pub villages: u64,
    pub active: u64,
}
