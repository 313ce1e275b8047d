//! Storage traits and error types
//!
//! This module defines the trait interface for storage backends and
//! associated error types.

use crate::storage::{
    DivisionRow, ProvinceCount, ProvinceResultRecord, RunRecord, RunStatus,
};
use thiserror::Error;

/// Errors that can occur during storage operations
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Run not found: {0}")]
    RunNotFound(i64),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Trait for storage backend implementations
///
/// One instance wraps one connection; province tasks each open their own.
pub trait Storage {
    // ===== Run Management =====

    /// Creates a new crawl run
    ///
    /// # Arguments
    ///
    /// * `config_hash` - Hash of the configuration file
    ///
    /// # Returns
    ///
    /// The ID of the newly created run
    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64>;

    /// Gets a run by ID
    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord>;

    /// Gets the most recent run
    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>>;

    /// Marks a run as finished with the given status
    fn complete_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()>;

    // ===== Divisions =====

    /// Writes all village rows of one province in a single transaction
    ///
    /// Rows are upserted by village code. When `deactivate_missing` is set,
    /// rows of the province that are not part of `rows` are marked inactive in
    /// the same transaction. Either every change commits or none does.
    ///
    /// # Returns
    ///
    /// The number of rows written
    fn persist_province(
        &mut self,
        province_code: &str,
        rows: &[DivisionRow],
        deactivate_missing: bool,
    ) -> StorageResult<usize>;

    /// Loads the stored rows of a province ordered by village code
    fn load_divisions(&self, province_code: &str) -> StorageResult<Vec<DivisionRow>>;

    /// Counts all stored village rows
    fn count_divisions(&self) -> StorageResult<u64>;

    /// Counts stored and active villages per province
    fn count_by_province(&self) -> StorageResult<Vec<ProvinceCount>>;

    // ===== Province Results =====

    /// Records the outcome of one province task
    fn record_province_result(
        &mut self,
        run_id: i64,
        result: &ProvinceResultRecord,
    ) -> StorageResult<()>;

    /// Gets the province outcomes of a run ordered by province code
    fn get_province_results(&self, run_id: i64) -> StorageResult<Vec<ProvinceResultRecord>>;
}
