//! SQLite storage implementation
//!
//! This module provides a SQLite-based implementation of the Storage trait.

use crate::storage::rows::DivisionRow;
use crate::storage::schema::initialize_schema;
use crate::storage::traits::{Storage, StorageError, StorageResult};
use crate::storage::{ProvinceCount, ProvinceResultRecord, ProvinceStatus, RunRecord, RunStatus};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use std::path::Path;
use std::time::Duration;

const UPSERT_DIVISION_SQL: &str = "
    INSERT INTO all_division (division_id, province_name, province_code, city_name, city_code,
        county_name, county_code, town_name, town_code, village_name, village_code,
        address_name, region_type, active)
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
    ON CONFLICT(division_id) DO UPDATE SET
        province_name = excluded.province_name,
        province_code = excluded.province_code,
        city_name = excluded.city_name,
        city_code = excluded.city_code,
        county_name = excluded.county_name,
        county_code = excluded.county_code,
        town_name = excluded.town_name,
        town_code = excluded.town_code,
        village_name = excluded.village_name,
        village_code = excluded.village_code,
        address_name = excluded.address_name,
        region_type = excluded.region_type,
        active = excluded.active";

/// Province tasks write concurrently; each waits this long for the write lock
const BUSY_TIMEOUT: Duration = Duration::from_secs(30);

/// SQLite storage backend
pub struct SqliteStorage {
    conn: Connection,
}

impl SqliteStorage {
    /// Opens or creates the database and initializes the schema
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the SQLite database file
    pub fn new(path: &Path) -> StorageResult<Self> {
        let conn = Connection::open(path)?;
        conn.busy_timeout(BUSY_TIMEOUT)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA foreign_keys = ON;
        ",
        )?;

        initialize_schema(&conn)?;

        Ok(Self { conn })
    }

    /// Creates an in-memory database (for testing)
    #[cfg(test)]
    pub fn new_in_memory() -> StorageResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        initialize_schema(&conn)?;
        Ok(Self { conn })
    }
}

fn run_from_row(row: &Row) -> rusqlite::Result<RunRecord> {
    Ok(RunRecord {
        id: row.get(0)?,
        started_at: row.get(1)?,
        finished_at: row.get(2)?,
        config_hash: row.get(3)?,
        status: RunStatus::from_db_string(&row.get::<_, String>(4)?).unwrap_or(RunStatus::Failed),
    })
}

fn division_from_row(row: &Row) -> rusqlite::Result<DivisionRow> {
    Ok(DivisionRow {
        division_id: row.get(0)?,
        province_name: row.get(1)?,
        province_code: row.get(2)?,
        city_name: row.get(3)?,
        city_code: row.get(4)?,
        county_name: row.get(5)?,
        county_code: row.get(6)?,
        town_name: row.get(7)?,
        town_code: row.get(8)?,
        village_name: row.get(9)?,
        village_code: row.get(10)?,
        address_name: row.get(11)?,
        region_type: row.get(12)?,
        active: row.get(13)?,
    })
}

impl Storage for SqliteStorage {
    // ===== Run Management =====

    fn create_run(&mut self, config_hash: &str) -> StorageResult<i64> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT INTO crawl_runs (started_at, config_hash, status) VALUES (?1, ?2, ?3)",
            params![now, config_hash, RunStatus::Running.to_db_string()],
        )?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_run(&self, run_id: i64) -> StorageResult<RunRecord> {
        self.conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status FROM crawl_runs WHERE id = ?1",
                params![run_id],
                run_from_row,
            )
            .optional()?
            .ok_or(StorageError::RunNotFound(run_id))
    }

    fn get_latest_run(&self) -> StorageResult<Option<RunRecord>> {
        let run = self
            .conn
            .query_row(
                "SELECT id, started_at, finished_at, config_hash, status
                 FROM crawl_runs ORDER BY id DESC LIMIT 1",
                [],
                run_from_row,
            )
            .optional()?;

        Ok(run)
    }

    fn complete_run(&mut self, run_id: i64, status: RunStatus) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        let updated = self.conn.execute(
            "UPDATE crawl_runs SET status = ?1, finished_at = ?2 WHERE id = ?3",
            params![status.to_db_string(), now, run_id],
        )?;

        if updated == 0 {
            return Err(StorageError::RunNotFound(run_id));
        }
        Ok(())
    }

    // ===== Divisions =====

    fn persist_province(
        &mut self,
        province_code: &str,
        rows: &[DivisionRow],
        deactivate_missing: bool,
    ) -> StorageResult<usize> {
        // Take the write lock up front; a deferred upgrade could fail mid-batch
        let tx = self
            .conn
            .transaction_with_behavior(TransactionBehavior::Immediate)?;

        if deactivate_missing {
            tx.execute(
                "UPDATE all_division SET active = 0 WHERE province_code = ?1",
                params![province_code],
            )?;
        }

        {
            let mut stmt = tx.prepare(UPSERT_DIVISION_SQL)?;
            for row in rows {
                stmt.execute(params![
                    row.division_id,
                    row.province_name,
                    row.province_code,
                    row.city_name,
                    row.city_code,
                    row.county_name,
                    row.county_code,
                    row.town_name,
                    row.town_code,
                    row.village_name,
                    row.village_code,
                    row.address_name,
                    row.region_type,
                    row.active,
                ])?;
            }
        }

        // Dropping an uncommitted transaction rolls it back
        tx.commit()?;
        Ok(rows.len())
    }

    fn load_divisions(&self, province_code: &str) -> StorageResult<Vec<DivisionRow>> {
        let mut stmt = self.conn.prepare(
            "SELECT division_id, province_name, province_code, city_name, city_code,
             county_name, county_code, town_name, town_code, village_name, village_code,
             address_name, region_type, active
             FROM all_division WHERE province_code = ?1 ORDER BY division_id",
        )?;

        let rows = stmt
            .query_map(params![province_code], division_from_row)?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(rows)
    }

    fn count_divisions(&self) -> StorageResult<u64> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM all_division", [], |row| row.get(0))?;
        Ok(count as u64)
    }

    fn count_by_province(&self) -> StorageResult<Vec<ProvinceCount>> {
        let mut stmt = self.conn.prepare(
            "SELECT province_code, MAX(province_name), COUNT(*), SUM(active)
             FROM all_division GROUP BY province_code ORDER BY province_code",
        )?;

        let counts = stmt
            .query_map([], |row| {
                Ok(ProvinceCount {
                    province_code: row.get(0)?,
                    province_name: row.get(1)?,
                    villages: row.get::<_, i64>(2)? as u64,
                    active: row.get::<_, i64>(3)? as u64,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(counts)
    }

    // ===== Province Results =====

    fn record_province_result(
        &mut self,
        run_id: i64,
        result: &ProvinceResultRecord,
    ) -> StorageResult<()> {
        let now = Utc::now().to_rfc3339();
        self.conn.execute(
            "INSERT OR REPLACE INTO province_results
             (run_id, province_code, province_name, status, villages, truncations, error_message, finished_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
            params![
                run_id,
                result.province_code,
                result.province_name,
                result.status.to_db_string(),
                result.villages as i64,
                result.truncations as i64,
                result.error_message,
                now,
            ],
        )?;
        Ok(())
    }

    fn get_province_results(&self, run_id: i64) -> StorageResult<Vec<ProvinceResultRecord>> {
        let mut stmt = self.conn.prepare(
            "SELECT province_code, province_name, status, villages, truncations, error_message
             FROM province_results WHERE run_id = ?1 ORDER BY province_code",
        )?;

        let results = stmt
            .query_map(params![run_id], |row| {
                Ok(ProvinceResultRecord {
                    province_code: row.get(0)?,
                    province_name: row.get(1)?,
                    status: ProvinceStatus::from_db_string(&row.get::<_, String>(2)?)
                        .unwrap_or(ProvinceStatus::Failed),
                    villages: row.get::<_, i64>(3)? as u64,
                    truncations: row.get::<_, i64>(4)? as u64,
                    error_message: row.get(5)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;

        Ok(results)
    }
}
