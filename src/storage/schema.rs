//! Database schema definitions
//!
//! This module contains all SQL schema definitions for the Division-Crawler database.

/// SQL schema for the database
pub const SCHEMA_SQL: &str = r#"
-- Track crawl runs
CREATE TABLE IF NOT EXISTS crawl_runs (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    started_at TEXT NOT NULL,
    finished_at TEXT,
    config_hash TEXT NOT NULL,
    status TEXT NOT NULL
);

-- One row per village, keyed by the 12-digit village code
CREATE TABLE IF NOT EXISTS all_division (
    division_id TEXT PRIMARY KEY CHECK (length(division_id) = 12),
    province_name TEXT NOT NULL,
    province_code TEXT NOT NULL,
    city_name TEXT NOT NULL,
    city_code TEXT NOT NULL,
    county_name TEXT NOT NULL,
    county_code TEXT NOT NULL,
    town_name TEXT NOT NULL,
    town_code TEXT NOT NULL,
    village_name TEXT NOT NULL,
    village_code TEXT NOT NULL,
    address_name TEXT NOT NULL,
    region_type TEXT NOT NULL,
    active INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS idx_all_division_province ON all_division(province_code);

-- Outcome of every province task of a run
CREATE TABLE IF NOT EXISTS province_results (
    run_id INTEGER NOT NULL REFERENCES crawl_runs(id),
    province_code TEXT NOT NULL,
    province_name TEXT NOT NULL,
    status TEXT NOT NULL,
    villages INTEGER NOT NULL DEFAULT 0,
    truncations INTEGER NOT NULL DEFAULT 0,
    error_message TEXT,
    finished_at TEXT NOT NULL,
    PRIMARY KEY (run_id, province_code)
);
"#;

/// Initializes the database schema
///
/// Every statement is `IF NOT EXISTS`, so this is safe on an existing database.
pub fn initialize_schema(conn: &rusqlite::Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(SCHEMA_SQL)?;
    Ok(())
}
