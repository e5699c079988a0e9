//! SQLite telemetry store implementation.

use chrono::{DateTime, NaiveDateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Result as SqlResult};
use std::path::Path;
use std::sync::{Arc, Mutex};
use thiserror::Error;

use super::models::*;

/// Database error types.
#[derive(Error, Debug)]
pub enum DbError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Migration error: {0}")]
    Migration(String),
}

/// Thread-safe telemetry store.
///
/// Holds one writer and one reader connection to the same WAL-mode
/// database so window queries are not serialized behind inserts.
#[derive(Clone)]
pub struct Store {
    writer: Arc<Mutex<Connection>>,
    reader: Arc<Mutex<Connection>>,
}

impl Store {
    /// Create a new store with the given database path.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, DbError> {
        let writer = open_conn(path.as_ref())?;
        let reader = open_conn(path.as_ref())?;
        let store = Self {
            writer: Arc::new(Mutex::new(writer)),
            reader: Arc::new(Mutex::new(reader)),
        };
        store.init()?;
        Ok(store)
    }

    /// Initialize the database with migrations.
    fn init(&self) -> Result<(), DbError> {
        let conn = self.writer.lock().unwrap();

        // Run migrations inline (embedded SQL)
        conn.execute_batch(include_str!("../../migrations/000001_init.up.sql"))
            .map_err(|e| DbError::Migration(format!("Migration 1 failed: {}", e)))?;

        // Try to run subsequent migrations, ignoring "already exists" errors
        let _ = conn.execute_batch(include_str!("../../migrations/000002_timestamp_index.up.sql"));

        Ok(())
    }

    /// Add a new reading and return its ID.
    ///
    /// The record is committed before this returns; later reads on any
    /// clone of the store observe it.
    pub fn add_reading(&self, reading: &NewReading, recorded_at: DateTime<Utc>) -> Result<i64, DbError> {
        let conn = self.writer.lock().unwrap();
        conn.execute(
            "INSERT INTO readings (timestamp, allpowers_battery, allpowers_watts, allpowers_voltage, \
             allpowers_240v_input, ecoflow_battery, ecoflow_watts, ecoflow_voltage, lifepo4_battery, \
             lifepo4_voltage, solar_watts, solar_voltage, system_load_watts, charger_status) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                recorded_at.format("%Y-%m-%d %H:%M:%S%.9f").to_string(),
                reading.allpowers_battery,
                reading.allpowers_watts,
                reading.allpowers_voltage,
                reading.allpowers_240v_input,
                reading.ecoflow_battery,
                reading.ecoflow_watts,
                reading.ecoflow_voltage,
                reading.lifepo4_battery,
                reading.lifepo4_voltage,
                reading.solar_watts,
                reading.solar_voltage,
                reading.system_load_watts,
                reading.charger_status.map(|s| s.as_str()),
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Get the most recent reading, or None when the store is empty.
    ///
    /// Timestamp ties are broken by the higher ID.
    pub fn latest_reading(&self) -> Result<Option<Reading>, DbError> {
        let conn = self.reader.lock().unwrap();
        let reading = conn
            .query_row(
                "SELECT id, timestamp, allpowers_battery, allpowers_watts, allpowers_voltage, \
                 allpowers_240v_input, ecoflow_battery, ecoflow_watts, ecoflow_voltage, lifepo4_battery, \
                 lifepo4_voltage, solar_watts, solar_voltage, system_load_watts, charger_status \
                 FROM readings ORDER BY timestamp DESC, id DESC LIMIT 1",
                [],
                read_row,
            )
            .optional()?;
        Ok(reading)
    }

    /// Get all readings recorded at or after the cutoff, newest first.
    pub fn readings_since(&self, cutoff: DateTime<Utc>) -> Result<Vec<Reading>, DbError> {
        let conn = self.reader.lock().unwrap();
        let mut stmt = conn.prepare(
            "SELECT id, timestamp, allpowers_battery, allpowers_watts, allpowers_voltage, \
             allpowers_240v_input, ecoflow_battery, ecoflow_watts, ecoflow_voltage, lifepo4_battery, \
             lifepo4_voltage, solar_watts, solar_voltage, system_load_watts, charger_status \
             FROM readings WHERE timestamp >= ?1 ORDER BY timestamp DESC, id DESC",
        )?;

        let readings = stmt
            .query_map(
                params![cutoff.format("%Y-%m-%d %H:%M:%S%.9f").to_string()],
                read_row,
            )?
            .collect::<SqlResult<Vec<_>>>()?;

        Ok(readings)
    }

    /// Compute aggregate statistics over readings at or after the cutoff.
    ///
    /// Uses the same inclusion predicate as [`Store::readings_since`], so
    /// `count` always matches the window's length.
    pub fn window_stats(&self, cutoff: DateTime<Utc>) -> Result<WindowStats, DbError> {
        let conn = self.reader.lock().unwrap();
        let stats = conn.query_row(
            "SELECT COUNT(*), \
             AVG(allpowers_battery), AVG(allpowers_watts), AVG(allpowers_voltage), \
             AVG(ecoflow_battery), AVG(ecoflow_watts), AVG(ecoflow_voltage), \
             AVG(lifepo4_battery), AVG(lifepo4_voltage), \
             AVG(solar_watts), AVG(solar_voltage), AVG(system_load_watts), \
             MAX(allpowers_watts), MAX(ecoflow_watts), MAX(solar_watts) \
             FROM readings WHERE timestamp >= ?1",
            params![cutoff.format("%Y-%m-%d %H:%M:%S%.9f").to_string()],
            |row| {
                Ok(WindowStats {
                    count: row.get(0)?,
                    avg_allpowers_battery: row.get(1)?,
                    avg_allpowers_watts: row.get(2)?,
                    avg_allpowers_voltage: row.get(3)?,
                    avg_ecoflow_battery: row.get(4)?,
                    avg_ecoflow_watts: row.get(5)?,
                    avg_ecoflow_voltage: row.get(6)?,
                    avg_lifepo4_battery: row.get(7)?,
                    avg_lifepo4_voltage: row.get(8)?,
                    avg_solar_watts: row.get(9)?,
                    avg_solar_voltage: row.get(10)?,
                    avg_system_load_watts: row.get(11)?,
                    max_allpowers_watts: row.get(12)?,
                    max_ecoflow_watts: row.get(13)?,
                    max_solar_watts: row.get(14)?,
                })
            },
        )?;
        Ok(stats)
    }

    /// Delete readings recorded before the cutoff, returning how many
    /// rows were removed. IDs of deleted rows are never reused.
    pub fn delete_readings_before(&self, cutoff: DateTime<Utc>) -> Result<usize, DbError> {
        let conn = self.writer.lock().unwrap();
        let removed = conn.execute(
            "DELETE FROM readings WHERE timestamp < ?1",
            params![cutoff.format("%Y-%m-%d %H:%M:%S%.9f").to_string()],
        )?;
        Ok(removed)
    }
}

/// Open a connection with WAL mode and a busy timeout applied.
fn open_conn(path: &Path) -> Result<Connection, DbError> {
    let conn = Connection::open(path)?;
    let _mode: String = conn.query_row("PRAGMA journal_mode = WAL", [], |r| r.get(0))?;
    let _timeout: i64 = conn.query_row("PRAGMA busy_timeout = 5000", [], |r| r.get(0))?;
    Ok(conn)
}

/// Map a full readings row.
fn read_row(row: &rusqlite::Row<'_>) -> SqlResult<Reading> {
    let time_str: String = row.get(1)?;
    let status: Option<String> = row.get(14)?;
    Ok(Reading {
        id: row.get(0)?,
        timestamp: parse_db_time(&time_str).unwrap_or_else(Utc::now),
        allpowers_battery: row.get(2)?,
        allpowers_watts: row.get(3)?,
        allpowers_voltage: row.get(4)?,
        allpowers_240v_input: row.get(5)?,
        ecoflow_battery: row.get(6)?,
        ecoflow_watts: row.get(7)?,
        ecoflow_voltage: row.get(8)?,
        lifepo4_battery: row.get(9)?,
        lifepo4_voltage: row.get(10)?,
        solar_watts: row.get(11)?,
        solar_voltage: row.get(12)?,
        system_load_watts: row.get(13)?,
        // Rows predating the closed status set read back as None.
        charger_status: status.and_then(|s| s.parse().ok()),
    })
}

/// Parse a datetime string from the database.
fn parse_db_time(s: &str) -> Option<DateTime<Utc>> {
    // Try various formats
    let formats = [
        "%Y-%m-%d %H:%M:%S%.9f",
        "%Y-%m-%d %H:%M:%S%.f",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%dT%H:%M:%S%.9fZ",
        "%Y-%m-%dT%H:%M:%SZ",
    ];

    for fmt in &formats {
        if let Ok(dt) = NaiveDateTime::parse_from_str(s, fmt) {
            return Some(DateTime::from_naive_utc_and_offset(dt, Utc));
        }
    }

    // Try ISO 8601
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    None
}
