//! SQLite-backed [`AnalysisStore`].

use std::path::Path;

use chrono::{NaiveDate, NaiveTime};
use rusqlite::{params, Connection, OptionalExtension};

use super::{AnalysisStore, CorrelationRow, SpectralRow, SpectrumSample, StoreError};
use crate::analysis::correlation::CorrelationMethod;
use crate::table::{Channel, Measurement, MeasurementTable};

const DATE_FORMAT: &str = "%Y-%m-%d";
const TIME_FORMAT: &str = "%H:%M:%S";

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS measurements (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        date TEXT NOT NULL,
        time TEXT NOT NULL,
        co_gt REAL,
        no2_gt REAL,
        temperature REAL,
        humidity REAL
    );
    CREATE TABLE IF NOT EXISTS correlation_results (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        variable1 TEXT NOT NULL,
        variable2 TEXT NOT NULL,
        coefficient REAL NOT NULL,
        method TEXT NOT NULL,
        calculated_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    );
    CREATE INDEX IF NOT EXISTS idx_correlation_method ON correlation_results(method);
    CREATE TABLE IF NOT EXISTS spectral_results (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        variable_name TEXT NOT NULL,
        dominant_frequency REAL,
        spectrum_sample TEXT NOT NULL,
        analyzed_at TIMESTAMP DEFAULT CURRENT_TIMESTAMP
    );
";

/// Store over a single SQLite connection
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    /// Open (or create) the database file and its tables
    pub fn open(db_path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let store = Self::init(Connection::open(db_path)?)?;
        tracing::info!("Opened result store at {}", db_path.display());
        Ok(store)
    }

    /// Private in-memory database
    pub fn open_in_memory() -> Result<Self, StoreError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, StoreError> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}

fn insert_row(conn: &Connection, row: &Measurement) -> Result<i64, StoreError> {
    conn.execute(
        "INSERT INTO measurements (id, date, time, co_gt, no2_gt, temperature, humidity)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            row.id,
            row.date.format(DATE_FORMAT).to_string(),
            row.time.format(TIME_FORMAT).to_string(),
            row.get(Channel::CarbonMonoxide),
            row.get(Channel::NitrogenDioxide),
            row.get(Channel::Temperature),
            row.get(Channel::Humidity),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

type RawMeasurement = (i64, String, String, [Option<f64>; 4]);

fn parse_measurement((id, date, time, values): RawMeasurement) -> Result<Measurement, StoreError> {
    let date = NaiveDate::parse_from_str(&date, DATE_FORMAT)
        .map_err(|e| StoreError::InvalidRow(format!("row {}: bad date '{}': {}", id, date, e)))?;
    let time = NaiveTime::parse_from_str(&time, TIME_FORMAT)
        .map_err(|e| StoreError::InvalidRow(format!("row {}: bad time '{}': {}", id, time, e)))?;
    Ok(Measurement {
        id: Some(id),
        date,
        time,
        values,
    })
}

impl AnalysisStore for SqliteStore {
    fn read_all_measurements(&self) -> Result<MeasurementTable, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT id, date, time, co_gt, no2_gt, temperature, humidity
             FROM measurements ORDER BY id",
        )?;
        let raw = stmt
            .query_map([], |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    [row.get(3)?, row.get(4)?, row.get(5)?, row.get(6)?],
                ))
            })?
            .collect::<Result<Vec<RawMeasurement>, _>>()?;

        let table = raw
            .into_iter()
            .map(parse_measurement)
            .collect::<Result<MeasurementTable, _>>()?;

        tracing::info!("Data loaded: {} records", table.len());
        Ok(table)
    }

    fn replace_measurements(&mut self, table: &MeasurementTable) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute("DELETE FROM measurements", [])?;
        for row in table.rows() {
            insert_row(&tx, row)?;
        }
        tx.commit()?;

        tracing::info!("Stored {} measurements", table.len());
        Ok(table.len())
    }

    fn insert_measurement(&mut self, row: &Measurement) -> Result<i64, StoreError> {
        insert_row(&self.conn, row)
    }

    fn delete_measurement(&mut self, id: i64) -> Result<bool, StoreError> {
        let removed = self
            .conn
            .execute("DELETE FROM measurements WHERE id = ?1", params![id])?;
        Ok(removed > 0)
    }

    fn replace_correlation_results(
        &mut self,
        method: CorrelationMethod,
        rows: &[CorrelationRow],
    ) -> Result<usize, StoreError> {
        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM correlation_results WHERE method = ?1",
            params![method.as_ref()],
        )?;
        for row in rows {
            tx.execute(
                "INSERT INTO correlation_results (variable1, variable2, coefficient, method)
                 VALUES (?1, ?2, ?3, ?4)",
                params![row.variable1, row.variable2, row.coefficient, method.as_ref()],
            )?;
        }
        tx.commit()?;

        tracing::info!("{} correlation results stored ({})", rows.len(), method);
        Ok(rows.len())
    }

    fn read_correlation_results(
        &self,
        method: CorrelationMethod,
    ) -> Result<Vec<CorrelationRow>, StoreError> {
        let mut stmt = self.conn.prepare(
            "SELECT variable1, variable2, coefficient FROM correlation_results
             WHERE method = ?1 ORDER BY id",
        )?;
        let rows = stmt
            .query_map(params![method.as_ref()], |row| {
                Ok(CorrelationRow {
                    variable1: row.get(0)?,
                    variable2: row.get(1)?,
                    coefficient: row.get(2)?,
                })
            })?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    fn replace_spectral_result(
        &mut self,
        channel: Channel,
        row: &SpectralRow,
    ) -> Result<(), StoreError> {
        let sample = serde_json::to_string(&row.spectrum)?;

        let tx = self.conn.transaction()?;
        tx.execute(
            "DELETE FROM spectral_results WHERE variable_name = ?1",
            params![channel.name()],
        )?;
        tx.execute(
            "INSERT INTO spectral_results (variable_name, dominant_frequency, spectrum_sample)
             VALUES (?1, ?2, ?3)",
            params![channel.name(), row.dominant_frequency, sample],
        )?;
        tx.commit()?;

        tracing::info!("Spectral results stored for '{}'", channel);
        Ok(())
    }

    fn read_spectral_result(&self, channel: Channel) -> Result<Option<SpectralRow>, StoreError> {
        let raw: Option<(Option<f64>, String)> = self
            .conn
            .query_row(
                "SELECT dominant_frequency, spectrum_sample FROM spectral_results
                 WHERE variable_name = ?1 ORDER BY id DESC LIMIT 1",
                params![channel.name()],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        match raw {
            Some((dominant_frequency, sample)) => {
                let spectrum: SpectrumSample = serde_json::from_str(&sample)?;
                Ok(Some(SpectralRow {
                    dominant_frequency,
                    spectrum,
                }))
            }
            None => Ok(None),
        }
    }
}
