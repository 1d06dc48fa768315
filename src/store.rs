use rusqlite::{params, Connection, OptionalExtension};
use std::fmt;
use std::fs;
use std::path::Path;
use std::sync::{Mutex, MutexGuard};
use std::time::Duration;

use crate::model::{
    AirQualityReading, AirQualitySummary, BirdObservation, BirdSummary, BirdTally, WeatherReading,
    WeatherSummary,
};

#[derive(Debug)]
pub enum StoreError {
    Database(rusqlite::Error),
    Io(std::io::Error),
    Poisoned,
}

impl From<rusqlite::Error> for StoreError {
    fn from(err: rusqlite::Error) -> Self {
        StoreError::Database(err)
    }
}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err)
    }
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Database(e) => write!(f, "database error: {}", e),
            StoreError::Io(e) => write!(f, "io error: {}", e),
            StoreError::Poisoned => write!(f, "store lock poisoned"),
        }
    }
}

impl std::error::Error for StoreError {}

/// Column layout of one reading table. Bootstrap, appends and window scans
/// run uniformly over this; a new category is one more descriptor plus its
/// typed row mapping.
struct TableDef {
    name: &'static str,
    /// Measurement columns after the fixed (id, ts) prefix.
    columns: &'static [(&'static str, &'static str)],
}

const WEATHER: TableDef = TableDef {
    name: "thp_readings",
    columns: &[
        ("temperature", "REAL"),
        ("humidity", "REAL"),
        ("pressure", "REAL"),
    ],
};

const AIR_QUALITY: TableDef = TableDef {
    name: "air_quality_readings",
    columns: &[("pm1", "REAL"), ("pm2_5", "REAL"), ("pm10", "REAL")],
};

const BIRDS: TableDef = TableDef {
    name: "bird_observations",
    columns: &[
        ("scientific_name", "TEXT"),
        ("common_name", "TEXT"),
        ("confidence", "REAL"),
    ],
};

const TABLES: [&TableDef; 3] = [&WEATHER, &AIR_QUALITY, &BIRDS];

fn create_sql(table: &TableDef) -> String {
    let columns: Vec<String> = table
        .columns
        .iter()
        .map(|(name, sql_type)| format!("{} {}", name, sql_type))
        .collect();
    format!(
        "CREATE TABLE IF NOT EXISTS {} (id TEXT PRIMARY KEY, ts REAL NOT NULL, {});\n\
         CREATE INDEX IF NOT EXISTS idx_{}_ts ON {} (ts);",
        table.name,
        columns.join(", "),
        table.name,
        table.name
    )
}

fn insert_sql(table: &TableDef) -> String {
    let names: Vec<&str> = table.columns.iter().map(|(name, _)| *name).collect();
    let placeholders: Vec<String> = (3..3 + names.len()).map(|i| format!("?{}", i)).collect();
    format!(
        "INSERT OR IGNORE INTO {} (id, ts, {}) VALUES (?1, ?2, {})",
        table.name,
        names.join(", "),
        placeholders.join(", ")
    )
}

fn latest_sql(table: &TableDef) -> String {
    let names: Vec<&str> = table.columns.iter().map(|(name, _)| *name).collect();
    // Equal stamps are resolved by highest id so repeated queries agree.
    format!(
        "SELECT id, ts, {} FROM {} WHERE ts > ?1 ORDER BY ts DESC, id DESC LIMIT 1",
        names.join(", "),
        table.name
    )
}

fn summary_sql(table: &TableDef) -> String {
    // avg() skips NULLs per column, which is exactly the per-field
    // independence the summaries promise.
    let avgs: Vec<String> = table
        .columns
        .iter()
        .map(|(name, _)| format!("avg({})", name))
        .collect();
    format!(
        "SELECT {}, count(id), max(ts) FROM {} WHERE ts > ?1",
        avgs.join(", "),
        table.name
    )
}

fn ranking_sql(table: &TableDef) -> String {
    format!(
        "SELECT common_name, sum(confidence) FROM {} \
         WHERE ts > ?1 AND confidence >= ?2 AND common_name IS NOT NULL \
         GROUP BY common_name ORDER BY sum(confidence) DESC, common_name ASC",
        table.name
    )
}

fn ranking_window_sql(table: &TableDef) -> String {
    format!(
        "SELECT count(id), max(ts) FROM {} \
         WHERE ts > ?1 AND confidence >= ?2 AND common_name IS NOT NULL",
        table.name
    )
}

/// Durable home of every reading, one SQLite file. All access funnels
/// through one connection; the guard is held for a single operation and
/// drops on any exit path.
pub struct ReadingStore {
    conn: Mutex<Connection>,
}

impl ReadingStore {
    /// Opens (creating if needed) the database and runs table bootstrap.
    /// Bootstrap is repeatable at every start and never touches existing
    /// rows.
    pub fn open(db_path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.busy_timeout(Duration::from_secs(5))?;

        for table in TABLES {
            conn.execute_batch(&create_sql(table))?;
        }

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Poisoned)
    }

    // --- APPENDS ---

    /// `Ok(false)` means the id already existed and the row was left as it
    /// was. Re-delivery of a reading is not a fault.
    pub fn append_weather(&self, reading: &WeatherReading) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            &insert_sql(&WEATHER),
            params![
                reading.id,
                reading.ts,
                reading.temperature,
                reading.humidity,
                reading.pressure
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn append_air_quality(&self, reading: &AirQualityReading) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            &insert_sql(&AIR_QUALITY),
            params![
                reading.id,
                reading.ts,
                reading.pm1,
                reading.pm2_5,
                reading.pm10
            ],
        )?;
        Ok(changed > 0)
    }

    pub fn append_bird(&self, observation: &BirdObservation) -> Result<bool, StoreError> {
        let conn = self.conn()?;
        let changed = conn.execute(
            &insert_sql(&BIRDS),
            params![
                observation.id,
                observation.ts,
                observation.scientific_name,
                observation.common_name,
                observation.confidence
            ],
        )?;
        Ok(changed > 0)
    }

    // --- WINDOW SCANS ---

    fn latest_row<T>(
        &self,
        table: &TableDef,
        min_ts: f64,
        map: fn(&rusqlite::Row<'_>) -> rusqlite::Result<T>,
    ) -> Result<Option<T>, StoreError> {
        let conn = self.conn()?;
        conn.query_row(&latest_sql(table), params![min_ts], map)
            .optional()
            .map_err(StoreError::from)
    }

    pub fn latest_weather_since(&self, min_ts: f64) -> Result<Option<WeatherReading>, StoreError> {
        self.latest_row(&WEATHER, min_ts, |row| {
            Ok(WeatherReading {
                id: row.get(0)?,
                ts: row.get(1)?,
                temperature: row.get(2)?,
                humidity: row.get(3)?,
                pressure: row.get(4)?,
            })
        })
    }

    pub fn latest_air_quality_since(
        &self,
        min_ts: f64,
    ) -> Result<Option<AirQualityReading>, StoreError> {
        self.latest_row(&AIR_QUALITY, min_ts, |row| {
            Ok(AirQualityReading {
                id: row.get(0)?,
                ts: row.get(1)?,
                pm1: row.get(2)?,
                pm2_5: row.get(3)?,
                pm10: row.get(4)?,
            })
        })
    }

    pub fn latest_bird_since(&self, min_ts: f64) -> Result<Option<BirdObservation>, StoreError> {
        self.latest_row(&BIRDS, min_ts, |row| {
            Ok(BirdObservation {
                id: row.get(0)?,
                ts: row.get(1)?,
                scientific_name: row.get(2)?,
                common_name: row.get(3)?,
                confidence: row.get(4)?,
            })
        })
    }

    pub fn weather_summary_since(&self, min_ts: f64) -> Result<WeatherSummary, StoreError> {
        let conn = self.conn()?;
        conn.query_row(&summary_sql(&WEATHER), params![min_ts], |row| {
            Ok(WeatherSummary {
                temperature: row.get(0)?,
                humidity: row.get(1)?,
                pressure: row.get(2)?,
                num_readings: row.get(3)?,
                latest_reading: row.get(4)?,
            })
        })
        .map_err(StoreError::from)
    }

    pub fn air_quality_summary_since(&self, min_ts: f64) -> Result<AirQualitySummary, StoreError> {
        let conn = self.conn()?;
        conn.query_row(&summary_sql(&AIR_QUALITY), params![min_ts], |row| {
            Ok(AirQualitySummary {
                pm1: row.get(0)?,
                pm2_5: row.get(1)?,
                pm10: row.get(2)?,
                num_readings: row.get(3)?,
                latest_reading: row.get(4)?,
            })
        })
        .map_err(StoreError::from)
    }

    /// Species ranking over the observation window. Rows under the floor or
    /// without a common name never enter the tally; `num_readings` counts
    /// the rows that did.
    pub fn bird_summary_since(&self, min_ts: f64, floor: f64) -> Result<BirdSummary, StoreError> {
        let conn = self.conn()?;

        let mut stmt = conn.prepare(&ranking_sql(&BIRDS))?;
        let rows = stmt.query_map(params![min_ts, floor], |row| {
            Ok(BirdTally {
                common_name: row.get(0)?,
                confidence: row.get(1)?,
            })
        })?;

        let mut sightings = Vec::new();
        for tally in rows {
            sightings.push(tally?);
        }

        let (num_readings, latest_reading): (i64, Option<f64>) = conn.query_row(
            &ranking_window_sql(&BIRDS),
            params![min_ts, floor],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;

        Ok(BirdSummary {
            sightings,
            num_readings,
            latest_reading,
        })
    }
}
