//! SQLite record store backed by `sqlx`.
//!
//! Timestamps are stored as `YYYY-MM-DD HH:MM:SS` text, which sorts
//! chronologically. The `hour` column caches the timestamp's hour and is
//! written here, from the timestamp, never by callers.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;
use std::str::FromStr;
use tracing::debug;

use super::RecordStore;
use crate::types::{
    RecordKind, TrafficError, TrafficObservation, WeatherObservation, TIMESTAMP_FORMAT,
};

const CREATE_TRAFFIC: &str = "
    CREATE TABLE IF NOT EXISTS traffic_data (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp     TEXT NOT NULL,
        location      TEXT NOT NULL,
        vehicle_count INTEGER NOT NULL,
        condition     TEXT NOT NULL,
        speed_kmh     REAL,
        hour          INTEGER,
        is_peak       INTEGER DEFAULT 0,
        rain_factor   REAL DEFAULT 1.0,
        data_source   TEXT DEFAULT 'simulated'
    )";

const CREATE_WEATHER: &str = "
    CREATE TABLE IF NOT EXISTS weather_data (
        id            INTEGER PRIMARY KEY AUTOINCREMENT,
        timestamp     TEXT NOT NULL,
        location      TEXT NOT NULL,
        temperature   REAL,
        precipitation REAL,
        windspeed     REAL,
        weather_code  INTEGER,
        weather_desc  TEXT,
        rain_category TEXT DEFAULT 'none'
    )";

const CREATE_INDEXES: &[&str] = &[
    "CREATE INDEX IF NOT EXISTS idx_traffic_location ON traffic_data (location)",
    "CREATE INDEX IF NOT EXISTS idx_traffic_timestamp ON traffic_data (timestamp)",
    "CREATE INDEX IF NOT EXISTS idx_weather_location ON weather_data (location)",
];

const TRAFFIC_COLUMNS: &str =
    "timestamp, location, vehicle_count, condition, speed_kmh, is_peak, rain_factor, data_source";

pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Connect (creating the file if needed) and ensure the schema exists.
    pub async fn connect(database_url: &str) -> Result<Self, TrafficError> {
        let options = SqliteConnectOptions::from_str(database_url)?.create_if_missing(true);
        // A single connection keeps `sqlite::memory:` one shared database
        // and serializes writers.
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await?;
        let store = Self { pool };
        store.init_tables().await?;
        Ok(store)
    }

    async fn init_tables(&self) -> Result<(), TrafficError> {
        sqlx::query(CREATE_TRAFFIC).execute(&self.pool).await?;
        sqlx::query(CREATE_WEATHER).execute(&self.pool).await?;
        for stmt in CREATE_INDEXES {
            sqlx::query(stmt).execute(&self.pool).await?;
        }
        debug!("SQLite tables ready");
        Ok(())
    }
}

fn traffic_rows(rows: Vec<SqliteRow>) -> Result<Vec<TrafficObservation>, TrafficError> {
    rows.iter().map(traffic_from_row).collect()
}

fn format_ts(ts: &NaiveDateTime) -> String {
    ts.format(TIMESTAMP_FORMAT).to_string()
}

fn parse_ts(raw: &str) -> Result<NaiveDateTime, TrafficError> {
    NaiveDateTime::parse_from_str(raw, TIMESTAMP_FORMAT)
        .map_err(|e| TrafficError::Storage(format!("bad timestamp {raw:?}: {e}")))
}

fn traffic_from_row(row: &SqliteRow) -> Result<TrafficObservation, TrafficError> {
    let vehicle_count: i64 = row.try_get("vehicle_count")?;
    let condition: String = row.try_get("condition")?;
    let data_source: Option<String> = row.try_get("data_source")?;
    Ok(TrafficObservation {
        timestamp: parse_ts(&row.try_get::<String, _>("timestamp")?)?,
        location: row.try_get("location")?,
        vehicle_count: u32::try_from(vehicle_count)
            .map_err(|_| TrafficError::Storage(format!("vehicle_count out of range: {vehicle_count}")))?,
        condition: condition
            .parse()
            .map_err(|e| TrafficError::Storage(format!("bad condition column: {e}")))?,
        speed_kmh: row.try_get::<Option<f64>, _>("speed_kmh")?.unwrap_or(0.0),
        is_peak: row.try_get::<Option<i64>, _>("is_peak")?.unwrap_or(0) != 0,
        rain_factor: row.try_get::<Option<f64>, _>("rain_factor")?.unwrap_or(1.0),
        data_source: data_source.as_deref().unwrap_or("simulated").parse()?,
    })
}

fn weather_from_row(row: &SqliteRow) -> Result<WeatherObservation, TrafficError> {
    let rain_category: Option<String> = row.try_get("rain_category")?;
    let weather_code: Option<i64> = row.try_get("weather_code")?;
    Ok(WeatherObservation {
        timestamp: parse_ts(&row.try_get::<String, _>("timestamp")?)?,
        location: row.try_get("location")?,
        temperature: row.try_get::<Option<f64>, _>("temperature")?.unwrap_or(0.0),
        precipitation: row.try_get::<Option<f64>, _>("precipitation")?.unwrap_or(0.0),
        windspeed: row.try_get::<Option<f64>, _>("windspeed")?.unwrap_or(0.0),
        weather_code: weather_code.unwrap_or(0) as i32,
        weather_desc: row.try_get::<Option<String>, _>("weather_desc")?.unwrap_or_default(),
        rain_category: rain_category
            .as_deref()
            .unwrap_or("none")
            .parse()
            .map_err(|e| TrafficError::Storage(format!("bad rain_category column: {e}")))?,
    })
}

#[async_trait]
impl RecordStore for SqliteStore {
    async fn insert_traffic(&self, records: &[TrafficObservation]) -> Result<(), TrafficError> {
        if records.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for r in records {
            sqlx::query(
                "INSERT INTO traffic_data
                 (timestamp, location, vehicle_count, condition, speed_kmh,
                  hour, is_peak, rain_factor, data_source)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(format_ts(&r.timestamp))
            .bind(r.location.clone())
            .bind(i64::from(r.vehicle_count))
            .bind(r.condition.label())
            .bind(r.speed_kmh)
            .bind(i64::from(r.hour()))
            .bind(i64::from(r.is_peak))
            .bind(r.rain_factor)
            .bind(r.data_source.as_str())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        debug!(rows = records.len(), "Inserted traffic records");
        Ok(())
    }

    async fn insert_weather(&self, records: &[WeatherObservation]) -> Result<(), TrafficError> {
        if records.is_empty() {
            return Ok(());
        }
        let mut tx = self.pool.begin().await?;
        for r in records {
            sqlx::query(
                "INSERT INTO weather_data
                 (timestamp, location, temperature, precipitation, windspeed,
                  weather_code, weather_desc, rain_category)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
            )
            .bind(format_ts(&r.timestamp))
            .bind(r.location.clone())
            .bind(r.temperature)
            .bind(r.precipitation)
            .bind(r.windspeed)
            .bind(i64::from(r.weather_code))
            .bind(r.weather_desc.clone())
            .bind(r.rain_category.as_str())
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        debug!(rows = records.len(), "Inserted weather records");
        Ok(())
    }

    async fn traffic_all(&self) -> Result<Vec<TrafficObservation>, TrafficError> {
        let sql = format!("SELECT {TRAFFIC_COLUMNS} FROM traffic_data ORDER BY id");
        traffic_rows(sqlx::query(&sql).fetch_all(&self.pool).await?)
    }

    async fn traffic_by_location(&self, location: &str) -> Result<Vec<TrafficObservation>, TrafficError> {
        let sql = format!("SELECT {TRAFFIC_COLUMNS} FROM traffic_data WHERE location = ? ORDER BY id");
        let rows = sqlx::query(&sql)
            .bind(location.to_string())
            .fetch_all(&self.pool)
            .await?;
        traffic_rows(rows)
    }

    async fn traffic_by_date_range(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<TrafficObservation>, TrafficError> {
        let sql = format!(
            "SELECT {TRAFFIC_COLUMNS} FROM traffic_data
             WHERE timestamp BETWEEN ? AND ? ORDER BY timestamp, id"
        );
        let rows = sqlx::query(&sql)
            .bind(format_ts(&start))
            .bind(format_ts(&end))
            .fetch_all(&self.pool)
            .await?;
        traffic_rows(rows)
    }

    async fn latest_traffic(&self, limit: usize) -> Result<Vec<TrafficObservation>, TrafficError> {
        let sql = format!(
            "SELECT {TRAFFIC_COLUMNS} FROM traffic_data ORDER BY timestamp DESC, id DESC LIMIT ?"
        );
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);
        traffic_rows(sqlx::query(&sql).bind(limit).fetch_all(&self.pool).await?)
    }

    async fn weather_all(&self) -> Result<Vec<WeatherObservation>, TrafficError> {
        sqlx::query("SELECT * FROM weather_data ORDER BY id")
            .fetch_all(&self.pool)
            .await?
            .iter()
            .map(weather_from_row)
            .collect()
    }

    async fn latest_weather(&self) -> Result<Vec<WeatherObservation>, TrafficError> {
        sqlx::query(
            "SELECT * FROM weather_data
             WHERE id IN (SELECT MAX(id) FROM weather_data GROUP BY location)
             ORDER BY location",
        )
        .fetch_all(&self.pool)
        .await?
        .iter()
        .map(weather_from_row)
        .collect()
    }

    async fn count(&self, kind: RecordKind) -> Result<u64, TrafficError> {
        let sql = format!("SELECT COUNT(*) AS total FROM {}", kind.table());
        let row = sqlx::query(&sql).fetch_one(&self.pool).await?;
        let total: i64 = row.try_get("total")?;
        Ok(total.max(0) as u64)
    }

    async fn clear(&self) -> Result<(), TrafficError> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM traffic_data").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM weather_data").execute(&mut *tx).await?;
        tx.commit().await?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
