//! Persistence layer.
//!
//! `RecordStore` is the only way observations are written or read
//! back. Two implementations: `SqliteStore` for the running service and
//! `MemoryStore` for tests and throwaway runs. Both return rows in
//! insertion order, which "latest" queries use to break timestamp ties.

pub mod memory;
pub mod sqlite;

use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::sync::Arc;
use tracing::info;

use crate::types::{RecordKind, TrafficError, TrafficObservation, WeatherObservation};

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

/// Append-only record store for traffic and weather observations.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Append a batch of traffic rows. An empty batch is a no-op.
    async fn insert_traffic(&self, records: &[TrafficObservation]) -> Result<(), TrafficError>;

    /// Append a batch of weather rows. An empty batch is a no-op.
    async fn insert_weather(&self, records: &[WeatherObservation]) -> Result<(), TrafficError>;

    async fn traffic_all(&self) -> Result<Vec<TrafficObservation>, TrafficError>;

    async fn traffic_by_location(&self, location: &str) -> Result<Vec<TrafficObservation>, TrafficError>;

    /// Rows with `start <= timestamp <= end`, oldest first.
    async fn traffic_by_date_range(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<TrafficObservation>, TrafficError>;

    /// The `limit` newest traffic rows, newest first.
    async fn latest_traffic(&self, limit: usize) -> Result<Vec<TrafficObservation>, TrafficError>;

    async fn weather_all(&self) -> Result<Vec<WeatherObservation>, TrafficError>;

    /// The most recently inserted weather row for each location.
    async fn latest_weather(&self) -> Result<Vec<WeatherObservation>, TrafficError>;

    async fn count(&self, kind: RecordKind) -> Result<u64, TrafficError>;

    /// Delete every row of both kinds.
    async fn clear(&self) -> Result<(), TrafficError>;
}

/// Open the store named by a `database_url`.
///
/// `memory` selects `MemoryStore`; anything else is handed to SQLite.
pub async fn open(database_url: &str) -> Result<Arc<dyn RecordStore>, TrafficError> {
    if database_url == "memory" {
        info!("Using in-memory record store");
        return Ok(Arc::new(MemoryStore::new()));
    }
    let store = SqliteStore::connect(database_url).await?;
    info!(database_url, "SQLite record store ready");
    Ok(Arc::new(store))
}
