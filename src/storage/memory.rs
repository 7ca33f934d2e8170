//! In-process record store.

use async_trait::async_trait;
use chrono::NaiveDateTime;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use super::RecordStore;
use crate::types::{RecordKind, TrafficError, TrafficObservation, WeatherObservation};

/// Vector-backed store. Rows keep insertion order.
///
/// `fail_inserts` makes every subsequent insert return a storage error,
/// for exercising failure propagation.
#[derive(Default)]
pub struct MemoryStore {
    traffic: Mutex<Vec<TrafficObservation>>,
    weather: Mutex<Vec<WeatherObservation>>,
    fail_inserts: AtomicBool,
    insert_calls: Mutex<Vec<(RecordKind, usize)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate with traffic rows.
    pub fn with_traffic(records: Vec<TrafficObservation>) -> Self {
        Self {
            traffic: Mutex::new(records),
            ..Self::default()
        }
    }

    pub fn set_fail_inserts(&self, fail: bool) {
        self.fail_inserts.store(fail, Ordering::SeqCst);
    }

    /// Every non-empty insert call so far, with its batch size.
    pub fn insert_calls(&self) -> Vec<(RecordKind, usize)> {
        lock(&self.insert_calls).map(|c| c.clone()).unwrap_or_default()
    }

    fn check_writable(&self) -> Result<(), TrafficError> {
        if self.fail_inserts.load(Ordering::SeqCst) {
            return Err(TrafficError::Storage("insert rejected (forced failure)".into()));
        }
        Ok(())
    }

    fn record_call(&self, kind: RecordKind, size: usize) -> Result<(), TrafficError> {
        lock(&self.insert_calls)?.push((kind, size));
        Ok(())
    }
}

fn lock<T>(m: &Mutex<T>) -> Result<MutexGuard<'_, T>, TrafficError> {
    m.lock()
        .map_err(|_| TrafficError::Storage("memory store lock poisoned".into()))
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn insert_traffic(&self, records: &[TrafficObservation]) -> Result<(), TrafficError> {
        if records.is_empty() {
            return Ok(());
        }
        self.check_writable()?;
        lock(&self.traffic)?.extend_from_slice(records);
        self.record_call(RecordKind::Traffic, records.len())
    }

    async fn insert_weather(&self, records: &[WeatherObservation]) -> Result<(), TrafficError> {
        if records.is_empty() {
            return Ok(());
        }
        self.check_writable()?;
        lock(&self.weather)?.extend_from_slice(records);
        self.record_call(RecordKind::Weather, records.len())
    }

    async fn traffic_all(&self) -> Result<Vec<TrafficObservation>, TrafficError> {
        Ok(lock(&self.traffic)?.clone())
    }

    async fn traffic_by_location(&self, location: &str) -> Result<Vec<TrafficObservation>, TrafficError> {
        Ok(lock(&self.traffic)?
            .iter()
            .filter(|r| r.location == location)
            .cloned()
            .collect())
    }

    async fn traffic_by_date_range(
        &self,
        start: NaiveDateTime,
        end: NaiveDateTime,
    ) -> Result<Vec<TrafficObservation>, TrafficError> {
        let mut rows: Vec<TrafficObservation> = lock(&self.traffic)?
            .iter()
            .filter(|r| r.timestamp >= start && r.timestamp <= end)
            .cloned()
            .collect();
        rows.sort_by_key(|r| r.timestamp);
        Ok(rows)
    }

    async fn latest_traffic(&self, limit: usize) -> Result<Vec<TrafficObservation>, TrafficError> {
        let guard = lock(&self.traffic)?;
        let mut indexed: Vec<(usize, &TrafficObservation)> = guard.iter().enumerate().collect();
        // Newest timestamp first, later insertion first on ties.
        indexed.sort_by(|(ia, a), (ib, b)| b.timestamp.cmp(&a.timestamp).then(ib.cmp(ia)));
        Ok(indexed.into_iter().take(limit).map(|(_, r)| r.clone()).collect())
    }

    async fn weather_all(&self) -> Result<Vec<WeatherObservation>, TrafficError> {
        Ok(lock(&self.weather)?.clone())
    }

    async fn latest_weather(&self) -> Result<Vec<WeatherObservation>, TrafficError> {
        let mut latest: BTreeMap<String, WeatherObservation> = BTreeMap::new();
        for row in lock(&self.weather)?.iter() {
            latest.insert(row.location.clone(), row.clone());
        }
        Ok(latest.into_values().collect())
    }

    async fn count(&self, kind: RecordKind) -> Result<u64, TrafficError> {
        let n = match kind {
            RecordKind::Traffic => lock(&self.traffic)?.len(),
            RecordKind::Weather => lock(&self.weather)?.len(),
        };
        Ok(n as u64)
    }

    async fn clear(&self) -> Result<(), TrafficError> {
        lock(&self.traffic)?.clear();
        lock(&self.weather)?.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{DataSource, RainCategory, TrafficCondition};
    use chrono::NaiveDate;

    fn ts(day: u32, hour: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(2026, 10, day).unwrap().and_hms_opt(hour, 0, 0).unwrap()
    }

    fn traffic(location: &str, timestamp: NaiveDateTime, vehicles: u32) -> TrafficObservation {
        TrafficObservation {
            timestamp,
            location: location.into(),
            vehicle_count: vehicles,
            condition: TrafficCondition::Moderate,
            speed_kmh: 35.0,
            is_peak: false,
            rain_factor: 1.0,
            data_source: DataSource::Simulated,
        }
    }

    fn weather(location: &str, timestamp: NaiveDateTime, code: i32) -> WeatherObservation {
        WeatherObservation {
            timestamp,
            location: location.into(),
            temperature: 28.0,
            precipitation: 0.0,
            windspeed: 10.0,
            weather_code: code,
            weather_desc: "Cerah".into(),
            rain_category: RainCategory::None,
        }
    }

    #[tokio::test]
    async fn test_insert_and_filter() {
        let store = MemoryStore::new();
        store
            .insert_traffic(&[
                traffic("A", ts(10, 7), 100),
                traffic("B", ts(11, 7), 120),
                traffic("A", ts(12, 7), 140),
            ])
            .await
            .unwrap();

        assert_eq!(store.count(RecordKind::Traffic).await.unwrap(), 3);
        assert_eq!(store.traffic_by_location("A").await.unwrap().len(), 2);

        let range = store.traffic_by_date_range(ts(11, 0), ts(12, 23)).await.unwrap();
        assert_eq!(range.len(), 2);
        assert_eq!(range[0].location, "B");
    }

    #[tokio::test]
    async fn test_latest_traffic_breaks_ties_by_insertion() {
        let store = MemoryStore::with_traffic(vec![
            traffic("A", ts(10, 7), 1),
            traffic("A", ts(10, 8), 2),
            traffic("B", ts(10, 8), 3),
        ]);
        let latest = store.latest_traffic(2).await.unwrap();
        assert_eq!(latest.iter().map(|r| r.vehicle_count).collect::<Vec<_>>(), vec![3, 2]);
    }

    #[tokio::test]
    async fn test_latest_weather_per_location() {
        let store = MemoryStore::new();
        store
            .insert_weather(&[weather("A", ts(10, 7), 0), weather("B", ts(10, 7), 3), weather("A", ts(10, 8), 61)])
            .await
            .unwrap();
        let latest = store.latest_weather().await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[0].weather_code, 61);
    }

    #[tokio::test]
    async fn test_forced_failure_and_clear() {
        let store = MemoryStore::new();
        store.insert_traffic(&[traffic("A", ts(10, 7), 1)]).await.unwrap();
        store.set_fail_inserts(true);
        let err = store.insert_traffic(&[traffic("A", ts(10, 8), 1)]).await.unwrap_err();
        assert!(matches!(err, TrafficError::Storage(_)));

        // Empty batches never touch the store.
        assert!(store.insert_traffic(&[]).await.is_ok());

        store.clear().await.unwrap();
        assert_eq!(store.count(RecordKind::Traffic).await.unwrap(), 0);
        assert_eq!(store.insert_calls(), vec![(RecordKind::Traffic, 1)]);
    }
}
